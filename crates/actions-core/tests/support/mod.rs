#![allow(dead_code)]

use actions_core::backends::{
    BatchScheduler, Backends, GraphDatabase, GraphSchema, JobStatus, JobSubmission, SearchQuery,
    SqlEngine, TextGenerator, WebSearch,
};
use actions_core::config::{Config, Provider};
use actions_core::envelope::InvocationEvent;
use actions_core::generation::GenerationRequest;
use actions_core::poll::{ExecutionState, Sleeper};
use actions_core::storage::{MemoryStore, ObjectStore, StorageError};
use actions_core::{ActionError, ActionRouter, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeGenerator {
    pub reply: String,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.reply.clone())
    }
}

#[derive(Default)]
pub struct FakeGraph {
    pub schema: GraphSchema,
    pub result: Value,
    pub queries: Mutex<Vec<String>>,
}

#[async_trait]
impl GraphDatabase for FakeGraph {
    async fn schema(&self) -> Result<GraphSchema> {
        Ok(self.schema.clone())
    }

    async fn query(&self, query: &str) -> Result<Value> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.result.clone())
    }
}

/// Replays `states` for every query, then serves `rows`.
#[derive(Default)]
pub struct FakeSql {
    pub states: Vec<ExecutionState>,
    pub rows: Vec<Vec<Option<String>>>,
    pub started: Mutex<Vec<(String, String)>>,
    pending: Mutex<VecDeque<ExecutionState>>,
    pub status_checks: AtomicUsize,
    pub fetches: AtomicUsize,
}

impl FakeSql {
    pub fn new(states: Vec<ExecutionState>, rows: Vec<Vec<&str>>) -> Self {
        Self {
            states,
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(|c| Some(c.to_string())).collect())
                .collect(),
            ..Default::default()
        }
    }

    pub fn started(&self) -> Vec<(String, String)> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlEngine for FakeSql {
    async fn start_query(&self, sql: &str, database: &str) -> Result<String> {
        let mut started = self.started.lock().unwrap();
        started.push((sql.to_string(), database.to_string()));
        *self.pending.lock().unwrap() = self.states.iter().cloned().collect();
        Ok(format!("exec-{}", started.len()))
    }

    async fn query_state(&self, _: &str) -> Result<ExecutionState> {
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        let mut pending = self.pending.lock().unwrap();
        Ok(pending
            .pop_front()
            .unwrap_or_else(|| self.states.last().cloned().unwrap_or(ExecutionState::Running)))
    }

    async fn fetch_rows(&self, _: &str) -> Result<Vec<Vec<Option<String>>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }
}

pub struct FakeBatch {
    pub job_id: String,
    pub status: Option<JobStatus>,
    pub submissions: Mutex<Vec<JobSubmission>>,
}

impl Default for FakeBatch {
    fn default() -> Self {
        Self {
            job_id: "4c8f7a2e-job".to_string(),
            status: None,
            submissions: Mutex::new(Vec::new()),
        }
    }
}

impl FakeBatch {
    pub fn submissions(&self) -> Vec<JobSubmission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchScheduler for FakeBatch {
    async fn submit(&self, job: &JobSubmission) -> Result<String> {
        self.submissions.lock().unwrap().push(job.clone());
        Ok(self.job_id.clone())
    }

    async fn describe(&self, job_id: &str) -> Result<JobStatus> {
        self.status
            .clone()
            .ok_or_else(|| ActionError::NotFound(format!("job {job_id} not found")))
    }
}

#[derive(Default)]
pub struct FakeSearch {
    pub queries: Mutex<Vec<SearchQuery>>,
}

#[async_trait]
impl WebSearch for FakeSearch {
    async fn search(&self, query: &SearchQuery) -> Result<String> {
        self.queries.lock().unwrap().push(query.clone());
        Ok(r#"{"results":[{"title":"MSI-H and immunotherapy","url":"https://nih.gov/a"}]}"#.to_string())
    }
}

#[derive(Default)]
pub struct NoSleep {
    pub sleeps: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Object store whose writes are always refused.
pub struct ReadOnlyStore;

#[async_trait]
impl ObjectStore for ReadOnlyStore {
    fn bucket(&self) -> &str {
        "pathology-data"
    }

    async fn put(&self, key: &str, _: Vec<u8>, _: &str) -> std::result::Result<(), StorageError> {
        Err(StorageError::Write {
            bucket: "pathology-data".into(),
            key: key.into(),
            message: "AccessDenied".into(),
        })
    }

    async fn get(&self, key: &str) -> std::result::Result<Vec<u8>, StorageError> {
        Err(StorageError::NotFound {
            bucket: "pathology-data".into(),
            key: key.into(),
        })
    }

    async fn list_keys(&self, _: &str, _: usize) -> std::result::Result<Vec<String>, StorageError> {
        Ok(Vec::new())
    }

    async fn presign_get(&self, key: &str, _: Duration) -> std::result::Result<String, StorageError> {
        Err(StorageError::Presign {
            bucket: "pathology-data".into(),
            key: key.into(),
            message: "nothing to presign".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub fn config() -> Config {
    let mut config = Config {
        provider: Provider::Local,
        ..Config::default()
    };
    config.storage.bucket = "pathology-data".into();
    config.batch.job_queue = "gpu-queue".into();
    config.batch.feature_extraction_definition = "feature-extraction:4".into();
    config.batch.classifier_definition = "msi-classifier:2".into();
    config.sql.poll.max_attempts = 5;
    config
}

pub fn backends(store: Arc<MemoryStore>) -> Backends {
    Backends::new(store).with_sleeper(Arc::new(NoSleep::default()))
}

pub fn router(config: Config, backends: Backends) -> ActionRouter {
    ActionRouter::new(Arc::new(config), backends)
}

pub fn function_event(action_group: &str, function: &str, params: &[(&str, &str)]) -> InvocationEvent {
    let parameters: Vec<Value> = params
        .iter()
        .map(|(name, value)| json!({ "name": name, "type": "string", "value": value }))
        .collect();
    serde_json::from_value(json!({
        "messageVersion": "1.0",
        "agent": { "name": "agent", "id": "AGENT1", "alias": "TSTALIASID", "version": "DRAFT" },
        "actionGroup": action_group,
        "function": function,
        "parameters": parameters,
        "sessionId": "session-1"
    }))
    .unwrap()
}

pub fn api_event(path: &str, method: &str, params: &[(&str, &str)], input_text: Option<&str>) -> InvocationEvent {
    let parameters: Vec<Value> = params
        .iter()
        .map(|(name, value)| json!({ "name": name, "type": "string", "value": value }))
        .collect();
    serde_json::from_value(json!({
        "messageVersion": "1.0",
        "actionGroup": "queries",
        "apiPath": path,
        "httpMethod": method,
        "parameters": parameters,
        "inputText": input_text
    }))
    .unwrap()
}
