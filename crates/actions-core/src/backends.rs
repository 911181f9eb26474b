//! Collaborating services, consumed through traits.
//!
//! A [`Backends`] value is built once at start-up and shared by every
//! invocation. Services a deployment does not configure are filled with
//! [`Unavailable`], which fails each call with a configuration error.

use crate::error::{ActionError, Result};
use crate::generation::GenerationRequest;
use crate::poll::{ExecutionState, Sleeper, TokioSleeper};
use crate::storage::ObjectStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Text generation
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one completion. An empty string means the model produced no text.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Graph database
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelProperties {
    pub label: String,
    /// `(property, type)` pairs, sorted by property name.
    pub properties: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    pub from: String,
    pub edge: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSchema {
    pub nodes: Vec<LabelProperties>,
    pub relationships: Vec<LabelProperties>,
    pub triples: Vec<Triple>,
}

impl fmt::Display for LabelProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let props: Vec<String> = self
            .properties
            .iter()
            .map(|(name, ty)| format!("{name}: {ty}"))
            .collect();
        write!(f, "{} {{{}}}", self.label, props.join(", "))
    }
}

impl fmt::Display for GraphSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Node properties are the following:")?;
        for node in &self.nodes {
            writeln!(f, "{node}")?;
        }
        writeln!(f, "Relationship properties are the following:")?;
        for rel in &self.relationships {
            writeln!(f, "{rel}")?;
        }
        write!(f, "The relationships are the following:")?;
        for t in &self.triples {
            write!(f, "\n(:{})-[:{}]->(:{})", t.from, t.edge, t.to)?;
        }
        Ok(())
    }
}

#[async_trait]
pub trait GraphDatabase: Send + Sync {
    async fn schema(&self) -> Result<GraphSchema>;

    /// Run an openCypher query and return the raw JSON result.
    async fn query(&self, query: &str) -> Result<Value>;
}

// ---------------------------------------------------------------------------
// SQL engine
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SqlEngine: Send + Sync {
    /// Submit `sql` against `database` and return the execution id.
    async fn start_query(&self, sql: &str, database: &str) -> Result<String>;

    async fn query_state(&self, execution_id: &str) -> Result<ExecutionState>;

    /// All result rows of a succeeded query, header row first.
    async fn fetch_rows(&self, execution_id: &str) -> Result<Vec<Vec<Option<String>>>>;
}

// ---------------------------------------------------------------------------
// Batch scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    #[serde(default = "default_vcpu")]
    pub vcpu: u32,
    #[serde(default = "default_memory_mib")]
    pub memory_mib: u32,
    #[serde(default = "default_gpu")]
    pub gpu: u32,
}

fn default_vcpu() -> u32 {
    1
}

fn default_memory_mib() -> u32 {
    15_000
}

fn default_gpu() -> u32 {
    1
}

impl Default for ResourceRequirements {
    fn default() -> Self {
        Self {
            vcpu: default_vcpu(),
            memory_mib: default_memory_mib(),
            gpu: default_gpu(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSubmission {
    pub name: String,
    pub queue: String,
    pub definition: String,
    pub environment: Vec<(String, String)>,
    pub resources: ResourceRequirements,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    /// Status string exactly as the scheduler reports it.
    pub status: String,
    pub state: ExecutionState,
    pub reason: Option<String>,
}

#[async_trait]
pub trait BatchScheduler: Send + Sync {
    /// Submit a job and return its id.
    async fn submit(&self, job: &JobSubmission) -> Result<String>;

    async fn describe(&self, job_id: &str) -> Result<JobStatus>;
}

// ---------------------------------------------------------------------------
// Web search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub target_website: Option<String>,
    pub topic: Option<String>,
    pub days: Option<u32>,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Raw search results, serialized as returned by the provider.
    async fn search(&self, query: &SearchQuery) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn secret_string(&self, secret_id: &str) -> Result<String>;
}

/// Reads secrets from environment variables named after the secret id.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretStore;

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn secret_string(&self, secret_id: &str) -> Result<String> {
        std::env::var(secret_id)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ActionError::NotFound(format!("secret {secret_id} is not set")))
    }
}

// ---------------------------------------------------------------------------
// Unavailable
// ---------------------------------------------------------------------------

/// Placeholder for a service the deployment did not configure.
#[derive(Debug, Clone, Copy)]
pub struct Unavailable(pub &'static str);

impl Unavailable {
    fn err(&self) -> ActionError {
        ActionError::Configuration(format!("{} is not configured", self.0))
    }
}

#[async_trait]
impl TextGenerator for Unavailable {
    async fn generate(&self, _: &GenerationRequest) -> Result<String> {
        Err(self.err())
    }
}

#[async_trait]
impl GraphDatabase for Unavailable {
    async fn schema(&self) -> Result<GraphSchema> {
        Err(self.err())
    }

    async fn query(&self, _: &str) -> Result<Value> {
        Err(self.err())
    }
}

#[async_trait]
impl SqlEngine for Unavailable {
    async fn start_query(&self, _: &str, _: &str) -> Result<String> {
        Err(self.err())
    }

    async fn query_state(&self, _: &str) -> Result<ExecutionState> {
        Err(self.err())
    }

    async fn fetch_rows(&self, _: &str) -> Result<Vec<Vec<Option<String>>>> {
        Err(self.err())
    }
}

#[async_trait]
impl BatchScheduler for Unavailable {
    async fn submit(&self, _: &JobSubmission) -> Result<String> {
        Err(self.err())
    }

    async fn describe(&self, _: &str) -> Result<JobStatus> {
        Err(self.err())
    }
}

#[async_trait]
impl WebSearch for Unavailable {
    async fn search(&self, _: &SearchQuery) -> Result<String> {
        Err(self.err())
    }
}

#[async_trait]
impl SecretStore for Unavailable {
    async fn secret_string(&self, _: &str) -> Result<String> {
        Err(self.err())
    }
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn ObjectStore>,
    pub generator: Arc<dyn TextGenerator>,
    pub graph: Arc<dyn GraphDatabase>,
    pub sql: Arc<dyn SqlEngine>,
    pub batch: Arc<dyn BatchScheduler>,
    pub search: Arc<dyn WebSearch>,
    pub sleeper: Arc<dyn Sleeper>,
}

impl Backends {
    /// Every service other than `store` starts out [`Unavailable`].
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            generator: Arc::new(Unavailable("text generation")),
            graph: Arc::new(Unavailable("graph database")),
            sql: Arc::new(Unavailable("sql engine")),
            batch: Arc::new(Unavailable("batch scheduler")),
            search: Arc::new(Unavailable("web search")),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_graph(mut self, graph: Arc<dyn GraphDatabase>) -> Self {
        self.graph = graph;
        self
    }

    pub fn with_sql(mut self, sql: Arc<dyn SqlEngine>) -> Self {
        self.sql = sql;
        self
    }

    pub fn with_batch(mut self, batch: Arc<dyn BatchScheduler>) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.search = search;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }
}
