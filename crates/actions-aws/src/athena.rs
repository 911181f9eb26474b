use actions_core::backends::SqlEngine;
use actions_core::error::{ActionError, Result};
use actions_core::poll::ExecutionState;
use async_trait::async_trait;
use aws_sdk_athena::error::DisplayErrorContext;
use aws_sdk_athena::types::{QueryExecutionContext, ResultConfiguration};
use aws_sdk_athena::Client;
use tracing::debug;

const SERVICE: &str = "athena";

fn backend_err(e: impl std::error::Error) -> ActionError {
    ActionError::backend(SERVICE, DisplayErrorContext(&e))
}

pub struct AthenaEngine {
    client: Client,
    output_location: Option<String>,
    workgroup: Option<String>,
}

impl AthenaEngine {
    pub fn new(client: Client, output_location: Option<String>, workgroup: Option<String>) -> Self {
        Self {
            client,
            output_location,
            workgroup,
        }
    }
}

/// Map an Athena `QueryExecutionState` string onto the shared lifecycle.
pub fn execution_state(state: &str, reason: Option<&str>) -> ExecutionState {
    match state {
        "QUEUED" => ExecutionState::Submitted,
        "SUCCEEDED" => ExecutionState::Succeeded,
        "FAILED" => ExecutionState::Failed {
            reason: reason.map(String::from),
        },
        "CANCELLED" => ExecutionState::Cancelled,
        _ => ExecutionState::Running,
    }
}

#[async_trait]
impl SqlEngine for AthenaEngine {
    async fn start_query(&self, sql: &str, database: &str) -> Result<String> {
        let result_config = self
            .output_location
            .as_ref()
            .map(|location| ResultConfiguration::builder().output_location(location).build());
        let output = self
            .client
            .start_query_execution()
            .query_string(sql)
            .query_execution_context(QueryExecutionContext::builder().database(database).build())
            .set_result_configuration(result_config)
            .set_work_group(self.workgroup.clone())
            .send()
            .await
            .map_err(backend_err)?;
        output
            .query_execution_id()
            .map(String::from)
            .ok_or_else(|| ActionError::backend(SERVICE, "no query execution id returned"))
    }

    async fn query_state(&self, execution_id: &str) -> Result<ExecutionState> {
        let output = self
            .client
            .get_query_execution()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(backend_err)?;
        let status = output.query_execution().and_then(|q| q.status());
        let state = status.and_then(|s| s.state()).map(|s| s.as_str()).unwrap_or("QUEUED");
        let reason = status.and_then(|s| s.state_change_reason());
        debug!(execution_id, state, "query state");
        Ok(execution_state(state, reason))
    }

    async fn fetch_rows(&self, execution_id: &str) -> Result<Vec<Vec<Option<String>>>> {
        let mut rows = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .get_query_results()
                .query_execution_id(execution_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(backend_err)?;
            if let Some(result_set) = output.result_set() {
                rows.extend(result_set.rows().iter().map(|row| {
                    row.data()
                        .iter()
                        .map(|d| d.var_char_value().map(String::from))
                        .collect::<Vec<_>>()
                }));
            }
            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        debug!(execution_id, rows = rows.len(), "query results fetched");
        Ok(rows)
    }
}
