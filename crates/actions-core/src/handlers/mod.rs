//! The closed set of action handlers and their operations.
//!
//! An invocation names its operation with a string (a function name or an
//! API path). That string is resolved exactly once into an [`Operation`];
//! everything after that dispatches on the enum.

pub mod graph;
pub mod pathology;
pub mod radiology;
pub mod sql;
pub mod web_search;

use crate::backends::Backends;
use crate::config::Config;
use crate::envelope::{ActionRequest, Invocation};
use crate::error::{ActionError, Result};
use crate::spill::Payload;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// HandlerKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandlerKind {
    WebSearch,
    Pathology,
    Radiology,
    Graph,
    Sql,
}

impl HandlerKind {
    pub fn all() -> &'static [HandlerKind] {
        &[
            HandlerKind::WebSearch,
            HandlerKind::Pathology,
            HandlerKind::Radiology,
            HandlerKind::Graph,
            HandlerKind::Sql,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HandlerKind::WebSearch => "web-search",
            HandlerKind::Pathology => "pathology",
            HandlerKind::Radiology => "radiology",
            HandlerKind::Graph => "graph",
            HandlerKind::Sql => "sql",
        }
    }

    /// Operation names this handler accepts, as the agent sends them.
    pub fn operations(self) -> &'static [&'static str] {
        match self {
            HandlerKind::WebSearch => &[web_search::WEB_SEARCH],
            HandlerKind::Pathology => &[
                pathology::RETRIEVE_REPORT,
                pathology::FEATURE_EXTRACTION,
                pathology::MSI_STATUS,
                pathology::BATCH_JOB_STATUS,
                pathology::EXECUTED_MODELS,
            ],
            HandlerKind::Radiology => &[radiology::RUN_VALIDATOR],
            HandlerKind::Graph => &[graph::GET_SCHEMA, graph::QUERY],
            HandlerKind::Sql => &[sql::GET_SCHEMA, sql::QUERY],
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerKind {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        HandlerKind::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| ActionError::Configuration(format!("unknown handler '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebSearchOp {
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathologyOp {
    RetrieveReport,
    FeatureExtraction,
    MsiStatus,
    BatchJobStatus,
    ExecutedModels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiologyOp {
    RunValidator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphOp {
    GetSchema,
    Query,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlOp {
    GetSchema,
    Query,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    WebSearch(WebSearchOp),
    Pathology(PathologyOp),
    Radiology(RadiologyOp),
    Graph(GraphOp),
    Sql(SqlOp),
}

impl Operation {
    /// Resolve the operation `invocation` names within `kind`. API-path
    /// operations are matched on the path alone; the method is echoed back
    /// but not checked.
    pub fn resolve(kind: HandlerKind, invocation: &Invocation) -> Result<Self> {
        let name = invocation.operation_name();
        let op = match kind {
            HandlerKind::WebSearch => match name {
                web_search::WEB_SEARCH => Some(Operation::WebSearch(WebSearchOp::Search)),
                _ => None,
            },
            HandlerKind::Pathology => match name {
                pathology::RETRIEVE_REPORT => Some(PathologyOp::RetrieveReport),
                pathology::FEATURE_EXTRACTION => Some(PathologyOp::FeatureExtraction),
                pathology::MSI_STATUS => Some(PathologyOp::MsiStatus),
                pathology::BATCH_JOB_STATUS => Some(PathologyOp::BatchJobStatus),
                pathology::EXECUTED_MODELS => Some(PathologyOp::ExecutedModels),
                _ => None,
            }
            .map(Operation::Pathology),
            HandlerKind::Radiology => match name {
                radiology::RUN_VALIDATOR => Some(Operation::Radiology(RadiologyOp::RunValidator)),
                _ => None,
            },
            HandlerKind::Graph => match name {
                graph::GET_SCHEMA => Some(Operation::Graph(GraphOp::GetSchema)),
                graph::QUERY => Some(Operation::Graph(GraphOp::Query)),
                _ => None,
            },
            HandlerKind::Sql => match name {
                sql::GET_SCHEMA => Some(Operation::Sql(SqlOp::GetSchema)),
                sql::QUERY => Some(Operation::Sql(SqlOp::Query)),
                _ => None,
            },
        };

        // Function handlers are only reachable by function name and API
        // handlers only by path.
        let style_matches = matches!(
            (kind, invocation),
            (
                HandlerKind::WebSearch | HandlerKind::Pathology | HandlerKind::Radiology,
                Invocation::Function { .. }
            ) | (HandlerKind::Graph | HandlerKind::Sql, Invocation::Api { .. })
        );

        match op {
            Some(op) if style_matches => Ok(op),
            _ => Err(ActionError::UnknownOperation {
                handler: kind.to_string(),
                operation: name.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Everything an operation may touch.
pub struct HandlerContext<'a> {
    pub config: &'a Config,
    pub backends: &'a Backends,
}

pub async fn run(op: Operation, ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    match op {
        Operation::WebSearch(op) => web_search::run(op, ctx, request).await,
        Operation::Pathology(op) => pathology::run(op, ctx, request).await,
        Operation::Radiology(op) => radiology::run(op, ctx, request).await,
        Operation::Graph(op) => graph::run(op, ctx, request).await,
        Operation::Sql(op) => sql::run(op, ctx, request).await,
    }
}
