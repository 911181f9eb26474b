use crate::backends::{GraphDatabase, GraphSchema, LabelProperties, Triple};
use crate::error::{ActionError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

const SERVICE: &str = "neptune";

const SAMPLE_LIMIT: usize = 100;
const TRIPLE_LIMIT: usize = 10;

/// openCypher over the Neptune HTTPS endpoint.
pub struct NeptuneGraph {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    payload: SummaryPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryPayload {
    graph_summary: GraphSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphSummary {
    #[serde(default)]
    node_labels: Vec<String>,
    #[serde(default)]
    edge_labels: Vec<String>,
}

impl NeptuneGraph {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: super::client(SERVICE, timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn labels(&self) -> Result<GraphSummary> {
        let url = format!(
            "{}/propertygraph/statistics/summary?mode=detailed",
            self.base_url
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ActionError::backend(SERVICE, e))?;
        let response = super::check_status(SERVICE, response).await?;
        let summary: SummaryResponse = response
            .json()
            .await
            .map_err(|e| ActionError::backend(SERVICE, e))?;
        Ok(summary.payload.graph_summary)
    }

    async fn results(&self, query: &str) -> Result<Vec<Value>> {
        let value = self.query(query).await?;
        Ok(match value.get("results") {
            Some(Value::Array(rows)) => rows.clone(),
            _ => Vec::new(),
        })
    }

    async fn sample_properties(&self, query: &str, label: &str) -> Result<LabelProperties> {
        let rows = self.results(query).await?;
        let mut properties: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            if let Some(Value::Object(props)) = row.get("props") {
                for (name, value) in props {
                    if let Some(ty) = property_type(value) {
                        properties.entry(name.clone()).or_insert_with(|| ty.to_string());
                    }
                }
            }
        }
        Ok(LabelProperties {
            label: label.to_string(),
            properties: properties.into_iter().collect(),
        })
    }
}

#[async_trait]
impl GraphDatabase for NeptuneGraph {
    async fn schema(&self) -> Result<GraphSchema> {
        let summary = self.labels().await?;
        info!(
            nodes = summary.node_labels.len(),
            edges = summary.edge_labels.len(),
            "reading graph schema"
        );

        let mut schema = GraphSchema::default();
        for label in &summary.node_labels {
            schema
                .nodes
                .push(self.sample_properties(&node_properties_query(label), label).await?);
        }
        for label in &summary.edge_labels {
            schema
                .relationships
                .push(self.sample_properties(&edge_properties_query(label), label).await?);

            for row in self.results(&triples_query(label)).await? {
                let triple = Triple {
                    from: first_label(row.get("from")),
                    edge: row
                        .get("edge")
                        .and_then(Value::as_str)
                        .unwrap_or(label.as_str())
                        .to_string(),
                    to: first_label(row.get("to")),
                };
                if !schema.triples.contains(&triple) {
                    schema.triples.push(triple);
                }
            }
        }
        Ok(schema)
    }

    async fn query(&self, query: &str) -> Result<Value> {
        debug!(query, "running openCypher query");
        let response = self
            .http
            .post(format!("{}/openCypher", self.base_url))
            .form(&[("query", query)])
            .send()
            .await
            .map_err(|e| ActionError::backend(SERVICE, e))?;
        let response = super::check_status(SERVICE, response).await?;
        response
            .json()
            .await
            .map_err(|e| ActionError::backend(SERVICE, format!("unreadable query result: {e}")))
    }
}

fn quote_label(label: &str) -> String {
    format!("`{}`", label.replace('`', "``"))
}

pub(crate) fn node_properties_query(label: &str) -> String {
    format!(
        "MATCH (a:{}) RETURN properties(a) AS props LIMIT {SAMPLE_LIMIT}",
        quote_label(label)
    )
}

pub(crate) fn edge_properties_query(label: &str) -> String {
    format!(
        "MATCH ()-[e:{}]->() RETURN properties(e) AS props LIMIT {SAMPLE_LIMIT}",
        quote_label(label)
    )
}

pub(crate) fn triples_query(label: &str) -> String {
    format!(
        "MATCH (a)-[e:{}]->(b) RETURN DISTINCT labels(a) AS from, type(e) AS edge, labels(b) AS to LIMIT {TRIPLE_LIMIT}",
        quote_label(label)
    )
}

fn first_label(value: Option<&Value>) -> String {
    match value {
        Some(Value::Array(labels)) => labels
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

fn property_type(value: &Value) -> Option<&'static str> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some("BOOLEAN"),
        Value::Number(n) if n.is_f64() => Some("DOUBLE"),
        Value::Number(_) => Some("INTEGER"),
        Value::String(_) => Some("STRING"),
        Value::Array(_) => Some("LIST"),
        Value::Object(_) => Some("MAP"),
    }
}
