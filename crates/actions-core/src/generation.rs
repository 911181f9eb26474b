//! Prompts and the Anthropic-on-Bedrock message format.

use crate::config::GenerationConfig;
use crate::error::{ActionError, Result};
use serde::Deserialize;
use serde_json::{json, Value};

pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

pub const SCHEMA_SYSTEM_PROMPT: &str = "You are a graph database expert. Your task is to analyze a user's query and the full database schema, then return only the relevant portions of the schema that are needed to answer the query.

Consider:
1. The node labels and their properties mentioned in the query
2. The relationships that would be needed to connect these nodes
3. Any properties that might be used for filtering or returning results

Return only the relevant parts of the schema in the same format as the input schema.";

pub const REPORT_EXTRACTION_PROMPT: &str = "Extract the pathology report as a json object, tumor type, grade type, microinstability status. If the information is not present, return None";

pub const REPORT_VALIDATION_PROMPT: &str = "You are a radiologist reviewing a draft radiology report. Check it for internal consistency, missing sections (findings, impression), laterality errors and unsupported conclusions. List each problem you find with a suggested correction, or state that the report is valid.";

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(config: &GenerationConfig, prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

pub fn schema_prompt(question: &str, schema: &str) -> String {
    format!(
        "I have a graph database query and I need to identify the relevant parts of the schema to answer it.\n\n\
         Query: {question}\n\n\
         Full Schema:\n{schema}\n\n\
         Please analyze the query and return only the portions of the schema that are directly relevant to answering this query.\n\
         Maintain the same schema format but include only the necessary nodes, relationships, and properties."
    )
}

pub fn report_extraction_prompt(document: &str) -> String {
    format!("{REPORT_EXTRACTION_PROMPT}\n\n<document>\n{document}\n</document>")
}

/// Request body for an Anthropic model invoked through Bedrock.
pub fn anthropic_body(request: &GenerationRequest) -> Value {
    let mut body = json!({
        "anthropic_version": ANTHROPIC_VERSION,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "messages": [{
            "role": "user",
            "content": [{ "type": "text", "text": request.prompt }],
        }],
    });
    if let Some(system) = &request.system {
        body["system"] = Value::String(system.clone());
    }
    body
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// First text block of a model response, or an empty string.
pub fn extract_text(body: &[u8]) -> Result<String> {
    let response: MessageResponse = serde_json::from_slice(body)
        .map_err(|e| ActionError::backend("bedrock", format!("unreadable model response: {e}")))?;
    Ok(response
        .content
        .into_iter()
        .find(|b| b.kind == "text")
        .and_then(|b| b.text)
        .unwrap_or_default())
}
