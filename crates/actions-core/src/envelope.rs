//! Inbound and outbound envelopes.
//!
//! Two invocation styles exist. *Function* action groups name an operation
//! with `function` and answer with a `TEXT` body. *API* action groups name it
//! with `apiPath` + `httpMethod` and answer with an `application/json` body
//! and an `httpStatusCode`.

use crate::error::ActionError;
use crate::params::{Parameter, Parameters};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const TEXT_CONTENT: &str = "TEXT";
pub const JSON_CONTENT: &str = "application/json";

fn default_message_version() -> String {
    "1.0".to_string()
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaContent {
    #[serde(default)]
    pub properties: Vec<Parameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    pub content: HashMap<String, MediaContent>,
}

/// The event an agent runtime delivers to a handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationEvent {
    #[serde(default = "default_message_version")]
    pub message_version: String,
    #[serde(default)]
    pub agent: Option<AgentInfo>,
    pub action_group: String,
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub api_path: Option<String>,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub request_body: Option<RequestBody>,
    #[serde(default)]
    pub input_text: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub session_attributes: HashMap<String, String>,
    #[serde(default)]
    pub prompt_session_attributes: HashMap<String, String>,
}

/// How the agent named the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Function { name: String },
    Api { path: String, method: String },
}

impl Invocation {
    pub fn operation_name(&self) -> &str {
        match self {
            Invocation::Function { name } => name,
            Invocation::Api { path, .. } => path,
        }
    }
}

/// A decoded invocation: operation identifier plus parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub message_version: String,
    pub action_group: String,
    pub invocation: Invocation,
    pub parameters: Parameters,
    pub input_text: Option<String>,
    pub session_attributes: HashMap<String, String>,
    pub prompt_session_attributes: HashMap<String, String>,
}

impl InvocationEvent {
    /// Decode into a request. `requestBody` JSON properties are appended to
    /// the parameter list, so they win over same-named query parameters.
    pub fn into_request(self) -> ActionRequest {
        let invocation = match self.function {
            Some(name) => Invocation::Function { name },
            None => Invocation::Api {
                path: self.api_path.unwrap_or_default(),
                method: self.http_method.unwrap_or_else(|| "GET".to_string()),
            },
        };

        let mut parameters = self.parameters;
        if let Some(mut body) = self.request_body {
            if let Some(json) = body.content.remove(JSON_CONTENT) {
                parameters.extend(json.properties);
            }
        }

        ActionRequest {
            message_version: self.message_version,
            action_group: self.action_group,
            invocation,
            parameters,
            input_text: self.input_text.filter(|t| !t.trim().is_empty()),
            session_attributes: self.session_attributes,
            prompt_session_attributes: self.prompt_session_attributes,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseState {
    Failure,
    Reprompt,
}

/// Outcome of one invocation, independent of wire shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResponse {
    pub message_version: String,
    pub action_group: String,
    pub invocation: Invocation,
    pub status: u16,
    pub state: Option<ResponseState>,
    pub body: String,
    pub session_attributes: HashMap<String, String>,
    pub prompt_session_attributes: HashMap<String, String>,
}

impl ActionResponse {
    pub fn success(request: &ActionRequest, body: String) -> Self {
        Self::build(request, 200, None, body)
    }

    pub fn failure(request: &ActionRequest, err: &ActionError) -> Self {
        let state = if err.is_reprompt() {
            ResponseState::Reprompt
        } else {
            ResponseState::Failure
        };
        Self::build(request, err.status_code(), Some(state), err.to_string())
    }

    fn build(request: &ActionRequest, status: u16, state: Option<ResponseState>, body: String) -> Self {
        Self {
            message_version: request.message_version.clone(),
            action_group: request.action_group.clone(),
            invocation: request.invocation.clone(),
            status,
            state,
            body,
            session_attributes: request.session_attributes.clone(),
            prompt_session_attributes: request.prompt_session_attributes.clone(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state.is_none()
    }

    pub fn into_envelope(self) -> ResponseEnvelope {
        let response = match self.invocation {
            Invocation::Function { name } => ResponsePayload::Function(FunctionResponse {
                action_group: self.action_group,
                function: name,
                function_response: FunctionResult {
                    response_state: self.state,
                    response_body: body_map(TEXT_CONTENT, self.body),
                },
            }),
            Invocation::Api { path, method } => ResponsePayload::Api(ApiResponse {
                action_group: self.action_group,
                api_path: path,
                http_method: method,
                http_status_code: self.status,
                response_body: body_map(JSON_CONTENT, self.body),
            }),
        };
        ResponseEnvelope {
            message_version: self.message_version,
            response,
            session_attributes: self.session_attributes,
            prompt_session_attributes: self.prompt_session_attributes,
        }
    }
}

fn body_map(content_type: &str, body: String) -> BTreeMap<String, BodyContent> {
    BTreeMap::from([(content_type.to_string(), BodyContent { body })])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyContent {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_state: Option<ResponseState>,
    pub response_body: BTreeMap<String, BodyContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub action_group: String,
    pub function: String,
    pub function_response: FunctionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub action_group: String,
    pub api_path: String,
    pub http_method: String,
    pub http_status_code: u16,
    pub response_body: BTreeMap<String, BodyContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    Function(FunctionResponse),
    Api(ApiResponse),
}

/// The JSON document returned to the agent runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub message_version: String,
    pub response: ResponsePayload,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub session_attributes: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub prompt_session_attributes: HashMap<String, String>,
}

impl ResponseEnvelope {
    pub fn body(&self) -> &str {
        let bodies = match &self.response {
            ResponsePayload::Function(f) => &f.function_response.response_body,
            ResponsePayload::Api(a) => &a.response_body,
        };
        bodies.values().next().map(|c| c.body.as_str()).unwrap_or("")
    }

    pub fn state(&self) -> Option<ResponseState> {
        match &self.response {
            ResponsePayload::Function(f) => f.function_response.response_state,
            ResponsePayload::Api(_) => None,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match &self.response {
            ResponsePayload::Function(_) => None,
            ResponsePayload::Api(a) => Some(a.http_status_code),
        }
    }
}
