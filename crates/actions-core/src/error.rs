use crate::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Missing mandatory parameter: {0}")]
    MissingParameter(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("configuration error: unknown operation '{operation}' for handler '{handler}'")]
    UnknownOperation { handler: String, operation: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("Unable to get {0} Secret Key")]
    SecretUnavailable(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Query was cancelled")]
    QueryCancelled,

    #[error("gave up waiting for {what} after {attempts} attempts")]
    PollTimeout { what: String, attempts: u32 },

    #[error("{service} error: {message}")]
    Backend {
        service: &'static str,
        message: String,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ActionError {
    /// Wrap a failure reported by an external service.
    pub fn backend(service: &'static str, err: impl std::fmt::Display) -> Self {
        ActionError::Backend {
            service,
            message: err.to_string(),
        }
    }

    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ActionError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// HTTP-style status carried in the response envelope.
    pub fn status_code(&self) -> u16 {
        match self {
            ActionError::MissingParameter(_)
            | ActionError::InvalidParameter { .. }
            | ActionError::UnknownOperation { .. } => 400,
            ActionError::NotFound(_) => 404,
            ActionError::QueryFailed(_)
            | ActionError::QueryCancelled
            | ActionError::Backend { .. } => 502,
            ActionError::PollTimeout { .. } => 504,
            ActionError::Configuration(_)
            | ActionError::SecretUnavailable(_)
            | ActionError::Storage(_)
            | ActionError::Json(_) => 500,
        }
    }

    /// Errors the agent can fix by asking the user again.
    pub fn is_reprompt(&self) -> bool {
        matches!(
            self,
            ActionError::MissingParameter(_) | ActionError::InvalidParameter { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ActionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameter_message_names_the_parameter() {
        let err = ActionError::MissingParameter("patient_id".into());
        assert_eq!(err.to_string(), "Missing mandatory parameter: patient_id");
        assert_eq!(err.status_code(), 400);
        assert!(err.is_reprompt());
    }

    #[test]
    fn unknown_operation_is_a_configuration_error() {
        let err = ActionError::UnknownOperation {
            handler: "pathology".into(),
            operation: "delete_everything".into(),
        };
        assert!(err.to_string().starts_with("configuration error"));
        assert_eq!(err.status_code(), 400);
        assert!(!err.is_reprompt());
    }

    #[test]
    fn storage_errors_map_to_500() {
        let err: ActionError = StorageError::Write {
            bucket: "b".into(),
            key: "k".into(),
            message: "denied".into(),
        }
        .into();
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn poll_timeout_maps_to_504() {
        let err = ActionError::PollTimeout {
            what: "query q-1".into(),
            attempts: 3,
        };
        assert_eq!(err.status_code(), 504);
        assert_eq!(
            err.to_string(),
            "gave up waiting for query q-1 after 3 attempts"
        );
    }
}
