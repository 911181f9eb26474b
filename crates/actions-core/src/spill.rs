//! Oversized-result spillover.
//!
//! The agent runtime rejects action responses above a fixed size. Rather than
//! truncating, a result larger than the threshold is written to the object
//! store and the response carries a pointer to it instead.
//!
//! Size is the byte length of the string that would be placed in the body:
//! the UTF-8 text itself, or the compact JSON serialization.

use crate::config::SpillConfig;
use crate::storage::{ObjectStore, StorageError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Result of an operation, before sizing.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
}

impl Payload {
    /// The exact string that goes on the wire.
    pub fn serialize(&self) -> String {
        match self {
            Payload::Text(s) => s.clone(),
            Payload::Json(v) => v.to_string(),
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Payload::Text(_) => "txt",
            Payload::Json(_) => "json",
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            Payload::Text(_) => "text/plain; charset=utf-8",
            Payload::Json(_) => "application/json",
        }
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(v: serde_json::Value) -> Self {
        Payload::Json(v)
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How a spilled result is pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceMode {
    #[default]
    PresignedUrl,
    Locator,
}

#[derive(Debug, Clone)]
pub struct SpillPolicy {
    pub threshold_bytes: usize,
    pub mode: ReferenceMode,
    pub url_ttl: Duration,
    pub key_prefix: String,
}

impl Default for SpillPolicy {
    fn default() -> Self {
        Self::from(&SpillConfig::default())
    }
}

impl From<&SpillConfig> for SpillPolicy {
    fn from(c: &SpillConfig) -> Self {
        Self {
            threshold_bytes: c.threshold_bytes,
            mode: c.reference,
            url_ttl: Duration::from_secs(c.url_ttl_secs),
            key_prefix: c.key_prefix.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// SizedBody
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SpillReference {
    PresignedUrl { url: String, expires_in: u64 },
    Locator { bucket: String, key: String },
}

impl SpillReference {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SpillReference::PresignedUrl { url, expires_in } => serde_json::json!({
                "type": "presigned_url",
                "url": url,
                "expires_in": expires_in,
            }),
            SpillReference::Locator { bucket, key } => serde_json::json!({
                "type": "s3_locator",
                "bucket": bucket,
                "key": key,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SizedBody {
    Inline(String),
    Spilled(SpillReference),
}

impl SizedBody {
    pub fn into_body(self) -> String {
        match self {
            SizedBody::Inline(s) => s,
            SizedBody::Spilled(r) => r.to_json().to_string(),
        }
    }

    pub fn is_spilled(&self) -> bool {
        matches!(self, SizedBody::Spilled(_))
    }
}

// ---------------------------------------------------------------------------
// ResponseSizer
// ---------------------------------------------------------------------------

pub struct ResponseSizer {
    store: Arc<dyn ObjectStore>,
    policy: SpillPolicy,
}

impl ResponseSizer {
    pub fn new(store: Arc<dyn ObjectStore>, policy: SpillPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &SpillPolicy {
        &self.policy
    }

    /// Inline `payload` if it fits, otherwise write it once to the store and
    /// return a reference.
    pub async fn size(&self, payload: &Payload) -> Result<SizedBody, StorageError> {
        let body = payload.serialize();
        let bytes = body.len();
        if bytes <= self.policy.threshold_bytes {
            debug!(bytes, "result returned inline");
            return Ok(SizedBody::Inline(body));
        }

        let key = format!(
            "{}{}.{}",
            self.policy.key_prefix,
            uuid::Uuid::new_v4(),
            payload.extension()
        );
        info!(
            bytes,
            threshold = self.policy.threshold_bytes,
            bucket = self.store.bucket(),
            key = %key,
            "result exceeds inline limit, spilling to object store"
        );
        self.store
            .put(&key, body.into_bytes(), payload.content_type())
            .await?;

        let reference = match self.policy.mode {
            ReferenceMode::PresignedUrl => {
                let url = self.store.presign_get(&key, self.policy.url_ttl).await?;
                SpillReference::PresignedUrl {
                    url,
                    expires_in: self.policy.url_ttl.as_secs(),
                }
            }
            ReferenceMode::Locator => SpillReference::Locator {
                bucket: self.store.bucket().to_string(),
                key,
            },
        };
        Ok(SizedBody::Spilled(reference))
    }
}
