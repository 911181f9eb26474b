use crate::backends::ResourceRequirements;
use crate::handlers::HandlerKind;
use crate::poll::PollPolicy;
use crate::spill::ReferenceMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "actions.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value '{value}' for {key}")]
    Invalid { key: String, value: String },
}

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Which family of backends to build at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[default]
    Aws,
    /// In-memory object store, secrets from environment variables.
    Local,
}

impl std::str::FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Provider::Aws),
            "local" => Ok(Provider::Local),
            _ => Err(ConfigError::Invalid {
                key: "provider".into(),
                value: s.into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub bucket: String,
    /// Root directory for the `local` provider's objects.
    #[serde(default = "default_local_dir")]
    pub local_dir: PathBuf,
}

fn default_local_dir() -> PathBuf {
    PathBuf::from(".actions/objects")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            local_dir: default_local_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// SpillConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpillConfig {
    #[serde(default = "default_threshold_bytes")]
    pub threshold_bytes: usize,
    #[serde(default)]
    pub reference: ReferenceMode,
    #[serde(default = "default_url_ttl_secs")]
    pub url_ttl_secs: u64,
    #[serde(default)]
    pub key_prefix: String,
}

fn default_threshold_bytes() -> usize {
    20_000
}

fn default_url_ttl_secs() -> u64 {
    3600
}

impl Default for SpillConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: default_threshold_bytes(),
            reference: ReferenceMode::default(),
            url_ttl_secs: default_url_ttl_secs(),
            key_prefix: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// GenerationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
}

fn default_model_id() -> String {
    "anthropic.claude-3-5-sonnet-20241022-v2:0".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// BatchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub job_queue: String,
    #[serde(default)]
    pub feature_extraction_definition: String,
    #[serde(default)]
    pub classifier_definition: String,
    #[serde(default)]
    pub resources: ResourceRequirements,
}

// ---------------------------------------------------------------------------
// GraphConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_graph_port")]
    pub port: u16,
    /// Full base URL; overrides `host`/`port` when set.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_graph_port() -> u16 {
    8182
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_graph_port(),
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GraphConfig {
    pub fn base_url(&self) -> Option<String> {
        if let Some(endpoint) = self.endpoint.as_deref().filter(|e| !e.is_empty()) {
            return Some(endpoint.trim_end_matches('/').to_string());
        }
        if self.host.is_empty() {
            return None;
        }
        Some(format!("https://{}:{}", self.host, self.port))
    }
}

// ---------------------------------------------------------------------------
// SqlConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_initial_interval_ms() -> u64 {
    1000
}

fn default_multiplier() -> u32 {
    2
}

fn default_max_interval_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    60
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            multiplier: default_multiplier(),
            max_interval_ms: default_max_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl PollConfig {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            initial_interval: Duration::from_millis(self.initial_interval_ms),
            multiplier: self.multiplier,
            max_interval: Duration::from_millis(self.max_interval_ms),
            max_attempts: self.max_attempts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlConfig {
    #[serde(default = "default_database")]
    pub database: String,
    /// Where the query service writes result files, when the workgroup has none.
    #[serde(default)]
    pub output_location: Option<String>,
    #[serde(default)]
    pub workgroup: Option<String>,
    #[serde(default)]
    pub poll: PollConfig,
}

fn default_database() -> String {
    "california_schools".to_string()
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            output_location: None,
            workgroup: None,
            poll: PollConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// WebSearchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// Secret id holding the search API key.
    #[serde(default)]
    pub api_key_secret: String,
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_search_depth")]
    pub search_depth: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_search_endpoint() -> String {
    crate::http::tavily::DEFAULT_ENDPOINT.to_string()
}

fn default_max_results() -> u32 {
    3
}

fn default_search_depth() -> String {
    "advanced".to_string()
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key_secret: String::new(),
            endpoint: default_search_endpoint(),
            max_results: default_max_results(),
            search_depth: default_search_depth(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub region: Option<String>,
    /// Handler served by `POST /invoke` when the path names none.
    #[serde(default)]
    pub handler: Option<HandlerKind>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub spill: SpillConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub sql: SqlConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            region: None,
            handler: None,
            log_level: default_log_level(),
            storage: StorageConfig::default(),
            spill: SpillConfig::default(),
            generation: GenerationConfig::default(),
            batch: BatchConfig::default(),
            graph: GraphConfig::default(),
            sql: SqlConfig::default(),
            web_search: WebSearchConfig::default(),
        }
    }
}

impl Config {
    /// Read `path` (or `actions.yaml` in the working directory when present),
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self, ConfigError> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(data)?)
    }

    /// Apply the deployment environment variables. Set, non-empty variables
    /// win over file values.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("ACTIONS_PROVIDER") {
            self.provider = v.parse()?;
        }
        if let Some(v) = get("ACTIONS_HANDLER") {
            self.handler = Some(v.parse().map_err(|_| ConfigError::Invalid {
                key: "ACTIONS_HANDLER".into(),
                value: v.clone(),
            })?);
        }
        if let Some(v) = get("REGION").or_else(|| get("AWS_REGION")) {
            self.region = Some(v);
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.log_level = v.trim().to_ascii_lowercase();
        }
        if let Some(v) = get("BUCKET_NAME") {
            self.storage.bucket = v;
        }
        if let Some(v) = get("ACTIONS_LOCAL_DIR") {
            self.storage.local_dir = PathBuf::from(v);
        }
        if let Some(v) = get("SPILL_THRESHOLD_BYTES") {
            self.spill.threshold_bytes = parse_env("SPILL_THRESHOLD_BYTES", &v)?;
        }
        if let Some(v) = get("MODEL_ID") {
            self.generation.model_id = v;
        }
        if let Some(v) = get("BATCH_JOB_QUEUE") {
            self.batch.job_queue = v;
        }
        if let Some(v) = get("BATCH_JOB_DEFINITION_FEATURE_EXTRACTION") {
            self.batch.feature_extraction_definition = v;
        }
        if let Some(v) = get("BATCH_JOB_DEFINITION_CLASSIFIER") {
            self.batch.classifier_definition = v;
        }
        if let Some(v) = get("NEPTUNE_HOST") {
            self.graph.host = v;
        }
        if let Some(v) = get("NEPTUNE_PORT") {
            self.graph.port = parse_env("NEPTUNE_PORT", &v)?;
        }
        if let Some(v) = get("ATHENA_DATABASE") {
            self.sql.database = v;
        }
        if let Some(v) = get("ATHENA_OUTPUT_LOCATION") {
            self.sql.output_location = Some(v);
        }
        if let Some(v) = get("TAVILY_API_KEY_NAME") {
            self.web_search.api_key_secret = v;
        }
        Ok(())
    }

    /// Problems that would make some operations fail at invocation time.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.storage.bucket.is_empty() && self.provider == Provider::Aws {
            warnings.push(ConfigWarning::error(
                "storage.bucket is empty: spilled results and pathology lookups have nowhere to go",
            ));
        }
        if self.spill.threshold_bytes == 0 {
            warnings.push(ConfigWarning::warning(
                "spill.threshold_bytes is 0: every non-empty result will be spilled",
            ));
        }
        // S3 rejects presigned URLs valid for more than seven days.
        if self.spill.url_ttl_secs == 0 || self.spill.url_ttl_secs > 604_800 {
            warnings.push(ConfigWarning::error(format!(
                "spill.url_ttl_secs must be between 1 and 604800, got {}",
                self.spill.url_ttl_secs
            )));
        }
        if self.generation.model_id.is_empty() {
            warnings.push(ConfigWarning::error("generation.model_id is empty"));
        }
        if !crate::handlers::sql::is_identifier(&self.sql.database) {
            warnings.push(ConfigWarning::error(format!(
                "sql.database must be letters, digits and underscores, got '{}'",
                self.sql.database
            )));
        }
        if self.sql.poll.max_attempts == 0 {
            warnings.push(ConfigWarning::error(
                "sql.poll.max_attempts is 0: every query would time out before its first status check",
            ));
        }
        if self.batch.job_queue.is_empty() {
            warnings.push(ConfigWarning::warning(
                "batch.job_queue is empty: pathology batch jobs cannot be submitted",
            ));
        }
        if self.graph.base_url().is_none() {
            warnings.push(ConfigWarning::warning(
                "graph.host is empty: graph operations are unavailable",
            ));
        }
        if self.web_search.api_key_secret.is_empty() {
            warnings.push(ConfigWarning::warning(
                "web_search.api_key_secret is empty: web search is unavailable",
            ));
        }
        warnings
    }

    pub fn has_errors(warnings: &[ConfigWarning]) -> bool {
        warnings.iter().any(|w| w.level == WarnLevel::Error)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    })
}
