//! AWS implementations of the `actions-core` backend traits, and the one
//! function that assembles a [`Backends`] from configuration.

pub mod athena;
pub mod batch;
pub mod bedrock;
pub mod s3;
pub mod secrets;

use actions_core::backends::{Backends, EnvSecretStore, SecretStore};
use actions_core::config::{Config, Provider};
use actions_core::http::neptune::NeptuneGraph;
use actions_core::http::tavily::TavilySearch;
use actions_core::fs_store::FsStore;
use anyhow::Context;
use aws_config::BehaviorVersion;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use athena::AthenaEngine;
pub use batch::BatchClient;
pub use bedrock::BedrockGenerator;
pub use s3::S3Store;
pub use secrets::SecretsManagerStore;

const LOCAL_BUCKET: &str = "local";

/// Build every backend the configuration describes. Called once at start-up.
pub async fn build_backends(config: &Config) -> anyhow::Result<Backends> {
    match config.provider {
        Provider::Local => local_backends(config),
        Provider::Aws => aws_backends(config).await,
    }
}

fn local_backends(config: &Config) -> anyhow::Result<Backends> {
    let bucket = if config.storage.bucket.is_empty() {
        LOCAL_BUCKET
    } else {
        config.storage.bucket.as_str()
    };
    let store = FsStore::open(&config.storage.local_dir, bucket)
        .context("failed to open local object store")?;
    info!(bucket, dir = %store.dir().display(), "using local object store");
    let backends = Backends::new(Arc::new(store));
    with_http_backends(backends, config, Arc::new(EnvSecretStore))
}

async fn aws_backends(config: &Config) -> anyhow::Result<Backends> {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &config.region {
        loader = loader.region(aws_sdk_s3::config::Region::new(region.clone()));
    }
    let sdk = loader.load().await;
    info!(region = ?sdk.region().map(|r| r.as_ref()), bucket = %config.storage.bucket, "using AWS backends");

    let backends = Backends::new(Arc::new(S3Store::new(
        aws_sdk_s3::Client::new(&sdk),
        config.storage.bucket.clone(),
    )))
    .with_generator(Arc::new(BedrockGenerator::new(
        aws_sdk_bedrockruntime::Client::new(&sdk),
        config.generation.model_id.clone(),
    )))
    .with_sql(Arc::new(AthenaEngine::new(
        aws_sdk_athena::Client::new(&sdk),
        config.sql.output_location.clone(),
        config.sql.workgroup.clone(),
    )))
    .with_batch(Arc::new(BatchClient::new(aws_sdk_batch::Client::new(&sdk))));

    let secrets = Arc::new(SecretsManagerStore::new(aws_sdk_secretsmanager::Client::new(&sdk)));
    with_http_backends(backends, config, secrets)
}

fn with_http_backends(
    mut backends: Backends,
    config: &Config,
    secrets: Arc<dyn SecretStore>,
) -> anyhow::Result<Backends> {
    match config.graph.base_url() {
        Some(url) => {
            let graph = NeptuneGraph::new(url, Duration::from_secs(config.graph.timeout_secs))
                .context("failed to build graph client")?;
            backends = backends.with_graph(Arc::new(graph));
        }
        None => warn!("graph.host not set; graph operations are unavailable"),
    }

    if config.web_search.api_key_secret.is_empty() {
        warn!("web_search.api_key_secret not set; web search is unavailable");
    } else {
        let search = TavilySearch::new(&config.web_search, secrets)
            .context("failed to build web search client")?;
        backends = backends.with_search(Arc::new(search));
    }
    Ok(backends)
}
