use crate::backends::{SearchQuery, SecretStore, WebSearch};
use crate::config::WebSearchConfig;
use crate::error::{ActionError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

pub const DEFAULT_ENDPOINT: &str = "https://api.tavily.com/search";

const SERVICE: &str = "tavily";

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    include_images: bool,
    include_answer: bool,
    include_raw_content: bool,
    max_results: u32,
    topic: &'a str,
    days: u32,
    include_domains: Vec<&'a str>,
    exclude_domains: Vec<&'a str>,
}

/// Tavily search client. The API key is read from the secret store on first
/// use and kept for the life of the process.
pub struct TavilySearch {
    http: reqwest::Client,
    endpoint: String,
    secret_id: String,
    max_results: u32,
    search_depth: String,
    secrets: Arc<dyn SecretStore>,
    api_key: OnceCell<String>,
}

impl TavilySearch {
    pub fn new(config: &WebSearchConfig, secrets: Arc<dyn SecretStore>) -> Result<Self> {
        Ok(Self {
            http: super::client(SERVICE, Duration::from_secs(config.timeout_secs))?,
            endpoint: config.endpoint.clone(),
            secret_id: config.api_key_secret.clone(),
            max_results: config.max_results,
            search_depth: config.search_depth.clone(),
            secrets,
            api_key: OnceCell::new(),
        })
    }

    async fn api_key(&self) -> Result<&str> {
        let key = self
            .api_key
            .get_or_try_init(|| async {
                self.secrets
                    .secret_string(&self.secret_id)
                    .await
                    .map_err(|e| {
                        error!(secret = %self.secret_id, error = %e, "could not resolve search api key");
                        ActionError::SecretUnavailable(self.secret_id.clone())
                    })
            })
            .await?;
        Ok(key.as_str())
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &SearchQuery) -> Result<String> {
        let api_key = self.api_key().await?;
        info!(query = %query.query, "executing web search");

        let request = SearchRequest {
            api_key,
            query: &query.query,
            search_depth: &self.search_depth,
            include_images: false,
            include_answer: false,
            include_raw_content: false,
            max_results: self.max_results,
            topic: query.topic.as_deref().unwrap_or("general"),
            days: query.days.unwrap_or(30),
            include_domains: query.target_website.as_deref().into_iter().collect(),
            exclude_domains: Vec::new(),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ActionError::backend(SERVICE, e))?;
        let response = super::check_status(SERVICE, response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ActionError::backend(SERVICE, e))?;
        debug!(bytes = body.len(), "search response received");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSecrets {
        calls: AtomicUsize,
        missing: bool,
    }

    #[async_trait]
    impl SecretStore for CountingSecrets {
        async fn secret_string(&self, secret_id: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.missing {
                return Err(ActionError::NotFound(secret_id.to_string()));
            }
            Ok("tvly-test-key".to_string())
        }
    }

    fn config(endpoint: String) -> WebSearchConfig {
        WebSearchConfig {
            api_key_secret: "tavily-api-key".into(),
            endpoint,
            ..WebSearchConfig::default()
        }
    }

    fn query(target: Option<&str>) -> SearchQuery {
        SearchQuery {
            query: "MSI-high colorectal immunotherapy".into(),
            target_website: target.map(String::from),
            topic: None,
            days: None,
        }
    }

    #[tokio::test]
    async fn posts_defaults_and_returns_raw_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/search")
            .match_body(Matcher::PartialJson(json!({
                "api_key": "tvly-test-key",
                "query": "MSI-high colorectal immunotherapy",
                "search_depth": "advanced",
                "max_results": 3,
                "topic": "general",
                "days": 30,
                "include_domains": ["nih.gov"],
            })))
            .with_status(200)
            .with_body(r#"{"results":[{"title":"t"}]}"#)
            .create_async()
            .await;

        let secrets = Arc::new(CountingSecrets::default());
        let search =
            TavilySearch::new(&config(format!("{}/search", server.url())), secrets.clone()).unwrap();
        let body = search.search(&query(Some("nih.gov"))).await.unwrap();

        mock.assert_async().await;
        assert_eq!(body, r#"{"results":[{"title":"t"}]}"#);
    }

    #[tokio::test]
    async fn api_key_is_resolved_once() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/search")
            .with_body("{}")
            .expect(2)
            .create_async()
            .await;

        let secrets = Arc::new(CountingSecrets::default());
        let search =
            TavilySearch::new(&config(format!("{}/search", server.url())), secrets.clone()).unwrap();
        search.search(&query(None)).await.unwrap();
        search.search(&query(None)).await.unwrap();
        assert_eq!(secrets.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unresolvable_secret_names_the_secret() {
        let secrets = Arc::new(CountingSecrets {
            missing: true,
            ..Default::default()
        });
        let search = TavilySearch::new(&config("http://127.0.0.1:9/search".into()), secrets).unwrap();
        let err = search.search(&query(None)).await.unwrap_err();
        assert_eq!(err.to_string(), "Unable to get tavily-api-key Secret Key");
    }

    #[tokio::test]
    async fn http_errors_become_backend_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/search")
            .with_status(429)
            .with_body("plan limit exceeded")
            .create_async()
            .await;

        let search = TavilySearch::new(
            &config(format!("{}/search", server.url())),
            Arc::new(CountingSecrets::default()),
        )
        .unwrap();
        let err = search.search(&query(None)).await.unwrap_err();
        assert!(matches!(err, ActionError::Backend { service: "tavily", .. }));
        assert!(err.to_string().contains("HTTP 429"));
    }
}
