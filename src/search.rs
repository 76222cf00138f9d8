//! Web search collaborator

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const SERPAPI_URL: &str = "https://serpapi.com/search.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Ordered results; an empty list means "no results"
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

/// Timeout-bounded wrapper that turns every failure into "no results"
#[derive(Clone)]
pub struct WebSearch {
    client: Arc<dyn SearchClient>,
    timeout: Duration,
}

impl WebSearch {
    pub fn new(client: Arc<dyn SearchClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        match tokio::time::timeout(self.timeout, self.client.search(query, max_results)).await {
            Ok(Ok(results)) => results,
            Ok(Err(error)) => {
                warn!(error = %error, "web search failed");
                Vec::new()
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "web search timed out");
                Vec::new()
            }
        }
    }
}

/// Numbered plain-text block for use inside an LLM prompt
pub fn format_for_prompt(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No search results found.".to_string();
    }
    let mut out = String::from("Search Results:\n\n");
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!(
            "{}. {}\n   {}\n   Source: {}\n\n",
            i + 1,
            r.title.trim(),
            crate::render::truncate(r.snippet.trim(), 300),
            r.link
        ));
    }
    out
}

// ============ SerpAPI ============

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<SerpResult>,
}

#[derive(Debug, Deserialize)]
struct SerpResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Google results through SerpAPI. Without a key every search is empty.
#[derive(Debug, Clone)]
pub struct SerpApiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SerpApiClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: SERPAPI_URL.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl SearchClient for SerpApiClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let Some(api_key) = self.api_key.as_deref() else {
            debug!("SERPAPI_KEY not set, skipping web search");
            return Ok(Vec::new());
        };

        info!(max_results, "serpapi search start");
        debug!(query = %query, "serpapi query");

        let num = max_results.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("api_key", api_key),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|error| {
                // the URL carries api_key
                let error = error.without_url();
                warn!(error = %error, "serpapi request failed");
                error
            })?
            .error_for_status()
            .map_err(|error| {
                let error = error.without_url();
                warn!(error = %error, "serpapi returned error status");
                error
            })?
            .json::<SerpResponse>()
            .await
            .map_err(reqwest::Error::without_url)?;

        let results: Vec<SearchResult> = response
            .organic_results
            .into_iter()
            .take(max_results)
            .map(|r| SearchResult {
                title: r.title,
                snippet: r.snippet,
                link: r.link,
            })
            .collect();

        info!(result_count = results.len(), "serpapi search success");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    #[async_trait]
    impl SearchClient for Broken {
        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchResult>> {
            anyhow::bail!("network down")
        }
    }

    #[tokio::test]
    async fn test_failure_means_no_results() {
        let search = WebSearch::new(Arc::new(Broken), Duration::from_secs(1));
        assert!(search.search("rust", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_is_empty() {
        let client = SerpApiClient::new(None, Duration::from_secs(1)).unwrap();
        assert!(client.search("rust", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_error_hides_key() {
        let mut client = SerpApiClient::new(Some("SECRETKEY123".into()), Duration::from_secs(2)).unwrap();
        client.base_url = "http://127.0.0.1:9/search.json".to_string();

        let error = client.search("rust", 3).await.unwrap_err();
        assert!(!format!("{:?}", error).contains("SECRETKEY123"));
    }

    #[test]
    fn test_format_for_prompt() {
        assert_eq!(format_for_prompt(&[]), "No search results found.");
        let text = format_for_prompt(&[SearchResult {
            title: " Rust ".into(),
            snippet: "A language".into(),
            link: "https://rust-lang.org".into(),
        }]);
        assert!(text.contains("1. Rust\n   A language\n   Source: https://rust-lang.org"));
    }
}
