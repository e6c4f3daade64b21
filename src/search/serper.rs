//! Serper (Google Search proxy) provider.
//!
//! Grounded in `original_source/ingestion/serper_search.py`'s `search_serper`:
//! fixed 10 results per page, pagination by incrementing `page`, stop on
//! empty page, raise on 401/429.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::rate_limiter::PerDomainRateLimiter;

use super::{SearchProvider, SearchResult};

const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";
const RESULTS_PER_PAGE: u32 = 10;
const MAX_PAGINATION_ATTEMPTS: u32 = 10;

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganicResult>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganicResult {
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

#[must_use]
pub struct SerperSearchProvider {
    http: reqwest::Client,
    limiter: PerDomainRateLimiter,
    api_key: String,
    timeout: Duration,
}

impl SerperSearchProvider {
    pub fn new(http: reqwest::Client, limiter: PerDomainRateLimiter, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            limiter,
            api_key: api_key.into(),
            timeout,
        }
    }
}

#[async_trait]
impl SearchProvider for SerperSearchProvider {
    async fn search(&self, query: &str, size: u32, start_offset: u32) -> Result<Vec<SearchResult>> {
        let mut all_results = Vec::new();
        let start_page: u32 = 1 + start_offset / RESULTS_PER_PAGE;
        let mut page: u32 = start_page;
        let max_pages = start_page + size.div_ceil(RESULTS_PER_PAGE).min(MAX_PAGINATION_ATTEMPTS);

        while all_results.len() < size as usize && page <= max_pages {
            let mut payload = serde_json::json!({
                "q": query,
                "num": RESULTS_PER_PAGE,
            });
            if page > 1 {
                payload["page"] = serde_json::json!(page);
            }

            info!(query, page, collected = all_results.len(), target = size, "serper api request");

            self.limiter.wait_for(SERPER_ENDPOINT).await;

            let response = self
                .http
                .post(SERPER_ENDPOINT)
                .timeout(self.timeout)
                .header("X-API-KEY", &self.api_key)
                .header("Content-Type", "application/json")
                .json(&payload)
                .send()
                .await?;

            if response.status() == reqwest::StatusCode::UNAUTHORIZED
                || response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS
            {
                return Err(Error::SearchProviderAuth(format!(
                    "serper api returned {}",
                    response.status()
                )));
            }
            if !response.status().is_success() {
                return Err(Error::SearchProvider(format!(
                    "serper api returned {}",
                    response.status()
                )));
            }

            let body: SerperResponse = response.json().await?;
            if body.organic.is_empty() {
                warn!(query, page, "serper api returned zero results, stopping pagination");
                break;
            }

            all_results.extend(body.organic.into_iter().map(|r| SearchResult {
                url: r.link,
                title: r.title,
                snippet: r.snippet,
            }));
            page += 1;
        }

        all_results.truncate(size as usize);
        Ok(all_results)
    }

    fn name(&self) -> &'static str {
        "SERPER"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_missing_is_a_caller_responsibility() {
        // SerperSearchProvider::new accepts any string; absence is enforced
        // at the orchestrator boundary (RunConfig/AppEnv), not here.
        let provider = SerperSearchProvider::new(
            reqwest::Client::new(),
            PerDomainRateLimiter::new(Duration::from_millis(1)),
            "",
            Duration::from_secs(30),
        );
        assert_eq!(provider.name(), "SERPER");
    }
}
