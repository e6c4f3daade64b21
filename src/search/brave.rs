//! Brave Search provider.
//!
//! Grounded in `original_source/ingestion/brave_search.py`'s `search_brave`
//! (API-key pagination loop, auth mode selection) and
//! `dashflow-brave`'s builder/constructor idiom for the HTTP client and
//! result types.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::BraveAuthMode;
use crate::error::{Error, Result};
use crate::rate_limiter::PerDomainRateLimiter;

use super::{SearchProvider, SearchResult};

const BRAVE_API_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";
const MAX_PAGINATION_ATTEMPTS: u32 = 10;

#[derive(Debug, Deserialize)]
struct BraveApiResponse {
    #[serde(default)]
    web: Option<BraveWebSection>,
}

#[derive(Debug, Deserialize)]
struct BraveWebSection {
    #[serde(default)]
    results: Vec<BraveApiResult>,
}

#[derive(Debug, Deserialize)]
struct BraveApiResult {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
}

/// Queries the Brave Search API, paginating via `offset` when `size` exceeds
/// one request's `count` ceiling.
#[must_use]
pub struct BraveSearchProvider {
    http: reqwest::Client,
    limiter: PerDomainRateLimiter,
    api_key: String,
    auth_mode: BraveAuthMode,
    max_per_request: u32,
    timeout: Duration,
}

impl BraveSearchProvider {
    pub fn new(
        http: reqwest::Client,
        limiter: PerDomainRateLimiter,
        api_key: impl Into<String>,
        auth_mode: BraveAuthMode,
        max_per_request: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            limiter,
            api_key: api_key.into(),
            auth_mode,
            max_per_request,
            timeout,
        }
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder, params: &mut Vec<(String, String)>) -> reqwest::RequestBuilder {
        match self.auth_mode {
            BraveAuthMode::Bearer => builder.header("Authorization", format!("Bearer {}", self.api_key)),
            BraveAuthMode::XApiKey => builder.header("x-api-key", &self.api_key),
            BraveAuthMode::SubscriptionToken => builder.header("X-Subscription-Token", &self.api_key),
            BraveAuthMode::Both => builder
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("x-api-key", &self.api_key),
            BraveAuthMode::QueryParam => {
                params.push(("key".to_string(), self.api_key.clone()));
                builder
            }
        }
    }
}

#[async_trait]
impl SearchProvider for BraveSearchProvider {
    async fn search(&self, query: &str, size: u32, start_offset: u32) -> Result<Vec<SearchResult>> {
        let mut all_results = Vec::new();
        let mut offset: u32 = start_offset;
        let mut attempts = 0;

        while all_results.len() < size as usize && attempts < MAX_PAGINATION_ATTEMPTS {
            attempts += 1;
            let remaining = size as usize - all_results.len();
            let batch_size = remaining.min(self.max_per_request as usize) as u32;

            let mut params = vec![
                ("q".to_string(), query.to_string()),
                ("count".to_string(), batch_size.to_string()),
            ];
            if offset > 0 {
                params.push(("offset".to_string(), offset.to_string()));
            }

            info!(query, batch_size, offset, collected = all_results.len(), target = size, "brave api request");

            self.limiter.wait_for(BRAVE_API_ENDPOINT).await;

            let mut builder = self
                .http
                .get(BRAVE_API_ENDPOINT)
                .timeout(self.timeout)
                .header("Accept", "application/json");
            builder = self.apply_auth(builder, &mut params);
            let response = builder.query(&params).send().await?;

            if response.status() == reqwest::StatusCode::UNAUTHORIZED
                || response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS
            {
                return Err(Error::SearchProviderAuth(format!(
                    "brave api returned {}",
                    response.status()
                )));
            }
            if !response.status().is_success() {
                return Err(Error::SearchProvider(format!(
                    "brave api returned {}",
                    response.status()
                )));
            }

            let body: BraveApiResponse = response.json().await?;
            let batch = body.web.map(|w| w.results).unwrap_or_default();
            if batch.is_empty() {
                warn!(query, "brave api returned zero results, stopping pagination");
                break;
            }

            let batch_len = batch.len();
            all_results.extend(batch.into_iter().map(|r| SearchResult {
                url: r.url,
                title: r.title,
                snippet: r.description,
            }));
            offset += batch_len as u32;
        }

        all_results.truncate(size as usize);
        Ok(all_results)
    }

    fn name(&self) -> &'static str {
        "BRAVE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_param_auth_appends_key_param() {
        let provider = BraveSearchProvider::new(
            reqwest::Client::new(),
            PerDomainRateLimiter::new(Duration::from_millis(1)),
            "secret-key",
            BraveAuthMode::QueryParam,
            20,
            Duration::from_secs(10),
        );
        let mut params = Vec::new();
        let _ = provider.apply_auth(provider.http.get(BRAVE_API_ENDPOINT), &mut params);
        assert_eq!(params, vec![("key".to_string(), "secret-key".to_string())]);
    }
}
