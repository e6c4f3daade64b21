//! Robots cache (C2, spec.md §4.2).
//!
//! Memoises parsed robots.txt policies per `scheme://host`. Fetches are routed
//! through the [`PerDomainRateLimiter`](crate::rate_limiter::PerDomainRateLimiter)
//! so a burst of first-time lookups against the same host still obeys C1.
//! Fails open: any fetch or parse failure memoises a permissive empty policy,
//! per spec.md §4.2.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use texting_robots::Robot;
use url::Url;

use crate::rate_limiter::PerDomainRateLimiter;

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// A memoised robots.txt decision for one `scheme://host`.
#[derive(Clone)]
enum Policy {
    /// Successfully parsed, or a fail-open empty policy.
    Parsed(Arc<Robot>),
    /// Fetch/parse failed; always allow.
    PermitAll,
}

pub struct RobotsCache {
    http: reqwest::Client,
    limiter: PerDomainRateLimiter,
    cache: Mutex<HashMap<String, Policy>>,
}

impl RobotsCache {
    pub fn new(http: reqwest::Client, limiter: PerDomainRateLimiter) -> Self {
        Self {
            http,
            limiter,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Is `url` allowed to be fetched by `user_agent`? Fails open on any error.
    pub async fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        let Some(host) = parsed.host_str() else {
            return true;
        };
        let origin_key = format!("{}://{}", parsed.scheme(), host);

        if let Some(policy) = self.cache.lock().get(&origin_key).cloned() {
            return Self::evaluate(&policy, url);
        }

        let policy = self.fetch_and_parse(&origin_key, user_agent).await;
        let decision = Self::evaluate(&policy, url);
        self.cache.lock().insert(origin_key, policy);
        decision
    }

    fn evaluate(policy: &Policy, url: &str) -> bool {
        match policy {
            Policy::PermitAll => true,
            Policy::Parsed(robot) => robot.allowed(url),
        }
    }

    async fn fetch_and_parse(&self, origin_key: &str, user_agent: &str) -> Policy {
        let robots_url = format!("{}/robots.txt", origin_key);
        self.limiter.wait_for(&robots_url).await;

        let fetch = self.http.get(&robots_url).send();
        let result = tokio::time::timeout(FETCH_TIMEOUT, fetch).await;

        let body = match result {
            Ok(Ok(resp)) if resp.status().is_success() => resp.bytes().await.ok(),
            _ => None,
        };

        match body {
            Some(bytes) => match Robot::new(user_agent, &bytes) {
                Ok(robot) => Policy::Parsed(Arc::new(robot)),
                Err(_) => Policy::PermitAll,
            },
            None => Policy::PermitAll,
        }
    }

    /// Clear all memoised decisions. Tests only.
    pub fn reset(&self) {
        self.cache.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> RobotsCache {
        RobotsCache::new(
            reqwest::Client::new(),
            PerDomainRateLimiter::new(Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn missing_robots_txt_fails_open() {
        let cache = cache();
        let policy = cache.fetch_and_parse("https://127.0.0.1:9", "test-agent").await;
        assert!(RobotsCache::evaluate(&policy, "https://127.0.0.1:9/anything"));
    }

    #[test]
    fn disallow_rule_blocks_matching_path() {
        let txt = b"User-agent: *\nDisallow: /private\n";
        let robot = Robot::new("test-agent", txt).unwrap();
        let policy = Policy::Parsed(Arc::new(robot));
        assert!(!RobotsCache::evaluate(&policy, "https://example.com/private/page"));
        assert!(RobotsCache::evaluate(&policy, "https://example.com/public"));
    }

    #[tokio::test]
    async fn unparsable_url_is_allowed() {
        let cache = cache();
        assert!(cache.is_allowed("not a url", "test-agent").await);
    }
}
