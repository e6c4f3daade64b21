//! Per-domain rate limiter (C1, spec.md §4.1).
//!
//! Grounded in `original_source/ingestion/rate_limiter.py`'s
//! `PerDomainRateLimiter`, generalized to hold the host's sub-lock only while
//! updating the timestamp and not across the sleep itself, so that waits for
//! distinct hosts never block one another (spec.md §4.1's serialisation
//! contract — the Python original's single global lock held across
//! `time.sleep` would violate that contract under real concurrency).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use url::Url;

/// Thread-safe, per-host request pacer.
///
/// Tracks the last permitted-request instant per host. `wait_for` blocks the
/// calling task (via `tokio::time::sleep`, never the OS thread) until the
/// configured interval has elapsed since the last request to that host.
#[derive(Debug, Clone)]
pub struct PerDomainRateLimiter {
    inner: Arc<Mutex<HashMap<String, Instant>>>,
    default_interval: Duration,
}

impl PerDomainRateLimiter {
    pub fn new(default_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            default_interval,
        }
    }

    /// Wait, if necessary, before a request to `url`'s host is allowed to proceed.
    ///
    /// Unparsable URLs or URLs without a host are not rate limited. A zero
    /// interval disables limiting entirely.
    pub async fn wait_for(&self, url: &str) {
        if self.default_interval.is_zero() {
            return;
        }
        let Some(host) = Self::extract_host(url) else {
            return;
        };

        loop {
            let sleep_for = {
                let mut map = self.inner.lock();
                let now = Instant::now();
                match map.get(&host) {
                    Some(last) => {
                        let elapsed = now.saturating_duration_since(*last);
                        if elapsed < self.default_interval {
                            Some(self.default_interval - elapsed)
                        } else {
                            map.insert(host.clone(), now);
                            None
                        }
                    }
                    None => {
                        map.insert(host.clone(), now);
                        None
                    }
                }
            };

            match sleep_for {
                Some(d) => tokio::time::sleep(d).await,
                None => break,
            }
        }
    }

    fn extract_host(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        parsed.host_str().map(str::to_string)
    }

    /// Clear all host tracking. Tests only.
    pub fn reset(&self) {
        self.inner.lock().clear();
    }
}

impl Default for PerDomainRateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs_f64(2.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_request_to_a_host_never_waits() {
        let limiter = PerDomainRateLimiter::new(Duration::from_millis(200));
        let start = Instant::now();
        limiter.wait_for("https://example.com/a").await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn same_host_is_serialised_with_minimum_interval() {
        let limiter = PerDomainRateLimiter::new(Duration::from_millis(150));
        limiter.wait_for("https://example.com/a").await;
        let start = Instant::now();
        limiter.wait_for("https://example.com/b").await;
        assert!(start.elapsed() >= Duration::from_millis(140));
    }

    #[tokio::test]
    async fn different_hosts_do_not_wait_on_each_other() {
        let limiter = PerDomainRateLimiter::new(Duration::from_millis(500));
        limiter.wait_for("https://example.com/a").await;
        let start = Instant::now();
        limiter.wait_for("https://other.com/a").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn unparsable_url_is_never_limited() {
        let limiter = PerDomainRateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        limiter.wait_for("not a url").await;
        limiter.wait_for("not a url").await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn reset_clears_tracked_hosts() {
        let limiter = PerDomainRateLimiter::new(Duration::from_millis(300));
        limiter.wait_for("https://example.com/a").await;
        limiter.reset();
        let start = Instant::now();
        limiter.wait_for("https://example.com/a").await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn zero_interval_disables_limiting() {
        let limiter = PerDomainRateLimiter::new(Duration::ZERO);
        let start = Instant::now();
        limiter.wait_for("https://example.com/a").await;
        limiter.wait_for("https://example.com/a").await;
        assert!(start.elapsed() < Duration::from_millis(20));
    }
}
