//! URL collector (C7, spec.md §4.7).
//!
//! The hard part: a producer/consumer pipeline that collects exactly
//! `target_count` successfully fetched pages per query while honouring
//! brand-owned/third-party ratios and per-host diversity caps. Grounded in
//! spec.md §4.7 directly — `original_source/ingestion/page_collector.py` is a
//! thin, provider-specific dispatch stub (the ratio/diversity/adaptive-sizing
//! logic lives inline in `brave_search.py`/`serper_search.py` in the
//! original); this module extracts it into the standalone component the spec
//! names.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::classifier::DomainClassifier;
use crate::config::UrlCollectionConfig;
use crate::error::Result;
use crate::fetcher::PageFetcher;
use crate::models::{AssetSourceType, SourceType};
use crate::robots::RobotsCache;
use crate::search::{SearchProvider, SearchResult};

const DEFAULT_WORKERS: usize = 5;
const DEFAULT_MIN_BODY_LENGTH: usize = 200;
const DEFAULT_MIN_BRAND_BODY_LENGTH: usize = 75;
const PRODUCER_YIELD: Duration = Duration::from_millis(100);
const ERROR_PAGE_MARKERS: &[&str] = &["access denied", "403", "404", "forbidden", "not found", "error"];

#[derive(Debug, Clone, Default)]
pub struct CollectorStats {
    pub processed: u32,
    pub fetched: u32,
    pub valid: u32,
    pub thin_content: u32,
    pub robots_blocked: u32,
    pub error_page: u32,
    pub domain_limit_reached: u32,
    pub pool_full: u32,
    pub no_url: u32,
}

/// Knobs for one collection run (spec.md §4.7).
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub target_count: u32,
    pub pool_size: u32,
    pub min_body_length: usize,
    pub min_brand_body_length: usize,
    pub url_collection: UrlCollectionConfig,
    pub workers: usize,
    pub excluded_urls: HashSet<String>,
}

impl CollectorConfig {
    pub fn new(target_count: u32, url_collection: UrlCollectionConfig) -> Self {
        Self {
            target_count,
            pool_size: (target_count * 5).max(30),
            min_body_length: DEFAULT_MIN_BODY_LENGTH,
            min_brand_body_length: DEFAULT_MIN_BRAND_BODY_LENGTH,
            url_collection,
            workers: DEFAULT_WORKERS,
            excluded_urls: HashSet::new(),
        }
    }
}

/// One accepted page, tagged with its classification.
#[derive(Debug, Clone)]
pub struct CollectedPage {
    pub url: String,
    pub title: String,
    pub body: String,
    pub raw_html: String,
    pub structured_body: Vec<crate::models::BodySegment>,
    pub privacy_link: Option<String>,
    pub verification_badge: Option<crate::models::VerificationBadge>,
    pub source_type: SourceType,
    pub source_kind: AssetSourceType,
}

struct SharedState {
    brand_owned_collected: Vec<CollectedPage>,
    third_party_collected: Vec<CollectedPage>,
    domain_counts: HashMap<String, u32>,
    seen_urls: HashSet<String>,
    stats: CollectorStats,
    stopped: bool,
}

/// Producer/consumer URL collector for one query.
pub struct UrlCollector {
    classifier: Arc<DomainClassifier>,
    robots: Arc<RobotsCache>,
    fetcher: Arc<PageFetcher>,
    user_agent: String,
    config: CollectorConfig,
}

impl UrlCollector {
    pub fn new(
        classifier: Arc<DomainClassifier>,
        robots: Arc<RobotsCache>,
        fetcher: Arc<PageFetcher>,
        user_agent: impl Into<String>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            classifier,
            robots,
            fetcher,
            user_agent: user_agent.into(),
            config,
        }
    }

    fn targets(&self) -> (u32, u32) {
        let total = self.config.target_count as f64;
        let brand_ratio = self.config.url_collection.brand_owned_ratio;
        let third_ratio = self.config.url_collection.third_party_ratio;

        let target_brand = (total * brand_ratio).floor() as u32;
        let target_third = (total * third_ratio).floor() as u32;
        let allocated = target_brand + target_third;
        let remainder = self.config.target_count.saturating_sub(allocated);

        if remainder == 0 {
            return (target_brand, target_third);
        }
        if brand_ratio >= third_ratio {
            (target_brand + remainder, target_third)
        } else {
            (target_brand, target_third + remainder)
        }
    }

    fn max_per_domain(&self) -> Option<u32> {
        let brand_controlled = DomainClassifier::is_brand_controlled(self.config.url_collection.brand_owned_ratio);
        if brand_controlled {
            None
        } else {
            Some((0.2 * self.config.target_count as f64).floor().max(1.0) as u32)
        }
    }

    /// Drive the collector for one query against `provider`, returning up to
    /// `target_count` pages.
    pub async fn collect(self: Arc<Self>, provider: Arc<dyn SearchProvider>, query: &str) -> Vec<CollectedPage> {
        let (target_brand, target_third) = self.targets();
        info!(query, target_brand, target_third, pool_size = self.config.pool_size, "starting url collection");

        let state = Arc::new(Mutex::new(SharedState {
            brand_owned_collected: Vec::new(),
            third_party_collected: Vec::new(),
            domain_counts: HashMap::new(),
            seen_urls: self.config.excluded_urls.clone(),
            stats: CollectorStats::default(),
            stopped: false,
        }));

        let (tx, rx) = mpsc::channel::<SearchResult>(self.config.pool_size.min(50) as usize);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let producer = {
            let state = Arc::clone(&state);
            let collector = Arc::clone(&self);
            let provider = Arc::clone(&provider);
            let query = query.to_string();
            tokio::spawn(async move {
                collector.run_producer(provider, query, state, tx, target_brand, target_third).await;
            })
        };

        let mut consumers = Vec::with_capacity(self.config.workers);
        for _ in 0..self.config.workers {
            let state = Arc::clone(&state);
            let collector = Arc::clone(&self);
            let rx = Arc::clone(&rx);
            consumers.push(tokio::spawn(async move {
                collector.run_consumer(state, rx, target_brand, target_third).await;
            }));
        }

        let _ = producer.await;
        for consumer in consumers {
            let _ = consumer.await;
        }

        let guard = state.lock();
        let mut results = guard.brand_owned_collected.clone();
        results.extend(guard.third_party_collected.clone());
        info!(query, collected = results.len(), stats = ?guard.stats, "url collection finished");
        results
    }

    async fn run_producer(
        &self,
        provider: Arc<dyn SearchProvider>,
        query: String,
        state: Arc<Mutex<SharedState>>,
        tx: mpsc::Sender<SearchResult>,
        target_brand: u32,
        target_third: u32,
    ) {
        let mut offset: u32 = 0;
        let mut batch_size = self.config.target_count.max(10);

        loop {
            let should_stop = {
                let guard = state.lock();
                let total_collected = (guard.brand_owned_collected.len() + guard.third_party_collected.len()) as u32;
                guard.stopped || total_collected >= target_brand + target_third || guard.stats.processed >= self.config.pool_size
            };
            if should_stop {
                state.lock().stopped = true;
                break;
            }

            let batch = match provider.search(&query, batch_size, offset).await {
                Ok(results) => results,
                Err(e) => {
                    debug!(query, error = %e, "search provider request failed, stopping producer");
                    state.lock().stopped = true;
                    break;
                }
            };
            if batch.is_empty() {
                state.lock().stopped = true;
                break;
            }

            let mut pushed_any = false;
            for result in &batch {
                let is_new = {
                    let mut guard = state.lock();
                    guard.seen_urls.insert(result.url.clone())
                };
                if is_new {
                    pushed_any = true;
                    if tx.send(result.clone()).await.is_err() {
                        state.lock().stopped = true;
                        return;
                    }
                }
            }
            offset += batch.len() as u32;
            if !pushed_any {
                debug!(query, offset, "batch produced no new urls, stopping producer");
                state.lock().stopped = true;
                break;
            }

            batch_size = self.adaptive_batch_size(&state, target_brand + target_third);
            tokio::time::sleep(PRODUCER_YIELD).await;
        }
    }

    /// Adaptive sizing (spec.md §4.7 producer step 6).
    fn adaptive_batch_size(&self, state: &Mutex<SharedState>, target: u32) -> u32 {
        let guard = state.lock();
        if guard.stats.fetched < 5 {
            return self.config.target_count.max(10);
        }
        let success_rate = guard.stats.valid as f64 / guard.stats.fetched.max(1) as f64;
        let collected = (guard.brand_owned_collected.len() + guard.third_party_collected.len()) as u32;

        if success_rate < 0.3 {
            2 * self.config.target_count
        } else if success_rate > 0.6 {
            let remaining = target.saturating_sub(collected) as f64;
            (10.0_f64).max((remaining / success_rate).ceil() + 5.0) as u32
        } else {
            self.config.target_count
        }
    }

    async fn run_consumer(
        &self,
        state: Arc<Mutex<SharedState>>,
        rx: Arc<tokio::sync::Mutex<mpsc::Receiver<SearchResult>>>,
        target_brand: u32,
        target_third: u32,
    ) {
        loop {
            let item = {
                let mut receiver = rx.lock().await;
                tokio::time::timeout(Duration::from_millis(200), receiver.recv()).await
            };

            let result = match item {
                Ok(Some(result)) => result,
                Ok(None) => break,
                Err(_) => {
                    if state.lock().stopped {
                        break;
                    }
                    continue;
                }
            };

            {
                let mut guard = state.lock();
                let total_collected = (guard.brand_owned_collected.len() + guard.third_party_collected.len()) as u32;
                if total_collected >= target_brand + target_third {
                    guard.stats.pool_full += 1;
                    continue;
                }
                guard.stats.processed += 1;
            }

            if result.url.is_empty() {
                state.lock().stats.no_url += 1;
                continue;
            }

            let classification = self.classifier.classify(&result.url);

            if !self.robots.is_allowed(&result.url, &self.user_agent).await {
                state.lock().stats.robots_blocked += 1;
                continue;
            }

            let fetched = match self.fetcher.fetch(&result.url, false).await {
                Ok(page) => page,
                Err(_) => {
                    state.lock().stats.error_page += 1;
                    continue;
                }
            };
            state.lock().stats.fetched += 1;

            let min_length = if classification.source_type == SourceType::BrandOwned {
                self.config.min_brand_body_length
            } else {
                self.config.min_body_length
            };
            if fetched.body.trim().len() < min_length {
                state.lock().stats.thin_content += 1;
                continue;
            }

            let title_lower = fetched.title.to_ascii_lowercase();
            if ERROR_PAGE_MARKERS.iter().any(|m| title_lower.contains(m)) {
                state.lock().stats.error_page += 1;
                continue;
            }

            let Ok(parsed) = url::Url::parse(&result.url) else {
                state.lock().stats.no_url += 1;
                continue;
            };
            let Some(host) = parsed.host_str().map(str::to_string) else {
                state.lock().stats.no_url += 1;
                continue;
            };

            let mut guard = state.lock();
            let total_collected = (guard.brand_owned_collected.len() + guard.third_party_collected.len()) as u32;
            if total_collected >= target_brand + target_third {
                guard.stats.pool_full += 1;
                continue;
            }

            let is_brand = classification.source_type == SourceType::BrandOwned;
            if is_brand && guard.brand_owned_collected.len() as u32 >= target_brand {
                guard.stats.pool_full += 1;
                continue;
            }
            if !is_brand && guard.third_party_collected.len() as u32 >= target_third {
                guard.stats.pool_full += 1;
                continue;
            }

            if let Some(cap) = self.max_per_domain() {
                let count = guard.domain_counts.get(&host).copied().unwrap_or(0);
                if count >= cap {
                    guard.stats.domain_limit_reached += 1;
                    continue;
                }
            }

            let page = CollectedPage {
                url: result.url.clone(),
                title: fetched.title.clone(),
                body: fetched.body.clone(),
                raw_html: fetched.raw_content.clone(),
                structured_body: fetched.structured_body.clone(),
                privacy_link: fetched.privacy_link.clone(),
                verification_badge: fetched.verification_badge.clone(),
                source_type: classification.source_type,
                source_kind: AssetSourceType::Web,
            };
            if is_brand {
                guard.brand_owned_collected.push(page);
            } else {
                guard.third_party_collected.push(page);
            }
            *guard.domain_counts.entry(host).or_insert(0) += 1;
            guard.stats.valid += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;

    fn make_collector(target: u32, ratio: f64) -> UrlCollector {
        let classifier = Arc::new(DomainClassifier::new(ClassifierConfig::default()));
        let robots = Arc::new(RobotsCache::new(reqwest::Client::new(), crate::rate_limiter::PerDomainRateLimiter::new(Duration::from_millis(1))));
        let fetcher = Arc::new(PageFetcher::new(
            reqwest::Client::new(),
            crate::rate_limiter::PerDomainRateLimiter::new(Duration::from_millis(1)),
            Arc::clone(&robots),
            None,
            "test-agent",
            None,
        ));
        let config = CollectorConfig::new(
            target,
            UrlCollectionConfig { brand_owned_ratio: ratio, third_party_ratio: 1.0 - ratio },
        );
        UrlCollector::new(classifier, robots, fetcher, "test-agent", config)
    }

    #[test]
    fn targets_split_evenly_and_allocate_remainder_to_larger_ratio() {
        let collector = make_collector(10, 0.5);
        assert_eq!(collector.targets(), (5, 5));

        let collector = make_collector(11, 0.6);
        let (brand, third) = collector.targets();
        assert_eq!(brand + third, 11);
        assert!(brand >= third);
    }

    #[test]
    fn max_per_domain_disabled_when_brand_controlled() {
        let collector = make_collector(10, 0.9);
        assert_eq!(collector.max_per_domain(), None);
    }

    #[test]
    fn max_per_domain_is_twenty_percent_floor_minimum_one() {
        let collector = make_collector(10, 0.5);
        assert_eq!(collector.max_per_domain(), Some(2));

        let collector = make_collector(3, 0.5);
        assert_eq!(collector.max_per_domain(), Some(1));
    }
}
