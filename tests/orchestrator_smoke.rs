//! End-to-end smoke test for the run orchestrator (C12), exercising smart
//! reuse (spec.md §8 property 5 / scenario S4) and the full
//! persist-then-report round trip (property 7) without any network access:
//! `sources`/`keywords` are left empty so `collect_assets` never runs and
//! the run is satisfied entirely out of the smart-reuse cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::Row;

use trust_stack::aggregator::TrustSignalsConfig;
use trust_stack::classifier::DomainClassifier;
use trust_stack::config::ClassifierConfig;
use trust_stack::detector::Rubric;
use trust_stack::fetcher::PageFetcher;
use trust_stack::metadata::MetadataExtractor;
use trust_stack::models::{AssetSourceType, Modality};
use trust_stack::orchestrator::{self, Services};
use trust_stack::pipeline::{ContentScores, ScoringService};
use trust_stack::rate_limiter::PerDomainRateLimiter;
use trust_stack::robots::RobotsCache;
use trust_stack::store::{self, NewAsset};

/// Always declines, forcing every item through the heuristic fallback —
/// keeps this test free of any real LLM call.
struct NeverScores;

#[async_trait]
impl ScoringService for NeverScores {
    async fn score_batch(&self, items: &[trust_stack::models::NormalizedContent]) -> Vec<Option<ContentScores>> {
        vec![None; items.len()]
    }
}

fn trust_signals_config() -> TrustSignalsConfig {
    let raw = std::fs::read_to_string("config/trust_signals.yml").expect("config/trust_signals.yml must exist");
    serde_yaml::from_str(&raw).expect("config/trust_signals.yml must parse")
}

async fn build_services(pool: sqlx::SqlitePool) -> Services {
    let http = reqwest::Client::new();
    let robots = Arc::new(RobotsCache::new(http.clone(), PerDomainRateLimiter::new(Duration::from_millis(1))));
    let fetcher = Arc::new(PageFetcher::new(
        http,
        PerDomainRateLimiter::new(Duration::from_millis(1)),
        Arc::clone(&robots),
        None,
        "test-agent",
        None,
    ));

    Services {
        pool,
        classifier: Arc::new(DomainClassifier::new(ClassifierConfig::default())),
        robots,
        fetcher,
        metadata: MetadataExtractor::new(),
        brave: None,
        serper: None,
        scoring: Arc::new(NeverScores),
        whois: None,
        trust_signals: trust_signals_config(),
        rubric: Rubric::all(),
        user_agent: "test-agent".to_string(),
    }
}

#[tokio::test]
async fn smart_reuse_satisfies_a_run_with_no_fresh_collection() {
    let pool = store::connect("sqlite::memory:").await.unwrap();
    store::init_db(&pool).await.unwrap();

    let brand = store::get_or_create_brand(&pool, "acme", Some("Acme"), &["acme.com".to_string()]).await.unwrap();
    let scenario = store::get_or_create_scenario(&pool, "default", None, None, serde_json::json!({})).await.unwrap();
    let prior_run = store::create_run(&pool, brand.id, scenario.id, "acme_20260101_000000_abcdef", serde_json::json!({})).await.unwrap();
    store::update_run_status(&pool, prior_run.id, trust_stack::models::RunStatus::Completed, None).await.unwrap();

    let seeded_assets: Vec<NewAsset> = (0..10)
        .map(|i| NewAsset {
            source_type: AssetSourceType::Web,
            channel: Some("acme.com".to_string()),
            url: Some(format!("https://acme.com/page-{i}")),
            external_id: None,
            title: Some(format!("Acme page {i}")),
            raw_content: Some(
                "Acme ships durable running shoes with a transparent supply chain. ".repeat(10),
            ),
            normalized_content: None,
            modality: Modality::Text,
            language: Some("en".to_string()),
            screenshot_path: None,
            visual_analysis: None,
            meta_info: serde_json::json!({}),
        })
        .collect();
    store::bulk_insert_assets(&pool, prior_run.id, seeded_assets).await.unwrap();

    let services = build_services(pool).await;

    let run_config = serde_json::json!({
        "sources": [],
        "keywords": [],
        "limit": 10,
        "reuse_data": true,
        "max_asset_age_hours": 24,
    });

    let report = orchestrator::run_analysis(&services, "acme", "default", run_config).await.unwrap();

    assert_eq!(report.status, "completed");
    assert_eq!(report.total_items_analyzed, 10);
    assert_eq!(report.items.len(), 10);
    assert!(report.items.iter().all(|i| i.overall_score.is_some()));
    assert_eq!(report.dimension_breakdown.len(), 5);

    let row = sqlx::query("SELECT status FROM runs WHERE id = ?")
        .bind(report.run_id)
        .fetch_one(&services.pool)
        .await
        .unwrap();
    let status: String = row.try_get("status").unwrap();
    assert_eq!(status, "completed");

    let summary_count: i64 = sqlx::query("SELECT COUNT(*) AS c FROM truststack_summary WHERE run_id = ?")
        .bind(report.run_id)
        .fetch_one(&services.pool)
        .await
        .unwrap()
        .try_get("c")
        .unwrap();
    assert_eq!(summary_count, 1);

    let dim_score_count: i64 = sqlx::query(
        "SELECT COUNT(*) AS c FROM dimension_scores ds JOIN content_assets ca ON ds.asset_id = ca.id WHERE ca.run_id = ?",
    )
    .bind(report.run_id)
    .fetch_one(&services.pool)
    .await
    .unwrap()
    .try_get("c")
    .unwrap();
    assert_eq!(dim_score_count, 0, "smart-reused assets belong to the prior run, not this one");
}

#[tokio::test]
async fn a_run_with_no_cache_and_no_sources_produces_an_empty_completed_report() {
    let pool = store::connect("sqlite::memory:").await.unwrap();
    store::init_db(&pool).await.unwrap();
    let services = build_services(pool).await;

    let run_config = serde_json::json!({
        "sources": [],
        "keywords": [],
        "limit": 10,
    });

    let report = orchestrator::run_analysis(&services, "brand-new", "default", run_config).await.unwrap();
    assert_eq!(report.status, "completed");
    assert_eq!(report.total_items_analyzed, 0);
    assert!(report.items.is_empty());
    assert!(report.blocked_urls.is_empty());
}
