//! Run orchestrator (C12, spec.md §4.12).
//!
//! Ties the collector (C7), fetcher (C5), scoring pipeline (C11) and
//! aggregator (C10) into one `run_analysis` call with smart-reuse caching,
//! persistence, and report construction. Grounded in
//! `original_source/core/run_manager.py`'s `RunManager.run_analysis` for the
//! overall lifecycle (pending → in_progress → completed/failed, smart reuse
//! before collection, eager relationship load on failure) and
//! `_build_report`'s `meta_info`/`rationale` merge for report construction;
//! the ASCII visual-analysis debug table and Athena/S3 upload orchestration
//! in the original are legacy reporting surfaces outside this spec's scope
//! (S3 export is kept as the one named export path, spec.md §4.12 step 6).

use std::collections::HashSet;
use std::sync::Arc;

use sqlx::SqlitePool;

use crate::aggregator::{self, TrustSignalsConfig};
use crate::classifier::DomainClassifier;
use crate::collector::{CollectedPage, CollectorConfig, UrlCollector};
use crate::config::{RunConfig, SearchProviderKind, SourceKind};
use crate::cost_tracker::CostTracker;
use crate::detector::whois::{is_known_social_host, WhoisClient};
use crate::detector::{self, Rubric};
use crate::error::{Error, Result};
use crate::fetcher::PageFetcher;
use crate::metadata::MetadataExtractor;
use crate::models::{Modality, NormalizedContent, Run, RunStatus, SignalScore, SourceType};
use crate::pipeline::{self, ScoringService};
use crate::robots::RobotsCache;
use crate::search::SearchProvider;
use crate::store;

/// External dependencies the orchestrator needs to run a collection +
/// scoring pass. Bundled so `run_analysis` takes one argument instead of a
/// long parameter list; constructed once at process startup (`main.rs`).
pub struct Services {
    pub pool: SqlitePool,
    pub classifier: Arc<DomainClassifier>,
    pub robots: Arc<RobotsCache>,
    pub fetcher: Arc<PageFetcher>,
    pub metadata: MetadataExtractor,
    pub brave: Option<Arc<dyn SearchProvider>>,
    pub serper: Option<Arc<dyn SearchProvider>>,
    pub scoring: Arc<dyn ScoringService>,
    pub whois: Option<Arc<dyn WhoisClient>>,
    pub trust_signals: TrustSignalsConfig,
    pub rubric: Rubric,
    pub user_agent: String,
}

impl Services {
    fn provider_for(&self, kind: SearchProviderKind) -> Result<Arc<dyn SearchProvider>> {
        match kind {
            SearchProviderKind::Brave => self.brave.clone().ok_or_else(|| Error::Config("brave search provider not configured".to_string())),
            SearchProviderKind::Serper => self.serper.clone().ok_or_else(|| Error::Config("serper search provider not configured".to_string())),
        }
    }
}

/// A blocked asset surfaced in the report (spec.md §4.12: "blocked_urls list").
#[derive(Debug, Clone, serde::Serialize)]
pub struct BlockedUrl {
    pub url: String,
    pub title: String,
    pub reason: String,
}

/// One scored asset as it appears in the final report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReportItem {
    pub content_id: Option<i64>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub channel: Option<String>,
    pub meta_info: serde_json::Value,
    pub dimensions: serde_json::Value,
    pub overall_score: Option<f64>,
    pub screenshot_path: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DimensionAverage {
    pub average: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Report {
    pub run_id: i64,
    pub external_id: String,
    pub status: String,
    pub total_items_analyzed: usize,
    pub dimension_breakdown: std::collections::HashMap<String, DimensionAverage>,
    pub items: Vec<ReportItem>,
    pub blocked_urls: Vec<BlockedUrl>,
}

fn collected_page_to_normalized(page: &CollectedPage, metadata: &MetadataExtractor) -> NormalizedContent {
    let channel_info = metadata.extract_channel_info(&page.url);
    let modality = if channel_info.modality == Modality::Text {
        metadata.detect_modality(&page.url, &page.raw_html, &channel_info.channel)
    } else {
        channel_info.modality
    };

    let mut meta = metadata.extract_all(&page.raw_html);
    if let serde_json::Value::Object(map) = &mut meta {
        if let Some(link) = &page.privacy_link {
            map.insert("privacy_link".to_string(), serde_json::Value::String(link.clone()));
        }
        if let Some(badge) = &page.verification_badge {
            map.insert("verification_badge".to_string(), serde_json::to_value(badge).unwrap_or(serde_json::Value::Null));
        }
    }

    NormalizedContent {
        content_id: uuid::Uuid::new_v4().to_string(),
        source: page.source_kind,
        platform_id: None,
        author: None,
        title: page.title.clone(),
        body: page.body.clone(),
        structured_body: if page.structured_body.is_empty() { None } else { Some(page.structured_body.clone()) },
        url: page.url.clone(),
        published_at: None,
        modality,
        channel: channel_info.channel,
        platform_type: channel_info.platform_type,
        source_type: page.source_type,
        tier: None,
        language: "en".to_string(),
        screenshot_path: None,
        metadata: meta,
        visual_analysis: None,
    }
}

/// Step 2 of spec.md §4.12: collect assets for every configured source/keyword.
async fn collect_assets(
    services: &Services,
    run_config: &RunConfig,
    excluded_urls: &HashSet<String>,
    per_keyword_target: u32,
) -> Vec<NormalizedContent> {
    let mut collected = Vec::new();

    for source in &run_config.sources {
        let provider_kind = match source {
            SourceKind::Web | SourceKind::Brave => SearchProviderKind::Brave,
            SourceKind::Serper => SearchProviderKind::Serper,
            SourceKind::Reddit | SourceKind::Youtube => {
                tracing::info!(?source, "unsupported collection source, skipping");
                continue;
            }
        };

        let provider = match services.provider_for(provider_kind) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(?source, %err, "search provider unavailable, skipping source");
                continue;
            }
        };

        let mut config = CollectorConfig::new(per_keyword_target, run_config.url_collection.clone());
        config.excluded_urls = excluded_urls.clone();

        let collector = Arc::new(UrlCollector::new(
            services.classifier.clone(),
            services.robots.clone(),
            services.fetcher.clone(),
            services.user_agent.clone(),
            config,
        ));

        for keyword in &run_config.keywords {
            let pages = collector.clone().collect(provider.clone(), keyword).await;
            for page in &pages {
                collected.push(collected_page_to_normalized(page, &services.metadata));
            }
        }
    }

    collected
}

/// Step 3 of spec.md §4.12: smart-reuse cache lookup.
async fn smart_reuse(services: &Services, brand_slug: &str, run_config: &RunConfig) -> (Vec<NormalizedContent>, HashSet<String>) {
    if !run_config.reuse_data {
        return (Vec::new(), HashSet::new());
    }

    let recent = match store::find_recent_assets_by_brand(&services.pool, brand_slug, run_config.max_asset_age_hours).await {
        Ok(assets) => assets,
        Err(err) => {
            tracing::warn!(%err, "smart reuse lookup failed, proceeding without cache");
            return (Vec::new(), HashSet::new());
        }
    };

    let mut excluded = HashSet::new();
    let mut reused = Vec::with_capacity(recent.len());

    for asset in recent {
        if let Some(url) = &asset.url {
            excluded.insert(url.clone());
        }
        reused.push(NormalizedContent {
            content_id: asset.id.to_string(),
            source: asset.source_type,
            platform_id: None,
            author: None,
            title: asset.title.unwrap_or_default(),
            body: asset.raw_content.unwrap_or_default(),
            structured_body: None,
            url: asset.url.unwrap_or_default(),
            published_at: None,
            modality: asset.modality,
            channel: asset.channel.clone().unwrap_or_default(),
            platform_type: "web".to_string(),
            source_type: SourceType::Unknown,
            tier: None,
            language: asset.language.unwrap_or_else(|| "en".to_string()),
            screenshot_path: asset.screenshot_path,
            metadata: asset.meta_info,
            visual_analysis: asset.visual_analysis,
        });
    }

    tracing::info!(brand_slug, reused = reused.len(), "smart reuse found cached assets");
    (reused, excluded)
}

/// Look up WHOIS facts for `content`'s host, skipping known social platforms
/// and anything we can't parse a host out of (spec.md §4.9).
async fn lookup_whois(services: &Services, content: &NormalizedContent) -> Option<crate::detector::whois::WhoisRecord> {
    let client = services.whois.as_ref()?;
    let host = url::Url::parse(&content.url).ok()?.host_str()?.to_string();
    if is_known_social_host(&host) {
        return None;
    }
    client.lookup(&host).await
}

fn detected_to_signal_scores(attrs: &[crate::models::DetectedAttribute]) -> Vec<SignalScore> {
    attrs
        .iter()
        .map(|attr| SignalScore {
            id: attr.attribute_id.clone(),
            label: attr.label.clone(),
            dimension: attr.dimension,
            value: attr.value,
            weight: 1.0,
            evidence: vec![attr.evidence.clone()],
            rationale: String::new(),
            confidence: attr.confidence,
        })
        .collect()
}

/// Fold a scored item's five `ContentScores` dimension floats (0-1) into
/// one synthetic 0-10 [`SignalScore`] per dimension, so the LLM/visual
/// judgment feeds `aggregator::aggregate` alongside the rule-based
/// detector signals rather than sitting unused on `ContentScores`.
fn llm_signal_scores(scores: &pipeline::ContentScores) -> Vec<SignalScore> {
    crate::models::Dimension::ALL
        .iter()
        .map(|&dimension| SignalScore {
            id: format!("llm_{}", dimension.as_str()),
            label: format!("model rating: {}", dimension.as_str()),
            dimension,
            value: scores.value_for(dimension) * 10.0,
            weight: 1.0,
            evidence: scores.model.iter().cloned().collect(),
            rationale: String::new(),
            confidence: 0.7,
        })
        .collect()
}

/// Legacy authenticity-ratio percentage (spec.md §9 / SPEC_FULL supplemented
/// feature 4), synthesized from each item's overall score using the
/// deprecated `AuthenticityRatio.from_ratings` thresholds: authentic >= 75,
/// suspect in [40, 75), inauthentic < 75. Returned as a 0.0-1.0 fraction of
/// authentic items, `None` when there is nothing to rate.
fn authenticity_ratio(items: &[ReportItem]) -> Option<f64> {
    if items.is_empty() {
        return None;
    }
    let authentic = items.iter().filter(|i| i.overall_score.is_some_and(|s| s >= 75.0)).count();
    Some(authentic as f64 / items.len() as f64)
}

fn classification_band(overall_score: f64) -> &'static str {
    if overall_score >= 80.0 {
        "excellent"
    } else if overall_score >= 60.0 {
        "good"
    } else if overall_score >= 40.0 {
        "fair"
    } else {
        "poor"
    }
}

/// `run_analysis(brand_slug, scenario_slug, config)` (spec.md §4.12).
pub async fn run_analysis(services: &Services, brand_slug: &str, scenario_slug: &str, config: serde_json::Value) -> Result<Report> {
    let run_config = RunConfig::from_value(config.clone())?;

    let brand = store::get_or_create_brand(&services.pool, brand_slug, run_config.brand_name.as_deref(), &run_config.classifier.brand_domains).await?;
    let scenario = store::get_or_create_scenario(
        &services.pool,
        scenario_slug,
        run_config.scenario_name.as_deref(),
        run_config.scenario_description.as_deref(),
        serde_json::json!({}),
    )
    .await?;

    let external_id = Run::new_external_id(brand_slug, chrono::Utc::now(), &uuid::Uuid::new_v4().simple().to_string()[..6]);
    let run = store::create_run(&services.pool, brand.id, scenario.id, &external_id, config).await?;
    store::update_run_status(&services.pool, run.id, RunStatus::InProgress, None).await?;

    match execute_run(services, &run, &run_config, brand_slug).await {
        Ok(report) => {
            store::update_run_status(&services.pool, run.id, RunStatus::Completed, None).await?;
            Ok(report)
        }
        Err(err) => {
            tracing::error!(run_id = run.id, %err, "run failed");
            store::update_run_status(&services.pool, run.id, RunStatus::Failed, Some(&err.to_string())).await?;
            Err(err)
        }
    }
}

async fn execute_run(services: &Services, run: &Run, run_config: &RunConfig, brand_slug: &str) -> Result<Report> {
    let (mut assets, excluded_urls) = smart_reuse(services, brand_slug, run_config).await;

    if !run_config.sources.is_empty() && !run_config.keywords.is_empty() {
        let remaining_target = run_config.limit.saturating_sub(assets.len() as u32).max(0);
        if remaining_target > 0 {
            let fresh = collect_assets(services, run_config, &excluded_urls, remaining_target).await;
            assets.extend(fresh);
        }
    }

    let new_assets: Vec<&NormalizedContent> = assets.iter().filter(|a| uuid::Uuid::parse_str(&a.content_id).is_ok()).collect();
    let persisted = store::bulk_insert_assets(
        &services.pool,
        run.id,
        new_assets
            .iter()
            .map(|content| store::NewAsset {
                source_type: content.source,
                channel: Some(content.channel.clone()),
                url: Some(content.url.clone()),
                external_id: None,
                title: Some(content.title.clone()),
                raw_content: Some(content.body.clone()),
                normalized_content: None,
                modality: content.modality,
                language: Some(content.language.clone()),
                screenshot_path: content.screenshot_path.clone(),
                visual_analysis: content.visual_analysis.clone(),
                meta_info: content.metadata.clone(),
            })
            .collect(),
    )
    .await?;

    let scored = pipeline::run_pipeline(&assets, services.scoring.as_ref()).await;

    let mut items = Vec::with_capacity(scored.len());
    let mut blocked_urls = Vec::new();
    let mut dimension_totals: std::collections::HashMap<&'static str, (f64, usize)> =
        crate::models::Dimension::ALL.iter().map(|d| (d.as_str(), (0.0, 0))).collect();

    for (idx, scores) in scored.iter().enumerate() {
        let content = &assets[idx];
        let whois_record = lookup_whois(services, content).await;
        let detected = detector::run_all(content, &services.rubric, chrono::Utc::now(), whois_record.as_ref());

        let mut signal_scores = detected_to_signal_scores(&detected);
        signal_scores.extend(scores.as_signal_scores());
        signal_scores.extend(llm_signal_scores(scores));

        let aggregation = aggregator::aggregate(&signal_scores, &services.trust_signals);
        let overall_score = aggregation.overall_score;

        for dim_result in &aggregation.dimensions {
            let entry = dimension_totals.get_mut(dim_result.dimension.as_str()).expect("all dimensions present");
            entry.0 += dim_result.score;
            entry.1 += 1;
        }

        let persisted_id = persisted.iter().position(|a| a.url.as_deref() == Some(content.url.as_str())).map(|i| persisted[i].id);

        if let Some(asset_id) = persisted_id {
            let rationale = serde_json::json!({
                "detected_attributes": signal_scores,
                "dimensions": aggregation.dimensions.iter().map(|d| (d.dimension.as_str(), d.score)).collect::<std::collections::HashMap<_, _>>(),
                "visual_analysis": scores.visual_analysis,
            });

            store::insert_dimension_scores(
                &services.pool,
                store::NewDimensionScores {
                    asset_id,
                    provenance: aggregation.dimensions[0].score,
                    verification: aggregation.dimensions[1].score,
                    transparency: aggregation.dimensions[2].score,
                    coherence: aggregation.dimensions[3].score,
                    resonance: aggregation.dimensions[4].score,
                    overall_score,
                    classification: classification_band(overall_score).to_string(),
                    rationale,
                    flags: serde_json::json!({}),
                },
            )
            .await?;
        }

        let access_denied = content.metadata.get("access_denied").and_then(|v| v.as_bool()).unwrap_or(false);
        if access_denied {
            blocked_urls.push(BlockedUrl {
                url: content.url.clone(),
                title: content.title.clone(),
                reason: "anti-bot protection (access denied)".to_string(),
            });
        }

        items.push(ReportItem {
            content_id: persisted_id,
            url: Some(content.url.clone()),
            title: Some(content.title.clone()),
            channel: Some(content.channel.clone()),
            meta_info: content.metadata.clone(),
            dimensions: serde_json::json!(aggregation.dimensions.iter().map(|d| (d.dimension.as_str(), d.score)).collect::<std::collections::HashMap<_, _>>()),
            overall_score: Some(overall_score),
            screenshot_path: content.screenshot_path.clone(),
        });
    }

    let dimension_breakdown = dimension_totals
        .into_iter()
        .map(|(name, (sum, count))| (name.to_string(), DimensionAverage { average: if count > 0 { sum / count as f64 } else { 0.0 } }))
        .collect();

    let overall_avg = if items.is_empty() {
        0.0
    } else {
        items.iter().filter_map(|i| i.overall_score).sum::<f64>() / items.len() as f64
    };

    store::create_truststack_summary(
        &services.pool,
        crate::models::TrustStackSummary {
            id: 0,
            run_id: run.id,
            avg_provenance: dimension_breakdown.get(crate::models::Dimension::Provenance.as_str()).map(|d| d.average),
            avg_verification: dimension_breakdown.get(crate::models::Dimension::Verification.as_str()).map(|d| d.average),
            avg_transparency: dimension_breakdown.get(crate::models::Dimension::Transparency.as_str()).map(|d| d.average),
            avg_coherence: dimension_breakdown.get(crate::models::Dimension::Coherence.as_str()).map(|d| d.average),
            avg_resonance: dimension_breakdown.get(crate::models::Dimension::Resonance.as_str()).map(|d| d.average),
            authenticity_ratio: authenticity_ratio(&items),
            overall_trust_stack_score: Some(overall_avg),
            insights: serde_json::json!({}),
        },
    )
    .await?;

    Ok(Report {
        run_id: run.id,
        external_id: run.external_id.clone(),
        status: "completed".to_string(),
        total_items_analyzed: items.len(),
        dimension_breakdown,
        items,
        blocked_urls,
    })
}

/// Called once after `run_analysis` returns (successfully or not): print the
/// per-model LLM usage table and warn on quota breach (spec.md §4.11's
/// cost-tracking cross-cutting concern, spec.md §4.12 grounded in
/// `original_source/core/run_manager.py`'s end-of-run cost summary call).
pub fn finalize_cost_tracking(tracker: &mut CostTracker) {
    let summary = tracker.summary();
    for model in &summary.models {
        tracing::info!(model = %model.model, prompt_tokens = model.prompt_tokens, completion_tokens = model.completion_tokens, cost_usd = model.cost_usd, "llm usage");
    }
    tracker.check_quotas();
    tracker.reset();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_bands_follow_thresholds() {
        assert_eq!(classification_band(85.0), "excellent");
        assert_eq!(classification_band(65.0), "good");
        assert_eq!(classification_band(45.0), "fair");
        assert_eq!(classification_band(10.0), "poor");
    }

    fn item_with_score(score: f64) -> ReportItem {
        ReportItem {
            content_id: None,
            url: None,
            title: None,
            channel: None,
            meta_info: serde_json::json!({}),
            dimensions: serde_json::json!({}),
            overall_score: Some(score),
            screenshot_path: None,
        }
    }

    #[test]
    fn authenticity_ratio_counts_items_scoring_at_least_75() {
        let items = vec![item_with_score(90.0), item_with_score(80.0), item_with_score(50.0), item_with_score(10.0)];
        assert_eq!(authenticity_ratio(&items), Some(0.5));
    }

    #[test]
    fn authenticity_ratio_is_none_for_an_empty_run() {
        assert_eq!(authenticity_ratio(&[]), None);
    }
}
