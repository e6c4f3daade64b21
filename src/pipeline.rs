//! Scoring pipeline (C11, spec.md §4.11).
//!
//! Per-asset stages: pre-filter, triage, language detect, LLM/visual scoring
//! through an injectable [`ScoringService`], aggregation via
//! [`crate::aggregator`], and persistence (left to the orchestrator, which
//! owns the store handle). Grounded in `original_source/scoring/triage.py`
//! for the pre-filter/triage rule set and `original_source/scoring/
//! pipeline.py` for the stage ordering; the Athena/S3 upload and legacy
//! Authenticity Ratio classification steps in the original are downstream
//! reporting concerns handled in `orchestrator.rs`, not this module.

use crate::models::{Dimension, NormalizedContent, SignalScore};

const FUNCTIONAL_PAGE_KEYWORDS: &[&str] =
    &["login", "sign in", "sign up", "register", "cart", "checkout", "forgot password"];
const ERROR_PAGE_KEYWORDS: &[&str] = &["404", "page not found", "internal server error", "access denied"];

const TRIAGE_SHORT_BODY_CHARS: usize = 100;
const TRIAGE_FUNCTIONAL_PAGE_CHARS: usize = 300;
const TRIAGE_DEFAULT_SCORE: f64 = 0.5;

/// Why an asset never reached LLM/visual scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    ShortBody,
    FunctionalPage(String),
    ErrorPage(String),
}

impl SkipReason {
    pub fn as_str(&self) -> String {
        match self {
            Self::ShortBody => "content too short (< 100 chars)".to_string(),
            Self::FunctionalPage(title) => format!("functional page detected: {title}"),
            Self::ErrorPage(title) => format!("error page detected: {title}"),
        }
    }
}

/// Outcome of running pre-filter + triage over one asset.
pub enum TriageOutcome {
    /// Passed both stages; proceed to LLM/visual scoring.
    Proceed,
    /// Skipped; caller should assign `default_score` without calling the
    /// scoring service.
    Skip { reason: SkipReason, default_score: f64 },
}

/// `should_skip_content` (spec.md §4.11 step 1): body too short, functional
/// page with thin body, or a detected error page.
pub fn should_skip_content(content: &NormalizedContent) -> Option<SkipReason> {
    let body = content.body.trim();
    if body.len() < TRIAGE_SHORT_BODY_CHARS {
        return Some(SkipReason::ShortBody);
    }

    let title_lower = content.title.to_ascii_lowercase();

    if ERROR_PAGE_KEYWORDS.iter().any(|kw| title_lower.contains(kw)) {
        return Some(SkipReason::ErrorPage(content.title.clone()));
    }

    if FUNCTIONAL_PAGE_KEYWORDS.iter().any(|kw| title_lower.contains(kw)) && body.len() < TRIAGE_FUNCTIONAL_PAGE_CHARS {
        return Some(SkipReason::FunctionalPage(content.title.clone()));
    }

    None
}

/// Stages 1-2 combined: pre-filter then triage (spec.md §4.11 steps 1-2).
pub fn triage(content: &NormalizedContent) -> TriageOutcome {
    if let Some(reason) = should_skip_content(content) {
        return TriageOutcome::Skip { reason, default_score: TRIAGE_DEFAULT_SCORE };
    }
    TriageOutcome::Proceed
}

/// Heuristic fallback score for items the scoring service itself declines to
/// score (spec.md §4.11 step 4): `0.5` for empty content, else
/// `min(1, 0.3 + len/2000)`.
pub fn heuristic_fallback_score(content: &NormalizedContent) -> f64 {
    if content.body.trim().is_empty() {
        return 0.5;
    }
    (0.3 + content.body.len() as f64 / 2000.0).min(1.0)
}

/// Output of scoring one content item (spec.md §4.11 step 4): five
/// dimension scores in [0,1], a rationale map, and optional visual analysis.
#[derive(Debug, Clone)]
pub struct ContentScores {
    pub content_id: String,
    pub provenance: f64,
    pub verification: f64,
    pub transparency: f64,
    pub coherence: f64,
    pub resonance: f64,
    pub detected_attributes: Vec<crate::models::DetectedAttribute>,
    pub dimensions: serde_json::Value,
    pub visual_analysis: Option<serde_json::Value>,
    pub model: Option<String>,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl ContentScores {
    pub fn fallback(content_id: &str, score: f64) -> Self {
        Self {
            content_id: content_id.to_string(),
            provenance: score,
            verification: score,
            transparency: score,
            coherence: score,
            resonance: score,
            detected_attributes: Vec::new(),
            dimensions: serde_json::json!({}),
            visual_analysis: None,
            model: None,
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }

    pub fn value_for(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Provenance => self.provenance,
            Dimension::Verification => self.verification,
            Dimension::Transparency => self.transparency,
            Dimension::Coherence => self.coherence,
            Dimension::Resonance => self.resonance,
        }
    }

    /// Flatten into per-dimension [`SignalScore`]s for [`crate::aggregator::aggregate`].
    pub fn as_signal_scores(&self) -> Vec<SignalScore> {
        self.detected_attributes
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
}

/// Pluggable batch LLM/visual scoring backend (spec.md §4.11 step 4). The
/// Python original wires `ContentScorer` directly; this crate keeps the same
/// "pluggable scoring service" boundary spec.md gives the WHOIS client so
/// tests can supply a fake and production can wire a real LLM client without
/// this module depending on any particular provider SDK.
#[async_trait::async_trait]
pub trait ScoringService: Send + Sync {
    async fn score_batch(&self, items: &[NormalizedContent]) -> Vec<Option<ContentScores>>;

    /// Log the run's per-model LLM usage and quota warnings, then reset the
    /// tracker for the next run (spec.md §4.11 ambient stack). A no-op for
    /// scoring services that don't track cost.
    fn finalize_cost_tracking(&self) {}
}

/// Run the full per-asset pipeline over `items` (spec.md §4.11 steps 1-4;
/// aggregation and persistence are the caller's responsibility since they
/// need a `TrustSignalsConfig` and a store handle respectively).
pub async fn run_pipeline(items: &[NormalizedContent], scoring: &dyn ScoringService) -> Vec<ContentScores> {
    let mut survivors = Vec::new();
    let mut results = vec![None; items.len()];

    for (idx, content) in items.iter().enumerate() {
        match triage(content) {
            TriageOutcome::Skip { reason, default_score } => {
                tracing::info!(content_id = %content.content_id, reason = %reason.as_str(), "pre-filtered content");
                results[idx] = Some(ContentScores::fallback(&content.content_id, default_score));
            }
            TriageOutcome::Proceed => survivors.push(idx),
        }
    }

    if !survivors.is_empty() {
        let batch: Vec<NormalizedContent> = survivors.iter().map(|&i| items[i].clone()).collect();
        let scored = scoring.score_batch(&batch).await;
        for (slot, outcome) in survivors.into_iter().zip(scored) {
            let content = &items[slot];
            results[slot] = Some(outcome.unwrap_or_else(|| {
                tracing::debug!(content_id = %content.content_id, "scoring service declined item, using heuristic fallback");
                ContentScores::fallback(&content.content_id, heuristic_fallback_score(content))
            }));
        }
    }

    results.into_iter().map(|r| r.expect("every index populated by triage or scoring loop")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetSourceType, Modality, SourceType};

    fn content_with(body: &str, title: &str) -> NormalizedContent {
        NormalizedContent {
            content_id: "c1".to_string(),
            source: AssetSourceType::Web,
            platform_id: None,
            author: None,
            title: title.to_string(),
            body: body.to_string(),
            structured_body: None,
            url: "https://example.com".to_string(),
            published_at: None,
            modality: Modality::Text,
            channel: "example.com".to_string(),
            platform_type: "web".to_string(),
            source_type: SourceType::ThirdParty,
            tier: None,
            language: "en".to_string(),
            screenshot_path: None,
            metadata: serde_json::json!({}),
            visual_analysis: None,
        }
    }

    #[test]
    fn short_body_is_skipped() {
        let content = content_with("too short", "Normal title");
        assert_eq!(should_skip_content(&content), Some(SkipReason::ShortBody));
    }

    #[test]
    fn functional_page_with_thin_body_is_skipped() {
        let body = "a".repeat(150);
        let content = content_with(&body, "Sign In to Your Account");
        assert!(matches!(should_skip_content(&content), Some(SkipReason::FunctionalPage(_))));
    }

    #[test]
    fn functional_page_with_substantial_body_passes() {
        let body = "a".repeat(400);
        let content = content_with(&body, "Sign In to Your Account");
        assert_eq!(should_skip_content(&content), None);
    }

    #[test]
    fn error_page_is_skipped_regardless_of_length() {
        let body = "a".repeat(1000);
        let content = content_with(&body, "404 Page Not Found");
        assert!(matches!(should_skip_content(&content), Some(SkipReason::ErrorPage(_))));
    }

    #[test]
    fn heuristic_fallback_scales_with_length() {
        let empty = content_with("", "Title");
        assert_eq!(heuristic_fallback_score(&empty), 0.5);

        let short = content_with(&"a".repeat(200), "Title");
        assert!((heuristic_fallback_score(&short) - 0.4).abs() < 1e-9);

        let long = content_with(&"a".repeat(10_000), "Title");
        assert_eq!(heuristic_fallback_score(&long), 1.0);
    }

    struct AlwaysNoneScorer;

    #[async_trait::async_trait]
    impl ScoringService for AlwaysNoneScorer {
        async fn score_batch(&self, items: &[NormalizedContent]) -> Vec<Option<ContentScores>> {
            vec![None; items.len()]
        }
    }

    #[tokio::test]
    async fn pipeline_uses_heuristic_fallback_when_scorer_declines() {
        let content = content_with(&"word ".repeat(50), "Normal title");
        let results = run_pipeline(&[content], &AlwaysNoneScorer).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].provenance > 0.0);
    }

    #[tokio::test]
    async fn pipeline_skips_without_calling_scorer() {
        let content = content_with("too short", "Normal title");
        let results = run_pipeline(&[content], &AlwaysNoneScorer).await;
        assert_eq!(results[0].provenance, 0.5);
    }
}
