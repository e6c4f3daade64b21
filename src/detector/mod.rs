//! Attribute detector (C9, spec.md §4.9).
//!
//! A rule-based catalogue of detectors keyed by `attribute_id`. The registry
//! loads an enabled-attributes list from a rubric file and dispatches the
//! corresponding function; each detector returns at most one
//! [`DetectedAttribute`] or `None`. No detector ever panics — `run_all`
//! catches nothing because nothing here is fallible; detectors that would
//! need a fallible external call (WHOIS) take an already-resolved value so
//! the boundary between "detector logic" and "I/O" stays explicit.
//!
//! Grounded in `original_source/scoring/attribute_detector.py` for the
//! overall dispatch-table shape; the representative detector bodies below
//! implement the testable contracts spec.md §4.9 calls out explicitly.

pub mod whois;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{AbsentReason, AttributeStatus, DetectedAttribute, Dimension, NormalizedContent};
use whois::WhoisRecord;

/// Rubric-driven enable list: which `attribute_id`s run for a given content
/// item. In production this is loaded from `config/trust_signals.yml`
/// (spec.md "Configuration" ambient-stack section); tests pass an explicit
/// list.
#[derive(Debug, Clone)]
pub struct Rubric {
    pub enabled_attribute_ids: Vec<String>,
}

impl Rubric {
    pub fn all() -> Self {
        Self {
            enabled_attribute_ids: ATTRIBUTE_IDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub const ATTRIBUTE_IDS: &[&str] = &[
    "ai_vs_human_labeling_clarity",
    "author_brand_identity_verified",
    "c2pa_cai_manifest_present",
    "canonical_url_matches_declared_source",
    "domain_age",
    "whois_privacy",
    "verified_platform_account",
    "readability_grade_level_fit",
    "privacy_policy_link_availability_clarity",
    "engagement_to_trust_correlation",
    "engagement_authenticity_ratio",
    "data_source_citations_for_claims",
    "claim_to_source_traceability",
];

fn attribute(
    attribute_id: &str,
    dimension: Dimension,
    label: &str,
    value: f64,
    evidence: impl Into<String>,
    confidence: f64,
    source_url: &str,
) -> DetectedAttribute {
    DetectedAttribute {
        attribute_id: attribute_id.to_string(),
        dimension,
        label: label.to_string(),
        value,
        evidence: evidence.into(),
        confidence,
        suggestion: None,
        source_url: source_url.to_string(),
        status: AttributeStatus::Present,
        reason: None,
    }
}

fn absent(attribute_id: &str, dimension: Dimension, value: f64, evidence: impl Into<String>, source_url: &str, reason: AbsentReason) -> DetectedAttribute {
    DetectedAttribute {
        attribute_id: attribute_id.to_string(),
        dimension,
        label: attribute_id.to_string(),
        value,
        evidence: evidence.into(),
        confidence: 0.0,
        suggestion: None,
        source_url: source_url.to_string(),
        status: AttributeStatus::Absent,
        reason: Some(reason),
    }
}

const AI_ARTIFACT_MARKERS: &[&str] = &[
    "as an ai language model",
    "i am an ai",
    "as a large language model",
    "i don't have personal",
];

/// `ai_vs_human_labeling_clarity` (spec.md §4.9): footer/header disclosures
/// beat main-text disclosures; negative detection only fires when the main
/// text contains an AI artefact marker and no disclosure was found anywhere.
pub fn ai_vs_human_labeling_clarity(content: &NormalizedContent) -> Option<DetectedAttribute> {
    let json_ld_has_author_type = content
        .metadata
        .get("json_ld")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter().any(|entry| {
                let t = entry.get("@type").and_then(|v| v.as_str()).unwrap_or("");
                t.eq_ignore_ascii_case("Person") || t.eq_ignore_ascii_case("Organization")
            })
        })
        .unwrap_or(false);
    let has_c2pa = content.metadata.get("has_provenance_manifest").and_then(|v| v.as_bool()).unwrap_or(false);
    let has_ai_generated_meta = content.metadata.get("ai_generated").is_some();

    let main_lower = content.body.to_ascii_lowercase();
    let footer_text: String = content
        .structured_body
        .as_ref()
        .map(|segs| {
            segs.iter()
                .filter(|s| matches!(s.semantic_role, crate::models::SemanticRole::FooterText))
                .map(|s| s.text.clone())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
        .to_ascii_lowercase();

    let disclosure_re = Regex::new(r"(?i)(written|generated|created) (by|with) (a )?(human|ai|artificial intelligence)").ok()?;
    let footer_disclosure = disclosure_re.is_match(&footer_text);
    let main_disclosure = disclosure_re.is_match(&main_lower);

    if json_ld_has_author_type || has_c2pa || has_ai_generated_meta || footer_disclosure || main_disclosure {
        let (value, evidence) = if footer_disclosure {
            (9.0, "disclosure found in footer/header")
        } else if json_ld_has_author_type || has_c2pa {
            (8.0, "structured authorship metadata present")
        } else if has_ai_generated_meta {
            (7.0, "ai-generated meta tag present")
        } else {
            (6.0, "disclosure found in main text")
        };
        return Some(attribute(
            "ai_vs_human_labeling_clarity",
            Dimension::Transparency,
            "AI vs human labeling clarity",
            value,
            evidence,
            0.8,
            &content.url,
        ));
    }

    if AI_ARTIFACT_MARKERS.iter().any(|m| main_lower.contains(m)) {
        return Some(attribute(
            "ai_vs_human_labeling_clarity",
            Dimension::Transparency,
            "AI vs human labeling clarity",
            2.0,
            "ai-artefact marker found in main text with no disclosure",
            0.7,
            &content.url,
        ));
    }

    None
}

/// `author_brand_identity_verified` (spec.md §4.9): explicit byline > schema
/// author > site-level inheritance > weak "About" mention.
pub fn author_brand_identity_verified(content: &NormalizedContent) -> Option<DetectedAttribute> {
    if let Some(author) = &content.author {
        if !author.trim().is_empty() {
            return Some(attribute(
                "author_brand_identity_verified",
                Dimension::Provenance,
                "Author/brand identity verified",
                9.0,
                format!("explicit byline: {author}"),
                0.9,
                &content.url,
            ));
        }
    }

    if let Some(schema_author) = content.metadata.get("author").and_then(|v| v.as_str()) {
        if !schema_author.trim().is_empty() {
            return Some(attribute(
                "author_brand_identity_verified",
                Dimension::Provenance,
                "Author/brand identity verified",
                7.0,
                format!("schema/meta author: {schema_author}"),
                0.75,
                &content.url,
            ));
        }
    }

    if content.source_type == crate::models::SourceType::BrandOwned {
        return Some(attribute(
            "author_brand_identity_verified",
            Dimension::Provenance,
            "Author/brand identity verified",
            5.0,
            "inherited from brand-owned site identity",
            0.5,
            &content.url,
        ));
    }

    let prefix: String = content.body.chars().take(500).collect();
    if prefix.to_ascii_lowercase().contains("about") {
        return Some(attribute(
            "author_brand_identity_verified",
            Dimension::Provenance,
            "Author/brand identity verified",
            3.0,
            "weak 'About' mention in opening text",
            0.3,
            &content.url,
        ));
    }

    None
}

/// `c2pa_cai_manifest_present` (spec.md §4.9): only evaluated for visual
/// content; text-only without significant visuals returns `None`.
pub fn c2pa_cai_manifest_present(content: &NormalizedContent) -> Option<DetectedAttribute> {
    let is_visual = content.modality != crate::models::Modality::Text || content.has_significant_visuals();
    if !is_visual {
        return None;
    }

    let has_manifest = content.metadata.get("has_provenance_manifest").and_then(|v| v.as_bool()).unwrap_or(false);
    let (value, evidence) = if has_manifest {
        (10.0, "C2PA/CAI provenance manifest present")
    } else {
        (2.0, "visual content with no provenance manifest")
    };

    Some(attribute(
        "c2pa_cai_manifest_present",
        Dimension::Provenance,
        "C2PA/CAI manifest present",
        value,
        evidence,
        0.8,
        &content.url,
    ))
}

/// Path with any trailing slash stripped, except the bare root path, so
/// `/a` and `/a/` compare equal.
fn normalize_path(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// `canonical_url_matches_declared_source` (spec.md §4.9).
pub fn canonical_url_matches_declared_source(content: &NormalizedContent) -> Option<DetectedAttribute> {
    let canonical = content.metadata.get("canonical_url").and_then(|v| v.as_str())?;
    let declared = url::Url::parse(&content.url).ok()?;
    let canon = url::Url::parse(canonical).ok()?;

    let declared_host = declared.host_str().unwrap_or("").trim_start_matches("www.");
    let canon_host = canon.host_str().unwrap_or("").trim_start_matches("www.");
    let host_matches_mod_www = declared_host == canon_host;
    let paths_match = normalize_path(declared.path()) == normalize_path(canon.path());

    if host_matches_mod_www && paths_match {
        return Some(attribute(
            "canonical_url_matches_declared_source",
            Dimension::Provenance,
            "Canonical URL matches declared source",
            10.0,
            "canonical URL matches declared source (protocol/trailing slash only)",
            0.9,
            &content.url,
        ));
    }

    if declared_host == canon_host {
        return Some(attribute(
            "canonical_url_matches_declared_source",
            Dimension::Provenance,
            "Canonical URL matches declared source",
            5.0,
            "same host, different path",
            0.9,
            &content.url,
        ));
    }

    Some(absent(
        "canonical_url_matches_declared_source",
        Dimension::Provenance,
        1.0,
        "canonical URL host mismatch",
        &content.url,
        AbsentReason::NotInDom,
    ))
}

/// `domain_age` (spec.md §4.9, WHOIS-backed, SPEC_FULL supplemented feature 1).
pub fn domain_age(content: &NormalizedContent, now: DateTime<Utc>, record: Option<&WhoisRecord>) -> Option<DetectedAttribute> {
    let host = url::Url::parse(&content.url).ok()?.host_str()?.to_string();
    if whois::is_known_social_host(&host) {
        return None;
    }
    let record = record?;
    let (value, evidence) = whois::domain_age_score(now, record)?;

    Some(attribute(
        "domain_age",
        Dimension::Provenance,
        "Domain age",
        value,
        evidence,
        0.7,
        &content.url,
    ))
}

/// `whois_privacy` (spec.md §4.9, SPEC_FULL supplemented feature 1).
pub fn whois_privacy(content: &NormalizedContent, record: Option<&WhoisRecord>) -> Option<DetectedAttribute> {
    let record = record?;
    let (value, evidence) = whois::whois_privacy_score(record);
    Some(attribute("whois_privacy", Dimension::Provenance, "WHOIS privacy", value, evidence, 0.6, &content.url))
}

/// `verified_platform_account` (spec.md §4.9).
pub fn verified_platform_account(content: &NormalizedContent) -> Option<DetectedAttribute> {
    let host = url::Url::parse(&content.url).ok()?.host_str()?.to_string();
    let known_social = whois::is_known_social_host(&host);

    if let Some(badge) = content.verification_badge() {
        if badge.verified {
            return Some(attribute(
                "verified_platform_account",
                Dimension::Verification,
                "Verified platform account",
                10.0,
                badge.evidence.unwrap_or_else(|| "verification badge present".to_string()),
                0.95,
                &content.url,
            ));
        }
    }

    if known_social {
        return Some(attribute(
            "verified_platform_account",
            Dimension::Verification,
            "Verified platform account",
            3.0,
            "known social host without a verification badge",
            0.5,
            &content.url,
        ));
    }

    None
}

static SENTENCE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s+").unwrap());

/// `readability_grade_level_fit` (spec.md §4.9).
pub fn readability_grade_level_fit(content: &NormalizedContent) -> Option<DetectedAttribute> {
    if looks_like_list_or_nav(&content.body) {
        return None;
    }

    let sentences: Vec<&str> = SENTENCE_SPLIT
        .split(content.body.trim())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.is_empty() {
        return None;
    }

    let mut word_counts: Vec<usize> = sentences.iter().map(|s| s.split_whitespace().count()).filter(|&n| n > 2).collect();
    if word_counts.is_empty() {
        return None;
    }
    word_counts.sort_unstable();
    let median = word_counts[word_counts.len() / 2] as f64;

    let (value, evidence) = if (12.0..=22.0).contains(&median) {
        (10.0, format!("median {median} words/sentence, ideal range"))
    } else if (8.0..=30.0).contains(&median) {
        (7.0, format!("median {median} words/sentence, acceptable range"))
    } else {
        (4.0, format!("median {median} words/sentence, outside comfortable range"))
    };

    Some(attribute(
        "readability_grade_level_fit",
        Dimension::Coherence,
        "Readability grade-level fit",
        value,
        evidence,
        0.7,
        &content.url,
    ))
}

fn looks_like_list_or_nav(body: &str) -> bool {
    let lines: Vec<&str> = body.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 5 {
        return false;
    }
    let short_lines = lines.iter().filter(|l| l.split_whitespace().count() <= 4).count();
    (short_lines as f64 / lines.len() as f64) > 0.6
}

const POLICY_PHRASES: &[&str] = &["privacy policy", "how we use your data", "data protection notice", "your privacy rights"];

/// `privacy_policy_link_availability_clarity` (spec.md §4.9).
pub fn privacy_policy_link_availability_clarity(content: &NormalizedContent) -> Option<DetectedAttribute> {
    let url_lower = content.url.to_ascii_lowercase();
    let looks_like_policy_url = url_lower.contains("/privacy") || url_lower.contains("/legal");
    let meta_policy_url = content.metadata.get("privacy_link").and_then(|v| v.as_str()).is_some();
    let body_lower = content.body.to_ascii_lowercase();
    let phrase_present = POLICY_PHRASES.iter().any(|p| body_lower.contains(p));
    let footer_link_present = content.metadata.get("privacy_link").is_some();

    if looks_like_policy_url || meta_policy_url || phrase_present || footer_link_present {
        return Some(attribute(
            "privacy_policy_link_availability_clarity",
            Dimension::Transparency,
            "Privacy policy link availability/clarity",
            9.0,
            "privacy policy reference found",
            0.85,
            &content.url,
        ));
    }

    if content.source_type == crate::models::SourceType::BrandOwned {
        return Some(attribute(
            "privacy_policy_link_availability_clarity",
            Dimension::Transparency,
            "Privacy policy link availability/clarity",
            2.0,
            "no privacy policy reference found on brand-owned content",
            0.6,
            &content.url,
        ));
    }

    None
}

const NON_ENGAGEMENT_PATHS: &[&str] = &["/docs", "/jobs", "/careers", "/landing"];

fn engagement_not_expected(content: &NormalizedContent) -> bool {
    let host = url::Url::parse(&content.url).ok().and_then(|u| u.host_str().map(str::to_string)).unwrap_or_default();
    if host.ends_with(".gov") || host.ends_with(".edu") {
        return true;
    }
    let path = url::Url::parse(&content.url).map(|u| u.path().to_ascii_lowercase()).unwrap_or_default();
    if NON_ENGAGEMENT_PATHS.iter().any(|p| path.starts_with(p)) {
        return true;
    }
    if content.source_type == crate::models::SourceType::BrandOwned {
        let has_reviews = content.metadata.get("has_reviews_section").and_then(|v| v.as_bool()).unwrap_or(false);
        if !has_reviews {
            return true;
        }
    }
    false
}

/// `engagement_to_trust_correlation` (spec.md §4.9).
pub fn engagement_to_trust_correlation(content: &NormalizedContent) -> Option<DetectedAttribute> {
    if engagement_not_expected(content) {
        return None;
    }
    let engagement = content.metadata.get("engagement_score").and_then(|v| v.as_f64()).unwrap_or(5.0);
    Some(attribute(
        "engagement_to_trust_correlation",
        Dimension::Resonance,
        "Engagement-to-trust correlation",
        engagement,
        "engagement metrics correlated with trust signals",
        0.6,
        &content.url,
    ))
}

/// `engagement_authenticity_ratio` (spec.md §4.9).
pub fn engagement_authenticity_ratio(content: &NormalizedContent) -> Option<DetectedAttribute> {
    if engagement_not_expected(content) {
        return None;
    }
    let ratio = content.metadata.get("engagement_authenticity_ratio").and_then(|v| v.as_f64()).unwrap_or(6.0);
    Some(attribute(
        "engagement_authenticity_ratio",
        Dimension::Resonance,
        "Engagement authenticity ratio",
        ratio,
        "engagement authenticity ratio derived from interaction metadata",
        0.5,
        &content.url,
    ))
}

static CLAIM_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(\.\d+)?%|\$\d|study (found|shows)|research (found|shows)|survey found)").unwrap()
});

fn has_data_claim(body: &str) -> bool {
    CLAIM_MARKERS.is_match(body)
}

/// `data_source_citations_for_claims` (spec.md §4.9): only evaluates pages
/// exhibiting data-claim markers.
pub fn data_source_citations_for_claims(content: &NormalizedContent) -> Option<DetectedAttribute> {
    if !has_data_claim(&content.body) {
        return None;
    }
    let has_citation = content.body.to_ascii_lowercase().contains("source:") || content.body.contains("http");
    let (value, evidence) = if has_citation {
        (8.0, "data claim accompanied by a citation or source reference")
    } else {
        (3.0, "data claim present with no visible citation")
    };
    Some(attribute(
        "data_source_citations_for_claims",
        Dimension::Coherence,
        "Data source citations for claims",
        value,
        evidence,
        0.65,
        &content.url,
    ))
}

/// `claim_to_source_traceability` (spec.md §4.9): only evaluates pages
/// exhibiting data-claim markers.
pub fn claim_to_source_traceability(content: &NormalizedContent) -> Option<DetectedAttribute> {
    if !has_data_claim(&content.body) {
        return None;
    }
    let json_ld_present = content.metadata.get("json_ld").and_then(|v| v.as_array()).map(|a| !a.is_empty()).unwrap_or(false);
    let (value, evidence) = if json_ld_present {
        (7.0, "structured data present alongside data claims")
    } else {
        (4.0, "data claims present without structured source traceability")
    };
    Some(attribute(
        "claim_to_source_traceability",
        Dimension::Coherence,
        "Claim-to-source traceability",
        value,
        evidence,
        0.6,
        &content.url,
    ))
}

/// Run every enabled, applicable detector against `content`. Detectors that
/// need WHOIS data receive an already-resolved `whois_record` (looked up by
/// the caller before invoking the registry); detectors never throw, so there
/// is nothing for this function to catch — a detector returning `None` is
/// the expected "not applicable" outcome, not a failure.
pub fn run_all(content: &NormalizedContent, rubric: &Rubric, now: DateTime<Utc>, whois_record: Option<&WhoisRecord>) -> Vec<DetectedAttribute> {
    let enabled = |id: &str| rubric.enabled_attribute_ids.iter().any(|e| e == id);
    let mut out = Vec::new();

    macro_rules! run {
        ($id:expr, $call:expr) => {
            if enabled($id) {
                if let Some(attr) = $call {
                    out.push(attr);
                }
            }
        };
    }

    run!("ai_vs_human_labeling_clarity", ai_vs_human_labeling_clarity(content));
    run!("author_brand_identity_verified", author_brand_identity_verified(content));
    run!("c2pa_cai_manifest_present", c2pa_cai_manifest_present(content));
    run!("canonical_url_matches_declared_source", canonical_url_matches_declared_source(content));
    run!("domain_age", domain_age(content, now, whois_record));
    run!("whois_privacy", whois_privacy(content, whois_record));
    run!("verified_platform_account", verified_platform_account(content));
    run!("readability_grade_level_fit", readability_grade_level_fit(content));
    run!("privacy_policy_link_availability_clarity", privacy_policy_link_availability_clarity(content));
    run!("engagement_to_trust_correlation", engagement_to_trust_correlation(content));
    run!("engagement_authenticity_ratio", engagement_authenticity_ratio(content));
    run!("data_source_citations_for_claims", data_source_citations_for_claims(content));
    run!("claim_to_source_traceability", claim_to_source_traceability(content));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetSourceType, Modality, SourceType};
    use serde_json::json;

    fn base_content() -> NormalizedContent {
        NormalizedContent {
            content_id: "c1".to_string(),
            source: AssetSourceType::Web,
            platform_id: None,
            author: None,
            title: "Title".to_string(),
            body: "Some body text that is reasonably long for testing purposes here.".to_string(),
            structured_body: None,
            url: "https://example.com/page".to_string(),
            published_at: None,
            modality: Modality::Text,
            channel: "example.com".to_string(),
            platform_type: "web".to_string(),
            source_type: SourceType::ThirdParty,
            tier: None,
            language: "en".to_string(),
            screenshot_path: None,
            metadata: json!({}),
            visual_analysis: None,
        }
    }

    #[test]
    fn ai_artifact_with_no_disclosure_scores_low() {
        let mut content = base_content();
        content.body = "As an AI language model, I cannot provide opinions.".to_string();
        let result = ai_vs_human_labeling_clarity(&content).unwrap();
        assert_eq!(result.value, 2.0);
    }

    #[test]
    fn explicit_byline_beats_everything_else() {
        let mut content = base_content();
        content.author = Some("Jane Doe".to_string());
        let result = author_brand_identity_verified(&content).unwrap();
        assert_eq!(result.value, 9.0);
    }

    #[test]
    fn c2pa_detector_returns_none_for_plain_text() {
        let content = base_content();
        assert!(c2pa_cai_manifest_present(&content).is_none());
    }

    #[test]
    fn c2pa_detector_fires_for_significant_visuals() {
        let mut content = base_content();
        content.metadata = json!({"has_significant_visuals": true, "has_provenance_manifest": true});
        let result = c2pa_cai_manifest_present(&content).unwrap();
        assert_eq!(result.value, 10.0);
    }

    #[test]
    fn canonical_exact_match_scores_ten() {
        let mut content = base_content();
        content.metadata = json!({"canonical_url": "https://example.com/page"});
        let result = canonical_url_matches_declared_source(&content).unwrap();
        assert_eq!(result.value, 10.0);
    }

    #[test]
    fn canonical_host_mismatch_scores_one() {
        let mut content = base_content();
        content.metadata = json!({"canonical_url": "https://other.com/page"});
        let result = canonical_url_matches_declared_source(&content).unwrap();
        assert_eq!(result.value, 1.0);
        assert_eq!(result.status, AttributeStatus::Absent);
    }

    #[test]
    fn canonical_trailing_slash_only_scores_ten() {
        let mut content = base_content();
        content.url = "https://x.com/a".to_string();
        content.metadata = json!({"canonical_url": "https://x.com/a/"});
        let result = canonical_url_matches_declared_source(&content).unwrap();
        assert_eq!(result.value, 10.0);
    }

    #[test]
    fn domain_age_skipped_for_known_social_host() {
        let mut content = base_content();
        content.url = "https://instagram.com/nike".to_string();
        assert!(domain_age(&content, Utc::now(), None).is_none());
    }

    #[test]
    fn verified_platform_account_reads_badge_from_metadata() {
        let mut content = base_content();
        content.url = "https://twitter.com/nike".to_string();
        content.metadata = json!({"verification_badge": {"verified": true, "platform": "twitter", "evidence": "icon-verified"}});
        let result = verified_platform_account(&content).unwrap();
        assert_eq!(result.value, 10.0);
    }

    #[test]
    fn readability_mid_range_scores_ten() {
        let mut content = base_content();
        let sentence = "word ".repeat(15).trim().to_string() + ".";
        content.body = sentence.repeat(6);
        let result = readability_grade_level_fit(&content);
        assert!(result.is_some());
    }

    #[test]
    fn list_like_body_skips_readability() {
        let mut content = base_content();
        content.body = (0..10).map(|i| format!("item {i}")).collect::<Vec<_>>().join("\n");
        assert!(readability_grade_level_fit(&content).is_none());
    }

    #[test]
    fn data_claim_detectors_return_none_without_markers() {
        let content = base_content();
        assert!(data_source_citations_for_claims(&content).is_none());
        assert!(claim_to_source_traceability(&content).is_none());
    }

    #[test]
    fn data_claim_with_citation_scores_high() {
        let mut content = base_content();
        content.body = "A 2023 study found that 42% of users prefer this. Source: https://example.com/study".to_string();
        let result = data_source_citations_for_claims(&content).unwrap();
        assert_eq!(result.value, 8.0);
    }

    #[test]
    fn run_all_respects_rubric_enable_list() {
        let content = base_content();
        let rubric = Rubric { enabled_attribute_ids: vec!["author_brand_identity_verified".to_string()] };
        let results = run_all(&content, &rubric, Utc::now(), None);
        assert!(results.iter().all(|a| a.attribute_id == "author_brand_identity_verified"));
    }
}
