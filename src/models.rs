//! Core data model (spec.md §3).
//!
//! Persisted entities (`Brand`, `Scenario`, `Run`, `ContentAsset`,
//! `DimensionScores`, `TrustStackSummary`) map 1:1 to tables in [`crate::store`].
//! Transient records (`DetectedAttribute`, `SignalScore`, `NormalizedContent`)
//! never reach the database; they live only within a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Run lifecycle status. Invariant: `finished_at.is_some() == matches!(status, Completed | Failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub industry: Option<String>,
    pub primary_domains: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub config: Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    pub external_id: String,
    pub brand_id: i64,
    pub scenario_id: i64,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config: Json,
    pub error_message: Option<String>,
}

impl Run {
    /// `{slug}_{YYYYMMDD_HHMMSS}_{6 hex chars}` — spec.md §4.12 step 1.
    pub fn new_external_id(slug: &str, now: DateTime<Utc>, suffix: &str) -> String {
        format!("{}_{}_{}", slug, now.format("%Y%m%d_%H%M%S"), suffix)
    }
}

/// Medium class of a [`ContentAsset`] (spec.md glossary: Modality).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Video,
    Audio,
}

/// Brand-owned vs. third-party classification axis (spec.md glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    BrandOwned,
    ThirdParty,
    Unknown,
}

/// Fine-grained classification within [`SourceType`] (spec.md glossary: Tier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    PrimaryWebsite,
    ContentHub,
    DirectToConsumer,
    BrandSocial,
    NewsMedia,
    UserGenerated,
    ExpertProfessional,
    Marketplace,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryWebsite => "primary_website",
            Self::ContentHub => "content_hub",
            Self::DirectToConsumer => "direct_to_consumer",
            Self::BrandSocial => "brand_social",
            Self::NewsMedia => "news_media",
            Self::UserGenerated => "user_generated",
            Self::ExpertProfessional => "expert_professional",
            Self::Marketplace => "marketplace",
        }
    }
}

/// `source_type` enum on [`ContentAsset`] (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetSourceType {
    Web,
    Reddit,
    Youtube,
    Brave,
    Serper,
    Social,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentAsset {
    pub id: i64,
    pub run_id: i64,
    pub source_type: AssetSourceType,
    pub channel: Option<String>,
    pub url: Option<String>,
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub raw_content: Option<String>,
    pub normalized_content: Option<String>,
    pub modality: Modality,
    pub language: Option<String>,
    pub screenshot_path: Option<String>,
    pub visual_analysis: Option<Json>,
    /// Free-form metadata. `metadata()` is the alias resolving open question 3
    /// of spec.md §9 (both `meta_info` and `metadata` read paths existed in
    /// the original; this crate converges on one field).
    pub meta_info: Json,
    pub created_at: DateTime<Utc>,
}

impl ContentAsset {
    /// Alias for `meta_info`, kept for callers that historically read `.metadata`.
    pub fn metadata(&self) -> &Json {
        &self.meta_info
    }

    pub fn access_denied(&self) -> bool {
        self.meta_info
            .get("access_denied")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// The five Trust Stack dimensions (spec.md glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Provenance,
    Verification,
    Transparency,
    Coherence,
    Resonance,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Provenance,
        Dimension::Verification,
        Dimension::Transparency,
        Dimension::Coherence,
        Dimension::Resonance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provenance => "provenance",
            Self::Verification => "verification",
            Self::Transparency => "transparency",
            Self::Coherence => "coherence",
            Self::Resonance => "resonance",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionScores {
    pub id: i64,
    pub asset_id: i64,
    pub provenance: f64,
    pub verification: f64,
    pub transparency: f64,
    pub coherence: f64,
    pub resonance: f64,
    pub overall_score: f64,
    pub classification: String,
    pub rationale: Json,
    pub flags: Json,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrustStackSummary {
    pub id: i64,
    pub run_id: i64,
    pub avg_provenance: Option<f64>,
    pub avg_verification: Option<f64>,
    pub avg_transparency: Option<f64>,
    pub avg_coherence: Option<f64>,
    pub avg_resonance: Option<f64>,
    /// Legacy aggregate (spec §9 open question 4): optional, derived from the
    /// 75/40 thresholds in `AuthenticityRatio.from_ratings`.
    pub authenticity_ratio: Option<f64>,
    pub overall_trust_stack_score: Option<f64>,
    pub insights: Json,
}

/// Detection status for a [`DetectedAttribute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeStatus {
    Present,
    Absent,
    Partial,
    Unknown,
}

/// Why a detector returned `Unknown`/`Absent` when evidence was inconclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentReason {
    NotInDom,
    Unreadable,
    Blocked,
    ClientRendered,
}

/// Transient detector output (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedAttribute {
    pub attribute_id: String,
    pub dimension: Dimension,
    pub label: String,
    pub value: f64,
    pub evidence: String,
    pub confidence: f64,
    pub suggestion: Option<String>,
    pub source_url: String,
    pub status: AttributeStatus,
    pub reason: Option<AbsentReason>,
}

/// Transient aggregation input (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalScore {
    pub id: String,
    pub label: String,
    pub dimension: Dimension,
    pub value: f64,
    pub weight: f64,
    pub evidence: Vec<String>,
    pub rationale: String,
    pub confidence: f64,
}

/// One `{text, element_type, semantic_role}` segment of structured body text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodySegment {
    pub text: String,
    pub element_type: String,
    pub semantic_role: SemanticRole,
}

/// Spec.md glossary: Semantic role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticRole {
    Headline,
    Subheadline,
    BodyText,
    ListItem,
    ProductListing,
    Hero,
    Banner,
    Tagline,
    FooterText,
}

/// Verification badge evidence extracted per social host (spec.md §4.5 step 9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationBadge {
    pub verified: bool,
    pub platform: Option<String>,
    pub evidence: Option<String>,
}

/// The fetch-and-extract product handed to the detector (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedContent {
    pub content_id: String,
    pub source: AssetSourceType,
    pub platform_id: Option<String>,
    pub author: Option<String>,
    pub title: String,
    pub body: String,
    pub structured_body: Option<Vec<BodySegment>>,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub modality: Modality,
    pub channel: String,
    pub platform_type: String,
    pub source_type: SourceType,
    pub tier: Option<Tier>,
    pub language: String,
    pub screenshot_path: Option<String>,
    pub metadata: Json,
    pub visual_analysis: Option<Json>,
}

impl NormalizedContent {
    pub fn has_significant_visuals(&self) -> bool {
        self.metadata
            .get("has_significant_visuals")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn verification_badge(&self) -> Option<VerificationBadge> {
        self.metadata
            .get("verification_badge")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
