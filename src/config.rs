//! Environment configuration and per-run configuration.
//!
//! [`AppEnv`] is read once at process startup (`AppEnv::from_env`). Per-run
//! options (the `config` map of spec.md §6) are parsed into [`RunConfig`] at
//! the orchestrator boundary so the rest of the crate never touches a loose
//! JSON map.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Process-wide configuration sourced from environment variables.
///
/// Mirrors spec.md §6's env var table. Loaded once in `main.rs` via
/// [`AppEnv::from_env`] after `dotenvy::dotenv().ok()`.
#[derive(Debug, Clone)]
pub struct AppEnv {
    pub database_url: String,
    pub brave_api_key: Option<String>,
    pub brave_api_auth: BraveAuthMode,
    pub brave_api_max_count: u32,
    pub brave_api_timeout: Duration,
    pub brave_allow_html_fallback: bool,
    pub brave_request_interval: Duration,
    pub serper_api_key: Option<String>,
    pub serper_api_timeout: Duration,
    pub serper_request_interval: Duration,
    pub serper_max_per_request: u32,
    pub user_agent: String,
    pub use_browser: bool,
    pub fetch_debug_dir: Option<String>,
    pub parallel_fetch_workers: usize,
}

/// How the Brave API key is presented on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BraveAuthMode {
    XApiKey,
    Bearer,
    SubscriptionToken,
    QueryParam,
    Both,
}

impl BraveAuthMode {
    fn from_env_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "bearer" => Self::Bearer,
            "subscription-token" | "subscription_token" => Self::SubscriptionToken,
            "query-param" | "query_param" => Self::QueryParam,
            "both" => Self::Both,
            _ => Self::XApiKey,
        }
    }
}

fn env_duration_secs(key: &str, default_secs: u64) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}

fn env_duration_f64_secs(key: &str, default_secs: f64) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .map(Duration::from_secs_f64)
        .unwrap_or_else(|| Duration::from_secs_f64(default_secs))
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

impl AppEnv {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://./truststack.db".to_string()),
            brave_api_key: std::env::var("BRAVE_API_KEY").ok(),
            brave_api_auth: std::env::var("BRAVE_API_AUTH")
                .map(|v| BraveAuthMode::from_env_str(&v))
                .unwrap_or(BraveAuthMode::XApiKey),
            brave_api_max_count: env_u32("BRAVE_API_MAX_COUNT", 20),
            brave_api_timeout: env_duration_secs("BRAVE_API_TIMEOUT", 10),
            brave_allow_html_fallback: env_bool("BRAVE_ALLOW_HTML_FALLBACK", false),
            brave_request_interval: env_duration_f64_secs("BRAVE_REQUEST_INTERVAL", 1.0),
            serper_api_key: std::env::var("SERPER_API_KEY").ok(),
            serper_api_timeout: env_duration_secs("SERPER_API_TIMEOUT", 30),
            serper_request_interval: env_duration_f64_secs("SERPER_REQUEST_INTERVAL", 1.0),
            serper_max_per_request: env_u32("SERPER_MAX_PER_REQUEST", 10),
            user_agent: std::env::var("AR_USER_AGENT").unwrap_or_else(|_| {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
                 Chrome/124.0.0.0 Safari/537.36"
                    .to_string()
            }),
            use_browser: env_bool("AR_USE_PLAYWRIGHT", true),
            fetch_debug_dir: std::env::var("AR_FETCH_DEBUG_DIR").ok(),
            parallel_fetch_workers: env_u32("AR_PARALLEL_FETCH_WORKERS", 5) as usize,
        }
    }
}

/// Classifier configuration: which domains/subdomains/handles are brand-owned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub brand_domains: Vec<String>,
    #[serde(default)]
    pub brand_subdomains: Vec<String>,
    #[serde(default)]
    pub brand_social_handles: Vec<String>,
}

/// Ratio & diversity knobs for the URL collector (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlCollectionConfig {
    #[serde(default = "default_brand_ratio")]
    pub brand_owned_ratio: f64,
    #[serde(default = "default_third_party_ratio")]
    pub third_party_ratio: f64,
}

fn default_brand_ratio() -> f64 {
    0.5
}
fn default_third_party_ratio() -> f64 {
    0.5
}

impl Default for UrlCollectionConfig {
    fn default() -> Self {
        Self {
            brand_owned_ratio: default_brand_ratio(),
            third_party_ratio: default_third_party_ratio(),
        }
    }
}

/// Which search backend a `web` source resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    Brave,
    Serper,
}

/// One configured content source for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Web,
    Brave,
    Serper,
    Reddit,
    Youtube,
}

/// Parsed, typed form of the `config` map accepted by `run_analysis` (spec.md §6).
///
/// Built once from the caller-supplied JSON map at the orchestrator boundary;
/// nothing downstream touches `serde_json::Value` directly.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub brand_name: Option<String>,
    pub scenario_name: Option<String>,
    pub scenario_description: Option<String>,
    pub sources: Vec<SourceKind>,
    pub keywords: Vec<String>,
    pub limit: u32,
    pub reuse_data: bool,
    pub max_asset_age_hours: i64,
    pub search_provider: SearchProviderKind,
    pub classifier: ClassifierConfig,
    pub url_collection: UrlCollectionConfig,
    pub visual_analysis_enabled: bool,
    pub export_to_s3: bool,
    pub s3_bucket: Option<String>,
    pub headless_mode: bool,
    pub raw: serde_json::Value,
}

impl RunConfig {
    /// Parse the caller-supplied JSON config map, applying spec.md §6 defaults.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let obj = value.as_object().cloned().unwrap_or_default();
        let get_str = |k: &str| obj.get(k).and_then(|v| v.as_str()).map(str::to_string);
        let scenario_config = obj.get("scenario_config").cloned().unwrap_or_default();

        let sources = obj
            .get("sources")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .filter_map(|s| match s {
                        "web" => Some(SourceKind::Web),
                        "brave" => Some(SourceKind::Brave),
                        "serper" => Some(SourceKind::Serper),
                        "reddit" => Some(SourceKind::Reddit),
                        "youtube" => Some(SourceKind::Youtube),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_else(|| vec![SourceKind::Web]);

        let keywords = obj
            .get("keywords")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let search_provider = scenario_config
            .get("search_provider")
            .and_then(|v| v.as_str())
            .map(|s| if s.eq_ignore_ascii_case("serper") {
                SearchProviderKind::Serper
            } else {
                SearchProviderKind::Brave
            })
            .unwrap_or(SearchProviderKind::Brave);

        let classifier: ClassifierConfig = serde_json::from_value(serde_json::json!({
            "brand_domains": scenario_config.get("brand_domains").cloned().unwrap_or_default(),
            "brand_subdomains": scenario_config.get("brand_subdomains").cloned().unwrap_or_default(),
            "brand_social_handles": scenario_config.get("brand_social_handles").cloned().unwrap_or_default(),
        }))
        .map_err(Error::Serde)?;

        let url_collection = scenario_config
            .get("url_collection_config")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        Ok(Self {
            brand_name: get_str("brand_name"),
            scenario_name: get_str("scenario_name"),
            scenario_description: get_str("scenario_description"),
            sources,
            keywords,
            limit: obj.get("limit").and_then(|v| v.as_u64()).unwrap_or(10) as u32,
            reuse_data: obj.get("reuse_data").and_then(|v| v.as_bool()).unwrap_or(true),
            max_asset_age_hours: obj
                .get("max_asset_age_hours")
                .and_then(|v| v.as_i64())
                .unwrap_or(24),
            search_provider,
            classifier,
            url_collection,
            visual_analysis_enabled: obj
                .get("visual_analysis_enabled")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            export_to_s3: obj.get("export_to_s3").and_then(|v| v.as_bool()).unwrap_or(false),
            s3_bucket: get_str("s3_bucket"),
            headless_mode: obj.get("headless_mode").and_then(|v| v.as_bool()).unwrap_or(true),
            raw: serde_json::Value::Object(obj),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = RunConfig::from_value(serde_json::json!({})).unwrap();
        assert_eq!(cfg.limit, 10);
        assert!(cfg.reuse_data);
        assert_eq!(cfg.max_asset_age_hours, 24);
        assert_eq!(cfg.sources, vec![SourceKind::Web]);
        assert_eq!(cfg.search_provider, SearchProviderKind::Brave);
    }

    #[test]
    fn parses_scenario_config() {
        let cfg = RunConfig::from_value(serde_json::json!({
            "keywords": ["nike running"],
            "limit": 25,
            "scenario_config": {
                "search_provider": "serper",
                "brand_domains": ["nike.com"],
            }
        }))
        .unwrap();
        assert_eq!(cfg.limit, 25);
        assert_eq!(cfg.search_provider, SearchProviderKind::Serper);
        assert_eq!(cfg.classifier.brand_domains, vec!["nike.com".to_string()]);
        assert_eq!(cfg.keywords, vec!["nike running".to_string()]);
    }
}
