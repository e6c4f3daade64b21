//! Domain classifier (C3, spec.md §4.3).
//!
//! Pure function over a URL and [`ClassifierConfig`]; no network, no state.
//! Decides whether a URL is brand-owned, third-party, or unknown, and assigns
//! a coarse [`Tier`] used by the collector (C7) for diversity bookkeeping and
//! by the aggregator (C10) as detector context.

use url::Url;

use crate::config::ClassifierConfig;
use crate::models::{SourceType, Tier};

/// Hosts treated as social platforms for handle matching.
const SOCIAL_HOSTS: &[&str] = &[
    "instagram.com",
    "facebook.com",
    "twitter.com",
    "x.com",
    "tiktok.com",
    "youtube.com",
    "linkedin.com",
    "pinterest.com",
    "threads.net",
];

const NEWS_HOSTS: &[&str] = &[
    "nytimes.com",
    "reuters.com",
    "bloomberg.com",
    "wsj.com",
    "forbes.com",
    "bbc.com",
    "cnn.com",
    "businessinsider.com",
    "techcrunch.com",
];

const UGC_HOSTS: &[&str] = &["reddit.com", "quora.com", "yelp.com", "tripadvisor.com"];

const MARKETPLACE_HOSTS: &[&str] = &["amazon.com", "ebay.com", "etsy.com", "walmart.com"];

/// Output of classifying one URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub source_type: SourceType,
    pub tier: Tier,
    pub reason: String,
}

pub struct DomainClassifier {
    config: ClassifierConfig,
}

impl DomainClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify `url` into a source type, tier, and human-readable reason.
    pub fn classify(&self, url: &str) -> Classification {
        let Ok(parsed) = Url::parse(url) else {
            return Classification {
                source_type: SourceType::Unknown,
                tier: Tier::UserGenerated,
                reason: "unparsable url".to_string(),
            };
        };
        let Some(host) = parsed.host_str() else {
            return Classification {
                source_type: SourceType::Unknown,
                tier: Tier::UserGenerated,
                reason: "url has no host".to_string(),
            };
        };
        let registrable = Self::strip_www(host);

        if let Some(matched) = self
            .config
            .brand_domains
            .iter()
            .find(|d| Self::strip_www(d) == registrable)
        {
            return Classification {
                source_type: SourceType::BrandOwned,
                tier: Tier::PrimaryWebsite,
                reason: format!("host matches configured brand domain {matched}"),
            };
        }

        if let Some(matched) = self
            .config
            .brand_subdomains
            .iter()
            .find(|sub| registrable.ends_with(sub.as_str()))
        {
            return Classification {
                source_type: SourceType::BrandOwned,
                tier: Tier::ContentHub,
                reason: format!("host matches configured brand subdomain {matched}"),
            };
        }

        if SOCIAL_HOSTS.iter().any(|h| registrable.ends_with(h)) {
            if self.matches_brand_handle(&parsed) {
                return Classification {
                    source_type: SourceType::BrandOwned,
                    tier: Tier::BrandSocial,
                    reason: "social handle matches configured brand social handle".to_string(),
                };
            }
            return Classification {
                source_type: SourceType::ThirdParty,
                tier: Tier::BrandSocial,
                reason: "known social host, handle not configured as brand-owned".to_string(),
            };
        }

        if NEWS_HOSTS.iter().any(|h| registrable.ends_with(h)) {
            return Classification {
                source_type: SourceType::ThirdParty,
                tier: Tier::NewsMedia,
                reason: "known news/media host".to_string(),
            };
        }

        if UGC_HOSTS.iter().any(|h| registrable.ends_with(h)) {
            return Classification {
                source_type: SourceType::ThirdParty,
                tier: Tier::UserGenerated,
                reason: "known user-generated-content host".to_string(),
            };
        }

        if MARKETPLACE_HOSTS.iter().any(|h| registrable.ends_with(h)) {
            return Classification {
                source_type: SourceType::ThirdParty,
                tier: Tier::Marketplace,
                reason: "known marketplace host".to_string(),
            };
        }

        Classification {
            source_type: SourceType::ThirdParty,
            tier: Tier::ExpertProfessional,
            reason: "unrecognised host, defaulting to third-party".to_string(),
        }
    }

    /// Whether the collector should treat this brand as "brand-controlled"
    /// (spec.md §4.3): relaxes domain-diversity caps when the configured
    /// ratio heavily favors brand-owned sources.
    pub fn is_brand_controlled(brand_owned_ratio: f64) -> bool {
        brand_owned_ratio >= 0.8
    }

    fn strip_www(host: &str) -> String {
        host.strip_prefix("www.").unwrap_or(host).to_string()
    }

    fn matches_brand_handle(&self, url: &Url) -> bool {
        let path = url.path().trim_matches('/').to_ascii_lowercase();
        self.config
            .brand_social_handles
            .iter()
            .any(|handle| {
                let normalized = handle.trim_start_matches('@').to_ascii_lowercase();
                path == normalized || path.starts_with(&format!("{normalized}/"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClassifierConfig {
        ClassifierConfig {
            brand_domains: vec!["nike.com".to_string()],
            brand_subdomains: vec!["shop.nike.com".to_string()],
            brand_social_handles: vec!["nike".to_string()],
        }
    }

    #[test]
    fn exact_brand_domain_is_brand_owned_primary() {
        let classifier = DomainClassifier::new(config());
        let result = classifier.classify("https://www.nike.com/running");
        assert_eq!(result.source_type, SourceType::BrandOwned);
        assert_eq!(result.tier, Tier::PrimaryWebsite);
    }

    #[test]
    fn brand_subdomain_is_content_hub() {
        let classifier = DomainClassifier::new(config());
        let result = classifier.classify("https://shop.nike.com/air-max");
        assert_eq!(result.source_type, SourceType::BrandOwned);
        assert_eq!(result.tier, Tier::ContentHub);
    }

    #[test]
    fn matching_social_handle_is_brand_social() {
        let classifier = DomainClassifier::new(config());
        let result = classifier.classify("https://instagram.com/nike");
        assert_eq!(result.source_type, SourceType::BrandOwned);
        assert_eq!(result.tier, Tier::BrandSocial);
    }

    #[test]
    fn unmatched_social_handle_is_third_party() {
        let classifier = DomainClassifier::new(config());
        let result = classifier.classify("https://instagram.com/someoneelse");
        assert_eq!(result.source_type, SourceType::ThirdParty);
        assert_eq!(result.tier, Tier::BrandSocial);
    }

    #[test]
    fn news_host_is_third_party_news_media() {
        let classifier = DomainClassifier::new(config());
        let result = classifier.classify("https://www.reuters.com/business/nike");
        assert_eq!(result.source_type, SourceType::ThirdParty);
        assert_eq!(result.tier, Tier::NewsMedia);
    }

    #[test]
    fn unrecognised_host_defaults_third_party() {
        let classifier = DomainClassifier::new(config());
        let result = classifier.classify("https://some-random-blog.example/post");
        assert_eq!(result.source_type, SourceType::ThirdParty);
    }

    #[test]
    fn unparsable_url_is_unknown() {
        let classifier = DomainClassifier::new(config());
        let result = classifier.classify("not a url");
        assert_eq!(result.source_type, SourceType::Unknown);
    }

    #[test]
    fn brand_controlled_threshold_matches_spec() {
        assert!(DomainClassifier::is_brand_controlled(0.8));
        assert!(DomainClassifier::is_brand_controlled(0.95));
        assert!(!DomainClassifier::is_brand_controlled(0.79));
    }
}
