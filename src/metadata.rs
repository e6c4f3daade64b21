//! Metadata extractor (C8, spec.md §4.8).
//!
//! Enriches a partially-built page record with modality, channel/platform
//! classification, structured-data (JSON-LD/microdata/RDFa), canonical URL,
//! Open Graph/meta tags, provenance-manifest indicators, and a
//! significant-visuals flag.
//!
//! Grounded in `original_source/ingestion/metadata_extractor.py`'s
//! `MetadataExtractor` (channel pattern table, modality detection order).

use scraper::{Html, Selector};
use serde_json::{json, Value as Json};

use crate::models::Modality;

/// Host → {channel, platform_type, modality} entry (spec.md §4.8).
struct ChannelEntry {
    domains: &'static [&'static str],
    channel: &'static str,
    platform_type: &'static str,
    modality: Modality,
}

const CHANNEL_TABLE: &[ChannelEntry] = &[
    ChannelEntry { domains: &["youtube.com", "youtu.be"], channel: "youtube", platform_type: "social", modality: Modality::Video },
    ChannelEntry { domains: &["reddit.com"], channel: "reddit", platform_type: "social", modality: Modality::Text },
    ChannelEntry { domains: &["instagram.com"], channel: "instagram", platform_type: "social", modality: Modality::Image },
    ChannelEntry { domains: &["tiktok.com"], channel: "tiktok", platform_type: "social", modality: Modality::Video },
    ChannelEntry { domains: &["facebook.com", "fb.com"], channel: "facebook", platform_type: "social", modality: Modality::Text },
    ChannelEntry { domains: &["twitter.com", "x.com"], channel: "twitter", platform_type: "social", modality: Modality::Text },
    ChannelEntry { domains: &["amazon.com", "amazon.co.uk", "amazon.de"], channel: "amazon", platform_type: "marketplace", modality: Modality::Text },
    ChannelEntry { domains: &["etsy.com"], channel: "etsy", platform_type: "marketplace", modality: Modality::Image },
    ChannelEntry { domains: &["ebay.com"], channel: "ebay", platform_type: "marketplace", modality: Modality::Text },
];

const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".webm", ".mov", ".avi", ".mkv", "youtube.com", "youtu.be", "vimeo.com"];
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg"];
const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".ogg", ".m4a", "spotify.com", "soundcloud.com"];

const SIGNIFICANT_CLASSES: &[&str] = &["hero", "banner", "featured", "cover", "main-image", "post-image"];
const EXCLUDED_CLASSES: &[&str] = &["logo", "icon", "avatar", "footer", "nav", "social"];

/// Channel/platform/modality classification for one URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub channel: String,
    pub platform_type: String,
    pub modality: Modality,
}

pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Channel/platform-type lookup from a host table, falling back to the
    /// bare host label (spec.md §4.8).
    pub fn extract_channel_info(&self, url: &str) -> ChannelInfo {
        let Ok(parsed) = url::Url::parse(url) else {
            return ChannelInfo { channel: "unknown".into(), platform_type: "unknown".into(), modality: Modality::Text };
        };
        let host = parsed.host_str().unwrap_or("").trim_start_matches("www.");

        for entry in CHANNEL_TABLE {
            if entry.domains.iter().any(|d| host == *d || host.ends_with(&format!(".{d}"))) {
                return ChannelInfo {
                    channel: entry.channel.to_string(),
                    platform_type: entry.platform_type.to_string(),
                    modality: entry.modality,
                };
            }
        }

        ChannelInfo {
            channel: host.to_string(),
            platform_type: "web".to_string(),
            modality: Modality::Text,
        }
    }

    /// Modality detection: source-specific defaults, URL extension hints,
    /// then `og:type`, defaulting to text.
    pub fn detect_modality(&self, url: &str, html: &str, channel: &str) -> Modality {
        match channel {
            "youtube" => return Modality::Video,
            "amazon" => return Modality::Text,
            "reddit" => {
                let lower = url.to_ascii_lowercase();
                if IMAGE_EXTENSIONS.iter().any(|e| lower.contains(e)) {
                    return Modality::Image;
                }
                if VIDEO_EXTENSIONS.iter().any(|e| lower.contains(e)) {
                    return Modality::Video;
                }
                return Modality::Text;
            }
            _ => {}
        }

        let lower = url.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.iter().any(|e| lower.contains(e)) {
            return Modality::Video;
        }
        if IMAGE_EXTENSIONS.iter().any(|e| lower.contains(e)) {
            return Modality::Image;
        }
        if AUDIO_EXTENSIONS.iter().any(|e| lower.contains(e)) {
            return Modality::Audio;
        }

        if let Some(og_type) = self.meta_property(html, "og:type") {
            let lower = og_type.to_ascii_lowercase();
            if lower.contains("video") {
                return Modality::Video;
            }
            if lower.contains("audio") {
                return Modality::Audio;
            }
            if lower.contains("image") {
                return Modality::Image;
            }
        }

        Modality::Text
    }

    /// Every `application/ld+json` script body, parsed where possible.
    pub fn extract_json_ld(&self, html: &str) -> Vec<Json> {
        let document = Html::parse_document(html);
        let Ok(sel) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
            return Vec::new();
        };
        document
            .select(&sel)
            .filter_map(|el| {
                let text: String = el.text().collect();
                serde_json::from_str(&text).ok()
            })
            .collect()
    }

    pub fn has_microdata(&self, html: &str) -> bool {
        self.has_attr(html, "itemtype")
    }

    pub fn has_rdfa(&self, html: &str) -> bool {
        self.has_attr(html, "typeof")
    }

    fn has_attr(&self, html: &str, attr: &str) -> bool {
        let document = Html::parse_document(html);
        let Ok(sel) = Selector::parse(&format!("[{attr}]")) else {
            return false;
        };
        document.select(&sel).next().is_some()
    }

    pub fn canonical_url(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let sel = Selector::parse(r#"link[rel="canonical"]"#).ok()?;
        document.select(&sel).next()?.value().attr("href").map(str::to_string)
    }

    pub fn meta_property(&self, html: &str, property: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let sel = Selector::parse(&format!(r#"meta[property="{property}"]"#)).ok()?;
        document.select(&sel).next()?.value().attr("content").map(str::to_string)
    }

    pub fn meta_name(&self, html: &str, name: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let sel = Selector::parse(&format!(r#"meta[name="{name}"]"#)).ok()?;
        document.select(&sel).next()?.value().attr("content").map(str::to_string)
    }

    /// Standard `description`, `keywords`, `author`, `robots` meta plus Open
    /// Graph fields, as a flat JSON object (spec.md §4.8).
    pub fn extract_meta(&self, html: &str) -> Json {
        json!({
            "description": self.meta_name(html, "description"),
            "keywords": self.meta_name(html, "keywords"),
            "author": self.meta_name(html, "author"),
            "robots": self.meta_name(html, "robots"),
            "og_title": self.meta_property(html, "og:title"),
            "og_description": self.meta_property(html, "og:description"),
            "og_image": self.meta_property(html, "og:image"),
            "og_type": self.meta_property(html, "og:type"),
        })
    }

    /// Whether any C2PA/CAI provenance-manifest indicator is present.
    pub fn has_provenance_manifest(&self, html: &str) -> bool {
        let document = Html::parse_document(html);
        let selectors = [
            r#"link[rel="c2pa-manifest"]"#,
            r#"link[rel="cai-manifest"]"#,
            r#"meta[name="c2pa-manifest"]"#,
            r#"script[type="application/c2pa-manifest+json"]"#,
        ];
        selectors.iter().any(|raw| {
            Selector::parse(raw)
                .map(|sel| document.select(&sel).next().is_some())
                .unwrap_or(false)
        })
    }

    /// True when an image exceeds 250px in either dimension, a
    /// hero/banner/featured-class image or container is present (and not
    /// excluded by a logo/icon/avatar/footer/nav/social class), or a video /
    /// embedded YouTube/Vimeo iframe is present.
    pub fn has_significant_visuals(&self, html: &str) -> bool {
        let document = Html::parse_document(html);

        if let Ok(sel) = Selector::parse("video") {
            if document.select(&sel).next().is_some() {
                return true;
            }
        }
        if let Ok(sel) = Selector::parse("iframe") {
            for el in document.select(&sel) {
                if let Some(src) = el.value().attr("src") {
                    if src.contains("youtube.com") || src.contains("youtube-nocookie.com") || src.contains("vimeo.com") {
                        return true;
                    }
                }
            }
        }
        if let Ok(sel) = Selector::parse("img") {
            for el in document.select(&sel) {
                let width: Option<u32> = el.value().attr("width").and_then(|v| v.parse().ok());
                let height: Option<u32> = el.value().attr("height").and_then(|v| v.parse().ok());
                if width.unwrap_or(0) > 250 || height.unwrap_or(0) > 250 {
                    return true;
                }
                let class = el.value().attr("class").unwrap_or("").to_ascii_lowercase();
                if Self::class_matches_significant(&class) {
                    return true;
                }
            }
        }
        if let Ok(sel) = Selector::parse("[class]") {
            for el in document.select(&sel) {
                let class = el.value().attr("class").unwrap_or("").to_ascii_lowercase();
                if Self::class_matches_significant(&class) {
                    return true;
                }
            }
        }

        false
    }

    fn class_matches_significant(class: &str) -> bool {
        if EXCLUDED_CLASSES.iter().any(|c| class.contains(c)) {
            return false;
        }
        SIGNIFICANT_CLASSES.iter().any(|c| class.contains(c))
    }

    /// Full per-page metadata blob handed to the detector registry (spec.md
    /// §4.8/§4.9): standard meta/OG tags plus canonical URL, the
    /// provenance-manifest and significant-visuals flags, and parsed JSON-LD.
    /// Grounded in `original_source/ingestion/metadata_extractor.py`'s
    /// `enrich_content_metadata`.
    pub fn extract_all(&self, html: &str) -> Json {
        let mut meta = self.extract_meta(html);
        if let Json::Object(map) = &mut meta {
            if let Some(canonical) = self.canonical_url(html) {
                map.insert("canonical_url".to_string(), Json::String(canonical));
            }
            map.insert("has_provenance_manifest".to_string(), Json::Bool(self.has_provenance_manifest(html)));
            map.insert("has_significant_visuals".to_string(), Json::Bool(self.has_significant_visuals(html)));
            map.insert("json_ld".to_string(), Json::Array(self.extract_json_ld(html)));
        }
        meta
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_info_matches_known_social_host() {
        let extractor = MetadataExtractor::new();
        let info = extractor.extract_channel_info("https://www.instagram.com/nike");
        assert_eq!(info.channel, "instagram");
        assert_eq!(info.platform_type, "social");
        assert_eq!(info.modality, Modality::Image);
    }

    #[test]
    fn channel_info_falls_back_to_host_label() {
        let extractor = MetadataExtractor::new();
        let info = extractor.extract_channel_info("https://blog.example.com/post");
        assert_eq!(info.channel, "blog.example.com");
        assert_eq!(info.platform_type, "web");
    }

    #[test]
    fn modality_detects_video_extension() {
        let extractor = MetadataExtractor::new();
        let m = extractor.detect_modality("https://cdn.example.com/clip.mp4", "", "web");
        assert_eq!(m, Modality::Video);
    }

    #[test]
    fn modality_falls_back_to_og_type() {
        let extractor = MetadataExtractor::new();
        let html = r#"<html><head><meta property="og:type" content="video.other"></head></html>"#;
        let m = extractor.detect_modality("https://example.com/page", html, "web");
        assert_eq!(m, Modality::Video);
    }

    #[test]
    fn json_ld_scripts_are_parsed() {
        let extractor = MetadataExtractor::new();
        let html = r#"<html><head><script type="application/ld+json">{"@type":"Article"}</script></head></html>"#;
        let blobs = extractor.extract_json_ld(html);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0]["@type"], "Article");
    }

    #[test]
    fn provenance_manifest_detected_from_meta_tag() {
        let extractor = MetadataExtractor::new();
        let html = r#"<html><head><meta name="c2pa-manifest" content="..."></head></html>"#;
        assert!(extractor.has_provenance_manifest(html));
    }

    #[test]
    fn significant_visuals_excludes_logo_class() {
        let extractor = MetadataExtractor::new();
        let html = r#"<html><body><img class="hero-logo" width="300" height="300"></body></html>"#;
        // width/height alone still trigger via the size check
        assert!(extractor.has_significant_visuals(html));
        let html_no_size = r#"<html><body><div class="site-logo"></div></body></html>"#;
        assert!(!extractor.has_significant_visuals(html_no_size));
    }

    #[test]
    fn embedded_youtube_iframe_is_significant() {
        let extractor = MetadataExtractor::new();
        let html = r#"<html><body><iframe src="https://www.youtube.com/embed/xyz"></iframe></body></html>"#;
        assert!(extractor.has_significant_visuals(html));
    }

    #[test]
    fn extract_all_merges_canonical_manifest_visuals_and_json_ld() {
        let extractor = MetadataExtractor::new();
        let html = r#"<html><head>
            <link rel="canonical" href="https://example.com/canonical">
            <meta name="c2pa-manifest" content="...">
            <meta name="author" content="Jane Doe">
            <script type="application/ld+json">{"@type":"Person"}</script>
        </head><body><video src="clip.mp4"></video></body></html>"#;

        let meta = extractor.extract_all(html);
        assert_eq!(meta["canonical_url"], "https://example.com/canonical");
        assert_eq!(meta["has_provenance_manifest"], true);
        assert_eq!(meta["has_significant_visuals"], true);
        assert_eq!(meta["author"], "Jane Doe");
        assert_eq!(meta["json_ld"][0]["@type"], "Person");
    }
}
