//! Page fetcher (C5, spec.md §4.5).
//!
//! Hybrid HTTP + browser fetch with per-domain retry/backoff, structured body
//! extraction, footer/legal link extraction, and social-platform verification
//! badge detection. Grounded in `original_source/ingestion/page_fetcher.py`'s
//! `fetch_page` (strategy order, thin-content/403 browser fallback,
//! domain-requires-browser memoisation) translated from requests+BeautifulSoup
//! retry loops to `reqwest` + exponential backoff.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::browser::BrowserController;
use crate::error::Result;
use crate::models::{BodySegment, SemanticRole, VerificationBadge};
use crate::rate_limiter::PerDomainRateLimiter;
use crate::robots::RobotsCache;

const MIN_THIN_CONTENT_LENGTH: usize = 200;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(500);
const EXCLUDED_SUBPAGE_PATTERNS: &[&str] = &["/search", "/login", "/cart", "/checkout", "/signin", "/signup"];

/// Normalised output of one fetch (spec.md §4.5).
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub title: String,
    pub body: String,
    pub raw_content: String,
    pub structured_body: Vec<BodySegment>,
    pub url: String,
    pub privacy_link: Option<String>,
    pub terms_link: Option<String>,
    pub verification_badge: Option<VerificationBadge>,
    pub screenshot: Option<Vec<u8>>,
    pub access_denied: bool,
    pub used_browser: bool,
}

impl FetchedPage {
    pub fn is_thin(&self) -> bool {
        self.body.trim().len() < MIN_THIN_CONTENT_LENGTH
    }
}

/// Hybrid fetch engine shared across collector workers.
pub struct PageFetcher {
    http: reqwest::Client,
    limiter: PerDomainRateLimiter,
    robots: Arc<RobotsCache>,
    browser: Option<Arc<BrowserController>>,
    user_agent: String,
    debug_dir: Option<std::path::PathBuf>,
    /// Hosts for which a prior HTTP attempt returned thin/403 content and the
    /// browser path subsequently succeeded — memoised so future requests
    /// skip straight to the browser (spec.md §4.5 step 5/6).
    domain_requires_browser: DashMap<String, bool>,
}

impl PageFetcher {
    pub fn new(
        http: reqwest::Client,
        limiter: PerDomainRateLimiter,
        robots: Arc<RobotsCache>,
        browser: Option<Arc<BrowserController>>,
        user_agent: impl Into<String>,
        debug_dir: Option<std::path::PathBuf>,
    ) -> Self {
        Self {
            http,
            limiter,
            robots,
            browser,
            user_agent: user_agent.into(),
            debug_dir,
            domain_requires_browser: DashMap::new(),
        }
    }

    fn host_of(url: &str) -> Option<String> {
        Url::parse(url).ok()?.host_str().map(str::to_string)
    }

    /// Fetch and normalise one page (spec.md §4.5 steps 1-9).
    pub async fn fetch(&self, url: &str, prefer_browser: bool) -> Result<FetchedPage> {
        let host = Self::host_of(url);
        let memo_requires_browser = host
            .as_ref()
            .map(|h| self.domain_requires_browser.get(h).map(|v| *v).unwrap_or(false))
            .unwrap_or(false);

        if (prefer_browser || memo_requires_browser) && self.browser.is_some() {
            if self.robots.is_allowed(url, &self.user_agent).await {
                if let Ok(page) = self.fetch_via_browser(url).await {
                    if !page.body.trim().is_empty() && !page.access_denied {
                        return Ok(page);
                    }
                }
            }
        }

        let mut page = self.fetch_via_http(url).await?;

        if page.access_denied && page.raw_content.is_empty() {
            if let Some(ref h) = host {
                if self.browser.is_some() {
                    if let Ok(browser_page) = self.fetch_via_browser(url).await {
                        if !browser_page.body.trim().is_empty() && !browser_page.access_denied {
                            self.domain_requires_browser.insert(h.clone(), true);
                            return Ok(browser_page);
                        }
                    }
                }
            }
            self.maybe_dump_debug(url, &page.raw_content, "access_denied");
            return Ok(page);
        }

        if page.is_thin() && self.browser.is_some() {
            if let Ok(browser_page) = self.fetch_via_browser(url).await {
                if !browser_page.body.trim().is_empty() && browser_page.body.len() > page.body.len() {
                    if let Some(h) = host {
                        self.domain_requires_browser.insert(h, true);
                    }
                    return Ok(browser_page);
                }
            }
            self.maybe_dump_debug(url, &page.raw_content, "thin_content");
        }

        page.structured_body = Self::extract_structured_body(&page.raw_content);
        let (privacy, terms) = Self::extract_footer_links(&page.raw_content, url);
        page.privacy_link = privacy;
        page.terms_link = terms;
        page.verification_badge = Self::extract_verification_badge(&page.raw_content, url);

        Ok(page)
    }

    async fn fetch_via_browser(&self, url: &str) -> Result<FetchedPage> {
        let browser = self.browser.as_ref().expect("checked by caller");
        let result = browser.fetch_page(url, &self.user_agent, false, Some(Duration::from_secs(25))).await?;
        Ok(FetchedPage {
            title: result.title,
            body: result.body,
            raw_content: result.raw_content,
            url: result.url,
            access_denied: result.access_denied,
            screenshot: result.screenshot,
            used_browser: true,
            ..Default::default()
        })
    }

    async fn fetch_via_http(&self, url: &str) -> Result<FetchedPage> {
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            if attempt == 1 {
                self.limiter.wait_for(url).await;
            } else {
                let jitter_ms = rand::thread_rng().gen_range(100..400);
                tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
            }

            let response = self
                .http
                .get(url)
                .header("User-Agent", &self.user_agent)
                .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
                .header("Accept-Language", "en-US,en;q=0.9")
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status == reqwest::StatusCode::FORBIDDEN {
                        return Ok(FetchedPage {
                            url: url.to_string(),
                            access_denied: true,
                            ..Default::default()
                        });
                    }
                    if !status.is_success() {
                        return Ok(FetchedPage { url: url.to_string(), ..Default::default() });
                    }

                    let html = resp.text().await.unwrap_or_default();
                    let title = Self::extract_title(&html);
                    let body = Self::extract_body(&html);
                    return Ok(FetchedPage {
                        title,
                        body,
                        raw_content: html,
                        url: url.to_string(),
                        access_denied: false,
                        used_browser: false,
                        ..Default::default()
                    });
                }
                Err(e) => {
                    warn!(url, attempt, error = %e, "http fetch attempt failed");
                    last_error = Some(e);
                    if attempt < MAX_RETRIES {
                        let backoff = BASE_BACKOFF * 2u32.pow(attempt - 1);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        debug!(url, "all http attempts exhausted, returning empty record");
        let _ = last_error;
        Ok(FetchedPage { url: url.to_string(), access_denied: false, ..Default::default() })
    }

    fn extract_title(html: &str) -> String {
        let document = Html::parse_document(html);
        if let Ok(sel) = Selector::parse("title") {
            if let Some(text) = document.select(&sel).next().map(|el| el.text().collect::<String>()) {
                if !text.trim().is_empty() {
                    return text.trim().to_string();
                }
            }
        }
        for property in ["og:title", "twitter:title"] {
            if let Ok(sel) = Selector::parse(&format!(r#"meta[property="{property}"], meta[name="{property}"]"#)) {
                if let Some(content) = document.select(&sel).next().and_then(|el| el.value().attr("content")) {
                    return content.trim().to_string();
                }
            }
        }
        String::new()
    }

    /// Same strategy ladder as the browser controller (spec.md §4.4/§4.5).
    fn extract_body(html: &str) -> String {
        crate::browser::BrowserController::extract_body(html)
    }

    /// Each accepted element yields `{text, element_type, semantic_role}`
    /// (spec.md §4.5 step 7).
    fn extract_structured_body(html: &str) -> Vec<BodySegment> {
        let document = Html::parse_document(html);
        let mut segments = Vec::new();

        let tag_role = |tag: &str| -> Option<SemanticRole> {
            match tag {
                "h1" | "h2" => Some(SemanticRole::Headline),
                "h3" | "h4" => Some(SemanticRole::Subheadline),
                "li" => Some(SemanticRole::ListItem),
                "p" => Some(SemanticRole::BodyText),
                _ => None,
            }
        };

        if let Ok(sel) = Selector::parse("h1, h2, h3, h4, li, p") {
            for el in document.select(&sel) {
                let text = el.text().collect::<Vec<_>>().join(" ").trim().to_string();
                if text.is_empty() {
                    continue;
                }
                let tag = el.value().name();
                let class = el.value().attr("class").unwrap_or("").to_ascii_lowercase();
                let role = Self::class_hint_role(&class).or_else(|| tag_role(tag)).unwrap_or(SemanticRole::BodyText);
                segments.push(BodySegment { text, element_type: tag.to_string(), semantic_role: role });
            }
        }

        if let Some(product_segments) = Self::extract_product_listings(&document) {
            segments.extend(product_segments);
        }

        segments
    }

    fn class_hint_role(class: &str) -> Option<SemanticRole> {
        if class.contains("hero") {
            Some(SemanticRole::Hero)
        } else if class.contains("banner") {
            Some(SemanticRole::Banner)
        } else if class.contains("tagline") {
            Some(SemanticRole::Tagline)
        } else if class.contains("footer") {
            Some(SemanticRole::FooterText)
        } else {
            None
        }
    }

    /// Product grids with ≥3 cards containing a title and a price/button
    /// become `product_listing` segments (spec.md §4.5 step 7).
    fn extract_product_listings(document: &Html) -> Option<Vec<BodySegment>> {
        let card_sel = Selector::parse("[class*=product]").ok()?;
        let price_sel = Selector::parse("[class*=price], button, [class*=btn]").ok()?;

        let mut listings = Vec::new();
        for card in document.select(&card_sel) {
            let has_title = card.text().collect::<String>().trim().len() > 3;
            let has_price_or_button = card.select(&price_sel).next().is_some();
            if has_title && has_price_or_button {
                let text = card.text().collect::<Vec<_>>().join(" ").trim().to_string();
                if !text.is_empty() {
                    listings.push(BodySegment {
                        text,
                        element_type: "div".to_string(),
                        semantic_role: SemanticRole::ProductListing,
                    });
                }
            }
        }

        if listings.len() >= 3 {
            Some(listings)
        } else {
            None
        }
    }

    /// Scan `<footer>` (falling back to all anchors) for privacy/terms links
    /// (spec.md §4.5 step 8).
    fn extract_footer_links(html: &str, base_url: &str) -> (Option<String>, Option<String>) {
        let document = Html::parse_document(html);
        let base = Url::parse(base_url).ok();

        let anchors: Vec<ElementRef> = if let Ok(footer_sel) = Selector::parse("footer a") {
            let footer_anchors: Vec<_> = document.select(&footer_sel).collect();
            if !footer_anchors.is_empty() {
                footer_anchors
            } else if let Ok(all_sel) = Selector::parse("a") {
                document.select(&all_sel).collect()
            } else {
                Vec::new()
            }
        } else {
            Vec::new()
        };

        let mut privacy = None;
        let mut terms = None;

        for anchor in anchors {
            let href = anchor.value().attr("href").unwrap_or("");
            if href.is_empty() {
                continue;
            }
            let text = anchor.text().collect::<String>().to_ascii_lowercase();
            let haystack = format!("{} {}", href.to_ascii_lowercase(), text);

            let resolved = base
                .as_ref()
                .and_then(|b| b.join(href).ok())
                .map(|u| u.to_string())
                .unwrap_or_else(|| href.to_string());

            if privacy.is_none() && (haystack.contains("privacy") || haystack.contains("cookie")) {
                privacy = Some(resolved.clone());
            }
            if terms.is_none() && (haystack.contains("term") || haystack.contains("conditions")) {
                terms = Some(resolved);
            }
            if privacy.is_some() && terms.is_some() {
                break;
            }
        }

        (privacy, terms)
    }

    /// Verification badge detection per social host (spec.md §4.5 step 9).
    fn extract_verification_badge(html: &str, url: &str) -> Option<VerificationBadge> {
        let host = Url::parse(url).ok()?.host_str()?.to_string();
        let document = Html::parse_document(html);

        if host.contains("instagram.com") {
            return Some(Self::instagram_badge(&document));
        }
        if host.contains("linkedin.com") {
            return Some(Self::linkedin_badge(&document));
        }
        if host.contains("twitter.com") || host.contains("x.com") {
            return Some(Self::twitter_badge(&document));
        }
        Some(Self::generic_badge(&document))
    }

    fn instagram_badge(document: &Html) -> VerificationBadge {
        if let Ok(sel) = Selector::parse(r#"svg[aria-label="Verified"]"#) {
            if document.select(&sel).next().is_some() {
                return VerificationBadge { verified: true, platform: Some("instagram".into()), evidence: Some("aria-label=Verified svg".into()) };
            }
        }
        if let Ok(sel) = Selector::parse("title") {
            for el in document.select(&sel) {
                if el.text().collect::<String>().trim() == "Verified" {
                    return VerificationBadge { verified: true, platform: Some("instagram".into()), evidence: Some("<title>Verified</title>".into()) };
                }
            }
        }
        if let Ok(sel) = Selector::parse(".x1lliihq.x1n2onr6.x1q0g3np") {
            if document.select(&sel).next().is_some() {
                return VerificationBadge { verified: true, platform: Some("instagram".into()), evidence: Some("2024 obfuscated verified class set".into()) };
            }
        }
        VerificationBadge { verified: false, platform: Some("instagram".into()), evidence: None }
    }

    fn linkedin_badge(document: &Html) -> VerificationBadge {
        if let Ok(sel) = Selector::parse(r#"use[href="#verified-medium"]"#) {
            if document.select(&sel).next().is_some() {
                return VerificationBadge { verified: true, platform: Some("linkedin".into()), evidence: Some("use href=#verified-medium".into()) };
            }
        }
        if let Ok(sel) = Selector::parse("svg[aria-label]") {
            for el in document.select(&sel) {
                if el.value().attr("aria-label").unwrap_or("").to_ascii_lowercase().contains("verified") {
                    return VerificationBadge { verified: true, platform: Some("linkedin".into()), evidence: Some("svg aria-label contains verified".into()) };
                }
            }
        }
        VerificationBadge { verified: false, platform: Some("linkedin".into()), evidence: None }
    }

    fn twitter_badge(document: &Html) -> VerificationBadge {
        if let Ok(sel) = Selector::parse(r#"[data-testid="icon-verified"]"#) {
            if document.select(&sel).next().is_some() {
                return VerificationBadge { verified: true, platform: Some("twitter".into()), evidence: Some("data-testid=icon-verified".into()) };
            }
        }
        if let Ok(sel) = Selector::parse(r#"svg[aria-label="Verified account"]"#) {
            if document.select(&sel).next().is_some() {
                return VerificationBadge { verified: true, platform: Some("twitter".into()), evidence: Some("aria-label=Verified account".into()) };
            }
        }
        VerificationBadge { verified: false, platform: Some("twitter".into()), evidence: None }
    }

    fn generic_badge(document: &Html) -> VerificationBadge {
        if let Ok(sel) = Selector::parse("[aria-label*=erified], [title*=erified], [class*=verified-badge]") {
            if document.select(&sel).next().is_some() {
                return VerificationBadge { verified: true, platform: None, evidence: Some("generic verification indicator".into()) };
            }
        }
        VerificationBadge { verified: false, platform: None, evidence: None }
    }

    fn maybe_dump_debug(&self, url: &str, raw: &str, reason: &str) {
        let Some(dir) = &self.debug_dir else { return };
        let sanitized: String = url.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).take(80).collect();
        let path = dir.join(format!("{reason}_{sanitized}.html"));
        if let Err(e) = std::fs::write(&path, raw) {
            debug!(path = %path.display(), error = %e, "failed to write fetch debug dump");
        }
    }

    /// Extract up to 15 same-host internal links, excluding search/login/cart
    /// style paths (spec.md §4.7 brand-owned sub-page expansion).
    pub fn extract_internal_links(html: &str, base_url: &str) -> Vec<String> {
        let Ok(base) = Url::parse(base_url) else { return Vec::new() };
        let Some(base_host) = base.host_str().map(str::to_string) else { return Vec::new() };
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        let Ok(sel) = Selector::parse("a") else { return Vec::new() };
        for el in document.select(&sel) {
            if links.len() >= 15 {
                break;
            }
            let Some(href) = el.value().attr("href") else { continue };
            let Ok(resolved) = base.join(href) else { continue };
            if resolved.host_str() != Some(base_host.as_str()) {
                continue;
            }
            let path = resolved.path().to_ascii_lowercase();
            if EXCLUDED_SUBPAGE_PATTERNS.iter().any(|p| path.starts_with(p)) {
                continue;
            }
            let normalized = resolved.to_string();
            if seen.insert(normalized.clone()) {
                links.push(normalized);
            }
        }

        links
    }

    /// Parallel fetch pool (spec.md §4.5): bounded concurrency, results in
    /// input order regardless of completion order.
    pub async fn fetch_all(self: &Arc<Self>, urls: &[String], max_workers: usize) -> Vec<Result<FetchedPage>> {
        let worker_count = max_workers.clamp(1, 10).min(urls.len().max(1));
        let semaphore = Arc::new(tokio::sync::Semaphore::new(worker_count));

        let mut handles = Vec::with_capacity(urls.len());
        for url in urls {
            let fetcher = Arc::clone(self);
            let permit = Arc::clone(&semaphore);
            let url = url.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await;
                fetcher.fetch(&url, false).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => results.push(Ok(FetchedPage { access_denied: false, body: String::new(), title: String::new(), url: e.to_string(), ..Default::default() })),
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_title_falls_back_to_og_title() {
        let html = r#"<html><head><meta property="og:title" content="From OG"></head></html>"#;
        assert_eq!(PageFetcher::extract_title(html), "From OG");
    }

    #[test]
    fn footer_links_resolve_relative_privacy_and_terms() {
        let html = r#"<html><body><footer><a href="/privacy">Privacy Policy</a><a href="/terms">Terms &amp; Conditions</a></footer></body></html>"#;
        let (privacy, terms) = PageFetcher::extract_footer_links(html, "https://example.com/page");
        assert_eq!(privacy.as_deref(), Some("https://example.com/privacy"));
        assert_eq!(terms.as_deref(), Some("https://example.com/terms"));
    }

    #[test]
    fn internal_links_exclude_cart_and_search() {
        let html = r#"<html><body>
            <a href="/products/1">P1</a>
            <a href="/cart">Cart</a>
            <a href="/search?q=x">Search</a>
            <a href="https://other.com/x">External</a>
        </body></html>"#;
        let links = PageFetcher::extract_internal_links(html, "https://example.com/");
        assert_eq!(links, vec!["https://example.com/products/1".to_string()]);
    }

    #[test]
    fn structured_body_assigns_headline_role() {
        let html = "<html><body><h1>Big Headline</h1><p>Some paragraph text.</p></body></html>";
        let segments = PageFetcher::extract_structured_body(html);
        assert!(segments.iter().any(|s| s.semantic_role == SemanticRole::Headline));
        assert!(segments.iter().any(|s| s.semantic_role == SemanticRole::BodyText));
    }

    #[test]
    fn product_grid_with_three_cards_becomes_listing() {
        let html = r#"<html><body>
            <div class="product-card"><span>Shoe A</span><button>Buy</button></div>
            <div class="product-card"><span>Shoe B</span><button>Buy</button></div>
            <div class="product-card"><span>Shoe C</span><button>Buy</button></div>
        </body></html>"#;
        let segments = PageFetcher::extract_structured_body(html);
        let listings: Vec<_> = segments.iter().filter(|s| s.semantic_role == SemanticRole::ProductListing).collect();
        assert_eq!(listings.len(), 3);
    }

    #[test]
    fn twitter_verified_badge_detected_by_testid() {
        let html = r#"<html><body><span data-testid="icon-verified"></span></body></html>"#;
        let badge = PageFetcher::extract_verification_badge(html, "https://twitter.com/nike").unwrap();
        assert!(badge.verified);
        assert_eq!(badge.platform.as_deref(), Some("twitter"));
    }

    #[test]
    fn twitter_unverified_fixture_scores_false() {
        let html = r#"<html><body><span data-testid="icon-follow"></span></body></html>"#;
        let badge = PageFetcher::extract_verification_badge(html, "https://x.com/someoneelse").unwrap();
        assert!(!badge.verified);
        assert_eq!(badge.platform.as_deref(), Some("twitter"));
    }

    #[test]
    fn instagram_verified_badge_detected_by_aria_label_svg() {
        let html = r#"<html><body><svg aria-label="Verified" fill="blue"></svg></body></html>"#;
        let badge = PageFetcher::extract_verification_badge(html, "https://instagram.com/nike").unwrap();
        assert!(badge.verified);
        assert_eq!(badge.platform.as_deref(), Some("instagram"));
    }

    #[test]
    fn instagram_unverified_fixture_scores_false() {
        let html = r#"<html><body><div class="profile-header">nike_fan_page</div></body></html>"#;
        let badge = PageFetcher::extract_verification_badge(html, "https://instagram.com/nike_fan_page").unwrap();
        assert!(!badge.verified);
        assert_eq!(badge.platform.as_deref(), Some("instagram"));
    }

    #[test]
    fn linkedin_verified_badge_detected_by_use_href() {
        let html = r#"<html><body><svg><use href="#verified-medium"></use></svg></body></html>"#;
        let badge = PageFetcher::extract_verification_badge(html, "https://linkedin.com/company/nike").unwrap();
        assert!(badge.verified);
        assert_eq!(badge.platform.as_deref(), Some("linkedin"));
    }

    #[test]
    fn linkedin_unverified_fixture_scores_false() {
        let html = r#"<html><body><svg aria-label="Share"></svg></body></html>"#;
        let badge = PageFetcher::extract_verification_badge(html, "https://linkedin.com/company/generic-co").unwrap();
        assert!(!badge.verified);
        assert_eq!(badge.platform.as_deref(), Some("linkedin"));
    }

    #[test]
    fn fetched_page_thin_detection_matches_threshold() {
        let short = FetchedPage { body: "x".repeat(50), ..Default::default() };
        let long = FetchedPage { body: "x".repeat(500), ..Default::default() };
        assert!(short.is_thin());
        assert!(!long.is_thin());
    }

    fn test_fetcher(debug_dir: Option<std::path::PathBuf>) -> PageFetcher {
        let robots = Arc::new(RobotsCache::new(reqwest::Client::new(), PerDomainRateLimiter::new(Duration::from_millis(1))));
        PageFetcher::new(reqwest::Client::new(), PerDomainRateLimiter::new(Duration::from_millis(1)), robots, None, "test-agent", debug_dir)
    }

    #[tokio::test]
    async fn fetch_via_http_extracts_title_and_badge_from_a_real_response() {
        let server = wiremock::MockServer::start().await;
        let html = r#"<html><head><title>Nike Running</title></head>
            <body><span data-testid="icon-verified"></span>
            <p>Nike ships durable running shoes built to last for miles and miles.</p>
            <footer><a href="/privacy">Privacy Policy</a></footer></body></html>"#;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/nike"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(html))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(None);
        let url = format!("{}/nike", server.uri());
        let page = fetcher.fetch(&url, false).await.unwrap();

        assert_eq!(page.title, "Nike Running");
        assert!(!page.is_thin());
        assert!(!page.access_denied);
        assert_eq!(page.privacy_link.as_deref(), Some(format!("{}/privacy", server.uri())).as_deref());
        assert!(page.verification_badge.is_some_and(|b| b.verified));
    }

    #[tokio::test]
    async fn fetch_via_http_treats_403_as_access_denied() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/blocked"))
            .respond_with(wiremock::ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(None);
        let url = format!("{}/blocked", server.uri());
        let page = fetcher.fetch(&url, false).await.unwrap();
        assert!(page.access_denied);
    }

    #[test]
    fn maybe_dump_debug_writes_a_file_under_the_configured_directory() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = test_fetcher(Some(dir.path().to_path_buf()));
        fetcher.maybe_dump_debug("https://example.com/a", "<html></html>", "thin_content");

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].as_ref().unwrap().file_name().into_string().unwrap();
        assert!(name.starts_with("thin_content_"));
    }

    #[test]
    fn maybe_dump_debug_is_a_no_op_without_a_configured_directory() {
        let fetcher = test_fetcher(None);
        fetcher.maybe_dump_debug("https://example.com/a", "<html></html>", "thin_content");
    }
}
