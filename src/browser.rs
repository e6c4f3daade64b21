//! Headless browser controller (C4, spec.md §4.4).
//!
//! A process singleton: one worker task owns the `chromiumoxide` browser and
//! drains a request channel sequentially, so the browser handle is never
//! shared across tasks. Callers submit a [`FetchRequest`] and await on an
//! embedded oneshot reply channel.
//!
//! Grounded in `original_source/ingestion/playwright_manager.py`'s dedicated
//! worker-thread/request-queue design, translated from OS thread + blocking
//! queue to a tokio task + `mpsc` channel, and generalized to the state
//! machine spec.md §4.4 names explicitly (`{stopped, starting, running,
//! stopping}`) where the Python original only tracked a boolean.

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(20);
const BODY_WAIT_TIMEOUT: Duration = Duration::from_secs(8);
const CLOSE_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Stealth init script installed on every new page: masks the most common
/// automation fingerprints (spec.md §4.4).
const STEALTH_INIT_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
const originalQuery = window.navigator.permissions.query;
window.navigator.permissions.query = (parameters) => (
    parameters.name === 'notifications'
        ? Promise.resolve({ state: Notification.permission })
        : originalQuery(parameters)
);
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Result of one browser fetch.
#[derive(Debug, Clone)]
pub struct BrowserFetchResult {
    pub title: String,
    pub body: String,
    pub raw_content: String,
    pub url: String,
    pub access_denied: bool,
    pub screenshot: Option<Vec<u8>>,
}

struct FetchRequest {
    url: String,
    user_agent: String,
    capture_screenshot: bool,
    reply: oneshot::Sender<Result<BrowserFetchResult>>,
}

/// Sentinel types posted on the worker's channel.
enum WorkItem {
    Fetch(FetchRequest),
    Shutdown(oneshot::Sender<()>),
}

/// Process-singleton headless browser actor.
///
/// Cheaply cloneable; every clone shares the same worker task and state.
#[derive(Clone)]
pub struct BrowserController {
    state: Arc<Mutex<State>>,
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<WorkItem>>>>,
    headless: bool,
}

impl BrowserController {
    pub fn new(headless: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::Stopped)),
            sender: Arc::new(Mutex::new(None)),
            headless,
        }
    }

    /// Idempotent when already running. Launches the browser and spawns the
    /// dedicated worker task that owns it for its whole lifetime.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            match *state {
                State::Running => return Ok(()),
                State::Starting | State::Stopping => return Ok(()),
                State::Stopped => *state = State::Starting,
            }
        }

        let config = BrowserConfig::builder()
            .with_head_option(!self.headless)
            .build()
            .map_err(|e| Error::BrowserNavigation(e.to_string()))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::BrowserNavigation(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
        });

        let (tx, mut rx) = mpsc::unbounded_channel::<WorkItem>();
        *self.sender.lock() = Some(tx);
        *self.state.lock() = State::Running;
        info!("browser worker started");

        tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                match item {
                    WorkItem::Fetch(req) => {
                        let result = Self::process_fetch(&mut browser, req.url.clone(), &req.user_agent, req.capture_screenshot).await;
                        let _ = req.reply.send(result);
                    }
                    WorkItem::Shutdown(done) => {
                        if let Err(e) = browser.close().await {
                            warn!(error = %e, "error closing browser during shutdown");
                        }
                        let _ = done.send(());
                        break;
                    }
                }
            }
            info!("browser worker stopped");
        });

        Ok(())
    }

    /// Submit a fetch and await the result. Fails with `BrowserNotStarted`
    /// if `start()` has not completed. An optional per-request timeout;
    /// when exceeded, returns `TimeoutWaitingForBrowser` while the worker
    /// continues draining the request in the background.
    pub async fn fetch_page(
        &self,
        url: &str,
        user_agent: &str,
        capture_screenshot: bool,
        timeout: Option<Duration>,
    ) -> Result<BrowserFetchResult> {
        let sender = {
            let guard = self.sender.lock();
            guard.clone()
        };
        let Some(sender) = sender else {
            return Err(Error::BrowserNotStarted);
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = FetchRequest {
            url: url.to_string(),
            user_agent: user_agent.to_string(),
            capture_screenshot,
            reply: reply_tx,
        };
        sender
            .send(WorkItem::Fetch(request))
            .map_err(|_| Error::BrowserNotStarted)?;

        match timeout {
            Some(d) => match tokio::time::timeout(d, reply_rx).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(Error::BrowserNotStarted),
                Err(_) => Err(Error::TimeoutWaitingForBrowser),
            },
            None => reply_rx.await.map_err(|_| Error::BrowserNotStarted)?,
        }
    }

    /// Posts a shutdown sentinel and waits (bounded) for the worker to drain
    /// in-flight work and close the browser. Subsequent `fetch_page` calls
    /// fail with `browser_not_started`.
    pub async fn close(&self) {
        let sender = {
            let mut guard = self.sender.lock();
            let taken = guard.take();
            *self.state.lock() = State::Stopping;
            taken
        };
        let Some(sender) = sender else {
            *self.state.lock() = State::Stopped;
            return;
        };

        let (done_tx, done_rx) = oneshot::channel();
        if sender.send(WorkItem::Shutdown(done_tx)).is_ok() {
            let _ = tokio::time::timeout(CLOSE_JOIN_TIMEOUT, done_rx).await;
        }
        *self.state.lock() = State::Stopped;
    }

    async fn process_fetch(
        browser: &mut Browser,
        url: String,
        user_agent: String,
        capture_screenshot: bool,
    ) -> Result<BrowserFetchResult> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::BrowserNavigation(e.to_string()))?;

        let result = Self::run_page(&page, &url, &user_agent, capture_screenshot).await;

        if let Err(e) = page.close().await {
            debug!(error = %e, "page close error suppressed during shutdown");
        }

        result
    }

    async fn run_page(
        page: &Page,
        url: &str,
        user_agent: &str,
        capture_screenshot: bool,
    ) -> Result<BrowserFetchResult> {
        page.set_user_agent(user_agent)
            .await
            .map_err(|e| Error::BrowserNavigation(e.to_string()))?;
        let _ = page.evaluate_on_new_document(STEALTH_INIT_SCRIPT).await;

        let navigation = tokio::time::timeout(NAVIGATION_TIMEOUT, page.goto(url));
        let status: Option<u16> = match navigation.await {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => return Err(Error::BrowserNavigation(e.to_string())),
            Err(_) => return Err(Error::TimeoutWaitingForBrowser),
        };

        let _ = tokio::time::timeout(BODY_WAIT_TIMEOUT, page.find_element("body")).await;

        let title = page.get_title().await.ok().flatten().unwrap_or_default();
        let raw_content = page.content().await.unwrap_or_default();

        let access_denied = Self::looks_access_denied(status, &title, &raw_content);
        let body = Self::extract_body(&raw_content);

        let screenshot = if capture_screenshot {
            page.screenshot(chromiumoxide::page::ScreenshotParams::builder().full_page(true).build())
                .await
                .ok()
        } else {
            None
        };

        Ok(BrowserFetchResult {
            title: title.trim().to_string(),
            body: body.trim().to_string(),
            raw_content,
            url: url.to_string(),
            access_denied,
            screenshot,
        })
    }

    fn looks_access_denied(status: Option<u16>, title: &str, html: &str) -> bool {
        if matches!(status, Some(401) | Some(403)) {
            return true;
        }
        let haystack = format!("{title} {html}").to_ascii_lowercase();
        haystack.contains("access denied")
            || haystack.contains("403 forbidden")
            || (haystack.contains("cloudflare") && haystack.contains("security"))
    }

    /// Extraction strategy ladder (spec.md §4.4): article → main/role=main →
    /// content-class div with ≥150 chars → concatenated `<p>` → body fallback.
    pub(crate) fn extract_body(html: &str) -> String {
        use scraper::{Html, Selector};

        let document = Html::parse_document(html);

        let text_of = |sel: &Selector| -> Option<String> {
            document.select(sel).next().map(|el| {
                el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
            })
        };

        if let Ok(sel) = Selector::parse("article") {
            if let Some(text) = text_of(&sel) {
                if text.len() >= 150 {
                    return text;
                }
            }
        }

        if let Ok(sel) = Selector::parse("main, [role=main]") {
            if let Some(text) = text_of(&sel) {
                if text.len() >= 150 {
                    return text;
                }
            }
        }

        const CONTENT_CLASSES: &[&str] = &[
            "content",
            "post-content",
            "article-body",
            "article",
            "entry",
            "post",
            "story-body",
        ];
        for pattern in CONTENT_CLASSES {
            if let Ok(sel) = Selector::parse(&format!("div[class*='{pattern}']")) {
                for el in document.select(&sel) {
                    let text = el.text().collect::<Vec<_>>().join(" ");
                    if text.len() >= 150 {
                        return text;
                    }
                }
            }
        }

        if let Ok(sel) = Selector::parse("p") {
            let joined = document
                .select(&sel)
                .map(|el| el.text().collect::<Vec<_>>().join(" "))
                .collect::<Vec<_>>()
                .join("\n\n");
            if joined.len() >= 150 {
                return joined;
            }
        }

        if let Ok(sel) = Selector::parse("body") {
            if let Some(text) = text_of(&sel) {
                return text;
            }
        }

        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_article_tag_when_long_enough() {
        let html = format!(
            "<html><body><article>{}</article><p>short</p></body></html>",
            "word ".repeat(40)
        );
        let body = BrowserController::extract_body(&html);
        assert!(body.starts_with("word"));
    }

    #[test]
    fn falls_back_to_paragraphs_when_no_article_or_main() {
        let html = "<html><body><p>First paragraph of reasonable length here.</p><p>Second paragraph also has a decent amount of text in it.</p></body></html>";
        let body = BrowserController::extract_body(html);
        assert!(body.contains("First paragraph"));
        assert!(body.contains("Second paragraph"));
    }

    #[test]
    fn access_denied_detected_from_status_code() {
        assert!(BrowserController::looks_access_denied(Some(403), "", ""));
        assert!(!BrowserController::looks_access_denied(Some(200), "Home", "<html></html>"));
    }

    #[test]
    fn access_denied_detected_from_title_heuristic() {
        assert!(BrowserController::looks_access_denied(None, "Access Denied", ""));
        assert!(BrowserController::looks_access_denied(None, "", "Cloudflare security check"));
    }

    #[tokio::test]
    async fn fetch_before_start_fails_with_browser_not_started() {
        let controller = BrowserController::new(true);
        let result = controller.fetch_page("https://example.com", "ua", false, None).await;
        assert!(matches!(result, Err(Error::BrowserNotStarted)));
    }
}
