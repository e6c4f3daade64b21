//! Crate-wide error type.
//!
//! Every fallible operation in this crate returns [`Result<T>`]. Network and
//! parsing failures that the spec says should degrade gracefully (thin
//! content, robots disallow, detector exceptions) are modeled as `Ok` values
//! carrying a status, not as `Err` — `Error` is reserved for failures a
//! caller needs to see and react to.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("browser has not been started")]
    BrowserNotStarted,

    #[error("timeout waiting for browser worker")]
    TimeoutWaitingForBrowser,

    #[error("browser navigation failed: {0}")]
    BrowserNavigation(String),

    #[error("search provider auth or quota error: {0}")]
    SearchProviderAuth(String),

    #[error("search provider request failed: {0}")]
    SearchProvider(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("run {0} not found")]
    RunNotFound(String),
}
