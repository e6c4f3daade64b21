//! Search provider abstraction (C6, spec.md §4.6).
//!
//! Unifies Brave and Serper behind one [`SearchProvider`] trait so the
//! collector (C7) never branches on which backend produced a result.
//! Grounded in `original_source/ingestion/search_provider.py`'s
//! `SearchProvider` ABC.

pub mod brave;
pub mod serper;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use brave::BraveSearchProvider;
pub use serper::SerperSearchProvider;

/// One standardized search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Execute a search starting at `start_offset` results into the ranked
    /// list and return up to `size` standardized results from there.
    /// Implementations paginate internally when the backend's per-request
    /// limit is smaller than `size`; `start_offset` lets a caller resume
    /// further into the result set across repeated calls for the same query
    /// (spec.md §4.6/§4.7).
    async fn search(&self, query: &str, size: u32, start_offset: u32) -> Result<Vec<SearchResult>>;

    /// Provider name for logging (`"BRAVE"`, `"SERPER"`).
    fn name(&self) -> &'static str;
}
