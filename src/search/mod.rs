//! Web search collaborator
//!
//! Search is optional context for a chat turn. Implementations never fail a
//! turn: transport or parse problems are logged and produce no results.

pub mod duckduckgo;

pub use duckduckgo::DuckDuckGoSearch;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A ranked search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

/// Source of ranked search results
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Return at most `max_results` results for `query`, best first
    ///
    /// Failures are absorbed and reported as an empty list.
    async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult>;
}

/// Keep the first result for each URL, preserving order
///
/// # Examples
///
/// ```
/// use chatstream::search::{dedupe_by_url, SearchResult};
///
/// let results = vec![
///     SearchResult::new("A", "https://a.example", ""),
///     SearchResult::new("B", "https://b.example", ""),
///     SearchResult::new("A again", "https://a.example", ""),
/// ];
/// let unique = dedupe_by_url(results);
/// assert_eq!(unique.len(), 2);
/// assert_eq!(unique[0].title, "A");
/// ```
pub fn dedupe_by_url(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|result| seen.insert(result.url.clone()))
        .collect()
}
