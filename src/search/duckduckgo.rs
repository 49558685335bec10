//! DuckDuckGo HTML search
//!
//! Uses the JavaScript-free results page, which needs no API key. Results are
//! read from the parsed document with CSS selectors.

use crate::config::SearchConfig;
use crate::error::{ChatstreamError, Result};
use crate::normalize::rules::{collapse_repeated_punctuation, collapse_repeated_spans};
use crate::search::{dedupe_by_url, SearchProvider, SearchResult};

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

const SNIPPET_LIMIT: usize = 200;
const SENTENCE_ENDS: &[char] = &['。', '！', '？', '.', '!', '?'];

const RESULT_SELECTOR: &str = ".result:not(.result--ad), .web-result:not(.result--ad)";
const TITLE_SELECTOR: &str = ".result__a";
const SNIPPET_SELECTOR: &str = ".result__snippet";

/// Selectors for the results page
struct ResultSelectors {
    result: Selector,
    title: Selector,
    snippet: Selector,
}

impl ResultSelectors {
    fn new() -> Result<Self> {
        let compile = |selector: &str| {
            Selector::parse(selector).map_err(|e| {
                ChatstreamError::Search(format!("Invalid selector {}: {:?}", selector, e))
            })
        };

        Ok(Self {
            result: compile(RESULT_SELECTOR)?,
            title: compile(TITLE_SELECTOR)?,
            snippet: compile(SNIPPET_SELECTOR)?,
        })
    }

    /// Extract results in page order, before deduplication and truncation
    fn parse(&self, html: &str) -> Vec<SearchResult> {
        let document = Html::parse_document(html);
        let mut results = Vec::new();

        for element in document.select(&self.result) {
            let Some(title_el) = element.select(&self.title).next() else {
                continue;
            };

            let title = text(title_el);
            let url = title_el
                .value()
                .attr("href")
                .map(resolve_result_url)
                .unwrap_or_default();

            if title.is_empty() || url.is_empty() {
                continue;
            }

            let snippet = element
                .select(&self.snippet)
                .next()
                .map(|el| clean_snippet(&text(el)))
                .unwrap_or_default();

            results.push(SearchResult { title, url, snippet });
        }

        results
    }
}

/// Text content of an element with whitespace collapsed
fn text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unwrap DuckDuckGo's redirect links to the target URL
fn resolve_result_url(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    match Url::parse(&absolute) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, target)| target.into_owned())
            .unwrap_or(absolute),
        Err(_) => absolute,
    }
}

/// Remove stutter from a result snippet and cap its length
///
/// Collapses repeated 2-10 character runs and repeated punctuation, drops
/// sentences whose letters and digits were already seen, then truncates to
/// 200 characters followed by `...`.
pub fn clean_snippet(snippet: &str) -> String {
    if snippet.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = snippet.chars().collect();
    let collapsed: String = collapse_repeated_spans(&chars, 2, 10, false, |c| !c.is_whitespace())
        .into_iter()
        .collect();
    let collapsed = collapse_repeated_punctuation(&collapsed);
    let deduped = drop_repeated_sentences(&collapsed);

    if deduped.chars().count() > SNIPPET_LIMIT {
        let mut truncated: String = deduped.chars().take(SNIPPET_LIMIT).collect();
        truncated.push_str("...");
        truncated
    } else {
        deduped
    }
}

fn drop_repeated_sentences(text: &str) -> String {
    let mut seen = HashSet::new();
    let mut out = String::with_capacity(text.len());
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let at_end = chars.peek().is_none();
        if !SENTENCE_ENDS.contains(&c) && !at_end {
            continue;
        }

        // Include trailing whitespace with the sentence it follows.
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if !next.is_whitespace() {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }

        let sentence = &text[start..end];
        let key: String = sentence.chars().filter(|c| c.is_alphanumeric()).collect();
        if key.is_empty() || seen.insert(key) {
            out.push_str(sentence);
        }
        start = end;
    }

    out.trim().to_string()
}

/// Search backed by the DuckDuckGo HTML endpoint
pub struct DuckDuckGoSearch {
    client: Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    /// Create a search client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ChatstreamError::Search(format!("Failed to create HTTP client: {}", e)))?;

        // Fail at construction rather than on every search.
        ResultSelectors::new()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Parse a results page into at most `max_results` unique results
    pub fn parse_results(&self, html: &str, max_results: usize) -> Vec<SearchResult> {
        let selectors = match ResultSelectors::new() {
            Ok(selectors) => selectors,
            Err(e) => {
                tracing::warn!("Cannot parse search results: {:#}", e);
                return Vec::new();
            }
        };

        let mut results = dedupe_by_url(selectors.parse(html));
        results.truncate(max_results);
        results
    }

    async fn fetch(&self, query: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        if query.trim().is_empty() || max_results == 0 {
            return Vec::new();
        }

        match self.fetch(query).await {
            Ok(html) => {
                let results = self.parse_results(&html, max_results);
                tracing::debug!("Search for {:?} returned {} results", query, results.len());
                results
            }
            Err(e) => {
                tracing::warn!("Search for {:?} failed: {:#}", query, e);
                Vec::new()
            }
        }
    }
}
