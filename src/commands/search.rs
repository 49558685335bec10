//! Web search command handler

use crate::config::Config;
use crate::error::Result;
use crate::search::{DuckDuckGoSearch, SearchProvider, SearchResult};
use colored::Colorize;

/// Run a search and print the results
pub async fn run_search(config: Config, query: String, max_results: usize) -> Result<()> {
    let search = DuckDuckGoSearch::new(&config.search)?;
    let results = search.search(&query, max_results).await;

    if results.is_empty() {
        println!("{}", "No results found.".yellow());
        return Ok(());
    }

    print!("{}", render_results(&results));
    Ok(())
}

/// Render results as a numbered list
pub fn render_results(results: &[SearchResult]) -> String {
    let mut out = String::new();
    for (index, result) in results.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", index + 1, result.title.bold()));
        out.push_str(&format!("   {}\n", result.url.cyan()));
        if !result.snippet.is_empty() {
            out.push_str(&format!("   {}\n", result.snippet));
        }
        out.push('\n');
    }
    out
}
