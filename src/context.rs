//! Prompt assembly for a chat turn
//!
//! The assembled context is a single text blob: recent history, optional
//! search results, then the current question.
//!
//! ```text
//! Conversation history:
//! User: What is Rust?
//! Assistant: A systems language.
//!
//! Relevant search results:
//! 1. The Rust Programming Language
//!    Link: https://www.rust-lang.org/
//!    Summary: A language empowering everyone.
//!
//!
//! Current question: Is it fast?
//! ```

use crate::config::ChatConfig;
use crate::search::{SearchProvider, SearchResult};
use crate::storage::{Message, Role};

/// Builds the text sent to the provider for one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextAssembler {
    history_limit: usize,
    search_results: usize,
}

impl ContextAssembler {
    /// Create an assembler keeping the last `history_limit` messages and up
    /// to `search_results` search hits
    pub fn new(history_limit: usize, search_results: usize) -> Self {
        Self {
            history_limit,
            search_results,
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(config.history_limit, config.search_results)
    }

    /// Render the context from already-gathered inputs
    ///
    /// Pure and deterministic. The last `history_limit` messages are taken
    /// oldest first; system messages among them are not rendered. The
    /// search section is omitted when `results` is empty.
    pub fn render(&self, history: &[Message], results: &[SearchResult], question: &str) -> String {
        let mut parts: Vec<String> = Vec::new();

        if !history.is_empty() {
            parts.push("Conversation history:".to_string());
            let start = history.len().saturating_sub(self.history_limit);
            for message in &history[start..] {
                if message.role != Role::System {
                    parts.push(format!("{}: {}", message.role.label(), message.content));
                }
            }
        }

        if !results.is_empty() {
            parts.push("\nRelevant search results:".to_string());
            for (index, result) in results.iter().enumerate() {
                parts.push(format!("{}. {}", index + 1, result.title));
                parts.push(format!("   Link: {}", result.url));
                parts.push(format!("   Summary: {}", result.snippet));
                parts.push(String::new());
            }
        }

        parts.push(format!("\nCurrent question: {}", question));
        parts.join("\n")
    }

    /// Gather search results when a search provider is given, then render
    pub async fn assemble(
        &self,
        history: &[Message],
        question: &str,
        search: Option<&dyn SearchProvider>,
    ) -> String {
        let results = match search {
            Some(search) if self.search_results > 0 => {
                let mut results = search.search(question, self.search_results).await;
                results.truncate(self.search_results);
                tracing::debug!("Including {} search results in context", results.len());
                results
            }
            _ => Vec::new(),
        };

        self.render(history, &results, question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::MockSearchProvider;

    fn history(pairs: &[(Role, &str)]) -> Vec<Message> {
        pairs
            .iter()
            .map(|(role, content)| Message::new("c1", *role, *content))
            .collect()
    }

    #[test]
    fn test_render_question_only() {
        let assembler = ContextAssembler::new(10, 3);
        assert_eq!(
            assembler.render(&[], &[], "Hello?"),
            "\nCurrent question: Hello?"
        );
    }

    #[test]
    fn test_render_history_and_question() {
        let assembler = ContextAssembler::new(10, 3);
        let history = history(&[(Role::User, "What is Rust?"), (Role::Assistant, "A language.")]);

        assert_eq!(
            assembler.render(&history, &[], "Is it fast?"),
            "Conversation history:\nUser: What is Rust?\nAssistant: A language.\n\nCurrent question: Is it fast?"
        );
    }

    #[test]
    fn test_render_search_results_block() {
        let assembler = ContextAssembler::new(10, 3);
        let results = vec![
            SearchResult::new("Rust", "https://www.rust-lang.org/", "Fast and safe."),
            SearchResult::new("Book", "https://doc.rust-lang.org/book/", ""),
        ];

        let expected = [
            "",
            "Relevant search results:",
            "1. Rust",
            "   Link: https://www.rust-lang.org/",
            "   Summary: Fast and safe.",
            "",
            "2. Book",
            "   Link: https://doc.rust-lang.org/book/",
            "   Summary: ",
            "",
            "",
            "Current question: q",
        ]
        .join("\n");
        assert_eq!(assembler.render(&[], &results, "q"), expected);
    }

    #[test]
    fn test_render_keeps_last_messages_only() {
        let assembler = ContextAssembler::new(2, 3);
        let history = history(&[
            (Role::User, "one"),
            (Role::Assistant, "two"),
            (Role::User, "three"),
        ]);

        let context = assembler.render(&history, &[], "q");
        assert!(!context.contains("one"));
        assert!(context.contains("Assistant: two\nUser: three"));
    }

    #[test]
    fn test_render_skips_system_messages() {
        let assembler = ContextAssembler::new(10, 3);
        let history = history(&[(Role::System, "secret"), (Role::User, "hi")]);

        let context = assembler.render(&history, &[], "q");
        assert!(!context.contains("secret"));
        assert!(context.starts_with("Conversation history:\nUser: hi"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let assembler = ContextAssembler::new(10, 3);
        let history = history(&[(Role::User, "a")]);
        assert_eq!(
            assembler.render(&history, &[], "b"),
            assembler.render(&history, &[], "b")
        );
    }

    #[tokio::test]
    async fn test_assemble_queries_search_with_question() {
        let mut search = MockSearchProvider::new();
        search
            .expect_search()
            .withf(|query, max| query == "rust news" && *max == 3)
            .times(1)
            .returning(|_, _| vec![SearchResult::new("Hit", "https://hit.example", "snip")]);

        let assembler = ContextAssembler::new(10, 3);
        let context = assembler.assemble(&[], "rust news", Some(&search)).await;

        assert!(context.contains("1. Hit"));
        assert!(context.contains("   Link: https://hit.example"));
        assert!(context.ends_with("\nCurrent question: rust news"));
    }

    #[tokio::test]
    async fn test_assemble_omits_empty_search_section() {
        let mut search = MockSearchProvider::new();
        search.expect_search().times(1).returning(|_, _| Vec::new());

        let assembler = ContextAssembler::new(10, 3);
        let context = assembler.assemble(&[], "q", Some(&search)).await;
        assert!(!context.contains("Relevant search results"));
    }

    #[tokio::test]
    async fn test_assemble_without_search_provider() {
        let assembler = ContextAssembler::new(10, 3);
        let context = assembler.assemble(&[], "q", None).await;
        assert_eq!(context, "\nCurrent question: q");
    }

    #[tokio::test]
    async fn test_assemble_truncates_overlong_results() {
        let mut search = MockSearchProvider::new();
        search.expect_search().returning(|_, _| {
            (0..5)
                .map(|i| SearchResult::new(format!("r{}", i), format!("https://{}.example", i), ""))
                .collect()
        });

        let assembler = ContextAssembler::new(10, 2);
        let context = assembler.assemble(&[], "q", Some(&search)).await;
        assert!(context.contains("2. r1"));
        assert!(!context.contains("3. r2"));
    }
}
