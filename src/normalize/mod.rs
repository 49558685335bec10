//! Text normalization for streamed model output
//!
//! Incremental generation tends to stutter: characters repeat, short phrases
//! echo, sentences and whole lines get emitted twice. This module removes
//! those artifacts at two strengths:
//!
//! - [`light_normalize`] runs on every streamed fragment. It only collapses
//!   runs of four or more identical characters, so it is linear in the
//!   fragment length and never touches tokens that are still being emitted.
//! - [`deep_normalize`] runs once over the full accumulated reply before it is
//!   persisted. It applies the ordered [`DeepRule`] pipeline until the text
//!   stops changing.
//!
//! Both functions are total over all inputs, including the empty string.
//!
//! # Examples
//!
//! ```
//! use chatstream::normalize::{deep_normalize, light_normalize};
//!
//! assert_eq!(light_normalize("你好"), "你好");
//! assert_eq!(deep_normalize("你好你好你好"), "你好");
//! assert_eq!(deep_normalize("Hello Hello world"), "Hello world");
//! ```

pub mod rules;

pub use rules::DeepRule;

/// Options controlling deep-pass strictness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Drop any non-blank line whose whitespace-normalized form appeared
    /// earlier in the text. Disabling keeps deliberately repeated lines such
    /// as identical list items.
    pub dedupe_lines: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self { dedupe_lines: true }
    }
}

impl NormalizeOptions {
    /// Rules enabled by these options, in pipeline order
    pub fn rules(&self) -> impl Iterator<Item = DeepRule> + '_ {
        DeepRule::ALL
            .into_iter()
            .filter(move |rule| self.dedupe_lines || *rule != DeepRule::DuplicateLines)
    }
}

/// Light pass for a single streamed fragment
///
/// Collapses any run of 4 or more identical characters to one occurrence.
/// Never increases the length and leaves text without such runs untouched.
pub fn light_normalize(fragment: &str) -> String {
    rules::collapse_character_runs(fragment, 4, 1)
}

/// Deep pass with default options
///
/// `deep_normalize(deep_normalize(x)) == deep_normalize(x)` for every `x`.
pub fn deep_normalize(text: &str) -> String {
    deep_normalize_with(text, &NormalizeOptions::default())
}

/// Deep pass with explicit options
///
/// Runs the enabled rules in order and repeats the whole pipeline until a
/// run leaves the text unchanged. Each rule only removes characters, so
/// every changing iteration strictly shortens the text and the loop ends.
pub fn deep_normalize_with(text: &str, options: &NormalizeOptions) -> String {
    let mut current = text.to_string();

    loop {
        let next = options
            .rules()
            .fold(current.clone(), |acc, rule| rule.apply(&acc));

        if next == current {
            return current;
        }

        tracing::trace!(
            "Normalization pass shrank text from {} to {} bytes",
            current.len(),
            next.len()
        );
        current = next;
    }
}
