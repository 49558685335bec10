//! Named rewrite rules used by the normalizer pipeline
//!
//! Every rule is a pure `&str -> String` function that only ever deletes
//! characters. The pipeline in [`super`] relies on that property to reach a
//! fixed point.

use std::collections::HashSet;

/// Characters that end a sentence or clause for the phrase and sentence rules.
const SENTENCE_TERMINATORS: &[char] = &['\n', '。', '！', '？', '.', '!', '?'];

/// Characters that may not appear inside an in-line repeated span (step 5a).
const INLINE_SPAN_BREAKERS: &[char] = &['。', '！', '？', '，'];

/// Punctuation whose repeated runs collapse to a single occurrence (step 7).
const COLLAPSIBLE_PUNCTUATION: &[char] = &['。', '！', '？', '，', '；', '：', '!', '?'];

/// Ordered deep-pass rules
///
/// The order matters: character-level rules shrink the input before the
/// phrase and line rules scan it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeepRule {
    /// Runs of 3+ identical characters become 2
    CharacterRuns,
    /// Back-to-back repeated 2-8 letter spans collapse
    WordSpans,
    /// Repeated English word tokens collapse, whitespace between allowed
    RepeatedWords,
    /// Back-to-back repeated 3-20 character clauses collapse
    RepeatedClauses,
    /// Per line: repeated short spans and repeated sentences collapse
    InlineRepeats,
    /// Exact duplicate lines are dropped, blank lines kept
    DuplicateLines,
    /// Runs of repeated punctuation collapse to one
    RepeatedPunctuation,
}

impl DeepRule {
    /// All rules in pipeline order
    pub const ALL: [DeepRule; 7] = [
        DeepRule::CharacterRuns,
        DeepRule::WordSpans,
        DeepRule::RepeatedWords,
        DeepRule::RepeatedClauses,
        DeepRule::InlineRepeats,
        DeepRule::DuplicateLines,
        DeepRule::RepeatedPunctuation,
    ];

    /// Stable rule name, used in debug logging
    pub fn name(&self) -> &'static str {
        match self {
            DeepRule::CharacterRuns => "character_runs",
            DeepRule::WordSpans => "word_spans",
            DeepRule::RepeatedWords => "repeated_words",
            DeepRule::RepeatedClauses => "repeated_clauses",
            DeepRule::InlineRepeats => "inline_repeats",
            DeepRule::DuplicateLines => "duplicate_lines",
            DeepRule::RepeatedPunctuation => "repeated_punctuation",
        }
    }

    /// Apply this rule to the whole text
    pub fn apply(&self, text: &str) -> String {
        match self {
            DeepRule::CharacterRuns => collapse_character_runs(text, 3, 2),
            DeepRule::WordSpans => collapse_word_spans(text),
            DeepRule::RepeatedWords => collapse_repeated_words(text),
            DeepRule::RepeatedClauses => collapse_repeated_clauses(text),
            DeepRule::InlineRepeats => collapse_inline_repeats(text),
            DeepRule::DuplicateLines => drop_duplicate_lines(text),
            DeepRule::RepeatedPunctuation => collapse_repeated_punctuation(text),
        }
    }
}

fn is_terminator(c: char) -> bool {
    SENTENCE_TERMINATORS.contains(&c)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Collapse runs of at least `min_run` identical characters down to `keep`.
///
/// Newlines are never collapsed.
pub fn collapse_character_runs(text: &str, min_run: usize, keep: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let mut run = 1;
        while chars.peek() == Some(&c) {
            chars.next();
            run += 1;
        }

        let emit = if c != '\n' && run >= min_run {
            keep
        } else {
            run
        };
        out.extend(std::iter::repeat(c).take(emit));
    }

    out
}

/// Collapse spans of `min..=max` characters that repeat immediately.
///
/// At each position the longest qualifying span wins, matching the
/// leftmost-greedy behaviour of a backreference pattern such as
/// `(x{min,max})\1+`. Every character of the span must satisfy `accept`.
/// With `allow_gap`, whitespace between copies is tolerated and removed
/// along with the duplicate.
pub(crate) fn collapse_repeated_spans(
    chars: &[char],
    min: usize,
    max: usize,
    allow_gap: bool,
    accept: impl Fn(char) -> bool,
) -> Vec<char> {
    let n = chars.len();
    let mut out = Vec::with_capacity(n);
    let mut i = 0;

    while i < n {
        let mut consumed = None;

        for len in (min..=max).rev() {
            if i + len > n || !chars[i..i + len].iter().all(|&c| accept(c)) {
                continue;
            }
            let end = skip_repeats(chars, i, len, allow_gap, |_| true);
            if end > i + len {
                consumed = Some((len, end));
                break;
            }
        }

        match consumed {
            Some((len, end)) => {
                out.extend_from_slice(&chars[i..i + len]);
                i = end;
            }
            None => {
                out.push(chars[i]);
                i += 1;
            }
        }
    }

    out
}

/// Return the end index after all immediate copies of `chars[start..start + len]`.
///
/// `boundary_ok` is called with the index just past a candidate copy and
/// must approve it for the copy to count.
fn skip_repeats(
    chars: &[char],
    start: usize,
    len: usize,
    allow_gap: bool,
    boundary_ok: impl Fn(usize) -> bool,
) -> usize {
    let unit = &chars[start..start + len];
    let mut end = start + len;

    loop {
        let mut k = end;
        if allow_gap {
            while k < chars.len() && chars[k].is_whitespace() {
                k += 1;
            }
        }
        if k + len <= chars.len() && &chars[k..k + len] == unit && boundary_ok(k + len) {
            end = k + len;
        } else {
            return end;
        }
    }
}

/// Step 2: repeated 2-8 character spans of letters in any script.
pub fn collapse_word_spans(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    collapse_repeated_spans(&chars, 2, 8, false, char::is_alphabetic)
        .into_iter()
        .collect()
}

/// Step 3: an ASCII word repeated as a whole token, e.g. `Hello Hello`.
pub fn collapse_repeated_words(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let mut out = Vec::with_capacity(n);
    let mut i = 0;

    let at_boundary = |idx: usize| idx >= n || !is_word_char(chars[idx]);

    while i < n {
        let starts_token =
            chars[i].is_ascii_alphabetic() && (i == 0 || !is_word_char(chars[i - 1]));
        if !starts_token {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let mut token_end = i;
        while token_end < n && chars[token_end].is_ascii_alphabetic() {
            token_end += 1;
        }

        if !at_boundary(token_end) {
            // Letters glued to digits or other scripts are not a standalone token.
            out.extend_from_slice(&chars[i..token_end]);
            i = token_end;
            continue;
        }

        let end = skip_repeats(&chars, i, token_end - i, true, &at_boundary);
        out.extend_from_slice(&chars[i..token_end]);
        i = end;
    }

    out.into_iter().collect()
}

/// Step 4: repeated 3-20 character clauses that do not cross a terminator.
pub fn collapse_repeated_clauses(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    collapse_repeated_spans(&chars, 3, 20, false, |c| !is_terminator(c))
        .into_iter()
        .collect()
}

/// Step 5: per non-blank line, collapse repeated short spans and then
/// repeated complete sentences.
pub fn collapse_inline_repeats(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                return line.to_string();
            }
            let chars: Vec<char> = line.chars().collect();
            let spans = collapse_repeated_spans(&chars, 2, 10, true, |c| {
                !c.is_whitespace() && !INLINE_SPAN_BREAKERS.contains(&c)
            });
            collapse_repeated_sentences(&spans).into_iter().collect()
        })
        .collect::<Vec<String>>()
        .join("\n")
}

/// A sentence is 5-30 non-terminator characters followed by one terminator.
fn collapse_repeated_sentences(chars: &[char]) -> Vec<char> {
    let n = chars.len();
    let mut out = Vec::with_capacity(n);
    let mut i = 0;

    while i < n {
        let terminator = chars[i..].iter().position(|&c| is_terminator(c));
        if let Some(offset) = terminator {
            if (5..=30).contains(&offset) {
                let len = offset + 1;
                let end = skip_repeats(chars, i, len, true, |_| true);
                if end > i + len {
                    out.extend_from_slice(&chars[i..i + len]);
                    i = end;
                    continue;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

/// Step 6: drop lines whose whitespace-normalized form was already seen.
pub fn drop_duplicate_lines(text: &str) -> String {
    let mut seen = HashSet::new();

    text.split('\n')
        .filter(|line| {
            let normalized = line.split_whitespace().collect::<Vec<_>>().join(" ");
            normalized.is_empty() || seen.insert(normalized)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Step 7: collapse runs of the same punctuation mark.
pub fn collapse_repeated_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous: Option<char> = None;

    for c in text.chars() {
        if previous == Some(c) && COLLAPSIBLE_PUNCTUATION.contains(&c) {
            continue;
        }
        out.push(c);
        previous = Some(c);
    }

    out
}
