//! Console log normalization.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

// Per-line prefix written by the CI timestamper, e.g. "[2020-04-22T11:21:48.848Z] "
static RE_TIMESTAMP_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]{3}Z\]\s(.*)$").unwrap()
});

// CSI and other 7-bit C1 escape sequences
static RE_ANSI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1B[@-_][0-?]*[ -/]*[@-~]").unwrap());

/// Console text with timestamp prefixes removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLog {
    pub text: String,
    /// Character count of `text`, taken before any truncation.
    pub original_length: usize,
}

/// Strip timestamp prefixes and record the resulting length.
pub fn normalize(raw: &str) -> NormalizedLog {
    let text = strip_timestamps(raw);
    let original_length = text.chars().count();
    NormalizedLog {
        text,
        original_length,
    }
}

/// Remove the per-line timestamp bracket wherever present.
///
/// Lines without the bracket pass through unchanged; lines are re-joined
/// with `\n`, so a trailing newline is not preserved.
pub fn strip_timestamps(raw: &str) -> String {
    split_lines(raw)
        .into_iter()
        .map(|line| match RE_TIMESTAMP_PREFIX.captures(line) {
            Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split on every line boundary: `\n`, `\r\n`, a bare `\r`, and the
/// vertical tab, form feed, file/group/record separators, NEL and the
/// Unicode line and paragraph separators.
///
/// A trailing boundary does not produce an empty last line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        lines.push(&text[start..i]);
        start = i + c.len_utf8();
        if c == '\r' && matches!(chars.peek(), Some((_, '\n'))) {
            chars.next();
            start += 1;
        }
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Remove ANSI escape sequences.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    RE_ANSI.replace_all(text, "")
}

/// Keep the last `limit` characters if `text` is longer than that.
pub fn truncate_tail(text: &str, limit: usize) -> &str {
    let len = text.chars().count();
    if len <= limit {
        return text;
    }
    let start = text
        .char_indices()
        .nth(len - limit)
        .map_or(text.len(), |(i, _)| i);
    &text[start..]
}
