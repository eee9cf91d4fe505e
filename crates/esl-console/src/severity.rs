//! Keyword-based severity detection for console lines.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

// Checked in order from most to least severe
static SEVERITY_PATTERNS: LazyLock<Vec<(Regex, Severity)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)\b(CRITICAL|CRIT|FATAL|EMERG|EMERGENCY|ALERT|PANIC)\b").unwrap(),
            Severity::Critical,
        ),
        (
            Regex::new(r"(?i)\b(ERROR|ERR|FAIL(?:ED|URE)?)\b").unwrap(),
            Severity::Error,
        ),
        (
            Regex::new(r"(?i)\b(WARN(?:ING)?|DEPRECATION)\b").unwrap(),
            Severity::Warning,
        ),
        (Regex::new(r"(?i)\b(NOTICE)\b").unwrap(), Severity::Notice),
        (Regex::new(r"(?i)\b(DEBUG|TRACE)\b").unwrap(), Severity::Debug),
    ]
});

/// Severity of a single console line; plain output counts as info.
pub fn detect_severity(line: &str) -> Severity {
    SEVERITY_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(line))
        .map_or(Severity::Info, |(_, severity)| *severity)
}

/// Per-severity line counts for a whole console log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub lines: usize,
    pub critical: usize,
    pub error: usize,
    pub warning: usize,
    pub notice: usize,
    pub info: usize,
    pub debug: usize,
}

impl SeverityCounts {
    pub fn from_text(text: &str) -> Self {
        let mut counts = Self::default();
        for line in text.lines() {
            counts.lines += 1;
            match detect_severity(line) {
                Severity::Critical => counts.critical += 1,
                Severity::Error => counts.error += 1,
                Severity::Warning => counts.warning += 1,
                Severity::Notice => counts.notice += 1,
                Severity::Info => counts.info += 1,
                Severity::Debug => counts.debug += 1,
            }
        }
        counts
    }
}
