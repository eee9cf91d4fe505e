//! Built-in console log processors.

use esl_console::SeverityCounts;
use serde_json::Value;

use crate::plugin::ConsoleLogProcessor;

/// Counts console lines per severity.
pub struct SeverityCountsProcessor;

impl ConsoleLogProcessor for SeverityCountsProcessor {
    fn name(&self) -> &str {
        "severity_counts"
    }

    fn process(&self, console_log: &str) -> Value {
        serde_json::json!(SeverityCounts::from_text(console_log))
    }
}
