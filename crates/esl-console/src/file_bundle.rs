//! Extra patterns loaded from a JSON file of `[{"name": .., "pattern": ..}]`.

use std::path::Path;

use serde::Deserialize;

use crate::catalogue::{NamedPattern, PatternCatalogue, RegexBundle};
use crate::error::{ConsoleError, ConsoleResult};

/// Default file name, looked up relative to the working directory.
pub const DEFAULT_REGEX_FILE: &str = "console_log_event_regex.json";

#[derive(Debug, Deserialize)]
struct PatternEntry {
    name: String,
    pattern: String,
}

/// Patterns read from a user-supplied file.
#[derive(Debug, Clone, Default)]
pub struct FileRegexBundle {
    patterns: Vec<NamedPattern>,
}

impl FileRegexBundle {
    /// Load the file if it exists; `Ok(None)` when it does not.
    pub fn load(path: impl AsRef<Path>) -> ConsoleResult<Option<Self>> {
        let path = path.as_ref();
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "regex file not found, no extra patterns");
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConsoleError::Io(e.to_string()))?;
        tracing::debug!(path = %path.display(), "loading console log patterns");
        Self::from_json(&contents).map(Some)
    }

    /// Parse the file contents. Patterns that fail to compile are skipped.
    pub fn from_json(contents: &str) -> ConsoleResult<Self> {
        let entries: Vec<PatternEntry> =
            serde_json::from_str(contents).map_err(|e| ConsoleError::Json(e.to_string()))?;
        let patterns = entries
            .into_iter()
            .filter_map(|entry| match NamedPattern::new(entry.name, &entry.pattern) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping console log pattern");
                    None
                }
            })
            .collect();
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl RegexBundle for FileRegexBundle {
    fn name(&self) -> &str {
        "file"
    }

    fn get_regex(&self, catalogue: &mut PatternCatalogue) {
        catalogue.extend(self.patterns.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entries_in_order() {
        let bundle = FileRegexBundle::from_json(
            r#"[{"name": "first", "pattern": "^a(?P<rest>.*)$"}, {"name": "second", "pattern": "b+"}]"#,
        )
        .unwrap();
        let mut catalogue = PatternCatalogue::new();
        bundle.get_regex(&mut catalogue);
        assert_eq!(catalogue.names().collect::<Vec<_>>(), ["first", "second"]);

        let matches = catalogue.scan("abc\nxbb");
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].named_matches["rest"], "bc");
    }

    #[test]
    fn invalid_pattern_is_skipped() {
        let bundle = FileRegexBundle::from_json(
            r#"[{"name": "bad", "pattern": "(oops"}, {"name": "good", "pattern": "ok"}]"#,
        )
        .unwrap();
        assert_eq!(bundle.len(), 1);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = FileRegexBundle::from_json(r#"{"name": "x"}"#).unwrap_err();
        assert!(matches!(err, ConsoleError::Json(_)));
    }

    #[test]
    fn missing_file_is_none() {
        let loaded = FileRegexBundle::load("/nonexistent/console_log_event_regex.json").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn load_from_disk() {
        let path = std::env::temp_dir().join(format!("esl-regex-{}.json", std::process::id()));
        std::fs::write(&path, r#"[{"name": "timeout", "pattern": "timed out after (?P<secs>\\d+)s"}]"#)
            .unwrap();
        let bundle = FileRegexBundle::load(&path).unwrap().unwrap();
        std::fs::remove_file(&path).unwrap();

        let mut catalogue = PatternCatalogue::new();
        bundle.get_regex(&mut catalogue);
        let matches = catalogue.scan("step timed out after 30s");
        assert_eq!(matches[0].named_matches["secs"], "30");
    }
}
