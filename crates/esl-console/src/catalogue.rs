//! Named regex patterns and the scanner that turns matches into records.

use fancy_regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ConsoleError, ConsoleResult};

/// Catalogue patterns may backtrack heavily on very large logs.
const BACKTRACK_LIMIT: usize = 10_000_000;

/// A named, compiled console pattern.
#[derive(Debug, Clone)]
pub struct NamedPattern {
    pub name: String,
    pub regex: Regex,
}

impl NamedPattern {
    /// Compile `pattern` in multi-line mode.
    pub fn new(name: impl Into<String>, pattern: &str) -> ConsoleResult<Self> {
        let name = name.into();
        let regex = RegexBuilder::new(&format!("(?m){pattern}"))
            .backtrack_limit(BACKTRACK_LIMIT)
            .build()
            .map_err(|e| ConsoleError::Pattern {
                name: name.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { name, regex })
    }
}

/// A source of console patterns, resolved by name at startup.
pub trait RegexBundle: Send + Sync {
    /// Registered bundle name.
    fn name(&self) -> &str;

    /// Append this bundle's patterns to `catalogue`.
    fn get_regex(&self, catalogue: &mut PatternCatalogue);
}

/// One match of one catalogue pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsoleMatch {
    pub name: String,
    #[serde(rename = "match")]
    pub matched: String,
    /// Every named group of the pattern; `null` when the group did not take part.
    pub named_matches: Map<String, Value>,
}

/// Ordered list of patterns; scanning preserves this order.
#[derive(Debug, Clone, Default)]
pub struct PatternCatalogue {
    patterns: Vec<NamedPattern>,
}

impl PatternCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalogue from bundles, in the order given.
    pub fn from_bundles<'a>(bundles: impl IntoIterator<Item = &'a dyn RegexBundle>) -> Self {
        let mut catalogue = Self::new();
        for bundle in bundles {
            let before = catalogue.len();
            bundle.get_regex(&mut catalogue);
            tracing::debug!(
                bundle = bundle.name(),
                added = catalogue.len() - before,
                total = catalogue.len(),
                "loaded regex bundle"
            );
        }
        catalogue
    }

    pub fn push(&mut self, pattern: NamedPattern) {
        self.patterns.push(pattern);
    }

    /// Compile and append a pattern known to be valid.
    ///
    /// Built-in bundles only; user-supplied patterns go through [`NamedPattern::new`].
    pub(crate) fn push_builtin(&mut self, name: &str, pattern: &str) {
        match NamedPattern::new(name, pattern) {
            Ok(p) => self.patterns.push(p),
            Err(e) => tracing::error!(error = %e, "built-in pattern failed to compile"),
        }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.name.as_str())
    }

    /// Run every pattern over `text`, patterns in catalogue order and
    /// matches in text order within a pattern.
    ///
    /// A search that exceeds the backtracking budget is abandoned for the
    /// current line only; the scan resumes at the next line.
    pub fn scan(&self, text: &str) -> Vec<ConsoleMatch> {
        let mut out = Vec::new();
        for pattern in &self.patterns {
            tracing::debug!(pattern = %pattern.name, "starting regex");
            let group_names: Vec<&str> = pattern.regex.capture_names().flatten().collect();
            let mut pos = 0;
            while pos <= text.len() {
                let caps = match pattern.regex.captures_from_pos(text, pos) {
                    Ok(Some(caps)) => caps,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(
                            pattern = %pattern.name,
                            error = %e,
                            offset = pos,
                            "regex evaluation aborted, resuming at next line"
                        );
                        match next_line(text, pos) {
                            Some(next) => {
                                pos = next;
                                continue;
                            }
                            None => break,
                        }
                    }
                };
                let Some(whole) = caps.get(0) else { break };
                pos = if whole.end() > whole.start() {
                    whole.end()
                } else {
                    match text[whole.end()..].chars().next() {
                        Some(c) => whole.end() + c.len_utf8(),
                        None => text.len() + 1,
                    }
                };
                let named_matches = group_names
                    .iter()
                    .map(|name| {
                        let value = caps
                            .name(name)
                            .map_or(Value::Null, |m| Value::String(m.as_str().to_string()));
                        (name.to_string(), value)
                    })
                    .collect();
                out.push(ConsoleMatch {
                    name: pattern.name.clone(),
                    matched: whole.as_str().to_string(),
                    named_matches,
                });
            }
        }
        out
    }
}

/// Start of the line after the one containing `pos`.
fn next_line(text: &str, pos: usize) -> Option<usize> {
    text[pos..]
        .find('\n')
        .map(|nl| pos + nl + 1)
        .filter(|&next| next < text.len())
}

impl Extend<NamedPattern> for PatternCatalogue {
    fn extend<T: IntoIterator<Item = NamedPattern>>(&mut self, iter: T) {
        self.patterns.extend(iter);
    }
}
