//! esl-console — console log handling for es-logger.
//!
//! Strips CI timestamp prefixes and ANSI escapes, keeps the tail of long
//! logs, and scans console text with a catalogue of named regex patterns
//! contributed by regex bundles.

pub mod bundles;
pub mod catalogue;
pub mod error;
pub mod file_bundle;
pub mod normalize;
pub mod severity;

pub use catalogue::{ConsoleMatch, NamedPattern, PatternCatalogue, RegexBundle};
pub use error::{ConsoleError, ConsoleResult};
pub use file_bundle::FileRegexBundle;
pub use normalize::{NormalizedLog, normalize, strip_ansi, strip_timestamps, truncate_tail};
pub use severity::{Severity, SeverityCounts, detect_severity};
