//! Built-in regex bundles, in registration order.

mod ansible;
mod eslogger;

pub use ansible::AnsibleRegexBundle;
pub use eslogger::EsLoggerRegexBundle;

use crate::catalogue::RegexBundle;

/// Every built-in bundle, in a fixed order.
pub fn all_bundles() -> Vec<Box<dyn RegexBundle>> {
    vec![Box::new(EsLoggerRegexBundle), Box::new(AnsibleRegexBundle)]
}
