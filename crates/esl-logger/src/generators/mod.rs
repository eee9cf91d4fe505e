//! Built-in event generators.

mod ansible;
mod artifact;
mod commit;
mod console_log_events;
mod junit;
mod stages;

use std::sync::Arc;

pub use ansible::{AnsibleFatalGenerator, AnsibleRecapGenerator, fatal_events, recap_events};
pub use artifact::{ARTIFACT_SETTING, ArtifactGenerator, DEFAULT_ARTIFACT};
pub use commit::{CommitGenerator, repair_commit_date};
pub use console_log_events::ConsoleLogEventsGenerator;
pub use junit::{JunitGenerator, fan_out_test_report};
pub use stages::StagesGenerator;

use crate::plugin::EventGenerator;

/// Every built-in generator, in registration order.
pub fn all_generators() -> Vec<Arc<dyn EventGenerator>> {
    vec![
        Arc::new(CommitGenerator),
        Arc::new(JunitGenerator),
        Arc::new(StagesGenerator),
        Arc::new(ConsoleLogEventsGenerator),
        Arc::new(AnsibleRecapGenerator),
        Arc::new(AnsibleFatalGenerator),
        Arc::new(ArtifactGenerator),
    ]
}
