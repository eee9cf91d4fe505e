use async_trait::async_trait;
use esl_protocol::{Event, Settings};

use crate::error::{TargetError, TargetResult};
use crate::logstash::LogstashTarget;
use crate::sqs::SqsTarget;

// ── EventTarget trait ─────────────────────────────────────────

/// A sink for assembled events.
///
/// Status values count failed deliveries: 0 means everything was accepted.
#[async_trait]
pub trait EventTarget: Send {
    fn name(&self) -> &str;

    /// Local readiness check, run before any event is sent.
    fn validate(&self) -> bool;

    async fn send_event(&mut self, event: &Event) -> TargetResult<u32>;

    /// Flush anything still pending.
    async fn finish_send(&mut self) -> TargetResult<u32>;
}

// ── Registration ──────────────────────────────────────────────

pub type TargetFactory = fn(&Settings) -> TargetResult<Box<dyn EventTarget>>;

/// Static description of a target plus how to build one.
#[derive(Clone, Copy)]
pub struct TargetSpec {
    pub name: &'static str,
    pub help: &'static str,
    pub required_settings: &'static [&'static str],
    pub factory: TargetFactory,
}

impl std::fmt::Debug for TargetSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetSpec")
            .field("name", &self.name)
            .field("required_settings", &self.required_settings)
            .finish()
    }
}

impl TargetSpec {
    /// Build a fresh target after checking its required settings.
    pub fn create(&self, settings: &Settings) -> TargetResult<Box<dyn EventTarget>> {
        let missing = settings.missing(self.required_settings);
        if !missing.is_empty() {
            return Err(TargetError::Misconfigured {
                target: self.name.to_string(),
                missing: missing.into_iter().map(String::from).collect(),
            });
        }
        (self.factory)(settings)
    }
}

/// Built-in targets in registration order.
pub fn all_targets() -> Vec<TargetSpec> {
    vec![LogstashTarget::spec(), SqsTarget::spec()]
}
