//! Extension points of the collection pipeline.

use async_trait::async_trait;
use esl_protocol::DEFAULT_FIELDS;
use serde_json::Value;

use crate::collector::Collection;
use crate::error::{CollectionResult, GenerateResult};

/// Summarises the normalized console log into one value.
///
/// Stored under `console_log_plugins.<name>` of the main document.
pub trait ConsoleLogProcessor: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, console_log: &str) -> Value;
}

/// Adds extra data to the main document, stored under `build_data.<name>`.
#[async_trait]
pub trait BuildDataGatherer: Send + Sync {
    fn name(&self) -> &str;

    async fn gather(&self, collection: &Collection<'_>) -> CollectionResult<Value>;
}

/// Turns collected build data into zero or more event payloads.
#[async_trait]
pub trait EventGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Environment variables echoed into each event's `env_vars.envMap`.
    fn fields(&self) -> Vec<&'static str> {
        DEFAULT_FIELDS.to_vec()
    }

    async fn generate_events(&self, collection: &Collection<'_>) -> GenerateResult<Vec<Value>>;
}
