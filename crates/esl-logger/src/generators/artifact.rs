//! Events a build saved for itself as a JSON artifact.

use async_trait::async_trait;
use serde_json::Value;

use crate::collector::Collection;
use crate::error::GenerateResult;
use crate::plugin::EventGenerator;

/// Setting naming the artifact to read.
pub const ARTIFACT_SETTING: &str = "ES_EVENT_ARTIFACT";
pub const DEFAULT_ARTIFACT: &str = "es-logger-data.json";

/// Re-emits the JSON array stored in the build's event artifact.
///
/// A missing, unreadable or malformed artifact yields no events.
pub struct ArtifactGenerator;

#[async_trait]
impl EventGenerator for ArtifactGenerator {
    fn name(&self) -> &str {
        "artifact"
    }

    async fn generate_events(&self, collection: &Collection<'_>) -> GenerateResult<Vec<Value>> {
        let artifact = collection.settings().get_or(ARTIFACT_SETTING, DEFAULT_ARTIFACT);

        let archived = collection
            .build_info()
            .get("artifacts")
            .and_then(Value::as_array)
            .is_some_and(|list| {
                list.iter()
                    .any(|a| a.get("relativePath").and_then(Value::as_str) == Some(artifact))
            });
        if !archived {
            tracing::info!(artifact, "no saved event data found");
            return Ok(Vec::new());
        }

        let identity = collection.identity();
        let raw = match collection
            .api()
            .get_build_artifact(&identity.job_name, identity.build_number, artifact)
            .await
        {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::info!(artifact, "no saved event data found");
                return Ok(Vec::new());
            }
            Err(e) => {
                tracing::warn!(artifact, error = %e, "failed to fetch event artifact");
                return Ok(Vec::new());
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(events)) => {
                tracing::debug!(artifact, events = events.len(), "loaded artifact events");
                Ok(events)
            }
            Ok(other) => {
                tracing::warn!(artifact, data = %other, "event artifact is not a JSON array");
                Ok(Vec::new())
            }
            Err(e) => {
                tracing::warn!(artifact, error = %e, data = %raw, "event artifact is not valid JSON");
                Ok(Vec::new())
            }
        }
    }
}
