//! Built-in build data gatherers.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::collector::Collection;
use crate::error::CollectionResult;
use crate::plugin::BuildDataGatherer;

/// Lists the build's archived artifacts.
pub struct ArtifactsGatherer;

#[async_trait]
impl BuildDataGatherer for ArtifactsGatherer {
    fn name(&self) -> &str {
        "artifacts"
    }

    async fn gather(&self, collection: &Collection<'_>) -> CollectionResult<Value> {
        let paths: Vec<&str> = collection
            .build_info()
            .get("artifacts")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|a| a.get("relativePath").and_then(Value::as_str))
            .collect();
        Ok(json!({"count": paths.len(), "paths": paths}))
    }
}
