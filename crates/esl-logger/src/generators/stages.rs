//! One event per pipeline stage.

use async_trait::async_trait;
use serde_json::Value;

use crate::collector::Collection;
use crate::error::GenerateResult;
use crate::plugin::EventGenerator;

pub struct StagesGenerator;

#[async_trait]
impl EventGenerator for StagesGenerator {
    fn name(&self) -> &str {
        "stages"
    }

    async fn generate_events(&self, collection: &Collection<'_>) -> GenerateResult<Vec<Value>> {
        let stages = collection
            .stages()
            .await?
            .and_then(|report| report.get("stages"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        tracing::debug!(stages = stages.len(), "finished stage events");
        Ok(stages)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::collector::fixture::{self, Fixture};

    #[tokio::test]
    async fn stages_in_order() {
        let fx = Fixture::new(fixture::jenkins().with_stages(json!({
            "name": "#42",
            "status": "SUCCESS",
            "stages": [{"name": "checkout"}, {"name": "build"}, {"name": "test"}]
        })));
        let collection = fx.collect().await;
        let events = StagesGenerator.generate_events(&collection).await.unwrap();
        let names: Vec<_> = events.iter().map(|e| e["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["checkout", "build", "test"]);
    }

    #[tokio::test]
    async fn no_stage_graph_no_events() {
        let fx = Fixture::new(fixture::jenkins());
        let collection = fx.collect().await;
        assert!(StagesGenerator.generate_events(&collection).await.unwrap().is_empty());

        let fx = Fixture::new(fixture::jenkins().with_stages(json!({"name": "#42"})));
        let collection = fx.collect().await;
        assert!(StagesGenerator.generate_events(&collection).await.unwrap().is_empty());
    }
}
