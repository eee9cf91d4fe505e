//! Console log matches against the regex catalogue.

use async_trait::async_trait;
use esl_protocol::DEFAULT_FIELDS;
use serde_json::{Value, json};

use crate::collector::Collection;
use crate::error::GenerateResult;
use crate::plugin::EventGenerator;

pub struct ConsoleLogEventsGenerator;

#[async_trait]
impl EventGenerator for ConsoleLogEventsGenerator {
    fn name(&self) -> &str {
        "console_log_events"
    }

    fn fields(&self) -> Vec<&'static str> {
        let mut fields = DEFAULT_FIELDS.to_vec();
        fields.extend(["NODE_NAME", "NODE_LABELS"]);
        fields
    }

    async fn generate_events(&self, collection: &Collection<'_>) -> GenerateResult<Vec<Value>> {
        let catalogue = collection.catalogue();
        tracing::debug!(patterns = catalogue.len(), "scanning console log");
        let events = catalogue
            .scan(collection.console_log())
            .into_iter()
            .map(|m| {
                json!({
                    "name": m.name,
                    "match": m.matched,
                    "named_matches": m.named_matches,
                })
            })
            .collect();
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use esl_console::bundles::all_bundles;
    use esl_console::{FileRegexBundle, PatternCatalogue, RegexBundle};

    use super::*;
    use crate::collector::fixture::{self, Fixture};

    const CONSOLE: &str = "\
Running on agent-7 in /var/lib/jenkins/workspace/app
[Pipeline] sh
ERROR: script returned exit code 2
[Pipeline] End of Pipeline
Finished: FAILURE
";

    #[tokio::test]
    async fn scans_full_console_with_every_bundle() {
        let mut catalogue = PatternCatalogue::from_bundles(all_bundles().iter().map(|b| &**b));
        let file = FileRegexBundle::from_json(r#"[{"name": "finish", "pattern": "^Finished: (?P<result>\\w+)$"}]"#)
            .unwrap();
        file.get_regex(&mut catalogue);

        let fx = Fixture::new(fixture::jenkins().with_console(CONSOLE)).with_catalogue(catalogue);
        let collection = fx.collect().await;
        let events = ConsoleLogEventsGenerator.generate_events(&collection).await.unwrap();

        let names: Vec<_> = events.iter().map(|e| e["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["jenkins agent", "jenkins error", "finish"]);
        assert_eq!(events[0]["named_matches"]["jenkins_agent"], "agent-7");
        assert_eq!(events[0]["named_matches"]["workspace"], "/var/lib/jenkins/workspace/app");
        assert_eq!(events[1]["named_matches"]["error_text"], "script returned exit code 2");
        assert_eq!(events[2]["match"], "Finished: FAILURE");
        assert_eq!(events[2]["named_matches"]["result"], "FAILURE");
    }

    #[tokio::test]
    async fn empty_catalogue_no_events() {
        let fx = Fixture::new(fixture::jenkins().with_console(CONSOLE));
        let collection = fx.collect().await;
        assert!(ConsoleLogEventsGenerator.generate_events(&collection).await.unwrap().is_empty());
    }

    #[test]
    fn declares_node_fields() {
        let fields = ConsoleLogEventsGenerator.fields();
        assert!(fields.ends_with(&["NODE_NAME", "NODE_LABELS"]));
    }
}
