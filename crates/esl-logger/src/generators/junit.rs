//! Test results fanned out into case, suite and total events.

use async_trait::async_trait;
use esl_protocol::DEFAULT_FIELDS;
use serde_json::{Map, Value};

use crate::collector::Collection;
use crate::error::GenerateResult;
use crate::plugin::EventGenerator;

const ERROR_DETAILS_LIMIT: usize = 255;

pub struct JunitGenerator;

#[async_trait]
impl EventGenerator for JunitGenerator {
    fn name(&self) -> &str {
        "junit"
    }

    fn fields(&self) -> Vec<&'static str> {
        let mut fields = DEFAULT_FIELDS.to_vec();
        fields.extend(["GERRIT_PATCHSET_REVISION", "GERRIT_REFSPEC"]);
        fields
    }

    async fn generate_events(&self, collection: &Collection<'_>) -> GenerateResult<Vec<Value>> {
        tracing::debug!("starting junit events");
        let events = match collection.test_report().await? {
            Some(report) => fan_out_test_report(report),
            None => Vec::new(),
        };
        tracing::debug!(events = events.len(), "finished junit events");
        Ok(events)
    }
}

#[derive(Default)]
struct Tally {
    pass: u64,
    skip: u64,
    fail: u64,
    unknown: u64,
}

impl Tally {
    fn count(&mut self, status: Option<&str>) {
        match status {
            Some("PASSED") => self.pass += 1,
            Some("SKIPPED") => self.skip += 1,
            Some("FAILED") => self.fail += 1,
            _ => self.unknown += 1,
        }
    }

    fn total(&self) -> u64 {
        self.pass + self.skip + self.fail + self.unknown
    }
}

/// Case events, then their suite summary, suite by suite; the annotated
/// report total comes last. `report` itself is not modified.
pub fn fan_out_test_report(report: &Value) -> Vec<Value> {
    let mut total = report.as_object().cloned().unwrap_or_default();
    let suites = total.remove("suites");

    let count = |key: &str| total.get(key).and_then(Value::as_u64).unwrap_or(0);
    let total_count = count("failCount") + count("skipCount") + count("passCount");
    total.insert("type".to_string(), "total".into());
    total.insert("totalCount".to_string(), total_count.into());

    let mut events = Vec::new();
    for suite in suites.as_ref().and_then(Value::as_array).into_iter().flatten() {
        let mut suite = suite.as_object().cloned().unwrap_or_default();
        let cases = suite.remove("cases");
        let suite_name = suite.get("name").cloned().unwrap_or(Value::Null);

        let mut tally = Tally::default();
        for case in cases.as_ref().and_then(Value::as_array).into_iter().flatten() {
            let mut case: Map<String, Value> = case.as_object().cloned().unwrap_or_default();
            case.insert("suite".to_string(), suite_name.clone());
            tally.count(case.get("status").and_then(Value::as_str));
            case.insert("type".to_string(), "case".into());
            if let Some(details) = case.get("errorDetails") {
                let truncated = match details {
                    Value::String(text) => {
                        Value::String(text.chars().take(ERROR_DETAILS_LIMIT).collect())
                    }
                    other => other.clone(),
                };
                case.insert("errorDetailsTruncated".to_string(), truncated);
            }
            events.push(Value::Object(case));
        }

        suite.insert("passCount".to_string(), tally.pass.into());
        suite.insert("skipCount".to_string(), tally.skip.into());
        suite.insert("failCount".to_string(), tally.fail.into());
        suite.insert("unknownCount".to_string(), tally.unknown.into());
        suite.insert("totalCount".to_string(), tally.total().into());
        suite.insert("type".to_string(), "suite".into());
        events.push(Value::Object(suite));
    }

    events.push(Value::Object(total));
    events
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::collector::fixture::{self, Fixture};

    fn report() -> Value {
        json!({
            "failCount": 1,
            "skipCount": 1,
            "passCount": 1,
            "duration": 1.5,
            "suites": [
                {"name": "suite-a", "duration": 1.0, "cases": [
                    {"name": "t1", "status": "PASSED", "errorDetails": null},
                    {"name": "t2", "status": "FAILED", "errorDetails": "x".repeat(300)}
                ]},
                {"name": "suite-b", "cases": [
                    {"name": "t3", "status": "SKIPPED"}
                ]}
            ]
        })
    }

    #[test]
    fn fan_out_order_and_counts() {
        let events = fan_out_test_report(&report());
        assert_eq!(events.len(), 6);

        let kinds: Vec<_> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
        assert_eq!(kinds, ["case", "case", "suite", "case", "suite", "total"]);

        assert_eq!(events[0]["suite"], "suite-a");
        assert_eq!(events[0]["errorDetailsTruncated"], Value::Null);
        assert_eq!(events[1]["errorDetailsTruncated"].as_str().unwrap().len(), 255);
        assert_eq!(events[1]["errorDetails"].as_str().unwrap().len(), 300);
        assert!(events[3].get("errorDetailsTruncated").is_none());

        assert_eq!(events[2]["passCount"], 1);
        assert_eq!(events[2]["failCount"], 1);
        assert_eq!(events[2]["totalCount"], 2);
        assert!(events[2].get("cases").is_none());
        assert_eq!(events[4]["skipCount"], 1);
        assert_eq!(events[4]["totalCount"], 1);

        let total = &events[5];
        assert_eq!(total["totalCount"], 3);
        assert_eq!(total["duration"], 1.5);
        assert!(total.get("suites").is_none());
    }

    #[test]
    fn unknown_statuses_are_tallied() {
        let report = json!({"suites": [{"name": "s", "cases": [
            {"status": "REGRESSION"}, {"status": "FIXED"}, {}
        ]}]});
        let events = fan_out_test_report(&report);
        assert_eq!(events[3]["unknownCount"], 3);
        assert_eq!(events[3]["totalCount"], 3);
        assert_eq!(events[4]["totalCount"], 0);
    }

    #[test]
    fn input_report_is_untouched() {
        let report = report();
        let before = report.clone();
        fan_out_test_report(&report);
        assert_eq!(report, before);
    }

    #[tokio::test]
    async fn no_report_no_events() {
        let fx = Fixture::new(fixture::jenkins());
        let collection = fx.collect().await;
        assert!(JunitGenerator.generate_events(&collection).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn generates_from_cached_report_and_keeps_main_document_whole() {
        let fx = Fixture::new(fixture::jenkins().with_test_report(report()));
        let collection = fx.collect().await;

        let first = JunitGenerator.generate_events(&collection).await.unwrap();
        let second = JunitGenerator.generate_events(&collection).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fx.jenkins.call_count("get_build_test_report"), 1);

        let doc = collection.main_document().unwrap();
        assert_eq!(doc["test_report"]["suites"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn declares_gerrit_fields() {
        let fields = JunitGenerator.fields();
        assert_eq!(
            fields,
            ["BUILD_NUMBER", "JOB_NAME", "BUILD_URL", "GERRIT_PATCHSET_REVISION", "GERRIT_REFSPEC"]
        );
    }
}
