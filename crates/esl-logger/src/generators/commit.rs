//! One event per change set item of the build.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::collector::Collection;
use crate::error::GenerateResult;
use crate::plugin::EventGenerator;

pub struct CommitGenerator;

/// Rewrite `2018-03-07 09:22:36 +0000` as `2018-03-07T09:22:36+0000`.
///
/// Dates without a space are returned unchanged; so are dates with fewer
/// than three space separated parts.
pub fn repair_commit_date(date: &str) -> Option<String> {
    if !date.contains(' ') {
        return None;
    }
    let parts: Vec<&str> = date.split_whitespace().collect();
    match parts.as_slice() {
        [day, time, zone, ..] => Some(format!("{day}T{time}{zone}")),
        _ => {
            tracing::debug!(date, "unrecognised change set date, leaving as is");
            None
        }
    }
}

fn change_items(build_info: &Value) -> Vec<&Value> {
    // Pipeline jobs report a list of change sets, freestyle jobs a single one
    let multi = build_info
        .get("changeSets")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|set| set.get("items").and_then(Value::as_array))
        .flatten();
    let single = build_info
        .pointer("/changeSet/items")
        .and_then(Value::as_array)
        .into_iter()
        .flatten();
    multi.chain(single).collect()
}

#[async_trait]
impl EventGenerator for CommitGenerator {
    fn name(&self) -> &str {
        "commit"
    }

    async fn generate_events(&self, collection: &Collection<'_>) -> GenerateResult<Vec<Value>> {
        let data = collection.data();
        let build_data = if data.build_data.is_empty() {
            Value::Null
        } else {
            Value::Object(data.build_data.clone())
        };

        let events = change_items(collection.build_info())
            .into_iter()
            .map(|item| {
                let mut item = item.clone();
                let repaired = item
                    .get("date")
                    .and_then(Value::as_str)
                    .and_then(repair_commit_date);
                if let (Some(date), Some(obj)) = (repaired, item.as_object_mut()) {
                    obj.insert("date".to_string(), Value::String(date));
                }
                let mut event = Map::new();
                event.insert("changeSet".to_string(), item);
                event.insert("build_data".to_string(), build_data.clone());
                Value::Object(event)
            })
            .collect();
        Ok(events)
    }
}
