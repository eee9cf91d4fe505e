//! Wraps generator payloads into self-contained events.

use esl_protocol::{DEFAULT_BUILD_INFO_FIELDS, Event, SELF_METADATA_KEY};
use serde_json::{Map, Value};

use crate::collector::CollectedData;
use crate::plugin::EventGenerator;

/// Adds build context to every payload a generator emits.
#[derive(Debug, Clone)]
pub struct EventAssembler {
    build_info_fields: Vec<String>,
    legacy_top_level_fields: bool,
}

impl Default for EventAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_BUILD_INFO_FIELDS.iter().map(|f| f.to_string()).collect())
    }
}

impl EventAssembler {
    pub fn new(build_info_fields: Vec<String>) -> Self {
        Self {
            build_info_fields,
            legacy_top_level_fields: true,
        }
    }

    /// Also copy each build info field to the top level of the event.
    pub fn legacy_top_level_fields(mut self, enabled: bool) -> Self {
        self.legacy_top_level_fields = enabled;
        self
    }

    /// One event per payload, in emission order.
    ///
    /// The payload sits under the generator's name; `build_info`, `env_vars`,
    /// `parameters` and the self-metadata block come from `data`.
    pub fn assemble(
        &self,
        generator: &dyn EventGenerator,
        payloads: Vec<Value>,
        data: &CollectedData,
    ) -> Vec<Event> {
        let name = generator.name();
        let context = self.context(name, &generator.fields(), data);
        let timestamp = data.build_info.get("timestamp").cloned().unwrap_or(Value::Null);

        payloads
            .into_iter()
            .map(|payload| {
                let mut event = Event::new();
                event.insert(name.to_string(), payload);
                event.extend(context.clone());
                if let Some(Value::Object(build_info)) = event.get_mut("build_info") {
                    build_info.insert("timestamp".into(), timestamp.clone());
                }
                event
            })
            .collect()
    }

    /// Keys shared by every event of one generator.
    fn context(&self, generator: &str, fields: &[&str], data: &CollectedData) -> Map<String, Value> {
        let mut context = Map::new();

        if let Some(env_vars) = &data.env_vars {
            let env_map = env_vars.get("envMap");
            let echoed: Map<String, Value> = fields
                .iter()
                .map(|field| {
                    let value = env_map.and_then(|m| m.get(*field)).cloned().unwrap_or(Value::Null);
                    (field.to_string(), value)
                })
                .collect();
            let mut env = Map::new();
            env.insert("envMap".into(), Value::Object(echoed));
            context.insert("env_vars".into(), Value::Object(env));
        }

        if !data.parameters.is_empty() {
            context.insert("parameters".into(), Value::Object(data.parameters.clone()));
        }

        let mut build_info = Map::new();
        for field in &self.build_info_fields {
            let value = data
                .build_info
                .get(field)
                .cloned()
                .unwrap_or_else(|| Value::String(String::new()));
            if self.legacy_top_level_fields {
                context.insert(field.clone(), value.clone());
            }
            build_info.insert(field.clone(), value);
        }
        context.insert("build_info".into(), Value::Object(build_info));

        context.insert(
            SELF_METADATA_KEY.into(),
            data.metadata.for_generator(generator).to_value(),
        );
        context
    }
}
