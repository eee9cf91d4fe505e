//! Name-indexed registry of every built-in extension.
//!
//! Extensions are selected by name from configuration; names are resolved
//! once, before any CI traffic, so a typo fails the run up front.

use std::fmt;
use std::sync::Arc;

use esl_console::RegexBundle;
use esl_console::bundles::all_bundles;
use esl_targets::{TargetSpec, all_targets};

use crate::error::{RegistryError, RegistryResult};
use crate::gatherers::ArtifactsGatherer;
use crate::generators::all_generators;
use crate::plugin::{BuildDataGatherer, ConsoleLogProcessor, EventGenerator};
use crate::processors::SeverityCountsProcessor;

/// Extension categories, in listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    BuildDataGatherer,
    ConsoleLogProcessor,
    EventGenerator,
    ConsoleLogEvents,
    EventTarget,
}

impl PluginKind {
    pub const ALL: [PluginKind; 5] = [
        Self::BuildDataGatherer,
        Self::ConsoleLogProcessor,
        Self::EventGenerator,
        Self::ConsoleLogEvents,
        Self::EventTarget,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuildDataGatherer => "gather_build_data",
            Self::ConsoleLogProcessor => "console_log_processor",
            Self::EventGenerator => "event_generator",
            Self::ConsoleLogEvents => "event_generator.console_log_events",
            Self::EventTarget => "event_target",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct PluginRegistry {
    processors: Vec<Arc<dyn ConsoleLogProcessor>>,
    gatherers: Vec<Arc<dyn BuildDataGatherer>>,
    generators: Vec<Arc<dyn EventGenerator>>,
    bundles: Vec<Box<dyn RegexBundle>>,
    targets: Vec<TargetSpec>,
}

impl PluginRegistry {
    /// An empty registry; see [`PluginRegistry::with_defaults`].
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
            gatherers: Vec::new(),
            generators: Vec::new(),
            bundles: Vec::new(),
            targets: Vec::new(),
        }
    }

    /// Every built-in extension, in a fixed order.
    pub fn with_defaults() -> Self {
        Self {
            processors: vec![Arc::new(SeverityCountsProcessor)],
            gatherers: vec![Arc::new(ArtifactsGatherer)],
            generators: all_generators(),
            bundles: all_bundles(),
            targets: all_targets(),
        }
    }

    pub fn register_processor(mut self, processor: Arc<dyn ConsoleLogProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    pub fn register_gatherer(mut self, gatherer: Arc<dyn BuildDataGatherer>) -> Self {
        self.gatherers.push(gatherer);
        self
    }

    pub fn register_generator(mut self, generator: Arc<dyn EventGenerator>) -> Self {
        self.generators.push(generator);
        self
    }

    pub fn register_bundle(mut self, bundle: Box<dyn RegexBundle>) -> Self {
        self.bundles.push(bundle);
        self
    }

    pub fn register_target(mut self, target: TargetSpec) -> Self {
        self.targets.push(target);
        self
    }

    /// Registered names of one category, in registration order.
    pub fn list(&self, kind: PluginKind) -> Vec<&str> {
        match kind {
            PluginKind::ConsoleLogProcessor => self.processors.iter().map(|p| p.name()).collect(),
            PluginKind::BuildDataGatherer => self.gatherers.iter().map(|g| g.name()).collect(),
            PluginKind::EventGenerator => self.generators.iter().map(|g| g.name()).collect(),
            PluginKind::ConsoleLogEvents => self.bundles.iter().map(|b| b.name()).collect(),
            PluginKind::EventTarget => self.targets.iter().map(|t| t.name).collect(),
        }
    }

    /// Listing printed by `--list-plugins`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for kind in PluginKind::ALL {
            out.push_str(&format!("es_logger.plugins.{kind}:\n"));
            let names = self.list(kind);
            if names.is_empty() {
                out.push_str("\tNone found\n");
            }
            for name in names {
                out.push_str(&format!("\t{name}\n"));
            }
        }
        out
    }

    /// Help text of every target, for `--help`.
    pub fn target_help(&self) -> String {
        self.targets
            .iter()
            .map(|t| t.help.trim_end())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn resolve_processors(&self, names: &[String]) -> RegistryResult<Vec<Arc<dyn ConsoleLogProcessor>>> {
        resolve(PluginKind::ConsoleLogProcessor, &self.processors, names, |p| p.name())
    }

    pub fn resolve_gatherers(&self, names: &[String]) -> RegistryResult<Vec<Arc<dyn BuildDataGatherer>>> {
        resolve(PluginKind::BuildDataGatherer, &self.gatherers, names, |g| g.name())
    }

    pub fn resolve_generators(&self, names: &[String]) -> RegistryResult<Vec<Arc<dyn EventGenerator>>> {
        resolve(PluginKind::EventGenerator, &self.generators, names, |g| g.name())
    }

    pub fn resolve_targets(&self, names: &[String]) -> RegistryResult<Vec<TargetSpec>> {
        resolve(PluginKind::EventTarget, &self.targets, names, |t| t.name)
    }

    /// Every registered regex bundle, in registration order.
    pub fn bundles(&self) -> impl Iterator<Item = &dyn RegexBundle> {
        self.bundles.iter().map(|b| &**b)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Look up each name in order; duplicates resolve to the same entry twice.
fn resolve<T: Clone>(
    kind: PluginKind,
    registered: &[T],
    names: &[String],
    name_of: impl Fn(&T) -> &str,
) -> RegistryResult<Vec<T>> {
    names
        .iter()
        .map(|name| {
            registered
                .iter()
                .find(|&entry| name_of(entry) == name.as_str())
                .cloned()
                .ok_or_else(|| RegistryError::UnknownPlugin {
                    kind,
                    name: name.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_in_registration_order() {
        let registry = PluginRegistry::with_defaults();
        assert_eq!(registry.list(PluginKind::ConsoleLogProcessor), ["severity_counts"]);
        assert_eq!(registry.list(PluginKind::BuildDataGatherer), ["artifacts"]);
        assert_eq!(
            registry.list(PluginKind::EventGenerator),
            [
                "commit",
                "junit",
                "stages",
                "console_log_events",
                "ansible_recap",
                "ansible_fatal",
                "artifact"
            ]
        );
        assert_eq!(registry.list(PluginKind::ConsoleLogEvents), ["eslogger", "ansible"]);
        assert_eq!(registry.list(PluginKind::EventTarget), ["logstash", "sqs"]);
    }

    #[test]
    fn resolve_keeps_requested_order() {
        let registry = PluginRegistry::with_defaults();
        let generators = registry.resolve_generators(&names(&["stages", "commit"])).unwrap();
        let resolved: Vec<_> = generators.iter().map(|g| g.name()).collect();
        assert_eq!(resolved, ["stages", "commit"]);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let registry = PluginRegistry::with_defaults();
        let err = registry.resolve_targets(&names(&["logstash", "kafka"])).unwrap_err();
        assert_eq!(err.to_string(), "unknown event_target plugin: kafka");
    }

    #[test]
    fn describe_lists_every_category() {
        let listing = PluginRegistry::new()
            .register_gatherer(Arc::new(ArtifactsGatherer))
            .describe();
        assert_eq!(
            listing,
            "es_logger.plugins.gather_build_data:\n\tartifacts\n\
             es_logger.plugins.console_log_processor:\n\tNone found\n\
             es_logger.plugins.event_generator:\n\tNone found\n\
             es_logger.plugins.event_generator.console_log_events:\n\tNone found\n\
             es_logger.plugins.event_target:\n\tNone found\n"
        );
    }

    #[test]
    fn target_help_mentions_settings() {
        let help = PluginRegistry::with_defaults().target_help();
        assert!(help.contains("LOGSTASH_SERVER"));
        assert!(help.contains("SQS_QUEUE"));
    }
}
