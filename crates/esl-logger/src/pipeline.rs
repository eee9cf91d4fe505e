//! One build, end to end: collect, generate, assemble, deliver.

use std::io::Write;
use std::sync::Arc;

use esl_console::{FileRegexBundle, PatternCatalogue, RegexBundle};
use esl_jenkins::JenkinsApi;
use esl_protocol::{BuildIdentity, Event, Settings};
use esl_targets::{EventTarget, TargetSpec};

use crate::assembler::EventAssembler;
use crate::collector::Collector;
use crate::config::{PipelineConfig, RunOptions};
use crate::error::{PipelineError, PipelineResult};
use crate::plugin::{BuildDataGatherer, ConsoleLogProcessor, EventGenerator};
use crate::registry::PluginRegistry;

/// The main document and every generated event of one build.
#[derive(Debug, Clone, PartialEq)]
pub struct Gathered {
    pub main: Event,
    pub events: Vec<Event>,
}

impl Gathered {
    /// Documents in delivery order: the main document first unless skipped.
    pub fn documents(&self, events_only: bool) -> impl Iterator<Item = &Event> {
        let main = (!events_only).then_some(&self.main);
        main.into_iter().chain(&self.events)
    }
}

/// Resolved extensions and settings, reusable across builds.
pub struct Pipeline {
    config: PipelineConfig,
    processors: Vec<Arc<dyn ConsoleLogProcessor>>,
    gatherers: Vec<Arc<dyn BuildDataGatherer>>,
    generators: Vec<Arc<dyn EventGenerator>>,
    targets: Vec<TargetSpec>,
    catalogue: PatternCatalogue,
    assembler: EventAssembler,
}

impl Pipeline {
    /// Resolve every configured extension name; unknown names fail here.
    pub fn new(registry: &PluginRegistry, config: PipelineConfig) -> PipelineResult<Self> {
        let processors = registry.resolve_processors(&config.process_console_logs)?;
        let gatherers = registry.resolve_gatherers(&config.gather_build_data)?;
        let generators = registry.resolve_generators(&config.generate_events)?;
        let targets = registry.resolve_targets(&config.targets)?;

        let mut catalogue = PatternCatalogue::from_bundles(registry.bundles());
        if let Some(path) = &config.regex_file {
            match FileRegexBundle::load(path) {
                Ok(Some(bundle)) => bundle.get_regex(&mut catalogue),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring regex file");
                }
            }
        }

        let assembler = EventAssembler::new(config.build_info_fields.clone())
            .legacy_top_level_fields(config.legacy_top_level_fields);

        tracing::info!(
            targets = ?config.targets,
            generators = ?config.generate_events,
            patterns = catalogue.len(),
            "pipeline configured"
        );

        Ok(Self {
            config,
            processors,
            gatherers,
            generators,
            targets,
            catalogue,
            assembler,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalogue(&self) -> &PatternCatalogue {
        &self.catalogue
    }

    /// Fresh instances of every configured target, checked for readiness.
    pub fn create_targets(&self, settings: &Settings) -> PipelineResult<Vec<Box<dyn EventTarget>>> {
        self.targets
            .iter()
            .map(|spec| {
                let target = spec.create(settings)?;
                if !target.validate() {
                    return Err(PipelineError::Config(format!(
                        "target {} is not ready",
                        spec.name
                    )));
                }
                Ok(target)
            })
            .collect()
    }

    /// Collect the build and run every generator over it.
    ///
    /// The main document is taken after generation so it carries any test
    /// report or stage graph a generator fetched.
    pub async fn gather(
        &self,
        api: &dyn JenkinsApi,
        settings: &Settings,
        identity: &BuildIdentity,
    ) -> PipelineResult<Gathered> {
        let collection = Collector::new(api, settings, &self.catalogue)
            .console_length(self.config.console_length)
            .processors(&self.processors)
            .gatherers(&self.gatherers)
            .collect(identity)
            .await?;

        let mut events = Vec::new();
        for generator in &self.generators {
            let payloads = generator
                .generate_events(&collection)
                .await
                .map_err(|source| PipelineError::Generate {
                    generator: generator.name().to_string(),
                    source,
                })?;
            tracing::debug!(generator = generator.name(), events = payloads.len(), "generated events");
            events.extend(
                self.assembler
                    .assemble(&**generator, payloads, collection.data()),
            );
        }

        let main = collection.main_document()?;
        Ok(Gathered { main, events })
    }

    /// Gather one build, then dump and/or post each document.
    ///
    /// Returns the summed failure count reported by the targets.
    pub async fn run<W: Write>(
        &self,
        api: &dyn JenkinsApi,
        settings: &Settings,
        identity: &BuildIdentity,
        options: RunOptions,
        mut targets: Vec<Box<dyn EventTarget>>,
        out: &mut W,
    ) -> PipelineResult<u32> {
        let gathered = self.gather(api, settings, identity).await?;

        let mut status = 0;
        for document in gathered.documents(options.events_only) {
            if options.dump {
                dump(document, out)?;
            }
            if options.post {
                status += post(&mut targets, document).await?;
            }
        }
        if options.post {
            status += finish(&mut targets).await?;
        }

        tracing::info!(
            job = %identity.job_name,
            build = identity.build_number,
            events = gathered.events.len(),
            status,
            "build processed"
        );
        Ok(status)
    }
}

/// Pretty JSON with sorted keys, one document per call.
pub fn dump<W: Write>(event: &Event, out: &mut W) -> PipelineResult<()> {
    serde_json::to_writer_pretty(&mut *out, event)?;
    writeln!(out)?;
    Ok(())
}

/// Send one document to every target.
pub async fn post(targets: &mut [Box<dyn EventTarget>], event: &Event) -> PipelineResult<u32> {
    let mut status = 0;
    for target in targets.iter_mut() {
        status += target.send_event(event).await?;
    }
    Ok(status)
}

/// Flush every target.
pub async fn finish(targets: &mut [Box<dyn EventTarget>]) -> PipelineResult<u32> {
    let mut status = 0;
    for target in targets.iter_mut() {
        let pending = target.finish_send().await?;
        tracing::debug!(sink = target.name(), status = pending, "finished target");
        status += pending;
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use esl_jenkins::{JenkinsError, MockJenkins};
    use esl_targets::RecordingTarget;
    use serde_json::{Value, json};

    use super::*;
    use crate::collector::fixture;

    fn config(generators: &[&str]) -> PipelineConfig {
        PipelineConfig {
            generate_events: generators.iter().map(|g| g.to_string()).collect(),
            regex_file: None,
            ..PipelineConfig::default()
        }
    }

    fn jenkins() -> MockJenkins {
        fixture::jenkins()
            .with_env_vars(json!({"envMap": {"JOB_NAME": "folder/sample-job"}}))
            .with_stages(json!({"name": "#42", "stages": [{"name": "build"}, {"name": "test"}]}))
    }

    #[tokio::test]
    async fn gather_builds_main_document_after_generators() {
        let pipeline = Pipeline::new(&PluginRegistry::with_defaults(), config(&["stages"])).unwrap();
        let gathered = pipeline
            .gather(&jenkins(), &Settings::new(), &fixture::identity())
            .await
            .unwrap();

        assert_eq!(gathered.events.len(), 2);
        assert_eq!(gathered.events[0]["stages"], json!({"name": "build"}));
        assert_eq!(gathered.events[1]["eslogger"]["event"], "stages");
        assert_eq!(gathered.main["stages"]["name"], "#42");
        assert_eq!(gathered.main["test_report"], Value::Null);
        assert_eq!(gathered.main["job_config_info_status"], "Unable to retrieve config.xml.");
    }

    #[tokio::test]
    async fn unknown_generator_rejected_before_collection() {
        let err = Pipeline::new(&PluginRegistry::with_defaults(), config(&["nope"]))
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Registry(_)));
    }

    #[tokio::test]
    async fn run_dumps_and_posts_every_document() {
        let pipeline = Pipeline::new(&PluginRegistry::with_defaults(), config(&["stages"])).unwrap();
        let target = RecordingTarget::new().with_status(1).with_finish_status(2);
        let recorded = target.handle();
        let mut out = Vec::new();

        let status = pipeline
            .run(
                &jenkins(),
                &Settings::new(),
                &fixture::identity(),
                RunOptions {
                    dump: true,
                    post: true,
                    events_only: false,
                },
                vec![Box::new(target)],
                &mut out,
            )
            .await
            .unwrap();

        // three documents at 1 each, plus the finish status
        assert_eq!(status, 5);
        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.events.len(), 3);
        assert!(recorded.events[0].contains_key("console_log"));
        assert_eq!(recorded.finishes, 1);

        let dumped = String::from_utf8(out).unwrap();
        assert_eq!(dumped.matches("\"eslogger\"").count(), 3);
    }

    #[tokio::test]
    async fn events_only_without_post() {
        let pipeline = Pipeline::new(&PluginRegistry::with_defaults(), config(&["stages"])).unwrap();
        let target = RecordingTarget::new();
        let recorded = target.handle();
        let mut out = Vec::new();

        let status = pipeline
            .run(
                &jenkins(),
                &Settings::new(),
                &fixture::identity(),
                RunOptions {
                    dump: true,
                    post: false,
                    events_only: true,
                },
                vec![Box::new(target)],
                &mut out,
            )
            .await
            .unwrap();

        assert_eq!(status, 0);
        assert!(recorded.lock().unwrap().events.is_empty());
        assert_eq!(recorded.lock().unwrap().finishes, 0);
        let dumped = String::from_utf8(out).unwrap();
        assert!(!dumped.contains("console_log"));
        assert_eq!(dumped.matches("\"stages\": {").count(), 2);
    }

    #[tokio::test]
    async fn collection_failure_names_operation() {
        let pipeline = Pipeline::new(&PluginRegistry::with_defaults(), config(&[])).unwrap();
        let jenkins = jenkins().failing(
            "get_build_console_output",
            JenkinsError::Transport("connection refused".into()),
        );
        let err = pipeline
            .gather(&jenkins, &Settings::new(), &fixture::identity())
            .await
            .unwrap_err();
        match err {
            PipelineError::Collection(e) => assert_eq!(e.operation, "get_build_console_output"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn dump_sorts_keys() {
        let event: Event = json!({"b": 1, "a": {"d": 2, "c": 3}}).as_object().cloned().unwrap();
        let mut out = Vec::new();
        dump(&event, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\n  \"a\": {\n    \"c\": 3,\n    \"d\": 2\n  },\n  \"b\": 1\n}\n"
        );
    }

    #[test]
    fn missing_target_settings() {
        let pipeline = Pipeline::new(&PluginRegistry::with_defaults(), config(&[])).unwrap();
        let err = pipeline.create_targets(&Settings::new()).err().unwrap();
        assert!(matches!(err, PipelineError::Target(_)));
    }
}
