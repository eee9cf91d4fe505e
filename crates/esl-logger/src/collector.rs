//! Build data collection.
//!
//! A [`Collector`] fetches everything es-logger needs about one build and
//! returns a [`Collection`]: the main document plus the state generators
//! read from. Test reports and stage graphs are fetched on first use and
//! cached for the life of the collection.

use std::sync::Arc;

use esl_console::{PatternCatalogue, normalize, truncate_tail};
use esl_jenkins::{JenkinsApi, JenkinsError};
use esl_protocol::{BRANCH_REDACTION_MARKER, BuildIdentity, Event, SelfMetadata, Settings};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use crate::error::{CollectionError, CollectionResult};
use crate::job_config::{JobConfigInfo, parse_job_config};
use crate::plugin::{BuildDataGatherer, ConsoleLogProcessor};

pub const DEFAULT_CONSOLE_LENGTH: usize = 32500;

pub const JOB_CONFIG_RETRIEVED: &str = "Retrieved config.xml.";
pub const JOB_CONFIG_UNAVAILABLE: &str = "Unable to retrieve config.xml.";

const PARAMETER_ACTIONS: &[&str] = &[
    "hudson.model.ParametersAction",
    "com.tikal.jenkins.plugins.multijob.MultiJobParametersAction",
];
const GIT_BUILD_DATA_ACTION: &str = "hudson.plugins.git.util.BuildData";

// ── Collected data ────────────────────────────────────────────

/// The main document for one build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectedData {
    #[serde(rename = "eslogger")]
    pub metadata: SelfMetadata,
    /// Build record, with git branch maps redacted.
    pub build_info: Value,
    /// `None` when the job configuration could not be retrieved.
    pub job_config_info: Option<JobConfigInfo>,
    pub job_config_info_status: String,
    /// `None` when the build has no injected environment.
    pub env_vars: Option<Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub build_data: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub console_log_plugins: Map<String, Value>,
    /// Tail of the normalized console log.
    pub console_log: String,
    /// Length of the normalized console log before truncation.
    pub console_log_length: usize,
}

/// Parameters and git build data pulled out of the build record's actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReshapedBuildInfo {
    pub build_info: Value,
    pub parameters: Map<String, Value>,
    pub build_data: Map<String, Value>,
}

/// Flatten parameter actions and extract git build data for `build_number`.
///
/// Works on a copy: the per-branch map of every git build data action is
/// replaced with [`BRANCH_REDACTION_MARKER`] in the returned record only.
pub fn reshape_build_info(raw: &Value, build_number: u64) -> ReshapedBuildInfo {
    let mut build_info = raw.clone();
    let mut parameters = Map::new();
    let mut build_data = Map::new();

    let actions = build_info
        .get_mut("actions")
        .and_then(Value::as_array_mut)
        .map(|a| a.as_mut_slice())
        .unwrap_or_default();

    for action in actions {
        let class = action
            .get("_class")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if PARAMETER_ACTIONS.contains(&class.as_str()) {
            let params = action.get("parameters").and_then(Value::as_array);
            for param in params.into_iter().flatten() {
                match (param.get("name").and_then(Value::as_str), param.get("value")) {
                    (Some(name), Some(value)) => {
                        parameters.insert(name.to_string(), value.clone());
                    }
                    _ => tracing::debug!(param = %param, "skipping incomplete parameter"),
                }
            }
        }

        if class == GIT_BUILD_DATA_ACTION {
            extract_git_build_data(action, build_number, &mut build_data);
            if let Some(obj) = action.as_object_mut() {
                obj.insert(
                    "buildsByBranchName".to_string(),
                    Value::String(BRANCH_REDACTION_MARKER.to_string()),
                );
            }
        }
    }

    ReshapedBuildInfo {
        build_info,
        parameters,
        build_data,
    }
}

fn extract_git_build_data(action: &Value, build_number: u64, out: &mut Map<String, Value>) {
    let scm_urls = action.get("remoteUrls").cloned().unwrap_or(Value::Null);
    let Some(primary) = scm_urls.get(0).and_then(Value::as_str) else {
        tracing::debug!("git build data without remote urls");
        return;
    };
    let Some(branches) = action.get("buildsByBranchName").and_then(Value::as_object) else {
        return;
    };
    for (branch, data) in branches {
        let built_here = data.get("buildNumber").and_then(Value::as_u64) == Some(build_number);
        let Some(data) = data.as_object().filter(|_| built_here) else {
            continue;
        };
        let mut entry = data.clone();
        entry.insert("scm_urls".to_string(), scm_urls.clone());
        entry.insert("branch".to_string(), Value::String(branch.clone()));
        out.insert(primary.to_string(), Value::Object(entry));
    }
}

// ── Collector ─────────────────────────────────────────────────

/// Runs one collection cycle against the CI server.
pub struct Collector<'a> {
    api: &'a dyn JenkinsApi,
    settings: &'a Settings,
    catalogue: &'a PatternCatalogue,
    console_length: usize,
    processors: &'a [Arc<dyn ConsoleLogProcessor>],
    gatherers: &'a [Arc<dyn BuildDataGatherer>],
}

impl<'a> Collector<'a> {
    pub fn new(
        api: &'a dyn JenkinsApi,
        settings: &'a Settings,
        catalogue: &'a PatternCatalogue,
    ) -> Self {
        Self {
            api,
            settings,
            catalogue,
            console_length: DEFAULT_CONSOLE_LENGTH,
            processors: &[],
            gatherers: &[],
        }
    }

    pub fn console_length(mut self, length: usize) -> Self {
        self.console_length = length;
        self
    }

    pub fn processors(mut self, processors: &'a [Arc<dyn ConsoleLogProcessor>]) -> Self {
        self.processors = processors;
        self
    }

    pub fn gatherers(mut self, gatherers: &'a [Arc<dyn BuildDataGatherer>]) -> Self {
        self.gatherers = gatherers;
        self
    }

    pub async fn collect(&self, identity: &BuildIdentity) -> CollectionResult<Collection<'a>> {
        let job = identity.job_name.as_str();
        let number = identity.build_number;
        tracing::info!(job, build = number, "collecting build");

        let raw_build_info = self
            .api
            .get_build_info(job, number, 0)
            .await
            .map_err(|e| CollectionError::new("get_build_info", e))?;

        let (job_config_info, job_config_info_status) = match self.api.get_job_config(job).await {
            Ok(xml) => {
                let info = parse_job_config(&xml).map_err(|e| {
                    CollectionError::new("get_job_config", JenkinsError::Parse(format!("config.xml: {e}")))
                })?;
                (Some(info), JOB_CONFIG_RETRIEVED)
            }
            Err(e) if e.is_unavailable() => {
                tracing::error!(job, error = %e, "unable to retrieve job config");
                (None, JOB_CONFIG_UNAVAILABLE)
            }
            Err(e) => return Err(CollectionError::new("get_job_config", e)),
        };

        let env_vars = self
            .api
            .get_build_env_vars(job, number, 0)
            .await
            .map_err(|e| CollectionError::new("get_build_env_vars", e))?;

        let reshaped = reshape_build_info(&raw_build_info, number);

        let raw_console = self
            .api
            .get_build_console_output(job, number)
            .await
            .map_err(|e| CollectionError::new("get_build_console_output", e))?;
        let normalized = normalize(&raw_console);
        let stored_console = truncate_tail(&normalized.text, self.console_length).to_string();

        let data = CollectedData {
            metadata: identity.metadata(),
            build_info: reshaped.build_info,
            job_config_info,
            job_config_info_status: job_config_info_status.to_string(),
            env_vars,
            parameters: reshaped.parameters,
            build_data: reshaped.build_data,
            console_log_plugins: Map::new(),
            console_log: stored_console,
            console_log_length: normalized.original_length,
        };

        let mut collection = Collection {
            api: self.api,
            settings: self.settings,
            catalogue: self.catalogue,
            identity: identity.clone(),
            data,
            console_log: normalized.text,
            test_report: OnceCell::new(),
            stages: OnceCell::new(),
        };

        for gatherer in self.gatherers {
            let value = gatherer.gather(&collection).await?;
            collection
                .data
                .build_data
                .insert(gatherer.name().to_string(), value);
        }

        for processor in self.processors {
            let value = processor.process(&collection.console_log);
            collection
                .data
                .console_log_plugins
                .insert(processor.name().to_string(), value);
        }

        tracing::debug!(
            job,
            build = number,
            console_log_length = collection.data.console_log_length,
            "collection complete"
        );
        Ok(collection)
    }
}

// ── Collection ────────────────────────────────────────────────

/// State of one collection cycle, shared read-only with generators.
pub struct Collection<'a> {
    api: &'a dyn JenkinsApi,
    settings: &'a Settings,
    catalogue: &'a PatternCatalogue,
    identity: BuildIdentity,
    data: CollectedData,
    console_log: String,
    test_report: OnceCell<Option<Value>>,
    stages: OnceCell<Option<Value>>,
}

impl<'a> Collection<'a> {
    pub fn identity(&self) -> &BuildIdentity {
        &self.identity
    }

    pub fn data(&self) -> &CollectedData {
        &self.data
    }

    /// Redacted build record.
    pub fn build_info(&self) -> &Value {
        &self.data.build_info
    }

    /// The whole normalized console log, not truncated.
    pub fn console_log(&self) -> &str {
        &self.console_log
    }

    pub fn api(&self) -> &'a dyn JenkinsApi {
        self.api
    }

    pub fn settings(&self) -> &'a Settings {
        self.settings
    }

    /// Console patterns from every configured regex bundle.
    pub fn catalogue(&self) -> &'a PatternCatalogue {
        self.catalogue
    }

    /// The build's test report, fetched at most once.
    pub async fn test_report(&self) -> CollectionResult<Option<&Value>> {
        let report = self
            .test_report
            .get_or_try_init(|| async {
                self.api
                    .get_build_test_report(&self.identity.job_name, self.identity.build_number, 0)
                    .await
                    .map_err(|e| CollectionError::new("get_build_test_report", e))
            })
            .await?;
        Ok(report.as_ref())
    }

    /// The build's pipeline stages, fetched at most once.
    pub async fn stages(&self) -> CollectionResult<Option<&Value>> {
        let stages = self
            .stages
            .get_or_try_init(|| async {
                self.api
                    .get_build_stages(&self.identity.job_name, self.identity.build_number)
                    .await
                    .map_err(|e| CollectionError::new("get_build_stages", e))
            })
            .await?;
        Ok(stages.as_ref())
    }

    /// The main document: collected data plus whatever reports were fetched.
    pub fn main_document(&self) -> serde_json::Result<Event> {
        let mut doc: Event = serde_json::from_value(serde_json::to_value(&self.data)?)?;
        let cached = |cell: &OnceCell<Option<Value>>| cell.get().cloned().flatten().unwrap_or(Value::Null);
        doc.insert("test_report".to_string(), cached(&self.test_report));
        doc.insert("stages".to_string(), cached(&self.stages));
        Ok(doc)
    }
}

// ── Test fixtures ─────────────────────────────────────────────
