//! Daemon configuration, loaded from a TOML file.
//!
//! ```toml
//! [feed]
//! broker_host = "mqtt.example.com"
//! topic = "jenkins/builds"
//!
//! [jenkins]
//! url = "https://jenkins.example.com/"
//! user = "es-logger"
//! password = "api-token"
//!
//! [eslogger]
//! targets = ["logstash"]
//!
//! [targets.logstash]
//! logstash_server = "http://logstash.example.com:8080"
//! ls_user = "writer"
//! ls_password = "secret"
//!
//! [plugin_settings."generate_events:artifact"]
//! es_event_artifact = "events.json"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use esl_jenkins::JenkinsConfig;
use esl_logger::{DEFAULT_CONSOLE_LENGTH, PipelineConfig, PluginKind, PluginRegistry};
use esl_protocol::Settings;
use serde::Deserialize;

use crate::error::{DaemonError, DaemonResult};

const JENKINS_URL: &str = "JENKINS_URL";
const JENKINS_USER: &str = "JENKINS_USER";
const JENKINS_PASSWORD: &str = "JENKINS_PASSWORD";

/// Key/value pairs copied upper-cased into [`Settings`].
pub type SettingsSection = BTreeMap<String, String>;

/// Top-level configuration for the daemon.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub jenkins: JenkinsSection,
    #[serde(default)]
    pub eslogger: EsLoggerSection,
    /// Per-target settings, keyed by target name.
    #[serde(default)]
    pub targets: BTreeMap<String, SettingsSection>,
    #[serde(default)]
    pub plugins: PluginsSection,
    /// Per-extension settings, keyed `"<category>:<name>"`.
    #[serde(default)]
    pub plugin_settings: BTreeMap<String, SettingsSection>,
}

// ── Sections ──────────────────────────────────────────────────

/// Where notifications come from and how many workers consume them.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub broker_host: String,
    #[serde(default = "default_broker_port")]
    pub broker_port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// How long a worker waits for a notification before logging and looping.
    #[serde(default = "default_worker_timeout")]
    pub worker_timeout_secs: u64,
    /// Interval between liveness checks of the listener and workers.
    #[serde(default = "default_supervisor_interval")]
    pub supervisor_interval_secs: u64,
    #[serde(default = "default_startup_delay")]
    pub startup_delay_secs: u64,
}

fn default_broker_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "es-logger".to_string()
}

fn default_topic() -> String {
    "jenkins/builds".to_string()
}

fn default_keepalive() -> u64 {
    30
}

fn default_num_workers() -> usize {
    3
}

fn default_worker_timeout() -> u64 {
    15
}

fn default_supervisor_interval() -> u64 {
    30
}

fn default_startup_delay() -> u64 {
    2
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            broker_host: String::new(),
            broker_port: default_broker_port(),
            client_id: default_client_id(),
            topic: default_topic(),
            keepalive_secs: default_keepalive(),
            num_workers: default_num_workers(),
            worker_timeout_secs: default_worker_timeout(),
            supervisor_interval_secs: default_supervisor_interval(),
            startup_delay_secs: default_startup_delay(),
        }
    }
}

impl FeedConfig {
    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_secs)
    }

    pub fn supervisor_interval(&self) -> Duration {
        Duration::from_secs(self.supervisor_interval_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }
}

/// CI server access; any field left out falls back to the environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JenkinsSection {
    #[serde(default, alias = "jenkins_url")]
    pub url: Option<String>,
    #[serde(default, alias = "jenkins_user")]
    pub user: Option<String>,
    #[serde(default, alias = "jenkins_password")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EsLoggerSection {
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,
    #[serde(default = "default_console_length")]
    pub console_length: usize,
}

fn default_targets() -> Vec<String> {
    vec![esl_logger::config::DEFAULT_TARGET.to_string()]
}

fn default_console_length() -> usize {
    DEFAULT_CONSOLE_LENGTH
}

impl Default for EsLoggerSection {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            console_length: default_console_length(),
        }
    }
}

/// Extension lists; an omitted list selects every registered extension.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginsSection {
    #[serde(default)]
    pub process_console_logs: Option<Vec<String>>,
    #[serde(default)]
    pub gather_build_data: Option<Vec<String>>,
    #[serde(default)]
    pub generate_events: Option<Vec<String>>,
}

// ── Loading and resolution ────────────────────────────────────

impl DaemonConfig {
    pub fn from_file(path: impl AsRef<Path>) -> DaemonResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DaemonError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> DaemonResult<Self> {
        toml::from_str(contents).map_err(|e| DaemonError::Config(e.to_string()))
    }

    /// Extensions to run, with unset lists filled from the registry.
    pub fn pipeline_config(&self, registry: &PluginRegistry) -> PipelineConfig {
        let select = |configured: &Option<Vec<String>>, kind: PluginKind| match configured {
            Some(names) => names.clone(),
            None => registry.list(kind).into_iter().map(String::from).collect(),
        };
        PipelineConfig {
            console_length: self.eslogger.console_length,
            targets: self.eslogger.targets.clone(),
            process_console_logs: select(
                &self.plugins.process_console_logs,
                PluginKind::ConsoleLogProcessor,
            ),
            gather_build_data: select(&self.plugins.gather_build_data, PluginKind::BuildDataGatherer),
            generate_events: select(&self.plugins.generate_events, PluginKind::EventGenerator),
            ..PipelineConfig::default()
        }
        .with_commit_generator()
    }

    /// `base` overlaid with the CI credentials, the sections of every
    /// selected target and the settings of every selected extension.
    ///
    /// Empty values never replace what `base` already holds.
    pub fn settings(&self, base: Settings, pipeline: &PipelineConfig) -> Settings {
        let mut settings = base;
        let mut apply = |pairs: Vec<(String, String)>| {
            settings.overlay(pairs.into_iter().filter(|(_, value)| !value.is_empty()));
        };

        apply(
            [
                (JENKINS_URL, &self.jenkins.url),
                (JENKINS_USER, &self.jenkins.user),
                (JENKINS_PASSWORD, &self.jenkins.password),
            ]
            .into_iter()
            .filter_map(|(key, value)| Some((key.to_string(), value.clone()?)))
            .collect(),
        );

        for target in &pipeline.targets {
            if let Some(section) = self.targets.get(target) {
                apply(section.clone().into_iter().collect());
            }
        }

        let categories = [
            ("process_console_logs", &pipeline.process_console_logs),
            ("gather_build_data", &pipeline.gather_build_data),
            ("generate_events", &pipeline.generate_events),
        ];
        for (category, names) in categories {
            for name in names {
                if let Some(section) = self.plugin_settings.get(&format!("{category}:{name}")) {
                    tracing::debug!(category, plugin = %name, "applying extension settings");
                    apply(section.clone().into_iter().collect());
                }
            }
        }
        settings
    }

    /// Fail with every missing key at once.
    pub fn validate(
        &self,
        registry: &PluginRegistry,
        pipeline: &PipelineConfig,
        settings: &Settings,
    ) -> DaemonResult<()> {
        let mut missing: Vec<String> = settings
            .missing(&[JENKINS_URL, JENKINS_USER, JENKINS_PASSWORD])
            .into_iter()
            .map(String::from)
            .collect();
        if self.feed.broker_host.is_empty() {
            missing.push("feed.broker_host".to_string());
        }
        for target in registry.resolve_targets(&pipeline.targets)? {
            missing.extend(settings.missing(target.required_settings).into_iter().map(String::from));
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DaemonError::Misconfigured { missing })
        }
    }

    /// CI connection from merged settings; run [`DaemonConfig::validate`] first.
    pub fn jenkins(&self, settings: &Settings) -> DaemonResult<JenkinsConfig> {
        let get = |key: &str| {
            settings
                .get(key)
                .map(String::from)
                .ok_or_else(|| DaemonError::Misconfigured {
                    missing: vec![key.to_string()],
                })
        };
        Ok(JenkinsConfig::new(
            get(JENKINS_URL)?,
            get(JENKINS_USER)?,
            get(JENKINS_PASSWORD)?,
        ))
    }
}
