//! One-shot configuration: command line flags backed by environment variables.

use std::path::PathBuf;

use clap::Parser;
use esl_console::file_bundle::DEFAULT_REGEX_FILE;
use esl_jenkins::JenkinsConfig;
use esl_protocol::{BuildIdentity, Credentials, DEFAULT_BUILD_INFO_FIELDS};

use crate::collector::DEFAULT_CONSOLE_LENGTH;
use crate::error::{PipelineError, PipelineResult};

pub const DEFAULT_TARGET: &str = "logstash";

/// Generator that every run includes.
const ALWAYS_GENERATED: &str = "commit";

// ── PipelineConfig ────────────────────────────────────────────

/// What to collect and where to send it; shared by both binaries.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Characters of console log kept in the main document.
    pub console_length: usize,
    pub targets: Vec<String>,
    pub process_console_logs: Vec<String>,
    pub gather_build_data: Vec<String>,
    pub generate_events: Vec<String>,
    /// Build record fields copied into every event.
    pub build_info_fields: Vec<String>,
    /// Optional file of extra console patterns; skipped when absent.
    pub regex_file: Option<PathBuf>,
    pub legacy_top_level_fields: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            console_length: DEFAULT_CONSOLE_LENGTH,
            targets: vec![DEFAULT_TARGET.to_string()],
            process_console_logs: Vec::new(),
            gather_build_data: Vec::new(),
            generate_events: Vec::new(),
            build_info_fields: DEFAULT_BUILD_INFO_FIELDS.iter().map(|f| f.to_string()).collect(),
            regex_file: Some(PathBuf::from(DEFAULT_REGEX_FILE)),
            legacy_top_level_fields: true,
        }
    }
}

impl PipelineConfig {
    /// Make sure the change set generator runs, after any configured ones.
    pub fn with_commit_generator(mut self) -> Self {
        if !self.generate_events.iter().any(|g| g == ALWAYS_GENERATED) {
            self.generate_events.push(ALWAYS_GENERATED.to_string());
        }
        self
    }
}

/// Space separated extension names; empty or unset means none.
pub fn split_names(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| s.split_whitespace().map(String::from).collect())
        .unwrap_or_default()
}

// ── Output options ────────────────────────────────────────────

/// What to do with each collected document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Print documents as pretty JSON.
    pub dump: bool,
    /// Send documents to the targets.
    pub post: bool,
    /// Skip the main collected-data document.
    pub events_only: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dump: false,
            post: true,
            events_only: false,
        }
    }
}

// ── LoggerConfig ──────────────────────────────────────────────

/// Everything one `es-logger` run needs.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub jenkins_url: Option<String>,
    pub jenkins_user: Option<String>,
    pub jenkins_password: Option<String>,
    pub job_name: Option<String>,
    pub build_number: u64,
    pub pipeline: PipelineConfig,
    pub output: RunOptions,
}

impl LoggerConfig {
    pub fn jenkins(&self) -> PipelineResult<JenkinsConfig> {
        let url = self
            .jenkins_url
            .as_deref()
            .ok_or_else(|| PipelineError::Config("JENKINS_URL is not set".into()))?;
        Ok(JenkinsConfig::new(
            url,
            self.jenkins_user.clone().unwrap_or_default(),
            self.jenkins_password.clone().unwrap_or_default(),
        ))
    }

    pub fn identity(&self) -> PipelineResult<BuildIdentity> {
        let jenkins = self.jenkins()?;
        let job_name = self
            .job_name
            .as_deref()
            .ok_or_else(|| PipelineError::Config("ES_JOB_NAME is not set".into()))?;
        Ok(BuildIdentity::new(
            jenkins.url,
            Credentials {
                user: jenkins.user,
                password: jenkins.password,
            },
            job_name,
            self.build_number,
        ))
    }
}

// ── Command line ──────────────────────────────────────────────

const LONG_ABOUT: &str = "\
Read data from a completed Jenkins job and push it to a logstash instance.

Behaviour is controlled through a number of environment variables as follows:

What data to gather:
    PROCESS_CONSOLE_LOGS    Which console log processors to use
    GATHER_BUILD_DATA       Which build data gatherers to use
    GENERATE_EVENTS         Which event generators to use

Where to gather data from:
    JENKINS_URL             The url to access Jenkins at
    JENKINS_USER            The username for Jenkins access
    JENKINS_PASSWORD        The password or API token for Jenkins access

What to gather data from:
    ES_JOB_NAME             The \"Full Project Name\" style job name for the job to process
    ES_BUILD_NUMBER         The build number for the job to process";

#[derive(Debug, Parser)]
#[command(name = "es-logger", version, about = "Collect a Jenkins build and ship it as events", long_about = LONG_ABOUT)]
pub struct Cli {
    /// Do not dump events to the console
    #[arg(long, conflicts_with = "no_post")]
    pub no_dump: bool,

    /// Do not post events to any targets
    #[arg(long)]
    pub no_post: bool,

    /// Restrict the console length in the event to this number of characters
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONSOLE_LENGTH)]
    pub console_length: usize,

    /// Do not dump or post the main job event, only generated events
    #[arg(short = 'e', long)]
    pub events_only: bool,

    /// List all plugins available
    #[arg(short = 'p', long)]
    pub list_plugins: bool,

    /// A target to send events to, defaults to logstash if no other is specified
    #[arg(short = 't', long = "target")]
    pub targets: Vec<String>,

    /// Print debug logs during execution
    #[arg(long)]
    pub debug: bool,

    #[arg(long, env = "JENKINS_URL", hide = true)]
    pub jenkins_url: Option<String>,

    #[arg(long, env = "JENKINS_USER", hide = true)]
    pub jenkins_user: Option<String>,

    #[arg(long, env = "JENKINS_PASSWORD", hide = true, hide_env_values = true)]
    pub jenkins_password: Option<String>,

    #[arg(long, env = "ES_JOB_NAME", hide = true)]
    pub job_name: Option<String>,

    #[arg(long, env = "ES_BUILD_NUMBER", default_value_t = 0, hide = true)]
    pub build_number: u64,

    #[arg(long, env = "PROCESS_CONSOLE_LOGS", hide = true)]
    pub process_console_logs: Option<String>,

    #[arg(long, env = "GATHER_BUILD_DATA", hide = true)]
    pub gather_build_data: Option<String>,

    #[arg(long, env = "GENERATE_EVENTS", hide = true)]
    pub generate_events: Option<String>,
}

impl Cli {
    pub fn into_config(self) -> LoggerConfig {
        let targets = if self.targets.is_empty() {
            vec![DEFAULT_TARGET.to_string()]
        } else {
            self.targets
        };
        let pipeline = PipelineConfig {
            console_length: self.console_length,
            targets,
            process_console_logs: split_names(self.process_console_logs.as_deref()),
            gather_build_data: split_names(self.gather_build_data.as_deref()),
            generate_events: split_names(self.generate_events.as_deref()),
            ..PipelineConfig::default()
        }
        .with_commit_generator();

        LoggerConfig {
            jenkins_url: self.jenkins_url,
            jenkins_user: self.jenkins_user,
            jenkins_password: self.jenkins_password,
            job_name: self.job_name,
            build_number: self.build_number,
            pipeline,
            output: RunOptions {
                dump: !self.no_dump,
                post: !self.no_post,
                events_only: self.events_only,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> LoggerConfig {
        let mut argv = vec!["es-logger"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().into_config()
    }

    #[test]
    fn defaults() {
        let config = parse(&["--generate-events", ""]);
        assert_eq!(config.pipeline.console_length, 32500);
        assert_eq!(config.pipeline.targets, ["logstash"]);
        assert_eq!(config.pipeline.generate_events, ["commit"]);
        assert_eq!(config.pipeline.build_info_fields, ["description", "number", "result", "url"]);
        assert_eq!(
            config.output,
            RunOptions {
                dump: true,
                post: true,
                events_only: false
            }
        );
    }

    #[test]
    fn flags() {
        let config = parse(&[
            "--no-post",
            "-e",
            "-c",
            "100",
            "-t",
            "sqs",
            "--target",
            "logstash",
            "--job-name",
            "folder/job",
            "--build-number",
            "7",
            "--generate-events",
            "junit  stages",
        ]);
        assert!(!config.output.post);
        assert!(config.output.dump);
        assert!(config.output.events_only);
        assert_eq!(config.pipeline.console_length, 100);
        assert_eq!(config.pipeline.targets, ["sqs", "logstash"]);
        assert_eq!(config.pipeline.generate_events, ["junit", "stages", "commit"]);
        assert_eq!(config.job_name.as_deref(), Some("folder/job"));
        assert_eq!(config.build_number, 7);
    }

    #[test]
    fn dump_and_post_suppression_conflict() {
        assert!(Cli::try_parse_from(["es-logger", "--no-dump", "--no-post"]).is_err());
    }

    #[test]
    fn commit_added_once() {
        let config = PipelineConfig {
            generate_events: split_names(Some("commit junit")),
            ..PipelineConfig::default()
        }
        .with_commit_generator();
        assert_eq!(config.generate_events, ["commit", "junit"]);
    }

    #[test]
    fn identity_needs_server_and_job() {
        let mut config = parse(&[]);
        config.jenkins_url = None;
        assert!(matches!(config.identity(), Err(PipelineError::Config(_))));

        config.jenkins_url = Some("https://ci.example.com/".into());
        config.job_name = None;
        assert!(matches!(config.identity(), Err(PipelineError::Config(_))));

        config.job_name = Some("folder/job".into());
        config.build_number = 3;
        let identity = config.identity().unwrap();
        assert_eq!(identity.server, "https://ci.example.com/");
        assert_eq!(identity.job_name, "folder/job");
        assert_eq!(identity.build_number, 3);
    }
}
