//! Shared harness: a wiremock Jenkins and a wiremock logstash, driven by
//! the real client, pipeline and targets.

#![allow(dead_code)]

use esl_jenkins::JenkinsConfig;
use esl_logger::{Pipeline, PipelineConfig, PluginRegistry};
use esl_protocol::{BuildIdentity, Credentials, Settings};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const JOB: &str = "folder/sample-job";
pub const BUILD: u64 = 42;
pub const JOB_PATH: &str = "/job/folder/job/sample-job";

pub const CONSOLE: &str = "\
[2020-04-22T11:21:48.848Z] Started by timer
[2020-04-22T11:21:49.001Z] Building in workspace /var/lib/jenkins/workspace
Finished: SUCCESS
";

/// Jenkins and logstash stand-ins for one scenario.
pub struct CiHarness {
    pub jenkins: MockServer,
    pub logstash: MockServer,
}

impl CiHarness {
    pub async fn start() -> Self {
        Self {
            jenkins: MockServer::start().await,
            logstash: MockServer::start().await,
        }
    }

    /// Serve a finished pipeline build with two stages.
    ///
    /// Env vars, test report and artifacts are left unmounted, so they 404.
    pub async fn mount_build(&self) {
        self.mount_json(
            &format!("{JOB_PATH}/{BUILD}/api/json"),
            json!({
                "description": "nightly",
                "number": BUILD,
                "result": "SUCCESS",
                "url": format!("{}{JOB_PATH}/{BUILD}/", self.jenkins.uri()),
                "timestamp": 1_520_000_000_000u64,
                "actions": [{
                    "_class": "hudson.model.ParametersAction",
                    "parameters": [{"name": "TARGET", "value": "prod"}]
                }],
                "artifacts": []
            }),
        )
        .await;
        self.mount_json(
            &format!("{JOB_PATH}/{BUILD}/wfapi/describe/"),
            json!({"name": "#42", "stages": [{"name": "build"}, {"name": "test"}]}),
        )
        .await;
        Mock::given(method("GET"))
            .and(path(format!("{JOB_PATH}/config.xml")))
            .respond_with(ResponseTemplate::new(200).set_body_string("<project><description/></project>"))
            .mount(&self.jenkins)
            .await;
        self.mount_console(CONSOLE).await;
    }

    pub async fn mount_console(&self, text: &str) {
        Mock::given(method("GET"))
            .and(path(format!("{JOB_PATH}/{BUILD}/consoleText")))
            .respond_with(ResponseTemplate::new(200).set_body_string(text))
            .mount(&self.jenkins)
            .await;
    }

    /// Takes precedence over [`CiHarness::mount_console`].
    pub async fn fail_console(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("{JOB_PATH}/{BUILD}/consoleText")))
            .respond_with(ResponseTemplate::new(status))
            .with_priority(1)
            .mount(&self.jenkins)
            .await;
    }

    async fn mount_json(&self, route: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.jenkins)
            .await;
    }

    /// Logstash answers every POST with `status`.
    pub async fn accept_events(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.logstash)
            .await;
    }

    pub fn jenkins_config(&self) -> JenkinsConfig {
        JenkinsConfig::new(self.jenkins.uri(), "bot", "token")
    }

    pub fn identity(&self) -> BuildIdentity {
        BuildIdentity::new(
            self.jenkins.uri(),
            Credentials {
                user: "bot".into(),
                password: "token".into(),
            },
            JOB,
            BUILD,
        )
    }

    /// Logstash target settings pointing at the mock.
    pub fn settings(&self) -> Settings {
        Settings::from_pairs([
            ("LOGSTASH_SERVER", format!("{}/", self.logstash.uri())),
            ("LS_USER", "writer".to_string()),
            ("LS_PASSWORD", "secret".to_string()),
        ])
    }

    /// Every JSON document logstash received, in arrival order.
    pub async fn posted(&self) -> Vec<Value> {
        self.logstash
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| request.body_json::<Value>().unwrap())
            .collect()
    }

    pub async fn jenkins_paths(&self) -> Vec<String> {
        self.jenkins
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| request.url.path().to_string())
            .collect()
    }
}

/// Default registry, logstash target, no regex file.
pub fn pipeline(generators: &[&str]) -> Pipeline {
    let config = PipelineConfig {
        generate_events: generators.iter().map(|g| g.to_string()).collect(),
        regex_file: None,
        ..PipelineConfig::default()
    };
    Pipeline::new(&PluginRegistry::with_defaults(), config).unwrap()
}

/// A feed frame announcing `phase` for the harness job.
pub fn notification(phase: &str, number: u64) -> Vec<u8> {
    let payload = json!({
        "name": "sample-job",
        "url": "job/folder/job/sample-job/",
        "build": {"number": number, "phase": phase, "status": "SUCCESS"}
    });
    format!("jenkins/builds {payload}").into_bytes()
}
