//! Mock Jenkins for testing without a server.
//!
//! Serves canned responses for a single build and records every call.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::api::JenkinsApi;
use crate::error::{JenkinsError, JenkinsResult};

#[derive(Default)]
pub struct MockJenkins {
    build_info: Option<Value>,
    job_config: Option<String>,
    env_vars: Option<Value>,
    console: Option<String>,
    test_report: Option<Value>,
    stages: Option<Value>,
    artifacts: HashMap<String, String>,
    failures: HashMap<&'static str, JenkinsError>,
    calls: Mutex<Vec<&'static str>>,
}

impl MockJenkins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_build_info(mut self, info: Value) -> Self {
        self.build_info = Some(info);
        self
    }

    pub fn with_job_config(mut self, xml: impl Into<String>) -> Self {
        self.job_config = Some(xml.into());
        self
    }

    pub fn with_env_vars(mut self, env: Value) -> Self {
        self.env_vars = Some(env);
        self
    }

    pub fn with_console(mut self, text: impl Into<String>) -> Self {
        self.console = Some(text.into());
        self
    }

    pub fn with_test_report(mut self, report: Value) -> Self {
        self.test_report = Some(report);
        self
    }

    pub fn with_stages(mut self, stages: Value) -> Self {
        self.stages = Some(stages);
        self
    }

    pub fn with_artifact(mut self, relative_path: impl Into<String>, body: impl Into<String>) -> Self {
        self.artifacts.insert(relative_path.into(), body.into());
        self
    }

    /// Make the named operation (e.g. `"get_build_env_vars"`) fail.
    pub fn failing(mut self, operation: &'static str, error: JenkinsError) -> Self {
        self.failures.insert(operation, error);
        self
    }

    /// Operation names in call order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == operation)
            .count()
    }

    fn record(&self, operation: &'static str) -> JenkinsResult<()> {
        self.calls.lock().unwrap().push(operation);
        match self.failures.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn required<T: Clone>(value: &Option<T>, what: &str) -> JenkinsResult<T> {
        value
            .clone()
            .ok_or_else(|| JenkinsError::NotFound(what.to_string()))
    }
}

#[async_trait]
impl JenkinsApi for MockJenkins {
    async fn get_build_info(&self, _job: &str, _build: u64, _depth: u32) -> JenkinsResult<Value> {
        self.record("get_build_info")?;
        Self::required(&self.build_info, "build info")
    }

    async fn get_job_config(&self, _job: &str) -> JenkinsResult<String> {
        self.record("get_job_config")?;
        Self::required(&self.job_config, "config.xml")
    }

    async fn get_build_env_vars(
        &self,
        _job: &str,
        _build: u64,
        _depth: u32,
    ) -> JenkinsResult<Option<Value>> {
        self.record("get_build_env_vars")?;
        Ok(self.env_vars.clone())
    }

    async fn get_build_console_output(&self, _job: &str, _build: u64) -> JenkinsResult<String> {
        self.record("get_build_console_output")?;
        Self::required(&self.console, "console")
    }

    async fn get_build_test_report(
        &self,
        _job: &str,
        _build: u64,
        _depth: u32,
    ) -> JenkinsResult<Option<Value>> {
        self.record("get_build_test_report")?;
        Ok(self.test_report.clone())
    }

    async fn get_build_stages(&self, _job: &str, _build: u64) -> JenkinsResult<Option<Value>> {
        self.record("get_build_stages")?;
        Ok(self.stages.clone())
    }

    async fn get_build_artifact(
        &self,
        _job: &str,
        _build: u64,
        relative_path: &str,
    ) -> JenkinsResult<Option<String>> {
        self.record("get_build_artifact")?;
        Ok(self.artifacts.get(relative_path).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn serves_canned_data_and_records_calls() {
        let mock = MockJenkins::new()
            .with_build_info(json!({"number": 5}))
            .with_console("hello");

        assert_eq!(mock.get_build_info("j", 5, 0).await.unwrap()["number"], 5);
        assert_eq!(mock.get_build_console_output("j", 5).await.unwrap(), "hello");
        assert!(mock.get_build_env_vars("j", 5, 0).await.unwrap().is_none());
        assert_eq!(
            mock.calls(),
            ["get_build_info", "get_build_console_output", "get_build_env_vars"]
        );
    }

    #[tokio::test]
    async fn missing_required_data_is_not_found() {
        let mock = MockJenkins::new();
        assert!(mock.get_job_config("j").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn scripted_failure() {
        let mock = MockJenkins::new()
            .with_stages(json!({"stages": []}))
            .failing("get_build_stages", JenkinsError::Transport("reset".into()));
        let err = mock.get_build_stages("j", 1).await.unwrap_err();
        assert!(matches!(err, JenkinsError::Transport(_)));
        assert_eq!(mock.call_count("get_build_stages"), 1);
    }

    #[tokio::test]
    async fn artifacts_by_path() {
        let mock = MockJenkins::new().with_artifact("es-logger-data.json", "[1]");
        assert_eq!(
            mock.get_build_artifact("j", 1, "es-logger-data.json")
                .await
                .unwrap()
                .as_deref(),
            Some("[1]")
        );
        assert!(mock.get_build_artifact("j", 1, "other").await.unwrap().is_none());
    }
}
