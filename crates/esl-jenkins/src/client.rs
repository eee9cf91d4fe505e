//! HTTP client for the Jenkins JSON API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::api::{JenkinsApi, encode_relative_path, job_url_path};
use crate::config::JenkinsConfig;
use crate::error::{JenkinsError, JenkinsResult, not_found_as_none};

pub struct JenkinsClient {
    client: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
}

impl JenkinsClient {
    pub fn new(config: &JenkinsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to build reqwest client");
        let base_url = if config.url.ends_with('/') {
            config.url.clone()
        } else {
            format!("{}/", config.url)
        };
        Self {
            client,
            base_url,
            user: config.user.clone(),
            password: config.password.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, job: &str, build: u64, suffix: &str) -> String {
        format!("{}{}{build}/{suffix}", self.base_url, job_url_path(job))
    }

    async fn get(&self, url: &str) -> JenkinsResult<reqwest::Response> {
        tracing::debug!(url, "jenkins request");
        let response = self
            .client
            .get(url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .map_err(|e| JenkinsError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(match status {
            StatusCode::NOT_FOUND => JenkinsError::NotFound(url.to_string()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => JenkinsError::Denied {
                status: status.as_u16(),
                url: url.to_string(),
            },
            _ => JenkinsError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            },
        })
    }

    async fn get_text(&self, url: &str) -> JenkinsResult<String> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| JenkinsError::Transport(e.to_string()))
    }

    async fn get_json(&self, url: &str) -> JenkinsResult<Value> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| JenkinsError::Parse(format!("{url}: {e}")))
    }
}

#[async_trait]
impl JenkinsApi for JenkinsClient {
    async fn get_build_info(&self, job: &str, build: u64, depth: u32) -> JenkinsResult<Value> {
        self.get_json(&self.build_url(job, build, &format!("api/json?depth={depth}")))
            .await
    }

    async fn get_job_config(&self, job: &str) -> JenkinsResult<String> {
        let url = format!("{}{}config.xml", self.base_url, job_url_path(job));
        self.get_text(&url).await
    }

    async fn get_build_env_vars(
        &self,
        job: &str,
        build: u64,
        depth: u32,
    ) -> JenkinsResult<Option<Value>> {
        let url = self.build_url(job, build, &format!("injectedEnvVars/api/json?depth={depth}"));
        not_found_as_none(self.get_json(&url).await)
    }

    async fn get_build_console_output(&self, job: &str, build: u64) -> JenkinsResult<String> {
        self.get_text(&self.build_url(job, build, "consoleText")).await
    }

    async fn get_build_test_report(
        &self,
        job: &str,
        build: u64,
        depth: u32,
    ) -> JenkinsResult<Option<Value>> {
        let url = self.build_url(job, build, &format!("testReport/api/json?depth={depth}"));
        not_found_as_none(self.get_json(&url).await)
    }

    async fn get_build_stages(&self, job: &str, build: u64) -> JenkinsResult<Option<Value>> {
        let url = self.build_url(job, build, "wfapi/describe/");
        not_found_as_none(self.get_json(&url).await)
    }

    async fn get_build_artifact(
        &self,
        job: &str,
        build: u64,
        relative_path: &str,
    ) -> JenkinsResult<Option<String>> {
        let url = self.build_url(
            job,
            build,
            &format!("artifact/{}", encode_relative_path(relative_path)),
        );
        not_found_as_none(self.get_text(&url).await)
    }
}
