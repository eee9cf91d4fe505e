use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;

use crate::error::JenkinsResult;

// Unreserved characters stay as-is in a path segment
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// The CI operations the collector and generators need.
///
/// Optional resources return `Ok(None)` when the server reports them missing.
#[async_trait]
pub trait JenkinsApi: Send + Sync {
    /// Build metadata (`api/json?depth=N`).
    async fn get_build_info(&self, job: &str, build: u64, depth: u32) -> JenkinsResult<Value>;

    /// Raw `config.xml` of the job.
    async fn get_job_config(&self, job: &str) -> JenkinsResult<String>;

    /// Injected environment variables, if the plugin is installed.
    async fn get_build_env_vars(
        &self,
        job: &str,
        build: u64,
        depth: u32,
    ) -> JenkinsResult<Option<Value>>;

    /// Full console text.
    async fn get_build_console_output(&self, job: &str, build: u64) -> JenkinsResult<String>;

    async fn get_build_test_report(
        &self,
        job: &str,
        build: u64,
        depth: u32,
    ) -> JenkinsResult<Option<Value>>;

    /// Pipeline stage graph (`wfapi/describe`).
    async fn get_build_stages(&self, job: &str, build: u64) -> JenkinsResult<Option<Value>>;

    /// Raw contents of an archived artifact.
    async fn get_build_artifact(
        &self,
        job: &str,
        build: u64,
        relative_path: &str,
    ) -> JenkinsResult<Option<String>>;
}

/// Relative URL of a job: `a/b/c` becomes `job/a/job/b/job/c/`.
pub fn job_url_path(job: &str) -> String {
    job.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| format!("job/{}/", utf8_percent_encode(segment, SEGMENT)))
        .collect()
}

/// Encode each segment of an artifact path, keeping the `/` separators.
pub(crate) fn encode_relative_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_job_path() {
        assert_eq!(job_url_path("folder/sample-job"), "job/folder/job/sample-job/");
        assert_eq!(job_url_path("top"), "job/top/");
    }

    #[test]
    fn job_path_segments_are_encoded() {
        assert_eq!(job_url_path("team a/build#1"), "job/team%20a/job/build%231/");
    }

    #[test]
    fn artifact_path_keeps_separators() {
        assert_eq!(encode_relative_path("out/es logger.json"), "out/es%20logger.json");
    }
}
