//! What a worker does with one frame from the feed.

use std::sync::Arc;

use async_trait::async_trait;
use esl_jenkins::{JenkinsApi, JenkinsConfig};
use esl_logger::{Pipeline, RunOptions};
use esl_protocol::{BuildIdentity, BuildNotification, Credentials, PHASE_COMPLETED, Settings};

use crate::error::DaemonResult;

#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// Failed-delivery count, or `None` when the notification was skipped.
    async fn handle(&self, frame: &[u8]) -> DaemonResult<Option<u32>>;
}

// ── Pipeline ──────────────────────────────────────────────────

/// Runs the full collection pipeline for every finished build.
pub struct PipelineHandler {
    pipeline: Pipeline,
    api: Arc<dyn JenkinsApi>,
    jenkins: JenkinsConfig,
    settings: Settings,
}

impl PipelineHandler {
    pub fn new(
        pipeline: Pipeline,
        api: Arc<dyn JenkinsApi>,
        jenkins: JenkinsConfig,
        settings: Settings,
    ) -> Self {
        Self {
            pipeline,
            api,
            jenkins,
            settings,
        }
    }
}

#[async_trait]
impl NotificationHandler for PipelineHandler {
    async fn handle(&self, frame: &[u8]) -> DaemonResult<Option<u32>> {
        let notification = BuildNotification::from_frame(frame)?;
        let job = notification.job_name();
        let number = notification.build_number();

        if !notification.is_finished() {
            if notification.phase() == PHASE_COMPLETED {
                tracing::debug!(job = %job, build = number, "skipping completed phase");
            } else {
                tracing::info!(job = %job, build = number, phase = notification.phase(), "skipping phase");
            }
            return Ok(None);
        }

        let identity = BuildIdentity::new(
            self.jenkins.url.clone(),
            Credentials {
                user: self.jenkins.user.clone(),
                password: self.jenkins.password.clone(),
            },
            job.clone(),
            number,
        );
        let targets = self.pipeline.create_targets(&self.settings)?;
        let options = RunOptions {
            dump: false,
            post: true,
            events_only: false,
        };
        let status = self
            .pipeline
            .run(
                &*self.api,
                &self.settings,
                &identity,
                options,
                targets,
                &mut std::io::sink(),
            )
            .await?;

        tracing::info!(
            job = %job,
            build = number,
            status = ?notification.build.status,
            delivery_failures = status,
            "build logged"
        );
        Ok(Some(status))
    }
}

// ── Log only ──────────────────────────────────────────────────

/// Logs each notification instead of collecting it; used to check the feed.
pub struct LogOnlyHandler;

#[async_trait]
impl NotificationHandler for LogOnlyHandler {
    async fn handle(&self, frame: &[u8]) -> DaemonResult<Option<u32>> {
        let notification = BuildNotification::from_frame(frame)?;
        tracing::info!(
            "Got event: job [{}] number [{}] phase [{}]",
            notification.job_name(),
            notification.build_number(),
            notification.phase()
        );
        Ok(Some(0))
    }
}

#[cfg(test)]
mod tests {
    use esl_jenkins::MockJenkins;
    use esl_logger::{PipelineConfig, PluginRegistry};
    use esl_targets::{EventTarget, RecordingTarget, TargetResult, TargetSpec};
    use serde_json::json;

    use super::*;
    use crate::error::DaemonError;

    const JOB_URL: &str = "job/folder/job/sample-job/";

    fn notification(phase: &str, number: u64) -> Vec<u8> {
        let payload = json!({
            "name": "sample-job",
            "url": JOB_URL,
            "build": {"number": number, "phase": phase, "status": "SUCCESS"}
        });
        format!("onFinalized {payload}").into_bytes()
    }

    fn failing_recorder(_: &Settings) -> TargetResult<Box<dyn EventTarget>> {
        Ok(Box::new(RecordingTarget::new().with_status(1)))
    }

    fn handler(jenkins: Arc<MockJenkins>) -> PipelineHandler {
        let registry = PluginRegistry::new().register_target(TargetSpec {
            name: "recording",
            help: "",
            required_settings: &[],
            factory: failing_recorder,
        });
        let config = PipelineConfig {
            targets: vec!["recording".into()],
            regex_file: None,
            ..PipelineConfig::default()
        };
        PipelineHandler::new(
            Pipeline::new(&registry, config).unwrap(),
            jenkins,
            JenkinsConfig::new("https://jenkins.example.com/", "bot", "token"),
            Settings::new(),
        )
    }

    fn jenkins() -> Arc<MockJenkins> {
        let mock = MockJenkins::new()
            .with_build_info(json!({
                "number": 7,
                "result": "SUCCESS",
                "url": "https://jenkins.example.com/job/folder/job/sample-job/7/",
                "timestamp": 1
            }))
            .with_console("Started by timer\nFinished: SUCCESS\n");
        Arc::new(mock)
    }

    #[tokio::test]
    async fn finished_build_runs_pipeline() {
        let jenkins = jenkins();
        let handler = handler(jenkins.clone());
        let status = handler.handle(&notification("FINISHED", 7)).await.unwrap();

        // only the main document: no generators configured
        assert_eq!(status, Some(1));
        assert_eq!(jenkins.call_count("get_build_info"), 1);
        assert_eq!(jenkins.call_count("get_build_console_output"), 1);
    }

    #[tokio::test]
    async fn other_phases_skipped_without_ci_traffic() {
        let jenkins = jenkins();
        let handler = handler(jenkins.clone());
        for phase in ["COMPLETED", "STARTED"] {
            assert_eq!(handler.handle(&notification(phase, 7)).await.unwrap(), None);
        }
        assert!(jenkins.calls().is_empty());
    }

    #[tokio::test]
    async fn undecodable_frame_is_an_error() {
        let handler = handler(jenkins());
        let err = handler.handle(b"onFinalized").await.unwrap_err();
        assert!(matches!(err, DaemonError::Notification(_)));
    }

    #[tokio::test]
    async fn log_only_reports_success() {
        let status = LogOnlyHandler.handle(&notification("STARTED", 3)).await.unwrap();
        assert_eq!(status, Some(0));
    }
}
