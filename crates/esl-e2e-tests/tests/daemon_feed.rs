//! The daemon consuming build notifications against real HTTP services.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use esl_daemon::{Daemon, DaemonOptions, LogOnlyHandler, MockFeed, PipelineHandler};
use esl_jenkins::JenkinsClient;

use helpers::{BUILD, CiHarness, notification, pipeline};

fn options() -> DaemonOptions {
    DaemonOptions {
        num_workers: 2,
        worker_timeout: Duration::from_millis(20),
        supervisor_interval: Duration::from_millis(20),
        startup_delay: Duration::ZERO,
    }
}

fn handler(ci: &CiHarness, generators: &[&str]) -> PipelineHandler {
    let jenkins = ci.jenkins_config();
    PipelineHandler::new(
        pipeline(generators),
        Arc::new(JenkinsClient::new(&jenkins)),
        jenkins,
        ci.settings(),
    )
}

#[tokio::test]
async fn finished_builds_are_logged_and_others_skipped() {
    let ci = CiHarness::start().await;
    ci.mount_build().await;
    ci.accept_events(200).await;

    let daemon = Daemon::new(Arc::new(handler(&ci, &["stages"])), options());
    let feed = MockFeed::new([
        notification("STARTED", BUILD),
        notification("COMPLETED", BUILD),
        notification("FINISHED", BUILD),
    ]);

    let status = daemon.run(Box::new(feed)).await;

    assert_eq!(status, 0);
    let posted = ci.posted().await;
    assert_eq!(posted.len(), 3);
    assert!(posted.iter().all(|doc| doc["eslogger"]["build_number"] == BUILD));

    // skipped phases never reach the CI server
    let build_info_fetches = ci
        .jenkins_paths()
        .await
        .iter()
        .filter(|p| p.ends_with("/42/api/json"))
        .count();
    assert_eq!(build_info_fetches, 1);
}

#[tokio::test]
async fn failures_are_tallied_without_stopping_workers() {
    let ci = CiHarness::start().await;
    ci.fail_console(500).await;
    ci.mount_build().await;
    ci.accept_events(200).await;

    let daemon = Daemon::new(Arc::new(handler(&ci, &[])), options());
    let feed = MockFeed::new([
        notification("FINISHED", BUILD),
        b"jenkins/builds not-json".to_vec(),
        notification("FINISHED", BUILD),
    ]);

    let status = daemon.run(Box::new(feed)).await;

    assert_eq!(status, 3);
    assert!(ci.posted().await.is_empty());
}

#[tokio::test]
async fn test_feed_mode_only_logs() {
    let ci = CiHarness::start().await;

    let daemon = Daemon::new(Arc::new(LogOnlyHandler), options());
    let feed = MockFeed::new([notification("FINISHED", BUILD), notification("STARTED", 43)]);
    let log = feed.handle();

    let status = daemon.run(Box::new(feed)).await;

    assert_eq!(status, 0);
    assert_eq!(log.lock().unwrap().delivered, 2);
    assert!(ci.jenkins_paths().await.is_empty());
}
