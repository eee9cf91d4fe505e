//! One build collected from a Jenkins server and shipped to logstash.

mod helpers;

use esl_jenkins::JenkinsClient;
use esl_logger::{PipelineError, RunOptions};
use serde_json::json;

use helpers::{BUILD, CiHarness, JOB, pipeline};

#[tokio::test]
async fn build_is_posted_and_dumped() {
    let ci = CiHarness::start().await;
    ci.mount_build().await;
    ci.accept_events(200).await;

    let pipeline = pipeline(&["stages", "commit"]);
    let settings = ci.settings();
    let targets = pipeline.create_targets(&settings).unwrap();
    let client = JenkinsClient::new(&ci.jenkins_config());
    let mut out = Vec::new();

    let status = pipeline
        .run(
            &client,
            &settings,
            &ci.identity(),
            RunOptions {
                dump: true,
                post: true,
                events_only: false,
            },
            targets,
            &mut out,
        )
        .await
        .unwrap();
    assert_eq!(status, 0);

    // main document, then one event per stage; no change sets
    let posted = ci.posted().await;
    assert_eq!(posted.len(), 3);

    let main = &posted[0];
    assert_eq!(main["eslogger"]["job_name"], JOB);
    assert_eq!(main["eslogger"]["build_number"], BUILD);
    assert_eq!(main["parameters"], json!({"TARGET": "prod"}));
    assert_eq!(main["job_config_info_status"], "Retrieved config.xml.");
    assert_eq!(main["job_config_info"]["is_pipeline_job"], false);
    assert_eq!(main["env_vars"], json!(null));
    assert!(main["console_log"].as_str().unwrap().starts_with("Started by timer\n"));
    assert_eq!(main["stages"]["name"], "#42");

    assert_eq!(posted[1]["stages"], json!({"name": "build"}));
    assert_eq!(posted[2]["stages"], json!({"name": "test"}));
    assert_eq!(posted[2]["eslogger"]["event"], "stages");
    assert_eq!(posted[2]["build_info"]["result"], "SUCCESS");
    assert_eq!(posted[2]["build_info"]["timestamp"], 1_520_000_000_000u64);

    let dumped = String::from_utf8(out).unwrap();
    assert_eq!(dumped.matches("\"eslogger\": {").count(), 3);
}

#[tokio::test]
async fn rejected_events_are_counted() {
    let ci = CiHarness::start().await;
    ci.mount_build().await;
    ci.accept_events(500).await;

    let pipeline = pipeline(&["stages"]);
    let settings = ci.settings();
    let targets = pipeline.create_targets(&settings).unwrap();
    let client = JenkinsClient::new(&ci.jenkins_config());

    let status = pipeline
        .run(
            &client,
            &settings,
            &ci.identity(),
            RunOptions::default(),
            targets,
            &mut std::io::sink(),
        )
        .await
        .unwrap();

    assert_eq!(status, 3);
}

#[tokio::test]
async fn console_failure_aborts_before_delivery() {
    let ci = CiHarness::start().await;
    ci.fail_console(503).await;
    ci.mount_build().await;
    ci.accept_events(200).await;

    let pipeline = pipeline(&["stages"]);
    let settings = ci.settings();
    let targets = pipeline.create_targets(&settings).unwrap();
    let client = JenkinsClient::new(&ci.jenkins_config());

    let err = pipeline
        .run(
            &client,
            &settings,
            &ci.identity(),
            RunOptions::default(),
            targets,
            &mut std::io::sink(),
        )
        .await
        .unwrap_err();

    match err {
        PipelineError::Collection(e) => assert_eq!(e.operation, "get_build_console_output"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(ci.posted().await.is_empty());
}

#[tokio::test]
async fn events_only_dump_without_post() {
    let ci = CiHarness::start().await;
    ci.mount_build().await;

    let pipeline = pipeline(&["stages"]);
    let client = JenkinsClient::new(&ci.jenkins_config());
    let mut out = Vec::new();

    let status = pipeline
        .run(
            &client,
            &ci.settings(),
            &ci.identity(),
            RunOptions {
                dump: true,
                post: false,
                events_only: true,
            },
            Vec::new(),
            &mut out,
        )
        .await
        .unwrap();

    assert_eq!(status, 0);
    let dumped = String::from_utf8(out).unwrap();
    assert!(!dumped.contains("console_log"));
    assert_eq!(dumped.matches("\"event\": \"stages\"").count(), 2);
    assert!(ci.posted().await.is_empty());
}
