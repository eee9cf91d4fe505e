//! esl-daemon — runs es-logger for every finished build on the CI feed.
//!
//! Exits with the daemon's final tally, capped at 255.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use esl_daemon::{
    Daemon, DaemonConfig, DaemonOptions, LogOnlyHandler, MqttFeed, NotificationHandler,
    PipelineHandler,
};
use esl_jenkins::JenkinsClient;
use esl_logger::{Pipeline, PluginRegistry};
use esl_protocol::Settings;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "esl-daemon",
    version,
    about = "Subscribe to the Jenkins build feed and run es-logger for every finished build"
)]
struct Args {
    /// Daemon configuration file
    #[arg(default_value = "es-logger.toml")]
    config: PathBuf,

    /// Log each notification instead of processing it
    #[arg(short = 't', long)]
    test_feed: bool,

    /// Print debug logs during execution
    #[arg(short = 'd', long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "esl-daemon starting");

    // ── Load config ─────────────────────────────────────────────
    let config = DaemonConfig::from_file(&args.config)?;
    let registry = PluginRegistry::with_defaults();
    let pipeline_config = config.pipeline_config(&registry);
    let settings = config.settings(Settings::from_env(), &pipeline_config);
    config.validate(&registry, &pipeline_config, &settings)?;
    tracing::info!(
        targets = ?pipeline_config.targets,
        processors = ?pipeline_config.process_console_logs,
        gatherers = ?pipeline_config.gather_build_data,
        generators = ?pipeline_config.generate_events,
        "config loaded"
    );

    // ── Handler ─────────────────────────────────────────────────
    let handler: Arc<dyn NotificationHandler> = if args.test_feed {
        tracing::info!("test feed mode, notifications are only logged");
        Arc::new(LogOnlyHandler)
    } else {
        let jenkins = config.jenkins(&settings)?;
        let pipeline = Pipeline::new(&registry, pipeline_config)?;
        Arc::new(PipelineHandler::new(
            pipeline,
            Arc::new(JenkinsClient::new(&jenkins)),
            jenkins,
            settings,
        ))
    };

    // ── Run ─────────────────────────────────────────────────────
    let daemon = Daemon::new(handler, DaemonOptions::from(&config.feed));
    tokio::spawn(stop_on_signal(daemon.stop_token()));

    let feed = MqttFeed::new(&config.feed);
    tracing::info!(
        broker = %config.feed.broker_host,
        port = config.feed.broker_port,
        topic = %config.feed.topic,
        "connecting to build feed"
    );
    let status = daemon.run(Box::new(feed)).await;

    tracing::info!(status, "esl-daemon finished");
    std::process::exit(status.min(255) as i32);
}

/// Cancel `stop` on SIGINT or SIGTERM.
async fn stop_on_signal(stop: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("shutdown signal received");
    stop.cancel();
}
