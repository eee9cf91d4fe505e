//! es-logger — collect one finished Jenkins build and ship it as events.
//!
//! Exits with the number of failed deliveries, capped at 255.

use clap::{CommandFactory, FromArgMatches};
use esl_jenkins::JenkinsClient;
use esl_logger::{Cli, Pipeline, PluginRegistry};
use esl_protocol::Settings;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let registry = PluginRegistry::with_defaults();
    let matches = Cli::command()
        .after_help(format!("Target Variables:\n\n{}", registry.target_help()))
        .get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .init();

    if cli.list_plugins {
        print!("{}", registry.describe());
        return Ok(());
    }

    let config = cli.into_config();
    let settings = Settings::from_env();
    let pipeline = Pipeline::new(&registry, config.pipeline.clone())?;
    tracing::info!(targets = ?config.pipeline.targets, "using targets");

    let targets = if config.output.post {
        pipeline.create_targets(&settings)?
    } else {
        Vec::new()
    };
    let identity = config.identity()?;
    let client = JenkinsClient::new(&config.jenkins()?);

    let mut stdout = std::io::stdout().lock();
    let status = pipeline
        .run(&client, &settings, &identity, config.output, targets, &mut stdout)
        .await?;

    std::process::exit(status.min(255) as i32);
}
