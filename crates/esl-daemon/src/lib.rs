//! esl-daemon — collects every build announced on the CI event feed.
//!
//! A [`Daemon`] listens on a [`Feed`] of build notifications and runs the
//! es-logger pipeline for each finished build on a small worker pool.

pub mod config;
pub mod daemon;
pub mod error;
pub mod feed;
pub mod handler;

pub use config::{DaemonConfig, FeedConfig};
pub use daemon::{Daemon, DaemonOptions};
pub use error::{DaemonError, DaemonResult};
pub use feed::{Feed, FeedLog, MockFeed, MqttFeed, frame};
pub use handler::{LogOnlyHandler, NotificationHandler, PipelineHandler};
