use esl_logger::{PipelineError, RegistryError};
use esl_protocol::NotificationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to read config: {0}")]
    Config(String),

    #[error("misconfigured, missing: {}", missing.join(", "))]
    Misconfigured { missing: Vec<String> },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("feed error: {0}")]
    Feed(String),
}

pub type DaemonResult<T> = Result<T, DaemonError>;
