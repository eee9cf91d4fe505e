//! Delivery error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TargetError {
    /// Send failed for good: retries exhausted or a non-transient error.
    #[error("delivery to {target} failed: {message}")]
    Delivery { target: String, message: String },

    #[error("queue service error: {0}")]
    Queue(String),

    #[error("{target} is missing required settings: {}", missing.join(", "))]
    Misconfigured { target: String, missing: Vec<String> },

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type TargetResult<T> = Result<T, TargetError>;
