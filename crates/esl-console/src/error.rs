//! Console processing error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("invalid pattern '{name}': {message}")]
    Pattern { name: String, message: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid regex file: {0}")]
    Json(String),
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;
