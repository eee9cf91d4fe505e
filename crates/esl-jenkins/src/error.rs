//! Jenkins API error types.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum JenkinsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("access denied ({status}): {url}")]
    Denied { status: u16, url: String },

    #[error("unexpected status {status}: {url}")]
    Status { status: u16, url: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl JenkinsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The server answered but would not hand the resource over.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Denied { .. } | Self::Status { .. }
        )
    }
}

pub type JenkinsResult<T> = Result<T, JenkinsError>;

/// Treat "not found" as absent data.
pub(crate) fn not_found_as_none<T>(result: JenkinsResult<T>) -> JenkinsResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
