//! "Build finished" notifications pushed by the CI server's event feed.
//!
//! A frame looks like:
//! ```text
//! onFinalized {"name":"sample-job","url":"job/folder/job/sample-job/","build":{...}}
//! ```
//! The first whitespace-delimited token names the feed event and is dropped.

use percent_encoding::percent_decode_str;
use serde::Deserialize;
use thiserror::Error;

/// Phase that triggers a collection run.
pub const PHASE_FINISHED: &str = "FINISHED";

/// Earlier phase that is deliberately skipped.
pub const PHASE_COMPLETED: &str = "COMPLETED";

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("notification has no payload after the event name")]
    Empty,

    #[error("invalid notification JSON: {0}")]
    Json(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BuildNotification {
    pub name: String,
    /// Job URL, usually relative to the server root.
    pub url: String,
    pub build: NotificationBuild,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationBuild {
    pub number: u64,
    pub phase: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub full_url: Option<String>,
}

impl BuildNotification {
    /// Decode one raw feed frame.
    ///
    /// Payload tokens are concatenated with no separator, so whitespace
    /// inside JSON strings does not survive decoding.
    pub fn from_frame(frame: &[u8]) -> Result<Self, NotificationError> {
        let text =
            std::str::from_utf8(frame).map_err(|e| NotificationError::Encoding(e.to_string()))?;
        let body: String = text.split_whitespace().skip(1).collect();
        if body.is_empty() {
            return Err(NotificationError::Empty);
        }
        serde_json::from_str(&body).map_err(|e| NotificationError::Json(e.to_string()))
    }

    /// Job path derived from the notification URL.
    pub fn job_name(&self) -> String {
        project_name(&self.url)
    }

    pub fn build_number(&self) -> u64 {
        self.build.number
    }

    pub fn phase(&self) -> &str {
        &self.build.phase
    }

    pub fn is_finished(&self) -> bool {
        self.build.phase == PHASE_FINISHED
    }
}

/// Turn a job URL into a job path: `job/a/job/b/` becomes `a/b`.
pub fn project_name(job_url: &str) -> String {
    let path = match url::Url::parse(job_url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => job_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let joined = path
        .trim_matches('/')
        .split('/')
        .filter(|segment| *segment != "job")
        .collect::<Vec<_>>()
        .join("/");

    percent_decode_str(&joined).decode_utf8_lossy().into_owned()
}
