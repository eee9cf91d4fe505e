//! Logstash HTTP input target.
//!
//! Posts each event as one JSON document. Timeouts and dropped connections
//! discard the session and retry; anything else fails the event at once.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use esl_protocol::{Event, Settings};

use crate::error::{TargetError, TargetResult};
use crate::target::{EventTarget, TargetSpec};

const HELP: &str = "\
Logstash Target Settings:
    LOGSTASH_SERVER         The server to send events to
    LS_USER                 The user for logstash access
    LS_PASSWORD             The password for logstash access
    LS_TIMEOUT_SECS         Request timeout in seconds (default 30)";

const REQUIRED: &[&str] = &["LOGSTASH_SERVER", "LS_USER", "LS_PASSWORD"];

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_ATTEMPTS: u32 = 5;
const RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct LogstashConfig {
    pub server: String,
    pub user: String,
    pub password: String,
    pub timeout: Duration,
    pub retry_delay: Duration,
    pub max_attempts: u32,
}

impl LogstashConfig {
    pub fn new(server: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            user: user.into(),
            password: password.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry_delay: RETRY_DELAY,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let timeout_secs = settings
            .get("LS_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self {
            timeout: Duration::from_secs(timeout_secs),
            ..Self::new(
                settings.get_or("LOGSTASH_SERVER", ""),
                settings.get_or("LS_USER", ""),
                settings.get_or("LS_PASSWORD", ""),
            )
        }
    }
}

pub struct LogstashTarget {
    config: LogstashConfig,
    session: Option<reqwest::Client>,
}

impl LogstashTarget {
    pub fn new(config: LogstashConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    pub fn spec() -> TargetSpec {
        TargetSpec {
            name: "logstash",
            help: HELP,
            required_settings: REQUIRED,
            factory: |settings| Ok(Box::new(Self::new(LogstashConfig::from_settings(settings)))),
        }
    }

    fn session(&mut self) -> TargetResult<reqwest::Client> {
        if let Some(client) = &self.session {
            return Ok(client.clone());
        }
        tracing::debug!(server = %self.config.server, "creating logstash session");
        let client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| self.delivery_error(format!("cannot create session: {e}")))?;
        self.session = Some(client.clone());
        Ok(client)
    }

    fn delivery_error(&self, message: String) -> TargetError {
        TargetError::Delivery {
            target: "logstash".to_string(),
            message,
        }
    }
}

/// Read timeouts and connections dropped mid-request.
///
/// Failing to connect at all, including a connect timeout, is not retried.
fn is_transient(err: &reqwest::Error) -> bool {
    if err.is_connect() {
        return false;
    }
    if err.is_timeout() {
        return true;
    }
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>()
            && matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
                    | ErrorKind::TimedOut
            )
        {
            return true;
        }
        source = inner.source();
    }
    false
}

#[async_trait]
impl EventTarget for LogstashTarget {
    fn name(&self) -> &str {
        "logstash"
    }

    fn validate(&self) -> bool {
        !self.config.server.is_empty()
    }

    async fn send_event(&mut self, event: &Event) -> TargetResult<u32> {
        let mut attempts = 0u32;
        loop {
            let session = self.session()?;
            let result = session
                .post(&self.config.server)
                .basic_auth(&self.config.user, Some(&self.config.password))
                .json(event)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let ok = response.status().is_success();
                    tracing::debug!(status = %response.status(), ok, "posted event");
                    return Ok(if ok { 0 } else { 1 });
                }
                Err(e) if is_transient(&e) => {
                    attempts += 1;
                    tracing::warn!(attempt = attempts, error = %e, "logstash post failed, dropping session");
                    self.session = None;
                    if attempts >= self.config.max_attempts {
                        return Err(self.delivery_error(format!(
                            "giving up after {attempts} attempts: {e}"
                        )));
                    }
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => {
                    return Err(self.delivery_error(format!(
                        "post failed after {attempts} retried attempts: {e}"
                    )));
                }
            }
        }
    }

    async fn finish_send(&mut self) -> TargetResult<u32> {
        Ok(0)
    }
}
