use serde::Serialize;
use serde_json::{Map, Value};

/// One self-contained document destined for a delivery target.
///
/// Backed by a sorted map so dumps are stable without extra work.
pub type Event = Map<String, Value>;

/// Key under which every event carries es-logger's own metadata.
pub const SELF_METADATA_KEY: &str = "eslogger";

/// Replaces the per-branch build map of git build data actions.
pub const BRANCH_REDACTION_MARKER: &str = "Removed by es-logger";

/// Environment variables echoed onto every event unless a generator adds more.
pub const DEFAULT_FIELDS: &[&str] = &["BUILD_NUMBER", "JOB_NAME", "BUILD_URL"];

/// Build record fields copied into each event's `build_info` object.
pub const DEFAULT_BUILD_INFO_FIELDS: &[&str] = &["description", "number", "result", "url"];

/// CI server credentials. `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Which build a collection cycle is about. Fixed once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildIdentity {
    /// CI server base URL.
    pub server: String,
    pub credentials: Credentials,
    /// Full job path, folders separated by `/`.
    pub job_name: String,
    /// 0 means "unresolved".
    pub build_number: u64,
}

impl BuildIdentity {
    pub fn new(
        server: impl Into<String>,
        credentials: Credentials,
        job_name: impl Into<String>,
        build_number: u64,
    ) -> Self {
        Self {
            server: server.into(),
            credentials,
            job_name: job_name.into(),
            build_number,
        }
    }

    /// Metadata block stored under [`SELF_METADATA_KEY`].
    pub fn metadata(&self) -> SelfMetadata {
        SelfMetadata {
            job_name: self.job_name.clone(),
            jenkins_url: self.server.clone(),
            build_number: self.build_number,
            event: None,
        }
    }
}

/// es-logger's own metadata, attached to the main document and every event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfMetadata {
    pub job_name: String,
    pub jenkins_url: String,
    pub build_number: u64,
    /// Name of the generator that produced the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl SelfMetadata {
    /// Shallow copy tagged with a generator name.
    pub fn for_generator(&self, generator: &str) -> Self {
        Self {
            event: Some(generator.to_string()),
            ..self.clone()
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!(self)
    }
}
