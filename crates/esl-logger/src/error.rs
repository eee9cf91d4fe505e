//! Error types for collection, event generation and the pipeline.

use esl_jenkins::JenkinsError;
use esl_targets::TargetError;
use thiserror::Error;

use crate::registry::PluginKind;

/// A CI operation failed in a way that aborts the collection cycle.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed: {source}")]
pub struct CollectionError {
    /// Name of the CI operation, e.g. `get_build_info`.
    pub operation: &'static str,
    #[source]
    pub source: JenkinsError,
}

impl CollectionError {
    pub fn new(operation: &'static str, source: JenkinsError) -> Self {
        Self { operation, source }
    }
}

pub type CollectionResult<T> = Result<T, CollectionError>;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error("bad status token {token:?} in ansible recap hosts:\n{hosts}")]
    HostStatus { token: String, hosts: String },

    #[error("bad ansible play total time {0:?}")]
    TotalTime(String),
}

pub type GenerateResult<T> = Result<T, GenerateError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown {kind} plugin: {name}")]
    UnknownPlugin { kind: PluginKind, name: String },
}

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error("generator {generator} failed: {source}")]
    Generate {
        generator: String,
        #[source]
        source: GenerateError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("dump failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
