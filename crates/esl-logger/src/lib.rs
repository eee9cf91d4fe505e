//! esl-logger — collects one finished Jenkins build and turns it into events.
//!
//! A [`Collector`] gathers the build record, job configuration, injected
//! environment and console log into a [`Collection`]. Event generators
//! turn the collection into payloads, the [`EventAssembler`] wraps them
//! with build context, and a [`Pipeline`] ties it together with the
//! configured delivery targets.

pub mod assembler;
pub mod collector;
pub mod config;
pub mod error;
pub mod gatherers;
pub mod generators;
pub mod job_config;
pub mod pipeline;
pub mod plugin;
pub mod processors;
pub mod registry;

pub use assembler::EventAssembler;
pub use collector::{CollectedData, Collection, Collector, DEFAULT_CONSOLE_LENGTH};
pub use config::{Cli, LoggerConfig, PipelineConfig, RunOptions, split_names};
pub use error::{
    CollectionError, CollectionResult, GenerateError, GenerateResult, PipelineError,
    PipelineResult, RegistryError,
};
pub use pipeline::{Gathered, Pipeline};
pub use plugin::{BuildDataGatherer, ConsoleLogProcessor, EventGenerator};
pub use registry::{PluginKind, PluginRegistry};
