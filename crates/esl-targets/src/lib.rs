//! esl-targets — where assembled events are delivered.
//!
//! Every target implements [`EventTarget`]: send one event, then flush
//! whatever is pending. Targets are created per pipeline run from a
//! [`TargetSpec`] and the run's [`Settings`](esl_protocol::Settings).

pub mod error;
pub mod logstash;
pub mod mock;
pub mod sqs;
pub mod target;

pub use error::{TargetError, TargetResult};
pub use logstash::{LogstashConfig, LogstashTarget};
pub use mock::{MockQueueClient, Recorded, RecordingTarget};
pub use sqs::{AwsQueueClient, BatchFailure, BatchOutcome, QueueClient, QueueEntry, SqsTarget};
pub use target::{EventTarget, TargetSpec, all_targets};
