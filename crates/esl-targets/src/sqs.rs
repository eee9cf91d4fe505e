//! AWS SQS target.
//!
//! Events are buffered client-side and submitted with `SendMessageBatch`.
//! A batch is flushed before it would exceed the count or byte limit.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{MessageAttributeValue, SendMessageBatchRequestEntry};
use esl_protocol::{Event, Settings};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;

use crate::error::{TargetError, TargetResult};
use crate::target::{EventTarget, TargetSpec};

const HELP: &str = "\
AWS SQS Target Settings:
    Credentials come from the standard AWS provider chain
    (environment, shared config/credentials files, instance role).

    SQS_QUEUE       Name or URL of the queue to send the data into";

const REQUIRED: &[&str] = &["SQS_QUEUE"];

/// SQS accepts at most 10 entries per batch.
pub const MESSAGE_COUNT_LIMIT: usize = 10;
/// 256 KiB, both per message and per batch.
pub const MESSAGE_SIZE_LIMIT: usize = 256 * 1024;

const MESSAGE_SOURCE: &str = "es-logger";
const MESSAGE_GROUP: &str = "es-logger";

// ── Queue entries ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageAttribute {
    pub string_value: String,
    pub data_type: String,
}

/// One message of a batch, serialized the way it is sized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueEntry {
    /// Position in the batch; assigned when the entry is buffered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub message_body: String,
    pub message_attributes: BTreeMap<String, MessageAttribute>,
    pub message_deduplication_id: String,
    pub message_group_id: String,
}

impl QueueEntry {
    pub fn new(body: String) -> Self {
        let dedup = hex::encode(Sha256::digest(body.as_bytes()));
        let attributes = BTreeMap::from([(
            "source".to_string(),
            MessageAttribute {
                string_value: MESSAGE_SOURCE.to_string(),
                data_type: "String".to_string(),
            },
        )]);
        Self {
            id: None,
            message_body: body,
            message_attributes: attributes,
            message_deduplication_id: dedup,
            message_group_id: MESSAGE_GROUP.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSuccess {
    pub id: String,
    pub sequence_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchFailure {
    pub id: String,
    pub code: String,
    pub message: Option<String>,
    pub sender_fault: bool,
}

/// Per-entry result of one batch submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub successful: Vec<BatchSuccess>,
    pub failed: Vec<BatchFailure>,
}

// ── QueueClient trait ─────────────────────────────────────────

/// Batch submission to a message queue.
#[async_trait]
pub trait QueueClient: Send + Sync {
    async fn send_batch(&self, queue: &str, entries: &[QueueEntry]) -> TargetResult<BatchOutcome>;
}

/// `QueueClient` backed by the AWS SDK. The SDK client is created on first use.
#[derive(Default)]
pub struct AwsQueueClient {
    client: OnceCell<aws_sdk_sqs::Client>,
}

impl AwsQueueClient {
    pub fn new() -> Self {
        Self::default()
    }

    async fn client(&self) -> &aws_sdk_sqs::Client {
        self.client
            .get_or_init(|| async {
                let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
                aws_sdk_sqs::Client::new(&config)
            })
            .await
    }

    async fn queue_url(&self, queue: &str) -> TargetResult<String> {
        if queue.starts_with("https://") || queue.starts_with("http://") {
            return Ok(queue.to_string());
        }
        let output = self
            .client()
            .await
            .get_queue_url()
            .queue_name(queue)
            .send()
            .await
            .map_err(|e| TargetError::Queue(DisplayErrorContext(&e).to_string()))?;
        output
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| TargetError::Queue(format!("no URL returned for queue {queue}")))
    }
}

fn to_sdk_entry(entry: &QueueEntry) -> TargetResult<SendMessageBatchRequestEntry> {
    let mut builder = SendMessageBatchRequestEntry::builder()
        .id(entry.id())
        .message_body(&entry.message_body)
        .message_deduplication_id(&entry.message_deduplication_id)
        .message_group_id(&entry.message_group_id);
    for (name, attribute) in &entry.message_attributes {
        let value = MessageAttributeValue::builder()
            .data_type(&attribute.data_type)
            .string_value(&attribute.string_value)
            .build()
            .map_err(|e| TargetError::Queue(e.to_string()))?;
        builder = builder.message_attributes(name, value);
    }
    builder.build().map_err(|e| TargetError::Queue(e.to_string()))
}

#[async_trait]
impl QueueClient for AwsQueueClient {
    async fn send_batch(&self, queue: &str, entries: &[QueueEntry]) -> TargetResult<BatchOutcome> {
        let queue_url = self.queue_url(queue).await?;
        let sdk_entries = entries
            .iter()
            .map(to_sdk_entry)
            .collect::<TargetResult<Vec<_>>>()?;

        let output = self
            .client()
            .await
            .send_message_batch()
            .queue_url(queue_url)
            .set_entries(Some(sdk_entries))
            .send()
            .await
            .map_err(|e| TargetError::Queue(DisplayErrorContext(&e).to_string()))?;

        Ok(BatchOutcome {
            successful: output
                .successful()
                .iter()
                .map(|r| BatchSuccess {
                    id: r.id().to_string(),
                    sequence_number: r.sequence_number().map(str::to_string),
                })
                .collect(),
            failed: output
                .failed()
                .iter()
                .map(|r| BatchFailure {
                    id: r.id().to_string(),
                    code: r.code().to_string(),
                    message: r.message().map(str::to_string),
                    sender_fault: r.sender_fault(),
                })
                .collect(),
        })
    }
}

// ── SqsTarget ─────────────────────────────────────────────────

pub struct SqsTarget {
    queue: String,
    client: Arc<dyn QueueClient>,
    pending: Vec<QueueEntry>,
    count_limit: usize,
    size_limit: usize,
}

impl SqsTarget {
    pub fn new(queue: impl Into<String>, client: Arc<dyn QueueClient>) -> Self {
        Self {
            queue: queue.into(),
            client,
            pending: Vec::new(),
            count_limit: MESSAGE_COUNT_LIMIT,
            size_limit: MESSAGE_SIZE_LIMIT,
        }
    }

    /// Override the batch limits.
    pub fn with_limits(mut self, count_limit: usize, size_limit: usize) -> Self {
        self.count_limit = count_limit;
        self.size_limit = size_limit;
        self
    }

    pub fn spec() -> TargetSpec {
        TargetSpec {
            name: "sqs",
            help: HELP,
            required_settings: REQUIRED,
            factory: |settings: &Settings| {
                Ok(Box::new(Self::new(
                    settings.get_or("SQS_QUEUE", ""),
                    Arc::new(AwsQueueClient::new()),
                )))
            },
        }
    }

    pub fn pending(&self) -> &[QueueEntry] {
        &self.pending
    }

    /// Submit the buffered batch and return how many entries failed.
    ///
    /// The buffer is emptied whatever the outcome.
    async fn flush(&mut self) -> TargetResult<u32> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let batch = std::mem::take(&mut self.pending);
        tracing::debug!(count = batch.len(), queue = %self.queue, "sending batch");
        let outcome = self.client.send_batch(&self.queue, &batch).await?;

        for record in &outcome.successful {
            tracing::debug!(
                id = %record.id,
                sequence_number = record.sequence_number.as_deref().unwrap_or(""),
                "queued record"
            );
        }
        for record in &outcome.failed {
            tracing::warn!(
                id = %record.id,
                code = %record.code,
                message = record.message.as_deref().unwrap_or(""),
                sender_fault = record.sender_fault,
                "record rejected by queue"
            );
        }
        let failed = outcome.failed.len() as u32;
        if failed > 0 {
            tracing::warn!(failed, "batch had failures");
        }
        Ok(failed)
    }
}

fn serialized_len<T: Serialize + ?Sized>(value: &T) -> TargetResult<usize> {
    serde_json::to_string(value)
        .map(|s| s.len())
        .map_err(|e| TargetError::Serialization(e.to_string()))
}

#[async_trait]
impl EventTarget for SqsTarget {
    fn name(&self) -> &str {
        "sqs"
    }

    fn validate(&self) -> bool {
        !self.queue.is_empty()
    }

    async fn send_event(&mut self, event: &Event) -> TargetResult<u32> {
        let body =
            serde_json::to_string(event).map_err(|e| TargetError::Serialization(e.to_string()))?;
        let mut entry = QueueEntry::new(body);

        let size = serialized_len(&entry)?;
        if size >= self.size_limit {
            tracing::warn!(size, limit = self.size_limit, "message too big, dropping");
            return Ok(1);
        }

        let mut errors = 0;
        let total = serialized_len(&self.pending)? + size;
        if total >= self.size_limit || self.pending.len() == self.count_limit {
            tracing::debug!(total, count = self.pending.len(), "batch full, flushing");
            errors = self.flush().await?;
        }

        // Ids only need to be unique within one batch
        entry.id = Some(self.pending.len().to_string());
        self.pending.push(entry);
        Ok(errors)
    }

    async fn finish_send(&mut self) -> TargetResult<u32> {
        self.flush().await
    }
}
