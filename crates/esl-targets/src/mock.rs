//! Test doubles: a queue service that records batches and a target that
//! records events.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use esl_protocol::Event;

use crate::error::{TargetError, TargetResult};
use crate::sqs::{BatchFailure, BatchOutcome, BatchSuccess, QueueClient, QueueEntry};
use crate::target::EventTarget;

// ── MockQueueClient ───────────────────────────────────────────

/// Records submitted batches; can reject chosen entry ids or whole calls.
#[derive(Default)]
pub struct MockQueueClient {
    batches: Mutex<Vec<Vec<QueueEntry>>>,
    queues: Mutex<Vec<String>>,
    failed_ids: HashSet<String>,
    error: Option<String>,
}

impl MockQueueClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report these entry ids as failed in every batch.
    pub fn with_failed_ids(mut self, ids: &[&str]) -> Self {
        self.failed_ids = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    /// Fail every call with a queue error.
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn batches(&self) -> Vec<Vec<QueueEntry>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn queues(&self) -> Vec<String> {
        self.queues.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueClient for MockQueueClient {
    async fn send_batch(&self, queue: &str, entries: &[QueueEntry]) -> TargetResult<BatchOutcome> {
        self.batches.lock().unwrap().push(entries.to_vec());
        self.queues.lock().unwrap().push(queue.to_string());
        if let Some(message) = &self.error {
            return Err(TargetError::Queue(message.clone()));
        }

        let mut outcome = BatchOutcome::default();
        for entry in entries {
            let id = entry.id().to_string();
            if self.failed_ids.contains(&id) {
                outcome.failed.push(BatchFailure {
                    id,
                    code: "InternalError".into(),
                    message: Some("mock rejection".into()),
                    sender_fault: false,
                });
            } else {
                outcome.successful.push(BatchSuccess {
                    sequence_number: Some(format!("seq-{id}")),
                    id,
                });
            }
        }
        Ok(outcome)
    }
}

// ── RecordingTarget ───────────────────────────────────────────

/// Shared log of what a [`RecordingTarget`] received.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub events: Vec<Event>,
    pub finishes: usize,
}

/// Target that keeps every event in memory and reports a fixed status.
pub struct RecordingTarget {
    recorded: Arc<Mutex<Recorded>>,
    status: u32,
    finish_status: u32,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self {
            recorded: Arc::new(Mutex::new(Recorded::default())),
            status: 0,
            finish_status: 0,
        }
    }

    /// Status returned from every `send_event`.
    pub fn with_status(mut self, status: u32) -> Self {
        self.status = status;
        self
    }

    pub fn with_finish_status(mut self, status: u32) -> Self {
        self.finish_status = status;
        self
    }

    /// Handle that stays valid after the target is boxed and moved.
    pub fn handle(&self) -> Arc<Mutex<Recorded>> {
        self.recorded.clone()
    }
}

impl Default for RecordingTarget {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventTarget for RecordingTarget {
    fn name(&self) -> &str {
        "recording"
    }

    fn validate(&self) -> bool {
        true
    }

    async fn send_event(&mut self, event: &Event) -> TargetResult<u32> {
        self.recorded.lock().unwrap().events.push(event.clone());
        Ok(self.status)
    }

    async fn finish_send(&mut self) -> TargetResult<u32> {
        self.recorded.lock().unwrap().finishes += 1;
        Ok(self.finish_status)
    }
}
