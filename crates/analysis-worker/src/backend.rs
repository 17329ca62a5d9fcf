//! Queue backend abstraction
//!
//! [`QueueBackend`] is the seam between the pipeline and the message queue. The SQS
//! implementation lives in [`crate::sqs`]; tests substitute an in-memory queue.

use crate::error::QueueError;
use analysis_core::{QueueConfig, QueueStats};
use async_trait::async_trait;

/// One undecoded delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    pub max_messages: i32,
    pub wait_time_secs: i32,
    pub visibility_timeout_secs: i32,
}

impl From<&QueueConfig> for ReceiveOptions {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_messages: config.max_messages,
            wait_time_secs: config.wait_time_secs,
            visibility_timeout_secs: config.visibility_timeout_secs,
        }
    }
}

#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// One receive round trip. Returns after at most `wait_time_secs`.
    async fn receive(&self, options: ReceiveOptions) -> Result<Vec<RawMessage>, QueueError>;

    /// Delete one delivery. An unknown or expired handle is [`QueueError::InvalidReceipt`].
    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;

    async fn attributes(&self) -> Result<QueueStats, QueueError>;

    /// Enqueue a raw body, returning the new message id.
    async fn send(&self, body: &str) -> Result<String, QueueError>;

    fn queue_url(&self) -> &str;
}
