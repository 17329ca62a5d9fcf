//! Queue client: long-poll, validation, acknowledgement and depth statistics.
//!
//! Backend failures never escape this type. A failed poll yields no events, a failed
//! delete is logged, and failed stats come back as unknowns. Ineligible deliveries are
//! deleted as soon as they are seen so they cannot be redelivered.

use crate::backend::{QueueBackend, ReceiveOptions};
use crate::envelope::decode_message;
use crate::error::{QueueError, Rejection};
use analysis_core::{EventFilter, NotificationEvent, QueueConfig, QueueStats};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Size reported in test messages. Only used for logging by the worker.
const TEST_MESSAGE_SIZE: u64 = 1000;
const MAX_BATCH: i32 = 10;

pub struct QueueClient {
    backend: Arc<dyn QueueBackend>,
    filter: EventFilter,
    options: ReceiveOptions,
    rejected: AtomicU64,
}

impl QueueClient {
    pub fn new(backend: Arc<dyn QueueBackend>, filter: EventFilter, config: &QueueConfig) -> Self {
        Self {
            backend,
            filter,
            options: ReceiveOptions::from(config),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn queue_url(&self) -> &str {
        self.backend.queue_url()
    }

    /// Messages deleted as ineligible since this client was created.
    pub fn rejected_total(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// One long-poll round trip returning at most `max_messages` eligible events.
    #[tracing::instrument(skip(self), fields(queue_url = %self.backend.queue_url()))]
    pub async fn poll(&self, max_messages: i32) -> Vec<NotificationEvent> {
        let options = ReceiveOptions {
            max_messages: max_messages.clamp(1, MAX_BATCH),
            ..self.options
        };

        let messages = match self.backend.receive(options).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!(error = %e, "Error polling queue");
                return Vec::new();
            }
        };
        tracing::info!(count = messages.len(), "Received messages from queue");

        let mut events = Vec::with_capacity(messages.len());
        for message in messages {
            match decode_message(&message, &self.filter) {
                Ok(event) => {
                    tracing::info!(
                        message_id = %event.message_id,
                        event_kind = %event.event_kind,
                        object = %event.object_uri(),
                        "Valid notification"
                    );
                    events.push(event);
                }
                Err(rejection) => {
                    self.reject(&message.message_id, &message.receipt_handle, &rejection)
                        .await;
                }
            }
        }
        events
    }

    async fn reject(&self, message_id: &str, receipt_handle: &str, rejection: &Rejection) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        match rejection {
            Rejection::InvalidJson(_) | Rejection::MalformedRecord(_) => {
                tracing::error!(message_id = %message_id, reason = %rejection, "Malformed message, deleting")
            }
            _ => {
                tracing::warn!(message_id = %message_id, reason = %rejection, "Ineligible message, deleting")
            }
        }
        self.delete_receipt(message_id, receipt_handle).await;
    }

    /// Acknowledge a delivery. Returns whether the backend confirmed the delete.
    ///
    /// Deleting an already deleted or expired delivery is logged and tolerated.
    pub async fn delete(&self, event: &NotificationEvent) -> bool {
        self.delete_receipt(&event.message_id, &event.delivery_token)
            .await
    }

    async fn delete_receipt(&self, message_id: &str, receipt_handle: &str) -> bool {
        match self.backend.delete(receipt_handle).await {
            Ok(()) => {
                tracing::info!(message_id = %message_id, "Deleted message from queue");
                true
            }
            Err(QueueError::InvalidReceipt) => {
                tracing::warn!(
                    message_id = %message_id,
                    "Message already deleted or receipt expired"
                );
                false
            }
            Err(e) => {
                tracing::error!(message_id = %message_id, error = %e, "Failed to delete message");
                false
            }
        }
    }

    /// Approximate queue depth; unknowns on failure.
    pub async fn stats(&self) -> QueueStats {
        match self.backend.attributes().await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!(error = %e, "Failed to get queue stats");
                QueueStats::default()
            }
        }
    }

    /// Enqueue a simplified body for `bucket`/`key`, returning the message id.
    pub async fn send_test_message(&self, bucket: &str, key: &str) -> Result<String, QueueError> {
        let body = json!({
            "bucket": bucket,
            "key": key,
            "size": TEST_MESSAGE_SIZE,
            "test": true,
        });
        let message_id = self.backend.send(&body.to_string()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to send test message");
            e
        })?;
        tracing::info!(bucket = %bucket, key = %key, message_id = %message_id, "Sent test message");
        Ok(message_id)
    }
}
