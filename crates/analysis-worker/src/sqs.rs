use crate::backend::{QueueBackend, RawMessage, ReceiveOptions};
use crate::error::QueueError;
use analysis_core::{QueueConfig, QueueStats};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::error::{DisplayErrorContext, SdkError};
use aws_sdk_sqs::operation::delete_message::DeleteMessageError;
use aws_sdk_sqs::operation::get_queue_url::GetQueueUrlError;
use aws_sdk_sqs::types::QueueAttributeName;
use aws_sdk_sqs::Client;
use std::collections::HashMap;

/// SQS queue backend
#[derive(Clone)]
pub struct SqsQueueBackend {
    client: Client,
    queue_url: String,
}

fn backend_error<E, R>(err: &SdkError<E, R>) -> QueueError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    QueueError::Backend(DisplayErrorContext(err).to_string())
}

fn parse_count(attributes: &HashMap<QueueAttributeName, String>, name: QueueAttributeName) -> Option<u64> {
    attributes.get(&name).and_then(|v| v.parse().ok())
}

impl SqsQueueBackend {
    /// Build a client, resolve the queue URL and verify the queue is reachable.
    ///
    /// `SQS_QUEUE_URL` wins over `SQS_QUEUE_NAME`. Credentials come from the default
    /// provider chain.
    pub async fn connect(region: String, config: &QueueConfig) -> Result<Self, QueueError> {
        let region_provider = RegionProviderChain::first_try(aws_config::Region::new(region));
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(RetryConfig::standard().with_max_attempts(3))
            .load()
            .await;
        let client = Client::new(&sdk_config);

        let queue_url = Self::resolve_queue_url(&client, config).await?;
        let backend = Self { client, queue_url };
        backend.check_connection().await?;

        tracing::info!(queue_url = %backend.queue_url, "SQS client initialized");
        Ok(backend)
    }

    pub fn from_client(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    async fn resolve_queue_url(client: &Client, config: &QueueConfig) -> Result<String, QueueError> {
        if let Some(url) = &config.queue_url {
            tracing::info!(queue_url = %url, "Using provided queue URL");
            return Ok(url.clone());
        }

        let name = config.queue_name.as_deref().ok_or_else(|| {
            QueueError::Config("SQS_QUEUE_URL or SQS_QUEUE_NAME is required".to_string())
        })?;

        let output = client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| {
                let missing = matches!(
                    &e,
                    SdkError::ServiceError(service_err)
                        if matches!(service_err.err(), GetQueueUrlError::QueueDoesNotExist(_))
                );
                if missing {
                    QueueError::NotFound(name.to_string())
                } else {
                    backend_error(&e)
                }
            })?;

        let url = output
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| QueueError::NotFound(name.to_string()))?;
        tracing::info!(queue_name = %name, queue_url = %url, "Found queue URL");
        Ok(url)
    }

    /// GetQueueAttributes(QueueArn) as a connectivity and permission check.
    pub async fn check_connection(&self) -> Result<(), QueueError> {
        self.client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(QueueAttributeName::QueueArn)
            .send()
            .await
            .map_err(|e| {
                QueueError::Backend(format!(
                    "SQS connection test failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }
}

#[async_trait]
impl QueueBackend for SqsQueueBackend {
    #[tracing::instrument(skip(self), fields(queue.backend = "sqs"))]
    async fn receive(&self, options: ReceiveOptions) -> Result<Vec<RawMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(options.max_messages)
            .wait_time_seconds(options.wait_time_secs)
            .visibility_timeout(options.visibility_timeout_secs)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| backend_error(&e))?;

        let mut messages = Vec::new();
        for message in output.messages() {
            let Some(receipt_handle) = message.receipt_handle() else {
                tracing::warn!(message_id = ?message.message_id(), "Message without receipt handle skipped");
                continue;
            };
            messages.push(RawMessage {
                message_id: message.message_id().unwrap_or_default().to_string(),
                receipt_handle: receipt_handle.to_string(),
                body: message.body().unwrap_or_default().to_string(),
            });
        }
        Ok(messages)
    }

    #[tracing::instrument(skip(self, receipt_handle), fields(queue.backend = "sqs"))]
    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| {
                let invalid = matches!(
                    &e,
                    SdkError::ServiceError(service_err)
                        if matches!(
                            service_err.err(),
                            DeleteMessageError::ReceiptHandleIsInvalid(_)
                                | DeleteMessageError::InvalidIdFormat(_)
                        )
                );
                if invalid {
                    QueueError::InvalidReceipt
                } else {
                    backend_error(&e)
                }
            })?;
        Ok(())
    }

    async fn attributes(&self) -> Result<QueueStats, QueueError> {
        let output = self
            .client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(QueueAttributeName::All)
            .send()
            .await
            .map_err(|e| backend_error(&e))?;

        let Some(attributes) = output.attributes() else {
            return Ok(QueueStats::default());
        };
        Ok(QueueStats {
            approx_visible: parse_count(attributes, QueueAttributeName::ApproximateNumberOfMessages),
            approx_in_flight: parse_count(
                attributes,
                QueueAttributeName::ApproximateNumberOfMessagesNotVisible,
            ),
            approx_delayed: parse_count(
                attributes,
                QueueAttributeName::ApproximateNumberOfMessagesDelayed,
            ),
        })
    }

    async fn send(&self, body: &str) -> Result<String, QueueError> {
        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| backend_error(&e))?;
        Ok(output.message_id().unwrap_or_default().to_string())
    }

    fn queue_url(&self) -> &str {
        &self.queue_url
    }
}
