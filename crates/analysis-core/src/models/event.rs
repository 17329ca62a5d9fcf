use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which envelope a notification was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOrigin {
    /// An object-store creation-event envelope that passed validation.
    S3Notification,
    /// A simplified `{bucket, key}` body injected for testing.
    Manual,
}

/// One decoded queue message. Never mutated after decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub message_id: String,
    /// Receipt handle; required to delete this delivery.
    #[serde(skip_serializing, default)]
    pub delivery_token: String,
    pub bucket: String,
    /// Object key, already URL-decoded.
    pub key: String,
    pub size: u64,
    pub content_hash: Option<String>,
    pub event_kind: String,
    pub event_time: Option<DateTime<Utc>>,
    pub region: Option<String>,
    pub origin: EventOrigin,
}

impl NotificationEvent {
    pub fn object_uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}
