//! Decoding and validation of queue message bodies.
//!
//! Two body shapes are accepted:
//!
//! - a bucket notification envelope (`{"Records": [...]}`), checked in order against the
//!   configured event source, event-name prefix, bucket and key prefix. The first record
//!   that passes wins; if none pass, the first record's rejection is reported.
//! - a simplified `{"bucket": ..., "key": ..., "size": ...}` body for manual injection,
//!   which skips the envelope checks.

use crate::backend::RawMessage;
use crate::error::Rejection;
use analysis_core::{EventFilter, EventOrigin, NotificationEvent};
use analysis_storage::keys::decode_key;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Event kind recorded for simplified bodies.
pub const MANUAL_EVENT_KIND: &str = "manual";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventRecord {
    #[serde(rename = "eventSource")]
    event_source: String,
    #[serde(rename = "eventName")]
    event_name: String,
    #[serde(rename = "eventTime")]
    event_time: Option<String>,
    #[serde(rename = "awsRegion")]
    aws_region: Option<String>,
    s3: Option<S3Entity>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct S3Object {
    key: String,
    size: u64,
    #[serde(rename = "eTag")]
    e_tag: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManualBody {
    bucket: String,
    key: String,
    #[serde(default)]
    size: u64,
}

/// Decode one delivery into an event, or say why it is ineligible.
pub fn decode_message(
    message: &RawMessage,
    filter: &EventFilter,
) -> Result<NotificationEvent, Rejection> {
    let body: Value =
        serde_json::from_str(&message.body).map_err(|e| Rejection::InvalidJson(e.to_string()))?;

    if let Some(records) = body.get("Records") {
        return decode_records(message, records, filter);
    }
    if body.get("bucket").is_some() && body.get("key").is_some() {
        return decode_manual(message, body);
    }
    if body.get("Event").and_then(Value::as_str) == Some("s3:TestEvent") {
        return Err(Rejection::TestEvent);
    }
    Err(Rejection::UnknownFormat)
}

fn decode_records(
    message: &RawMessage,
    records: &Value,
    filter: &EventFilter,
) -> Result<NotificationEvent, Rejection> {
    let records = records
        .as_array()
        .ok_or_else(|| Rejection::MalformedRecord("Records is not an array".to_string()))?;

    let mut first_rejection = None;
    for raw in records {
        let outcome = EventRecord::deserialize(raw)
            .map_err(|e| Rejection::MalformedRecord(e.to_string()))
            .and_then(|record| validate_record(message, record, filter));
        match outcome {
            Ok(event) => return Ok(event),
            Err(rejection) => {
                tracing::debug!(
                    message_id = %message.message_id,
                    reason = %rejection,
                    "Skipping ineligible record"
                );
                first_rejection.get_or_insert(rejection);
            }
        }
    }
    Err(first_rejection.unwrap_or(Rejection::NoRecords))
}

fn validate_record(
    message: &RawMessage,
    record: EventRecord,
    filter: &EventFilter,
) -> Result<NotificationEvent, Rejection> {
    if record.event_source != filter.expected_source {
        return Err(Rejection::EventSource {
            found: record.event_source,
            expected: filter.expected_source.clone(),
        });
    }
    if !record.event_name.starts_with(&filter.expected_event_prefix) {
        return Err(Rejection::EventName {
            found: record.event_name,
            expected: filter.expected_event_prefix.clone(),
        });
    }

    let s3 = record.s3.ok_or(Rejection::MissingField("s3"))?;
    if s3.bucket.name != filter.bucket {
        return Err(Rejection::Bucket {
            found: s3.bucket.name,
            expected: filter.bucket.clone(),
        });
    }

    let key = decode_key(&s3.object.key);
    if !key.starts_with(&format!("{}/", filter.key_prefix)) {
        return Err(Rejection::KeyPrefix {
            found: key,
            expected: filter.key_prefix.clone(),
        });
    }

    Ok(NotificationEvent {
        message_id: message.message_id.clone(),
        delivery_token: message.receipt_handle.clone(),
        bucket: s3.bucket.name,
        key,
        size: s3.object.size,
        content_hash: s3.object.e_tag.filter(|tag| !tag.is_empty()),
        event_kind: record.event_name,
        event_time: record
            .event_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc)),
        region: record.aws_region,
        origin: EventOrigin::S3Notification,
    })
}

fn decode_manual(message: &RawMessage, body: Value) -> Result<NotificationEvent, Rejection> {
    let manual: ManualBody =
        serde_json::from_value(body).map_err(|e| Rejection::MalformedRecord(e.to_string()))?;
    if manual.bucket.is_empty() {
        return Err(Rejection::MissingField("bucket"));
    }
    if manual.key.is_empty() {
        return Err(Rejection::MissingField("key"));
    }

    Ok(NotificationEvent {
        message_id: message.message_id.clone(),
        delivery_token: message.receipt_handle.clone(),
        bucket: manual.bucket,
        key: manual.key,
        size: manual.size,
        content_hash: None,
        event_kind: MANUAL_EVENT_KIND.to_string(),
        event_time: None,
        region: None,
        origin: EventOrigin::Manual,
    })
}
