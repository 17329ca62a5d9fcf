use analysis_processing::ProbeError;
use analysis_storage::StorageError;
use thiserror::Error;

/// Failure talking to the queue backend.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue not found: {0}")]
    NotFound(String),

    /// The delivery was already deleted or its visibility timeout expired.
    #[error("Receipt handle is invalid or expired")]
    InvalidReceipt,

    #[error("Queue backend error: {0}")]
    Backend(String),

    #[error("Queue configuration error: {0}")]
    Config(String),
}

/// Why a raw message was dropped instead of surfacing as an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Failed to parse message JSON: {0}")]
    InvalidJson(String),

    #[error("Bucket configuration test event")]
    TestEvent,

    #[error("Unknown message format")]
    UnknownFormat,

    #[error("Malformed event record: {0}")]
    MalformedRecord(String),

    #[error("Envelope contains no records")]
    NoRecords,

    #[error("Unexpected event source: {found}, expected: {expected}")]
    EventSource { found: String, expected: String },

    #[error("Unexpected event type: {found}, expected prefix: {expected}")]
    EventName { found: String, expected: String },

    #[error("Unexpected bucket: {found}, expected: {expected}")]
    Bucket { found: String, expected: String },

    #[error("Object not in expected prefix: {found}, expected prefix: {expected}/")]
    KeyPrefix { found: String, expected: String },

    #[error("Message is missing {0}")]
    MissingField(&'static str),
}

/// Failure of one event's pipeline. Recorded on the processing record, never fatal.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Invalid event: {0}")]
    InvalidEvent(&'static str),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Metadata extraction failed: {0}")]
    Extraction(#[from] ProbeError),

    #[error("Failed to serialize metadata: {0}")]
    Serialization(#[from] serde_json::Error),
}
