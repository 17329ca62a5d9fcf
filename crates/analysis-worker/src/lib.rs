//! Analysis Worker Library
//!
//! The queue-driven pipeline: poll a bounded batch of upload notifications, then for each
//! event download the object, extract metadata, persist the outcome and acknowledge the
//! delivery.
//!
//! - [`backend`]: the [`QueueBackend`] seam and its SQS implementation in [`sqs`]
//! - [`envelope`]: message decoding and eligibility checks
//! - [`queue`]: [`QueueClient`], which deletes ineligible deliveries and never surfaces
//!   backend errors
//! - [`orchestrator`]: the [`Orchestrator`] loop, runtime budget and ack policy
//! - [`shutdown`]: the stop flag shared with signal handlers

pub mod backend;
pub mod envelope;
pub mod error;
pub mod orchestrator;
pub mod queue;
pub mod shutdown;
#[cfg(feature = "queue-sqs")]
pub mod sqs;
pub mod status;
pub mod tracker;

pub use backend::{QueueBackend, RawMessage, ReceiveOptions};
pub use envelope::decode_message;
pub use error::{ProcessingError, QueueError, Rejection};
pub use orchestrator::{EventOutcome, Orchestrator, PipelineSettings, RunSummary, Stage, StopReason};
pub use queue::QueueClient;
pub use shutdown::{ShutdownHandle, ShutdownSignal};
#[cfg(feature = "queue-sqs")]
pub use sqs::SqsQueueBackend;
pub use status::{ServiceStats, StatusReport};
pub use tracker::RecordTracker;
