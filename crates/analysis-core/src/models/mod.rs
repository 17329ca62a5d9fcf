//! Domain models shared across the pipeline.

pub mod event;
pub mod metadata;
pub mod record;
pub mod stats;

pub use event::{EventOrigin, NotificationEvent};
pub use metadata::{
    BasicAnalysis, ExtractedMetadata, FileInfo, FrameRate, ObjectAttributes, PlaceholderAnalysis,
    PlaceholderView, ProbeMetadata, ProcessingInfo, RealMetadata, RealMetadataView,
    SimulatedResults, TechnicalMetadata, VideoDetails,
};
pub use record::{
    ProcessingRecord, ProcessingStatus, RecordId, RecordStats, RecordSummary, StatusCounts,
};
pub use stats::{DirStats, QueueStats};
