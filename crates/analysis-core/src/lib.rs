//! Analysis Core Library
//!
//! This crate provides the configuration, domain models and configuration error type
//! shared by every component of the upload analysis service.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{
    load_dotenv, AckPolicy, DatabaseConfig, EventFilter, LogFormat, ProbeConfig, QueueConfig,
    ScheduleConfig, ScratchConfig, ScratchNamespace, WorkerConfig,
};
pub use error::ConfigError;
pub use models::{
    BasicAnalysis, DirStats, EventOrigin, ExtractedMetadata, FileInfo, FrameRate,
    NotificationEvent, ObjectAttributes, PlaceholderAnalysis, PlaceholderView, ProbeMetadata,
    ProcessingInfo, ProcessingRecord, ProcessingStatus, QueueStats, RealMetadata,
    RealMetadataView, RecordId, RecordStats, RecordSummary, SimulatedResults, StatusCounts,
    TechnicalMetadata, VideoDetails,
};
