//! Extraction result types
//!
//! [`ExtractedMetadata`] keeps measured data (`real_metadata`) and fabricated data
//! (`placeholder_analysis`) in separate namespaces. Consumers rely on that split to tell
//! the two apart, so the placeholder section always carries `simulated: true`.

use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use super::stats::bytes_to_mb;

/// Attributes of the source object, read from the store without downloading it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectAttributes {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub content_type: String,
    pub last_modified: Option<DateTime<Utc>>,
    /// ETag with surrounding quotes stripped.
    pub etag: String,
    pub storage_class: String,
    #[serde(default)]
    pub user_metadata: BTreeMap<String, String>,
}

/// Attributes of the downloaded local file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub local_path: String,
    pub filename: String,
    pub file_size_bytes: u64,
    pub file_size_mb: f64,
    /// Lowercase, including the leading dot; empty when the file has no extension.
    pub file_extension: String,
    pub modification_time: Option<DateTime<Utc>>,
}

impl FileInfo {
    pub fn new(
        local_path: String,
        filename: String,
        file_size_bytes: u64,
        file_extension: String,
        modification_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            local_path,
            filename,
            file_size_bytes,
            file_size_mb: bytes_to_mb(file_size_bytes),
            file_extension,
            modification_time,
        }
    }
}

/// Frame rate normalized from the probe's `num/den` fraction.
///
/// Serialized as a number rounded to two decimals, or the string `"unknown"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameRate {
    Fps(f64),
    Unknown,
}

impl FrameRate {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FrameRate::Fps(v) => Some(*v),
            FrameRate::Unknown => None,
        }
    }
}

impl Display for FrameRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FrameRate::Fps(v) => write!(f, "{}", v),
            FrameRate::Unknown => write!(f, "unknown"),
        }
    }
}

impl Serialize for FrameRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FrameRate::Fps(v) => serializer.serialize_f64(*v),
            FrameRate::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

impl<'de> Deserialize<'de> for FrameRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Number(v) => FrameRate::Fps(v),
            Repr::Text(_) => FrameRate::Unknown,
        })
    }
}

/// Summary of the first video stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: FrameRate,
    pub aspect_ratio: Option<String>,
    pub pixel_format: Option<String>,
}

/// Technical data measured by the probe tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeMetadata {
    pub format_name: Option<String>,
    pub format_long_name: Option<String>,
    pub duration_seconds: Option<f64>,
    pub bitrate: Option<u64>,
    pub file_size: Option<u64>,
    pub video_streams: usize,
    pub audio_streams: usize,
    pub video_details: Option<VideoDetails>,
}

/// Coarse guess derived from the file extension when the probe is unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicAnalysis {
    pub file_extension: String,
    pub detected_format: String,
    pub likely_codec: String,
    pub note: String,
    /// Why the probe path was abandoned.
    pub probe_error: Option<String>,
}

/// Technical metadata, tagged with how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "extraction_method")]
pub enum TechnicalMetadata {
    #[serde(rename = "ffprobe")]
    Probe(ProbeMetadata),
    #[serde(rename = "basic_analysis")]
    BasicAnalysis(BasicAnalysis),
}

impl TechnicalMetadata {
    pub fn extraction_method(&self) -> &'static str {
        match self {
            TechnicalMetadata::Probe(_) => "ffprobe",
            TechnicalMetadata::BasicAnalysis(_) => "basic_analysis",
        }
    }

    pub fn is_precise(&self) -> bool {
        matches!(self, TechnicalMetadata::Probe(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingInfo {
    pub processing_timestamp: DateTime<Utc>,
    pub processor_version: String,
    pub extraction_status: String,
}

/// Measured data: local file, source object and probe output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealMetadata {
    pub file_info: FileInfo,
    /// `None` when the metadata lookup failed after a successful download.
    pub source_object: Option<ObjectAttributes>,
    pub technical: TechnicalMetadata,
}

/// Simulated analysis values. None of these numbers are measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedResults {
    pub analysis_type: String,
    pub status: String,
    pub processing_time_seconds: f64,
    pub gait_cycle_detected: bool,
    pub estimated_stride_length_m: f64,
    pub estimated_cadence_spm: u32,
    pub estimated_walking_speed_mps: f64,
    pub confidence_score: f64,
    pub notes: Vec<String>,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderAnalysis {
    /// Always `true`.
    pub simulated: bool,
    pub note: String,
    pub warning: String,
    pub analysis_results: SimulatedResults,
}

/// Full extraction result stored in `metadata_blob`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub processing_info: ProcessingInfo,
    pub real_metadata: RealMetadata,
    pub placeholder_analysis: PlaceholderAnalysis,
}

/// Projection without the simulated section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealMetadataView {
    pub processing_info: ProcessingInfo,
    pub real_metadata: RealMetadata,
}

/// Projection with only the simulated section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderView {
    pub processing_info: ProcessingInfo,
    pub placeholder_analysis: PlaceholderAnalysis,
}

impl ExtractedMetadata {
    pub fn real_only(&self) -> RealMetadataView {
        RealMetadataView {
            processing_info: self.processing_info.clone(),
            real_metadata: self.real_metadata.clone(),
        }
    }

    pub fn placeholder_only(&self) -> PlaceholderView {
        PlaceholderView {
            processing_info: self.processing_info.clone(),
            placeholder_analysis: self.placeholder_analysis.clone(),
        }
    }
}
