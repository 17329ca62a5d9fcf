//! Analysis Processing Library
//!
//! Turns a downloaded file into [`analysis_core::ExtractedMetadata`]:
//!
//! - [`probe`]: the external inspection tool (ffprobe) behind the [`MetadataProbe`] trait
//! - [`heuristic`]: the extension-based fallback used when probing fails
//! - [`extractor`]: composition of file info, source attributes, technical metadata and the
//!   simulated analysis section
//! - [`summary`]: human-readable report keeping measured and simulated values apart

pub mod error;
pub mod extractor;
pub mod heuristic;
pub mod placeholder;
pub mod probe;
pub mod summary;

pub use error::ProbeError;
pub use extractor::MetadataExtractor;
pub use probe::{check_probe, parse_frame_rate, FfprobeProbe, MetadataProbe, ProbeStatus};
pub use summary::render_summary;
