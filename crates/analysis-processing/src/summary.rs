//! Human-readable extraction report.
//!
//! Measured values and simulated values are printed under separate headings, and every
//! simulated value line ends in `(SIMULATED)`.

use analysis_core::{ExtractedMetadata, TechnicalMetadata};
use std::fmt::Write;

const RULE: &str = "======================================================================";
const SUBRULE: &str = "--------------------------------------------------";

fn or_unknown<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn render_summary(metadata: &ExtractedMetadata) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_summary(&mut out, metadata);
    out
}

fn write_summary(out: &mut String, metadata: &ExtractedMetadata) -> std::fmt::Result {
    let info = &metadata.processing_info;
    let real = &metadata.real_metadata;
    let file = &real.file_info;

    writeln!(out)?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "METADATA EXTRACTION SUMMARY")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "Processed: {}", info.processing_timestamp.to_rfc3339())?;
    writeln!(out, "Processor Version: {}", info.processor_version)?;

    writeln!(out)?;
    writeln!(out, "REAL METADATA (extracted from the actual file and object store)")?;
    writeln!(out, "{}", SUBRULE)?;
    writeln!(out, "File: {}", file.filename)?;
    writeln!(out, "Size: {} MB", file.file_size_mb)?;
    writeln!(
        out,
        "Modified: {}",
        or_unknown(file.modification_time.map(|t| t.to_rfc3339()))
    )?;
    writeln!(out, "Extension: {}", file.file_extension)?;

    match &real.source_object {
        Some(source) => {
            writeln!(out, "Source: s3://{}/{}", source.bucket, source.key)?;
            writeln!(out, "Content Type: {}", source.content_type)?;
            writeln!(out, "ETag: {}", source.etag)?;
            writeln!(out, "Storage Class: {}", source.storage_class)?;
        }
        None => writeln!(out, "Source: metadata unavailable")?,
    }

    writeln!(
        out,
        "Extraction Method: {}",
        real.technical.extraction_method()
    )?;
    match &real.technical {
        TechnicalMetadata::Probe(probe) => {
            if let Some(video) = &probe.video_details {
                writeln!(
                    out,
                    "Resolution: {}x{}",
                    or_unknown(video.width),
                    or_unknown(video.height)
                )?;
                writeln!(out, "FPS: {}", video.fps)?;
                writeln!(out, "Codec: {}", or_unknown(video.codec.as_deref()))?;
                writeln!(
                    out,
                    "Aspect Ratio: {}",
                    or_unknown(video.aspect_ratio.as_deref())
                )?;
                writeln!(
                    out,
                    "Pixel Format: {}",
                    or_unknown(video.pixel_format.as_deref())
                )?;
            }
            if let Some(duration) = probe.duration_seconds {
                writeln!(
                    out,
                    "Duration: {} seconds ({:.1} minutes)",
                    duration,
                    duration / 60.0
                )?;
            }
            if let Some(bitrate) = probe.bitrate {
                writeln!(
                    out,
                    "Bitrate: {} bps ({:.1} Mbps)",
                    bitrate,
                    bitrate as f64 / 1_000_000.0
                )?;
            }
            writeln!(out, "Video Streams: {}", probe.video_streams)?;
            writeln!(out, "Audio Streams: {}", probe.audio_streams)?;
        }
        TechnicalMetadata::BasicAnalysis(basic) => {
            writeln!(out, "Detected Format: {}", basic.detected_format)?;
            writeln!(out, "Likely Codec: {}", basic.likely_codec)?;
            writeln!(out, "Note: {}", basic.note)?;
        }
    }

    let placeholder = &metadata.placeholder_analysis;
    let results = &placeholder.analysis_results;
    writeln!(out)?;
    writeln!(out, "PLACEHOLDER ANALYSIS (SIMULATED DATA - TO BE REPLACED)")?;
    writeln!(out, "{}", SUBRULE)?;
    writeln!(out, "WARNING: {}", placeholder.warning)?;
    writeln!(out, "Analysis Status: {} (SIMULATED)", results.status)?;
    writeln!(
        out,
        "Gait Detected: {} (SIMULATED)",
        results.gait_cycle_detected
    )?;
    writeln!(
        out,
        "Stride Length: {} m (SIMULATED)",
        results.estimated_stride_length_m
    )?;
    writeln!(
        out,
        "Cadence: {} steps/min (SIMULATED)",
        results.estimated_cadence_spm
    )?;
    writeln!(
        out,
        "Walking Speed: {} m/s (SIMULATED)",
        results.estimated_walking_speed_mps
    )?;
    writeln!(
        out,
        "Confidence: {:.1}% (SIMULATED)",
        results.confidence_score * 100.0
    )?;

    writeln!(out)?;
    writeln!(out, "NEXT STEPS:")?;
    for (i, step) in results.next_steps.iter().enumerate() {
        writeln!(out, "   {}. {}", i + 1, step)?;
    }
    writeln!(out, "{}", RULE)?;
    Ok(())
}
