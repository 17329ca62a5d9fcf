//! Extension-based format guess for when the probe cannot run.

use analysis_core::BasicAnalysis;
use std::path::Path;

const BASIC_NOTE: &str = "Limited metadata - install ffmpeg for detailed analysis";

/// `(extension, detected format, likely codec)`
const FORMAT_TABLE: &[(&str, &str, &str)] = &[
    (".mp4", "MP4", "H.264"),
    (".avi", "AVI", "Various"),
    (".mov", "QuickTime", "H.264"),
    (".mkv", "Matroska", "Various"),
    (".wmv", "Windows Media", "WMV"),
    (".flv", "Flash Video", "H.264"),
    (".webm", "WebM", "VP9"),
    (".m4v", "MPEG-4", "H.264"),
];

/// Lowercase extension with its leading dot, or an empty string.
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

pub fn lookup(extension: &str) -> (&'static str, &'static str) {
    let extension = extension.to_lowercase();
    FORMAT_TABLE
        .iter()
        .find(|(ext, _, _)| *ext == extension)
        .map(|(_, format, codec)| (*format, *codec))
        .unwrap_or(("Unknown", "Unknown"))
}

pub fn basic_analysis(path: &Path, probe_error: Option<String>) -> BasicAnalysis {
    let file_extension = file_extension(path);
    let (detected_format, likely_codec) = lookup(&file_extension);
    BasicAnalysis {
        file_extension,
        detected_format: detected_format.to_string(),
        likely_codec: likely_codec.to_string(),
        note: BASIC_NOTE.to_string(),
        probe_error,
    }
}
