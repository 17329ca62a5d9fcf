use thiserror::Error;

/// Failure of the external probe tool. Never fatal: the extractor falls back to the
/// extension heuristic and records the message in `probe_error`.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ffprobe not available: {0}")]
    Unavailable(String),

    #[error("ffprobe timed out after {0}s")]
    Timeout(u64),

    #[error("ffprobe failed with status {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Failed to parse ffprobe output: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
