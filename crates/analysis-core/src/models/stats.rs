use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Approximate queue depth as reported by the backend. `None` means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub approx_visible: Option<u64>,
    pub approx_in_flight: Option<u64>,
    pub approx_delayed: Option<u64>,
}

impl QueueStats {
    pub fn is_unknown(&self) -> bool {
        self.approx_visible.is_none()
            && self.approx_in_flight.is_none()
            && self.approx_delayed.is_none()
    }
}

/// Scratch directory usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirStats {
    pub dir: PathBuf,
    pub exists: bool,
    pub file_count: u64,
    pub total_bytes: u64,
}

impl DirStats {
    pub fn total_mb(&self) -> f64 {
        bytes_to_mb(self.total_bytes)
    }
}

pub(crate) fn bytes_to_mb(bytes: u64) -> f64 {
    ((bytes as f64 / (1024.0 * 1024.0)) * 100.0).round() / 100.0
}
