//! Scratch directory utilities.

use analysis_core::DirStats;
use std::fs;
use std::path::Path;

/// Walk `dir` recursively and total its regular files.
///
/// Entries that vanish or cannot be stat'ed mid-walk are skipped.
pub fn collect_dir_stats(dir: &Path) -> DirStats {
    let mut stats = DirStats {
        dir: dir.to_path_buf(),
        exists: dir.is_dir(),
        file_count: 0,
        total_bytes: 0,
    };
    if !stats.exists {
        return stats;
    }

    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %current.display(), error = %e, "Skipping unreadable directory");
                continue;
            }
        };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                stats.file_count += 1;
                if let Ok(meta) = entry.metadata() {
                    stats.total_bytes += meta.len();
                }
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn counts_nested_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.mp4"), vec![0u8; 100]).unwrap();
        fs::create_dir_all(dir.path().join("host-1/deeper")).unwrap();
        fs::write(dir.path().join("host-1/b.mp4"), vec![0u8; 50]).unwrap();
        fs::write(dir.path().join("host-1/deeper/c.mov"), vec![0u8; 25]).unwrap();

        let stats = collect_dir_stats(dir.path());
        assert!(stats.exists);
        assert_eq!(stats.file_count, 3);
        assert_eq!(stats.total_bytes, 175);
    }

    #[test]
    fn missing_dir_reports_not_existing() {
        let dir = TempDir::new().unwrap();
        let stats = collect_dir_stats(&dir.path().join("nope"));
        assert!(!stats.exists);
        assert_eq!(stats.file_count, 0);
    }
}
