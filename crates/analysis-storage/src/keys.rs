//! Object key helpers shared by the backends and the client.

use crate::traits::{StorageError, StorageResult};

/// Decode a key as it appears in a bucket notification.
///
/// Notifications encode spaces as `+` and other reserved bytes as `%XX`. Invalid escapes
/// fall back to the raw key.
pub fn decode_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Local filename for a downloaded object: the key's final `/` segment.
pub fn local_file_name(key: &str) -> StorageResult<&str> {
    let name = key.rsplit('/').next().unwrap_or(key);
    if name.is_empty() || name == "." || name == ".." {
        return Err(StorageError::InvalidKey(format!(
            "key has no usable file name: {}",
            key
        )));
    }
    Ok(name)
}

/// Reject keys that could escape a directory when mapped onto a filesystem.
pub fn validate_relative_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == "..") {
        return Err(StorageError::InvalidKey(format!(
            "key contains invalid path segments: {}",
            key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plus_and_percent_escapes() {
        assert_eq!(
            decode_key("uploads/u1/s1/my+video%281%29.mp4"),
            "uploads/u1/s1/my video(1).mp4"
        );
        assert_eq!(decode_key("uploads/plain.mp4"), "uploads/plain.mp4");
    }

    #[test]
    fn invalid_escape_keeps_raw_key() {
        assert_eq!(decode_key("uploads/%E0%A4%A.mp4"), "uploads/%E0%A4%A.mp4");
    }

    #[test]
    fn file_name_is_last_segment() {
        assert_eq!(local_file_name("uploads/u1/s1/abc.mp4").unwrap(), "abc.mp4");
        assert_eq!(local_file_name("abc.mp4").unwrap(), "abc.mp4");
        assert!(local_file_name("uploads/u1/").is_err());
        assert!(local_file_name("uploads/..").is_err());
    }

    #[test]
    fn rejects_traversal() {
        assert!(validate_relative_key("uploads/a.mp4").is_ok());
        assert!(validate_relative_key("../etc/passwd").is_err());
        assert!(validate_relative_key("/abs/path").is_err());
        assert!(validate_relative_key("").is_err());
    }
}
