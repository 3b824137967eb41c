//! File fingerprints.

use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Cheap change-detection identity for a file: absolute path, size, and
/// modification time in nanoseconds.
///
/// Processed-blob cache keys embed this fingerprint, so edits and touches
/// invalidate cached adapter output without hashing file contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileFingerprint {
    /// Canonical absolute path as a string.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
    /// Modification time in nanoseconds since the Unix epoch.
    pub mtime_ns: u128,
}

impl FileFingerprint {
    /// Reads the fingerprint of a file from the filesystem.
    pub fn of(path: &Path) -> io::Result<Self> {
        let meta = path.metadata()?;
        let mtime_ns = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Ok(Self {
            path: path.to_string_lossy().into_owned(),
            size: meta.len(),
            mtime_ns,
        })
    }

    /// Fingerprint for a path that could not be stat'ed.
    ///
    /// Keeps the cache key stable (always a miss against real files) instead
    /// of failing the pipeline.
    pub fn missing(path: &Path) -> Self {
        Self {
            path: path.to_string_lossy().into_owned(),
            size: 0,
            mtime_ns: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn fingerprint_tracks_size_and_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "hello").unwrap();

        let fp1 = FileFingerprint::of(&file).unwrap();
        assert_eq!(fp1.size, 5);
        assert!(fp1.mtime_ns > 0);

        fs::write(&file, "hello world").unwrap();
        let fp2 = FileFingerprint::of(&file).unwrap();
        assert_ne!(fp1, fp2);
        assert_eq!(fp2.size, 11);
    }

    #[test]
    fn missing_file_fingerprint_is_zeroed() {
        let fp = FileFingerprint::missing(Path::new("/no/such/file"));
        assert_eq!(fp.size, 0);
        assert_eq!(fp.mtime_ns, 0);
    }
}
