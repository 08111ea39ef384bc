use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Whether a file name looks like an unfinished engine artifact.
pub fn is_partial_artifact(name: &str) -> bool {
    name.ends_with(".part") || name.ends_with(".ytdl") || name.contains(".part-Frag")
}

/// Best-effort removal of partial downloads directly inside `dir`.
/// Returns how many files were removed; failures are only logged.
pub fn remove_partial_artifacts(dir: &Path) -> usize {
    let mut removed = 0;

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to scan {:?} for partial files: {}", dir, e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !is_partial_artifact(&name) {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!("Removed partial file {:?}", entry.path());
                removed += 1;
            }
            Err(e) => warn!("Failed to remove partial file {:?}: {}", entry.path(), e),
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn matches_engine_suffixes() {
        assert!(is_partial_artifact("Song.webm.part"));
        assert!(is_partial_artifact("Song.f140.m4a.part-Frag12"));
        assert!(is_partial_artifact("Song.mp4.ytdl"));
        assert!(!is_partial_artifact("Song.mp4"));
        assert!(!is_partial_artifact("partial.mp3"));
    }

    #[test]
    fn removes_only_partials() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.mp4.part"), b"x").unwrap();
        std::fs::write(dir.path().join("a.mp4.part-Frag3"), b"x").unwrap();
        std::fs::write(dir.path().join("keep.mp4"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested.part")).unwrap();

        assert_eq!(remove_partial_artifacts(dir.path()), 2);
        assert!(dir.path().join("keep.mp4").exists());
        assert!(dir.path().join("nested.part").exists());
        assert!(!dir.path().join("a.mp4.part").exists());
    }

    #[test]
    fn missing_directory_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        assert_eq!(remove_partial_artifacts(&dir.path().join("gone")), 0);
    }
}
