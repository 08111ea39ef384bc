use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::ProvisionError;

pub const EXE_SUFFIX: &str = std::env::consts::EXE_SUFFIX;

pub fn ffmpeg_file_name() -> String {
    format!("ffmpeg{}", EXE_SUFFIX)
}

pub fn ffprobe_file_name() -> String {
    format!("ffprobe{}", EXE_SUFFIX)
}

/// Unpack a zip archive into `destination`.
pub fn extract_zip(archive_path: &Path, destination: &Path) -> Result<(), ProvisionError> {
    let file = fs::File::open(archive_path)
        .map_err(|e| ProvisionError::io(format!("Failed to open {:?}", archive_path), e))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| ProvisionError::Extract(e.to_string()))?;

    fs::create_dir_all(destination)
        .map_err(|e| ProvisionError::io(format!("Failed to create {:?}", destination), e))?;
    archive
        .extract(destination)
        .map_err(|e| ProvisionError::Extract(e.to_string()))
}

/// Directory inside an extracted release that holds the executables: the
/// `bin/` of the first `ffmpeg*` directory, or the extraction root.
pub fn locate_binaries(extracted: &Path) -> Option<PathBuf> {
    let release_dir = WalkDir::new(extracted)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| {
            entry.file_type().is_dir() && entry.file_name().to_string_lossy().starts_with("ffmpeg")
        })
        .map(|entry| entry.into_path());

    let candidates = release_dir
        .iter()
        .flat_map(|dir| [dir.join("bin"), dir.clone()])
        .chain(std::iter::once(extracted.to_path_buf()));

    let ffmpeg = ffmpeg_file_name();
    candidates
        .into_iter()
        .find(|dir| dir.join(&ffmpeg).is_file())
}

/// Move `name` from `from` into `to`, replacing a stale copy. Returns false
/// when the source does not exist.
pub fn install_binary(from: &Path, to: &Path, name: &str) -> Result<bool, ProvisionError> {
    let src = from.join(name);
    if !src.is_file() {
        return Ok(false);
    }

    let dst = to.join(name);
    if dst.exists() {
        fs::remove_file(&dst)
            .map_err(|e| ProvisionError::io(format!("Failed to replace {:?}", dst), e))?;
    }
    fs::rename(&src, &dst)
        .map_err(|e| ProvisionError::io(format!("Failed to move {:?}", src), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&dst, fs::Permissions::from_mode(0o755))
            .map_err(|e| ProvisionError::io(format!("Failed to mark {:?} executable", dst), e))?;
    }

    Ok(true)
}
