pub mod cleanup;
pub mod executor;
pub mod progress;
pub mod session;

pub use executor::DownloadExecutor;
pub use progress::{PlaylistPosition, ProgressAggregator, ProgressEvent, ProgressPhase};
pub use session::{
    CancelFlag, DownloadOutcome, DownloadSession, SessionEvent, SessionHandle, SessionState,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    /// Best audio stream transcoded to the configured codec
    Audio,
    #[default]
    Video,
}

impl std::fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaFormat::Audio => write!(f, "audio"),
            MediaFormat::Video => write!(f, "video"),
        }
    }
}

/// What to download and where. Fixed once handed to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    url: String,
    format: MediaFormat,
    destination: PathBuf,
    playlist: bool,
}

impl DownloadRequest {
    pub fn new(
        url: impl Into<String>,
        format: MediaFormat,
        destination: impl Into<PathBuf>,
        playlist: bool,
    ) -> Self {
        Self {
            url: url.into(),
            format,
            destination: destination.into(),
            playlist,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn playlist(&self) -> bool {
        self.playlist
    }
}
