pub mod options;
pub mod ytdlp;

pub use options::{AudioExtraction, EngineOptions, PlaylistMode};
pub use ytdlp::YtDlpEngine;

use async_trait::async_trait;
use serde::Deserialize;
use std::ops::ControlFlow;
use std::path::PathBuf;

/// Metadata returned by an info-only extraction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

/// One progress checkpoint as reported by the engine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProgress {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub downloaded_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes_estimate: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub eta: Option<f64>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    Progress(RawProgress),
    /// An item finished downloading and post-processing.
    ItemFinished { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    UnsupportedUrl,
    Extractor,
    Download,
    Unavailable,
    /// The progress hook asked the engine to stop.
    Aborted,
    Spawn,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineFailure {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn aborted() -> Self {
        Self::new(EngineErrorKind::Aborted, "aborted by progress hook")
    }
}

impl std::fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for EngineFailure {}

/// Receives engine checkpoints. Returning `Break` stops the transfer at the
/// next point the engine can be interrupted.
#[async_trait]
pub trait ProgressHook: Send {
    async fn on_event(&mut self, event: EngineEvent) -> ControlFlow<()>;
}

/// External extraction/download service.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Fetch display metadata without downloading media.
    async fn extract_info(&self, url: &str) -> Result<MediaInfo, EngineFailure>;

    /// Count the entries of a playlist using flat extraction.
    async fn playlist_count(
        &self,
        url: &str,
        playlist_end: Option<u32>,
    ) -> Result<usize, EngineFailure>;

    async fn download(
        &self,
        url: &str,
        options: &EngineOptions,
        hook: &mut dyn ProgressHook,
    ) -> Result<(), EngineFailure>;
}
