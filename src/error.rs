use std::path::PathBuf;
use thiserror::Error;

/// Failures while installing or locating the ffmpeg transcoder.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("network error while fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server returned {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("archive digest mismatch (expected {expected}, got {actual})")]
    Integrity { expected: String, actual: String },

    #[error("no digest for {asset} found in published checksums")]
    MissingDigest { asset: String },

    #[error("failed to extract archive: {0}")]
    Extract(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no ffmpeg release archive is configured for this platform")]
    NoArchive,

    #[error("ffmpeg was not found at {0:?} after installation")]
    Verify(PathBuf),
}

impl ProvisionError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not a supported video URL")]
    InvalidUrl,

    #[error("metadata extraction failed: {0}")]
    Engine(String),

    #[error("engine returned malformed metadata: {0}")]
    Malformed(String),
}

/// Classified terminal failure of a download session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("the URL is not a recognised video link")]
    UnsupportedUrl,

    #[error("the video could not be found: {0}")]
    Extractor(String),

    #[error("an error occurred while downloading: {0}")]
    Download(String),

    #[error("this video is unavailable for download")]
    Unavailable,

    #[error("download cancelled")]
    Cancelled,

    #[error("an error occurred: {0}")]
    Engine(String),

    #[error("file system error: {0}")]
    Io(String),
}

impl DownloadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Reasons the controller refuses to start a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("please enter a URL")]
    EmptyUrl,

    #[error("not a valid video URL: {0}")]
    InvalidUrl(String),

    #[error("please choose a download location")]
    MissingDestination,

    #[error("a download is already running")]
    SessionActive,
}
