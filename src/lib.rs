pub mod config;
pub mod controller;
pub mod download;
pub mod engine;
pub mod error;
pub mod history;
pub mod metadata;
pub mod provision;
pub mod urls;

// Re-export commonly used types for easier access in tests
pub use config::{Config, ConfigManager};
pub use controller::DownloadController;
pub use download::{
    DownloadExecutor, DownloadOutcome, DownloadRequest, MediaFormat, ProgressEvent, SessionEvent,
    SessionHandle, SessionState,
};
pub use error::{DownloadError, HistoryError, MetadataError, ProvisionError, StartError};
pub use history::{HistoryRecord, HistoryStore};
pub use metadata::{MetadataFetcher, MetadataPanel, MetadataUpdate, VideoMetadata};
pub use provision::{ProvisionEvent, ProvisionState, Provisioner, Ready, ReadySource};
pub use urls::UrlValidator;
