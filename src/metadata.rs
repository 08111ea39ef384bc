use reqwest::Client;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::{EngineFailure, MediaEngine, MediaInfo};
use crate::error::MetadataError;
use crate::urls::UrlValidator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub thumbnail_url: String,
    /// `H:MM:SS`
    pub duration: String,
    pub uploader: String,
}

impl VideoMetadata {
    pub fn from_info(info: &MediaInfo) -> Self {
        let seconds = info
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d as u64)
            .unwrap_or(0);

        Self {
            title: info.title.clone().unwrap_or_default(),
            thumbnail_url: info.thumbnail.clone().unwrap_or_default(),
            duration: format_duration(seconds),
            uploader: info
                .uploader
                .clone()
                .or_else(|| info.channel.clone())
                .unwrap_or_default(),
        }
    }
}

pub fn format_duration(seconds: u64) -> String {
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Results of a fetch, tagged with the generation that produced them.
#[derive(Debug, Clone)]
pub enum MetadataUpdate {
    /// The URL is not one we can look up; hide the panel.
    Hidden { generation: u64 },
    Loaded {
        generation: u64,
        metadata: VideoMetadata,
    },
    Thumbnail { generation: u64, bytes: Vec<u8> },
    ThumbnailFailed { generation: u64, message: String },
    Failed { generation: u64, message: String },
}

impl MetadataUpdate {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Hidden { generation }
            | Self::Loaded { generation, .. }
            | Self::Thumbnail { generation, .. }
            | Self::ThumbnailFailed { generation, .. }
            | Self::Failed { generation, .. } => *generation,
        }
    }
}

/// Background metadata lookups where only the newest request may land.
pub struct MetadataFetcher {
    engine: Arc<dyn MediaEngine>,
    client: Client,
    validator: UrlValidator,
    latest: Arc<AtomicU64>,
    sender: mpsc::UnboundedSender<MetadataUpdate>,
}

impl MetadataFetcher {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        validator: UrlValidator,
    ) -> (Self, mpsc::UnboundedReceiver<MetadataUpdate>) {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("tubefetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        let (sender, receiver) = mpsc::unbounded_channel();

        (
            Self {
                engine,
                client,
                validator,
                latest: Arc::new(AtomicU64::new(0)),
                sender,
            },
            receiver,
        )
    }

    /// Start a lookup for `url`, superseding any earlier one. Returns its generation.
    pub fn fetch(&self, url: &str) -> u64 {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.validator.is_valid(url) {
            let _ = self.sender.send(MetadataUpdate::Hidden { generation });
            return generation;
        }

        let engine = Arc::clone(&self.engine);
        let client = self.client.clone();
        let latest = Arc::clone(&self.latest);
        let sender = self.sender.clone();
        let url = url.to_string();

        tokio::spawn(async move {
            let is_current = || latest.load(Ordering::SeqCst) == generation;

            let metadata = match lookup(engine.as_ref(), &url).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    if is_current() {
                        let _ = sender.send(MetadataUpdate::Failed {
                            generation,
                            message: e.to_string(),
                        });
                    }
                    return;
                }
            };

            if !is_current() {
                debug!("Dropping stale metadata for {}", url);
                return;
            }
            let thumbnail_url = metadata.thumbnail_url.clone();
            let _ = sender.send(MetadataUpdate::Loaded {
                generation,
                metadata,
            });

            if thumbnail_url.is_empty() {
                return;
            }
            let thumbnail = fetch_thumbnail(&client, &thumbnail_url).await;
            if !is_current() {
                return;
            }
            let update = match thumbnail {
                Ok(bytes) => MetadataUpdate::Thumbnail { generation, bytes },
                Err(message) => MetadataUpdate::ThumbnailFailed {
                    generation,
                    message,
                },
            };
            let _ = sender.send(update);
        });

        generation
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.latest() == generation
    }
}

async fn lookup(engine: &dyn MediaEngine, url: &str) -> Result<VideoMetadata, MetadataError> {
    let info = engine
        .extract_info(url)
        .await
        .map_err(|e: EngineFailure| MetadataError::Engine(e.message))?;

    if info.title.as_deref().unwrap_or_default().is_empty() {
        return Err(MetadataError::Malformed("missing title".to_string()));
    }
    Ok(VideoMetadata::from_info(&info))
}

async fn fetch_thumbnail(client: &Client, url: &str) -> Result<Vec<u8>, String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("failed to load thumbnail: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("thumbnail request returned {}", response.status()));
    }

    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| format!("failed to read thumbnail: {}", e))
}

/// What the foreground shows for the current URL.
#[derive(Debug, Clone, Default)]
pub struct MetadataPanel {
    pub metadata: Option<VideoMetadata>,
    pub thumbnail: Option<Vec<u8>>,
    /// Transient message, e.g. a failed lookup
    pub status: Option<String>,
}

impl MetadataPanel {
    pub fn is_visible(&self) -> bool {
        self.metadata.is_some()
    }

    /// Apply an update if it belongs to `current`. Returns whether it was applied.
    pub fn apply(&mut self, update: MetadataUpdate, current: u64) -> bool {
        if update.generation() != current {
            return false;
        }

        match update {
            MetadataUpdate::Hidden { .. } => {
                self.metadata = None;
                self.thumbnail = None;
                self.status = None;
            }
            MetadataUpdate::Loaded { metadata, .. } => {
                self.metadata = Some(metadata);
                self.thumbnail = None;
                self.status = None;
            }
            MetadataUpdate::Thumbnail { bytes, .. } => self.thumbnail = Some(bytes),
            MetadataUpdate::ThumbnailFailed { message, .. } => self.status = Some(message),
            MetadataUpdate::Failed { message, .. } => {
                self.metadata = None;
                self.thumbnail = None;
                self.status = Some(message);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_duration_like_a_clock() {
        assert_eq!(format_duration(0), "0:00:00");
        assert_eq!(format_duration(205), "0:03:25");
        assert_eq!(format_duration(3600 + 61), "1:01:01");
        assert_eq!(format_duration(30 * 3600), "30:00:00");
    }

    #[test]
    fn builds_metadata_from_engine_info() {
        let info = MediaInfo {
            title: Some("Clip".into()),
            thumbnail: Some("https://i.example.com/t.jpg".into()),
            duration: Some(125.7),
            uploader: None,
            channel: Some("Chan".into()),
        };
        let metadata = VideoMetadata::from_info(&info);
        assert_eq!(metadata.title, "Clip");
        assert_eq!(metadata.duration, "0:02:05");
        assert_eq!(metadata.uploader, "Chan");
    }

    #[test]
    fn panel_ignores_other_generations() {
        let mut panel = MetadataPanel::default();
        let stale = MetadataUpdate::Loaded {
            generation: 1,
            metadata: VideoMetadata {
                title: "old".into(),
                thumbnail_url: String::new(),
                duration: "0:00:01".into(),
                uploader: String::new(),
            },
        };
        assert!(!panel.apply(stale, 2));
        assert!(!panel.is_visible());

        assert!(panel.apply(
            MetadataUpdate::Failed {
                generation: 2,
                message: "nope".into()
            },
            2
        ));
        assert_eq!(panel.status.as_deref(), Some("nope"));
        assert!(!panel.is_visible());
    }
}
