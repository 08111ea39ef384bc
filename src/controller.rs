use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};

use crate::config::Config;
use crate::download::{DownloadExecutor, DownloadRequest, MediaFormat, SessionHandle};
use crate::engine::{MediaEngine, YtDlpEngine};
use crate::error::{ProvisionError, StartError};
use crate::history::HistoryStore;
use crate::metadata::{MetadataFetcher, MetadataUpdate};
use crate::provision::{ProvisionEvent, ProvisionState, Provisioner, Ready, ReadySource};
use crate::urls::UrlValidator;

/// Entry point for front ends: validates requests, owns the provisioning
/// state and runs at most one download session at a time.
pub struct DownloadController {
    engine: Arc<dyn MediaEngine>,
    validator: UrlValidator,
    executor: DownloadExecutor,
    history: Arc<HistoryStore>,
    provisioner: Arc<Provisioner>,
    ffmpeg_location: RwLock<Option<PathBuf>>,
}

impl DownloadController {
    /// Controller driving the configured `yt-dlp` binary.
    pub fn from_config(config: &Config, history_file: PathBuf) -> Self {
        let engine: Arc<dyn MediaEngine> = Arc::new(YtDlpEngine::new(&config.engine.binary));
        let history = HistoryStore::with_limit(history_file, config.history.max_entries);
        let provisioner = Provisioner::new(config.provision.clone());
        Self::new(engine, config, provisioner, history)
    }

    pub fn new(
        engine: Arc<dyn MediaEngine>,
        config: &Config,
        provisioner: Provisioner,
        history: HistoryStore,
    ) -> Self {
        let history = Arc::new(history);
        let executor = DownloadExecutor::new(Arc::clone(&engine), config.engine.clone())
            .with_history(Arc::clone(&history));

        Self {
            engine,
            validator: config.general.url_validator(),
            executor,
            history,
            provisioner: Arc::new(provisioner),
            ffmpeg_location: RwLock::new(None),
        }
    }

    pub fn validator(&self) -> &UrlValidator {
        &self.validator
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// A fresh metadata fetcher sharing this controller's engine.
    pub fn metadata_fetcher(&self) -> (MetadataFetcher, mpsc::UnboundedReceiver<MetadataUpdate>) {
        MetadataFetcher::new(Arc::clone(&self.engine), self.validator.clone())
    }

    /// Check user input and build an immutable request from it.
    pub fn validate_request(
        &self,
        url: &str,
        format: MediaFormat,
        destination: Option<&Path>,
        playlist: bool,
    ) -> Result<DownloadRequest, StartError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(StartError::EmptyUrl);
        }
        if !self.validator.is_valid(url) {
            return Err(StartError::InvalidUrl(url.to_string()));
        }

        let destination = destination
            .filter(|d| !d.as_os_str().is_empty())
            .ok_or(StartError::MissingDestination)?;

        Ok(DownloadRequest::new(
            url,
            format,
            destination.to_path_buf(),
            playlist,
        ))
    }

    /// Validate and launch a session in the background.
    pub async fn start(
        &self,
        url: &str,
        format: MediaFormat,
        destination: Option<&Path>,
        playlist: bool,
    ) -> Result<SessionHandle, StartError> {
        if self.executor.is_busy() {
            return Err(StartError::SessionActive);
        }
        let request = self.validate_request(url, format, destination, playlist)?;
        let ffmpeg_location = self.ffmpeg_location.read().await.clone();

        debug!(
            "Request: {} as {} into {:?} (playlist: {})",
            request.url(),
            request.format(),
            request.destination(),
            request.playlist()
        );
        self.executor.start(request, ffmpeg_location)
    }

    /// The source URL may not change while a session is running.
    pub fn is_input_locked(&self) -> bool {
        self.executor.is_busy()
    }

    /// Make the transcoder available. A managed install is passed to the
    /// engine explicitly on later starts.
    ///
    /// Binding updates this process's `PATH`, so call this before starting
    /// sessions or metadata lookups.
    pub async fn provision(
        &self,
        progress: Option<mpsc::UnboundedSender<ProvisionEvent>>,
    ) -> Result<Ready, ProvisionError> {
        let ready = self.provisioner.ensure_available(progress).await?;
        if ready.source != ReadySource::System {
            info!("Transcoder ready in {:?}", ready.dir);
            *self.ffmpeg_location.write().await = Some(ready.dir.clone());
        }
        Ok(ready)
    }

    pub async fn provision_state(&self) -> ProvisionState {
        self.provisioner.state().await
    }
}
