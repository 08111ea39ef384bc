use async_trait::async_trait;
use futures_util::FutureExt;
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use super::cleanup::remove_partial_artifacts;
use super::progress::ProgressAggregator;
use super::session::{
    CancelFlag, DownloadOutcome, DownloadSession, SessionEvent, SessionHandle, SessionState,
};
use super::{DownloadRequest, MediaFormat};
use crate::config::EngineConfig;
use crate::engine::{
    EngineErrorKind, EngineEvent, EngineFailure, EngineOptions, MediaEngine, ProgressHook,
};
use crate::error::{DownloadError, StartError};
use crate::history::{HistoryRecord, HistoryStore};

/// Runs download sessions in the background, one at a time.
pub struct DownloadExecutor {
    engine: Arc<dyn MediaEngine>,
    config: EngineConfig,
    history: Option<Arc<HistoryStore>>,
    busy: Arc<AtomicBool>,
}

impl DownloadExecutor {
    pub fn new(engine: Arc<dyn MediaEngine>, config: EngineConfig) -> Self {
        Self {
            engine,
            config,
            history: None,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_history(mut self, history: Arc<HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    /// True from `start` until the session's terminal event is sent.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Start a fresh session. Fails while another session is still running.
    pub fn start(
        &self,
        request: DownloadRequest,
        ffmpeg_location: Option<PathBuf>,
    ) -> Result<SessionHandle, StartError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(StartError::SessionActive);
        }

        let session = DownloadSession::new(request);
        let id = session.id;
        let session = Arc::new(RwLock::new(session));
        let cancel = CancelFlag::new();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let runner = SessionRunner {
            engine: Arc::clone(&self.engine),
            config: self.config.clone(),
            ffmpeg_location,
            history: self.history.clone(),
            session: Arc::clone(&session),
            cancel: cancel.clone(),
            events: event_tx,
            busy: Arc::clone(&self.busy),
        };

        info!("Starting download session {}", id);
        let task = tokio::spawn(runner.run());

        Ok(SessionHandle {
            id,
            cancel,
            session,
            events: event_rx,
            task,
        })
    }
}

/// Frees the session slot when dropped, including during a panic.
struct SlotGuard(Arc<AtomicBool>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct SessionRunner {
    engine: Arc<dyn MediaEngine>,
    config: EngineConfig,
    ffmpeg_location: Option<PathBuf>,
    history: Option<Arc<HistoryStore>>,
    session: Arc<RwLock<DownloadSession>>,
    cancel: CancelFlag,
    events: mpsc::UnboundedSender<SessionEvent>,
    busy: Arc<AtomicBool>,
}

impl SessionRunner {
    async fn run(self) -> Result<DownloadOutcome, DownloadError> {
        let slot = SlotGuard(Arc::clone(&self.busy));
        let request = {
            let mut session = self.session.write().await;
            session.state = SessionState::Running;
            session.request.clone()
        };

        let result = AssertUnwindSafe(self.execute(&request))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                warn!("Download of {} panicked", request.url());
                Err(DownloadError::Engine("download task panicked".to_string()))
            });

        let state = match &result {
            Ok(outcome) => {
                self.record_history(&request, outcome);
                SessionState::Completed
            }
            Err(error) => {
                let destination = request.destination().to_path_buf();
                let removed =
                    tokio::task::spawn_blocking(move || remove_partial_artifacts(&destination))
                        .await
                        .unwrap_or_else(|e| {
                            warn!("Partial file cleanup did not run: {}", e);
                            0
                        });
                debug!("Removed {} partial files after failure", removed);

                if error.is_cancelled() {
                    SessionState::Cancelled
                } else {
                    SessionState::Failed
                }
            }
        };

        {
            let mut session = self.session.write().await;
            session.state = state;
            session.result = Some(result.clone());
        }

        // Release the slot before the terminal event so the receiver can start anew.
        drop(slot);

        let terminal = match &result {
            Ok(outcome) => {
                info!("Download session finished: {:?}", outcome);
                SessionEvent::Completed(outcome.clone())
            }
            Err(error) => {
                info!("Download session ended: {}", error);
                SessionEvent::Failed(error.clone())
            }
        };
        let _ = self.events.send(terminal);

        result
    }

    async fn execute(&self, request: &DownloadRequest) -> Result<DownloadOutcome, DownloadError> {
        if self.cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let aggregator = if request.playlist() {
            let total = self
                .engine
                .playlist_count(request.url(), self.config.playlist_end)
                .await
                .map_err(classify)?;
            debug!("Playlist has {} items", total);

            self.session.write().await.total_items = total.max(1);
            let _ = self
                .events
                .send(SessionEvent::PlaylistResolved { total: total.max(1) });

            if self.cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            ProgressAggregator::playlist(total)
        } else {
            ProgressAggregator::single()
        };

        let options =
            EngineOptions::for_request(request, &self.config, self.ffmpeg_location.as_deref());

        let mut hook = SessionHook {
            aggregator,
            cancel: self.cancel.clone(),
            session: Arc::clone(&self.session),
            events: self.events.clone(),
            finished: Vec::new(),
            last_filename: None,
        };

        let outcome = self
            .engine
            .download(request.url(), &options, &mut hook)
            .await;

        // A cancel that no checkpoint observed still wins over success.
        if self.cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        outcome.map_err(classify)?;

        if request.playlist() {
            Ok(DownloadOutcome::Batch {
                items: hook.finished,
            })
        } else {
            let path = hook
                .finished
                .last()
                .cloned()
                .or_else(|| {
                    hook.last_filename
                        .as_deref()
                        .map(|name| final_path(name, request.format(), &self.config))
                })
                .ok_or_else(|| {
                    DownloadError::Engine("engine did not report an output file".to_string())
                })?;
            Ok(DownloadOutcome::Single { path })
        }
    }

    fn record_history(&self, request: &DownloadRequest, outcome: &DownloadOutcome) {
        let Some(history) = &self.history else {
            return;
        };

        for path in outcome.paths() {
            if let Err(e) = history.append(HistoryRecord::new(&path, request.url())) {
                warn!("Failed to record download history: {}", e);
            }
        }
    }
}

struct SessionHook {
    aggregator: ProgressAggregator,
    cancel: CancelFlag,
    session: Arc<RwLock<DownloadSession>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    finished: Vec<PathBuf>,
    last_filename: Option<String>,
}

#[async_trait]
impl ProgressHook for SessionHook {
    async fn on_event(&mut self, event: EngineEvent) -> ControlFlow<()> {
        if self.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }

        match event {
            EngineEvent::Progress(raw) => {
                if let Some(name) = &raw.filename {
                    self.last_filename = Some(name.clone());
                }
                let progress = self.aggregator.translate(&raw);
                self.session.write().await.last_progress = Some(progress.clone());
                let _ = self.events.send(SessionEvent::Progress(progress));
            }
            EngineEvent::ItemFinished { path } => {
                self.finished.push(path.clone());
                if let Some(position) = self.aggregator.finish_item() {
                    {
                        let mut session = self.session.write().await;
                        session.current_item = position.current;
                        session.total_items = position.total;
                    }
                    let _ = self
                        .events
                        .send(SessionEvent::ItemFinished { position, path });
                }
            }
        }

        ControlFlow::Continue(())
    }
}

fn classify(failure: EngineFailure) -> DownloadError {
    match failure.kind {
        EngineErrorKind::UnsupportedUrl => DownloadError::UnsupportedUrl,
        EngineErrorKind::Extractor => DownloadError::Extractor(failure.message),
        EngineErrorKind::Download => DownloadError::Download(failure.message),
        EngineErrorKind::Unavailable => DownloadError::Unavailable,
        EngineErrorKind::Aborted => DownloadError::Cancelled,
        EngineErrorKind::Spawn => DownloadError::Io(failure.message),
        EngineErrorKind::Other => DownloadError::Engine(failure.message),
    }
}

/// Name of the file left behind once post-processing has run.
fn final_path(engine_filename: &str, format: MediaFormat, config: &EngineConfig) -> PathBuf {
    let path = Path::new(engine_filename.strip_suffix(".part").unwrap_or(engine_filename));
    match format {
        MediaFormat::Audio => path.with_extension(&config.audio_codec),
        MediaFormat::Video => path.to_path_buf(),
    }
}
