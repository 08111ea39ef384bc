use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::progress::{PlaylistPosition, ProgressEvent};
use super::DownloadRequest;
use crate::error::DownloadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Single { path: PathBuf },
    /// Playlist finished; every produced file in completion order.
    Batch { items: Vec<PathBuf> },
}

impl DownloadOutcome {
    pub fn paths(&self) -> Vec<PathBuf> {
        match self {
            Self::Single { path } => vec![path.clone()],
            Self::Batch { items } => items.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Progress(ProgressEvent),
    PlaylistResolved { total: usize },
    ItemFinished { position: PlaylistPosition, path: PathBuf },
    Completed(DownloadOutcome),
    Failed(DownloadError),
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }
}

/// Shared cancellation flag. Only ever goes from false to true.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns true only for the call that set the flag.
    pub fn cancel(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Mutable state of one download attempt.
#[derive(Debug, Clone)]
pub struct DownloadSession {
    pub id: Uuid,
    pub request: DownloadRequest,
    pub state: SessionState,
    /// Number of finished items, which is also the 0-based index of the next one
    pub current_item: usize,
    pub total_items: usize,
    pub last_progress: Option<ProgressEvent>,
    pub result: Option<Result<DownloadOutcome, DownloadError>>,
}

impl DownloadSession {
    pub fn new(request: DownloadRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            state: SessionState::Idle,
            current_item: 0,
            total_items: 1,
            last_progress: None,
            result: None,
        }
    }
}

/// Foreground view of a running session.
pub struct SessionHandle {
    pub(crate) id: Uuid,
    pub(crate) cancel: CancelFlag,
    pub(crate) session: Arc<RwLock<DownloadSession>>,
    pub(crate) events: mpsc::UnboundedReceiver<SessionEvent>,
    pub(crate) task: JoinHandle<Result<DownloadOutcome, DownloadError>>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the session to stop at its next checkpoint. Repeated calls are no-ops.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Next event in production order; `None` once the terminal event was taken.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    pub async fn snapshot(&self) -> DownloadSession {
        self.session.read().await.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Block until the background task ends and return its outcome.
    pub async fn wait(self) -> Result<DownloadOutcome, DownloadError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(DownloadError::Engine(format!("download task failed: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_is_monotonic() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        assert!(flag.cancel());
        assert!(!flag.cancel());
        assert!(flag.is_cancelled());

        let clone = flag.clone();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn terminal_states() {
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Running.is_terminal());
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
    }
}
