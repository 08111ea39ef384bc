use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::options::{FINAL_POSTPROCESSOR, POSTPROCESS_MARKER, PROGRESS_MARKER};
use super::{
    EngineErrorKind, EngineEvent, EngineFailure, EngineOptions, MediaEngine, MediaInfo,
    ProgressHook, RawProgress,
};

/// Drives the `yt-dlp` executable.
pub struct YtDlpEngine {
    binary: PathBuf,
}

#[derive(Deserialize)]
struct FlatPlaylist {
    #[serde(default)]
    playlist_count: Option<usize>,
    #[serde(default)]
    entries: Option<Vec<serde_json::Value>>,
}

impl YtDlpEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    async fn run_json(&self, args: &[String], url: &str) -> Result<Vec<u8>, EngineFailure> {
        debug!("Running {:?} {:?} {}", self.binary, args, url);

        let output = Command::new(&self.binary)
            .args(args)
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| spawn_failure(&self.binary, e))?;

        if !output.status.success() {
            return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    async fn extract_info(&self, url: &str) -> Result<MediaInfo, EngineFailure> {
        let args = [
            "--dump-single-json",
            "--skip-download",
            "--no-playlist",
            "--no-warnings",
        ]
        .map(String::from);

        let stdout = self.run_json(&args, url).await?;
        serde_json::from_slice(&stdout).map_err(|e| {
            EngineFailure::new(
                EngineErrorKind::Other,
                format!("yt-dlp returned invalid JSON: {}", e),
            )
        })
    }

    async fn playlist_count(
        &self,
        url: &str,
        playlist_end: Option<u32>,
    ) -> Result<usize, EngineFailure> {
        let mut args: Vec<String> = ["--flat-playlist", "--dump-single-json", "--no-warnings"]
            .map(String::from)
            .to_vec();
        if let Some(end) = playlist_end {
            args.push("--playlist-end".to_string());
            args.push(end.to_string());
        }

        let stdout = self.run_json(&args, url).await?;
        let playlist: FlatPlaylist = serde_json::from_slice(&stdout).map_err(|e| {
            EngineFailure::new(
                EngineErrorKind::Other,
                format!("yt-dlp returned invalid playlist JSON: {}", e),
            )
        })?;

        let count = playlist
            .entries
            .map(|entries| entries.len())
            .or(playlist.playlist_count)
            .unwrap_or(1);

        Ok(match playlist_end {
            Some(end) => count.min(end as usize),
            None => count,
        })
    }

    async fn download(
        &self,
        url: &str,
        options: &EngineOptions,
        hook: &mut dyn ProgressHook,
    ) -> Result<(), EngineFailure> {
        let args = options.to_args();
        debug!("Running {:?} {:?} {}", self.binary, args, url);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_failure(&self.binary, e))?;

        // Progress and completion markers both arrive on stdout, in order.
        // stderr only carries diagnostics.
        let diagnostics = child.stderr.take().map(collect_diagnostics);
        let stdout = child.stdout.take().ok_or_else(|| {
            EngineFailure::new(EngineErrorKind::Spawn, "yt-dlp stdout was not captured")
        })?;

        let mut lines = BufReader::new(stdout).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read yt-dlp output: {}", e);
                    break;
                }
            };
            let Some(event) = parse_line(&line) else {
                continue;
            };

            if hook.on_event(event).await.is_break() {
                debug!("Progress hook requested stop, terminating yt-dlp");
                if let Err(e) = child.kill().await {
                    warn!("Failed to stop yt-dlp: {}", e);
                }
                return Err(EngineFailure::aborted());
            }
        }

        let status = child.wait().await.map_err(|e| {
            EngineFailure::new(
                EngineErrorKind::Spawn,
                format!("yt-dlp process failed: {}", e),
            )
        })?;

        if status.success() {
            return Ok(());
        }
        let stderr = match diagnostics {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        Err(classify_failure(&stderr))
    }
}

fn collect_diagnostics<R>(reader: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut text = String::new();
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("yt-dlp: {}", line);
            text.push_str(&line);
            text.push('\n');
        }
        text
    })
}

fn spawn_failure(binary: &Path, error: std::io::Error) -> EngineFailure {
    EngineFailure::new(
        EngineErrorKind::Spawn,
        format!("failed to run {:?}: {}", binary, error),
    )
}

/// Recognise the machine-readable lines requested by `EngineOptions::to_args`.
pub(crate) fn parse_line(line: &str) -> Option<EngineEvent> {
    let line = line.trim();

    if let Some(idx) = line.find(PROGRESS_MARKER) {
        let payload = &line[idx + PROGRESS_MARKER.len()..];
        return serde_json::from_str::<RawProgress>(payload)
            .ok()
            .map(EngineEvent::Progress);
    }

    if let Some(idx) = line.find(POSTPROCESS_MARKER) {
        let payload = &line[idx + POSTPROCESS_MARKER.len()..];
        let (postprocessor, rest) = payload.split_once(' ')?;
        let (status, filepath) = rest.split_once(' ')?;
        if postprocessor != FINAL_POSTPROCESSOR || status != "finished" {
            return None;
        }
        return serde_json::from_str::<String>(filepath)
            .ok()
            .filter(|path| !path.is_empty())
            .map(|path| EngineEvent::ItemFinished {
                path: PathBuf::from(path),
            });
    }

    None
}

/// Map yt-dlp's error output onto a failure category.
pub(crate) fn classify_failure(stderr: &str) -> EngineFailure {
    let lower = stderr.to_lowercase();
    let message = last_error_line(stderr);

    let kind = if lower.contains("unsupported url") {
        EngineErrorKind::UnsupportedUrl
    } else if lower.contains("video unavailable")
        || lower.contains("this video is unavailable")
        || lower.contains("private video")
        || lower.contains("is not available")
    {
        EngineErrorKind::Unavailable
    } else if lower.contains("unable to download")
        || lower.contains("http error")
        || lower.contains("giving up after")
        || lower.contains("fragment")
    {
        EngineErrorKind::Download
    } else if lower.contains("unable to extract")
        || lower.contains("extractorerror")
        || lower.contains("error: [")
    {
        EngineErrorKind::Extractor
    } else {
        EngineErrorKind::Other
    };

    EngineFailure::new(kind, message)
}

fn last_error_line(stderr: &str) -> String {
    let line = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.to_lowercase().starts_with("error"))
        .unwrap_or_else(|| stderr.trim());

    let line = line
        .strip_prefix("ERROR: ")
        .or_else(|| line.strip_prefix("ERROR:"))
        .unwrap_or(line);

    if line.is_empty() {
        "yt-dlp exited with an error".to_string()
    } else {
        line.chars().take(300).collect()
    }
}
