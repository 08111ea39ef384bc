#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tubefetch::engine::{
    EngineEvent, EngineFailure, EngineOptions, MediaEngine, MediaInfo, ProgressHook, RawProgress,
};
use tubefetch::provision::EnvironmentBinding;

/// One scripted action of a fake download.
#[derive(Clone)]
pub enum Step {
    Progress { downloaded: f64, total: Option<f64> },
    Finish(PathBuf),
    /// Write a file, like an engine leaving temporary data behind.
    Touch(PathBuf),
    /// Block until the test releases the gate.
    Gate(Arc<Notify>),
    Fail(EngineFailure),
    /// Panic, but only during the first download.
    Panic,
}

pub fn progress(downloaded: f64, total: f64) -> Step {
    Step::Progress {
        downloaded,
        total: Some(total),
    }
}

/// In-process engine that replays a fixed script for every download.
#[derive(Default)]
pub struct ScriptedEngine {
    pub steps: Vec<Step>,
    pub playlist_total: usize,
    /// url -> (delay, info)
    pub infos: HashMap<String, (Duration, MediaInfo)>,
    pub info_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn with_steps(steps: Vec<Step>) -> Self {
        Self {
            steps,
            playlist_total: 1,
            ..Default::default()
        }
    }
}

#[async_trait]
impl MediaEngine for ScriptedEngine {
    async fn extract_info(&self, url: &str) -> Result<MediaInfo, EngineFailure> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        match self.infos.get(url) {
            Some((delay, info)) => {
                tokio::time::sleep(*delay).await;
                Ok(info.clone())
            }
            None => Err(EngineFailure::new(
                tubefetch::engine::EngineErrorKind::Extractor,
                format!("no such video: {}", url),
            )),
        }
    }

    async fn playlist_count(
        &self,
        _url: &str,
        playlist_end: Option<u32>,
    ) -> Result<usize, EngineFailure> {
        Ok(match playlist_end {
            Some(end) => self.playlist_total.min(end as usize),
            None => self.playlist_total,
        })
    }

    async fn download(
        &self,
        _url: &str,
        _options: &EngineOptions,
        hook: &mut dyn ProgressHook,
    ) -> Result<(), EngineFailure> {
        let call = self.download_calls.fetch_add(1, Ordering::SeqCst);

        for step in &self.steps {
            let event = match step {
                Step::Progress { downloaded, total } => EngineEvent::Progress(RawProgress {
                    status: "downloading".to_string(),
                    downloaded_bytes: Some(*downloaded),
                    total_bytes: *total,
                    speed: Some(1024.0),
                    eta: Some(3.0),
                    ..Default::default()
                }),
                Step::Finish(path) => EngineEvent::ItemFinished { path: path.clone() },
                Step::Touch(path) => {
                    std::fs::write(path, b"partial").expect("write scratch file");
                    continue;
                }
                Step::Gate(gate) => {
                    gate.notified().await;
                    continue;
                }
                Step::Fail(failure) => return Err(failure.clone()),
                Step::Panic => {
                    if call == 0 {
                        panic!("scripted engine crashed");
                    }
                    continue;
                }
            };

            if hook.on_event(event).await.is_break() {
                return Err(EngineFailure::aborted());
            }
        }
        Ok(())
    }
}

pub fn info(title: &str, thumbnail: Option<&str>) -> MediaInfo {
    MediaInfo {
        title: Some(title.to_string()),
        thumbnail: thumbnail.map(str::to_string),
        duration: Some(212.0),
        uploader: Some("Uploader".to_string()),
        channel: None,
    }
}

/// Binding that only records which directories it was asked to bind.
#[derive(Clone, Default)]
pub struct RecordingBinding {
    pub seen: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingBinding {
    pub fn calls(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

impl EnvironmentBinding for RecordingBinding {
    fn name(&self) -> &str {
        "test binding"
    }

    fn ensure(&self, dir: &Path) -> io::Result<bool> {
        let mut seen = self.seen.lock().unwrap();
        let fresh = !seen.iter().any(|p| p == dir);
        seen.push(dir.to_path_buf());
        Ok(fresh)
    }
}

/// Minimal HTTP/1.1 responder on loopback. Unknown paths get a 404.
/// Returns the base URL, e.g. `http://127.0.0.1:41234`.
pub async fn serve(routes: HashMap<String, Vec<u8>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = Arc::new(routes);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let head = String::from_utf8_lossy(&request);
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = match routes.get(&path) {
                    Some(body) => ("200 OK", body.clone()),
                    None => ("404 Not Found", b"not found".to_vec()),
                };
                let header = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                );
                let _ = socket.write_all(header.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}
