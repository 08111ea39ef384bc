pub mod archive;
pub mod checksum;
pub mod env;

pub use archive::{ffmpeg_file_name, ffprobe_file_name};
pub use checksum::{ChecksumType, ChecksumVerifier};
pub use env::{EnvironmentBinding, PersistentPath, ProcessPath};

use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::config::ProvisionConfig;
use crate::error::ProvisionError;

const ARCHIVE_NAME: &str = "ffmpeg.zip";
const SCRATCH_DIR: &str = "ffmpeg-extract";

#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionEvent {
    Downloading { percent: f64 },
    Verifying,
    Extracting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadySource {
    /// Installed by this run
    Installed,
    AlreadyPresent,
    /// Found on `PATH`; no managed install exists
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ready {
    pub dir: PathBuf,
    pub ffmpeg: PathBuf,
    pub source: ReadySource,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionState {
    pub present: bool,
    pub installing: bool,
    pub progress: f64,
    pub last_error: Option<String>,
}

/// Makes sure an ffmpeg build is installed and discoverable.
pub struct Provisioner {
    config: ProvisionConfig,
    client: Client,
    bindings: Vec<Box<dyn EnvironmentBinding>>,
    state: Arc<RwLock<ProvisionState>>,
}

impl Provisioner {
    /// Provisioner that binds the process `PATH`, plus the user's durable
    /// environment when `persist_path` is set.
    pub fn new(config: ProvisionConfig) -> Self {
        let mut bindings: Vec<Box<dyn EnvironmentBinding>> = vec![Box::new(ProcessPath::default())];
        if config.persist_path {
            bindings.push(Box::new(PersistentPath::default()));
        }
        Self::with_bindings(config, bindings)
    }

    pub fn with_bindings(
        config: ProvisionConfig,
        bindings: Vec<Box<dyn EnvironmentBinding>>,
    ) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("tubefetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            config,
            client,
            bindings,
            state: Arc::new(RwLock::new(ProvisionState::default())),
        }
    }

    pub fn install_dir(&self) -> &Path {
        &self.config.install_dir
    }

    pub fn ffmpeg_path(&self) -> PathBuf {
        self.config.install_dir.join(ffmpeg_file_name())
    }

    pub async fn state(&self) -> ProvisionState {
        self.state.read().await.clone()
    }

    /// Install ffmpeg unless it is already there, then bind its directory.
    ///
    /// Must not run alongside other work that reads the process environment.
    pub async fn ensure_available(
        &self,
        progress: Option<mpsc::UnboundedSender<ProvisionEvent>>,
    ) -> Result<Ready, ProvisionError> {
        let dir = self.config.install_dir.clone();
        let ffmpeg = self.ffmpeg_path();

        if ffmpeg.is_file() {
            debug!("ffmpeg already installed at {:?}", ffmpeg);
            self.bind(&dir);
            self.mark_present().await;
            return Ok(Ready {
                dir,
                ffmpeg,
                source: ReadySource::AlreadyPresent,
            });
        }

        let Some(archive_url) = self.config.archive_url.clone() else {
            return match find_on_path(&ffmpeg_file_name()) {
                Some(found) => {
                    info!("Using system ffmpeg at {:?}", found);
                    self.mark_present().await;
                    Ok(Ready {
                        dir: found.parent().map(Path::to_path_buf).unwrap_or_default(),
                        ffmpeg: found,
                        source: ReadySource::System,
                    })
                }
                None => {
                    let error = ProvisionError::NoArchive;
                    self.state.write().await.last_error = Some(error.to_string());
                    Err(error)
                }
            };
        };

        {
            let mut state = self.state.write().await;
            state.installing = true;
            state.progress = 0.0;
            state.last_error = None;
        }

        info!("Installing ffmpeg into {:?}", dir);
        let result = self.install(&archive_url, &dir, progress.as_ref()).await;

        if let Err(e) = &result {
            warn!("ffmpeg installation failed: {}", e);
            self.rollback(&dir).await;
            let mut state = self.state.write().await;
            state.installing = false;
            state.last_error = Some(e.to_string());
        }
        result?;

        self.bind(&dir);
        {
            let mut state = self.state.write().await;
            state.installing = false;
            state.present = true;
            state.progress = 100.0;
        }
        info!("ffmpeg installed at {:?}", ffmpeg);

        Ok(Ready {
            dir,
            ffmpeg,
            source: ReadySource::Installed,
        })
    }

    async fn install(
        &self,
        archive_url: &str,
        dir: &Path,
        progress: Option<&mpsc::UnboundedSender<ProvisionEvent>>,
    ) -> Result<(), ProvisionError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ProvisionError::io(format!("Failed to create {:?}", dir), e))?;

        let archive = dir.join(ARCHIVE_NAME);
        self.download_archive(archive_url, &archive, progress).await?;

        if let Some(digest_url) = &self.config.digest_url {
            send(progress, ProvisionEvent::Verifying);
            self.verify_archive(archive_url, digest_url, &archive).await?;
        }

        send(progress, ProvisionEvent::Extracting);
        let scratch = dir.join(SCRATCH_DIR);
        let target = dir.to_path_buf();
        let archive_path = archive.clone();
        let scratch_path = scratch.clone();
        tokio::task::spawn_blocking(move || {
            archive::extract_zip(&archive_path, &scratch_path)?;
            let bin = archive::locate_binaries(&scratch_path)
                .ok_or_else(|| ProvisionError::Verify(scratch_path.join(ffmpeg_file_name())))?;
            archive::install_binary(&bin, &target, &ffmpeg_file_name())?;
            if !archive::install_binary(&bin, &target, &ffprobe_file_name())? {
                debug!("Release has no ffprobe");
            }
            Ok::<_, ProvisionError>(())
        })
        .await
        .map_err(|e| ProvisionError::Extract(e.to_string()))??;

        if let Err(e) = tokio::fs::remove_file(&archive).await {
            warn!("Failed to remove {:?}: {}", archive, e);
        }
        if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
            warn!("Failed to remove {:?}: {}", scratch, e);
        }

        let ffmpeg = dir.join(ffmpeg_file_name());
        if !ffmpeg.is_file() {
            return Err(ProvisionError::Verify(ffmpeg));
        }
        Ok(())
    }

    async fn download_archive(
        &self,
        url: &str,
        output: &Path,
        progress: Option<&mpsc::UnboundedSender<ProvisionEvent>>,
    ) -> Result<(), ProvisionError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ProvisionError::Network {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(ProvisionError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let total_size = response.content_length().filter(|len| *len > 0);
        let mut file = tokio::fs::File::create(output)
            .await
            .map_err(|e| ProvisionError::io(format!("Failed to create {:?}", output), e))?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| ProvisionError::Network {
                url: url.to_string(),
                source,
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ProvisionError::io("Failed to write archive", e))?;
            downloaded += chunk.len() as u64;

            if let Some(total) = total_size {
                let percent = (downloaded as f64 / total as f64 * 100.0).min(100.0);
                self.state.write().await.progress = percent;
                send(progress, ProvisionEvent::Downloading { percent });
            }
        }

        file.flush()
            .await
            .map_err(|e| ProvisionError::io("Failed to flush archive", e))?;
        debug!("Downloaded {} bytes from {}", downloaded, url);
        Ok(())
    }

    async fn verify_archive(
        &self,
        archive_url: &str,
        digest_url: &str,
        archive: &Path,
    ) -> Result<(), ProvisionError> {
        let response = self
            .client
            .get(digest_url)
            .send()
            .await
            .map_err(|source| ProvisionError::Network {
                url: digest_url.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(ProvisionError::HttpStatus {
                url: digest_url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let listing = response
            .text()
            .await
            .map_err(|source| ProvisionError::Network {
                url: digest_url.to_string(),
                source,
            })?;

        let asset = asset_name(archive_url);
        let checksum_type = ChecksumType::from_digest_url(digest_url);
        let expected = ChecksumVerifier::parse_published(&listing, &asset, checksum_type)
            .ok_or_else(|| ProvisionError::MissingDigest {
                asset: asset.clone(),
            })?;

        let actual = ChecksumVerifier::calculate_checksum(archive, checksum_type).await?;
        if !actual.eq_ignore_ascii_case(&expected) {
            return Err(ProvisionError::Integrity { expected, actual });
        }
        debug!("Archive digest verified for {}", asset);
        Ok(())
    }

    // The install directory holds only managed binaries; nothing in it
    // survives a failed run.
    async fn rollback(&self, dir: &Path) {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => debug!("Removed {:?}", dir),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Rollback of {:?} incomplete: {}", dir, e),
        }
    }

    fn bind(&self, dir: &Path) {
        for binding in &self.bindings {
            match binding.ensure(dir) {
                Ok(true) => info!("Added {:?} to the {}", dir, binding.name()),
                Ok(false) => debug!("{:?} already in the {}", dir, binding.name()),
                Err(e) => warn!("Failed to update the {}: {}", binding.name(), e),
            }
        }
    }

    async fn mark_present(&self) {
        let mut state = self.state.write().await;
        state.present = true;
        state.installing = false;
        state.last_error = None;
    }
}

fn send(progress: Option<&mpsc::UnboundedSender<ProvisionEvent>>, event: ProvisionEvent) {
    if let Some(tx) = progress {
        let _ = tx.send(event);
    }
}

/// Last path segment of a URL, without query or fragment.
fn asset_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// First `name` executable found on the process `PATH`.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_name_strips_query() {
        assert_eq!(
            asset_name("https://host/releases/ffmpeg-win64-gpl.zip?raw=1"),
            "ffmpeg-win64-gpl.zip"
        );
        assert_eq!(asset_name("https://evermeet.cx/ffmpeg/getrelease/zip"), "zip");
    }

    #[tokio::test]
    async fn fresh_state_is_idle() {
        let provisioner = Provisioner::with_bindings(ProvisionConfig::default(), Vec::new());
        let state = provisioner.state().await;
        assert!(!state.present);
        assert!(!state.installing);
        assert!(state.last_error.is_none());
    }
}
