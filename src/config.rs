use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::download::MediaFormat;
use crate::urls::UrlValidator;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub provision: ProvisionConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub output_directory: Option<PathBuf>,
    #[serde(default)]
    pub default_format: MediaFormat,
    #[serde(default = "default_sites")]
    pub sites: Vec<String>,
    #[serde(default = "default_short_hosts")]
    pub short_hosts: Vec<String>,
}

/// Knobs passed through to the extraction engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_binary")]
    pub binary: PathBuf,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retries")]
    pub fragment_retries: u32,
    #[serde(default = "default_retries")]
    pub file_access_retries: u32,
    #[serde(default = "default_retries")]
    pub extractor_retries: u32,
    #[serde(default = "default_socket_timeout_secs")]
    pub socket_timeout_secs: u64,
    #[serde(default = "default_http_chunk_size")]
    pub http_chunk_size: u64,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u64,
    #[serde(default = "default_concurrent_fragments")]
    pub concurrent_fragments: u32,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,
    #[serde(default)]
    pub playlist_end: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,
    #[serde(default = "default_archive_url")]
    pub archive_url: Option<String>,
    #[serde(default = "default_digest_url")]
    pub digest_url: Option<String>,
    #[serde(default)]
    pub persist_path: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

// Default value functions
fn default_sites() -> Vec<String> {
    vec!["youtube.com".to_string()]
}
fn default_short_hosts() -> Vec<String> {
    vec!["youtu.be".to_string()]
}
fn default_engine_binary() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("yt-dlp.exe")
    } else {
        PathBuf::from("yt-dlp")
    }
}
fn default_retries() -> u32 {
    10
}
fn default_socket_timeout_secs() -> u64 {
    300
}
fn default_http_chunk_size() -> u64 {
    10 * 1024 * 1024
}
fn default_buffer_size() -> u64 {
    1024 * 1024
}
fn default_concurrent_fragments() -> u32 {
    10
}
fn default_audio_codec() -> String {
    "mp3".to_string()
}
fn default_audio_quality() -> String {
    "192".to_string()
}
fn default_install_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".ffmpeg"))
        .unwrap_or_else(|| PathBuf::from(".ffmpeg"))
}
fn default_archive_url() -> Option<String> {
    if cfg!(windows) {
        Some("https://github.com/BtbN/FFmpeg-Builds/releases/download/latest/ffmpeg-master-latest-win64-gpl.zip".to_string())
    } else if cfg!(target_os = "macos") {
        Some("https://evermeet.cx/ffmpeg/getrelease/zip".to_string())
    } else {
        None
    }
}
fn default_digest_url() -> Option<String> {
    if cfg!(windows) {
        Some(
            "https://github.com/BtbN/FFmpeg-Builds/releases/download/latest/checksums.sha256"
                .to_string(),
        )
    } else {
        None
    }
}
fn default_max_entries() -> usize {
    100
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_directory: None,
            default_format: MediaFormat::default(),
            sites: default_sites(),
            short_hosts: default_short_hosts(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: default_engine_binary(),
            retries: default_retries(),
            fragment_retries: default_retries(),
            file_access_retries: default_retries(),
            extractor_retries: default_retries(),
            socket_timeout_secs: default_socket_timeout_secs(),
            http_chunk_size: default_http_chunk_size(),
            buffer_size: default_buffer_size(),
            concurrent_fragments: default_concurrent_fragments(),
            audio_codec: default_audio_codec(),
            audio_quality: default_audio_quality(),
            playlist_end: None,
        }
    }
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            install_dir: default_install_dir(),
            archive_url: default_archive_url(),
            digest_url: default_digest_url(),
            persist_path: false,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            file: None,
            max_entries: default_max_entries(),
        }
    }
}

impl GeneralConfig {
    pub fn url_validator(&self) -> UrlValidator {
        UrlValidator::new(&self.sites, &self.short_hosts)
    }
}

pub struct ConfigManager {
    config_file: PathBuf,
    data_dir: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Create a new ConfigManager and load existing config or create default
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("", "", "tubefetch")
            .context("Failed to determine config directory")?;

        Self::with_dirs(
            project_dirs.config_dir().to_path_buf(),
            project_dirs.data_dir().to_path_buf(),
        )
    }

    /// Load or create the config file inside explicit directories
    pub fn with_dirs(config_dir: PathBuf, data_dir: PathBuf) -> Result<Self> {
        let config_file = config_dir.join("config.toml");

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
        }

        let config = if config_file.exists() {
            Self::load_config(&config_file)?
        } else {
            let default_config = Config::default();
            Self::save_config(&config_file, &default_config)?;
            default_config
        };

        Ok(Self {
            config_file,
            data_dir,
            config,
        })
    }

    /// Get a reference to the current config
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the current config
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Save the current config to disk
    pub fn save(&self) -> Result<()> {
        Self::save_config(&self.config_file, &self.config)
    }

    /// Replace the current config with defaults and persist it
    pub fn reset(&mut self) -> Result<()> {
        self.config = Config::default();
        self.save()
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Location of the download history, honouring an explicit override
    pub fn history_file(&self) -> PathBuf {
        self.config
            .history
            .file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("history.json"))
    }

    fn load_config(config_file: &Path) -> Result<Config> {
        let content = fs::read_to_string(config_file)
            .with_context(|| format!("Failed to read config file: {:?}", config_file))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_file))?;

        Ok(config)
    }

    fn save_config(config_file: &Path, config: &Config) -> Result<()> {
        let content = toml::to_string_pretty(config).context("Failed to serialize config")?;

        fs::write(config_file, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_file))?;

        Ok(())
    }

    /// Validate the current configuration
    pub fn validate(&self) -> Result<()> {
        let engine = &self.config.engine;
        if engine.concurrent_fragments == 0 {
            anyhow::bail!("engine.concurrent_fragments must be greater than 0");
        }
        if engine.socket_timeout_secs == 0 {
            anyhow::bail!("engine.socket_timeout_secs must be greater than 0");
        }
        if engine.http_chunk_size == 0 {
            anyhow::bail!("engine.http_chunk_size must be greater than 0");
        }
        if engine.audio_codec.trim().is_empty() {
            anyhow::bail!("engine.audio_codec cannot be empty");
        }
        if engine.playlist_end == Some(0) {
            anyhow::bail!("engine.playlist_end must be greater than 0 when set");
        }

        if self.config.general.sites.is_empty() && self.config.general.short_hosts.is_empty() {
            anyhow::bail!("at least one site or short host must be configured");
        }

        if self.config.history.max_entries == 0 {
            anyhow::bail!("history.max_entries must be greater than 0");
        }

        if self.config.provision.install_dir.as_os_str().is_empty() {
            anyhow::bail!("provision.install_dir cannot be empty");
        }

        Ok(())
    }
}
