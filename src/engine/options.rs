use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::download::{DownloadRequest, MediaFormat};

pub const AUDIO_SELECTOR: &str = "bestaudio/best";
pub const VIDEO_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

pub(crate) const PROGRESS_MARKER: &str = "tubefetch-progress ";
pub(crate) const POSTPROCESS_MARKER: &str = "tubefetch-post ";
/// Postprocessor that moves each item to its final location.
pub(crate) const FINAL_POSTPROCESSOR: &str = "MoveFilesAfterDownload";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioExtraction {
    pub codec: String,
    pub quality: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistMode {
    Single,
    Playlist { end: Option<u32> },
}

/// Everything the engine needs for one download invocation.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub output_template: PathBuf,
    pub format_selector: String,
    pub audio_extraction: Option<AudioExtraction>,
    pub retries: u32,
    pub fragment_retries: u32,
    pub file_access_retries: u32,
    pub extractor_retries: u32,
    pub socket_timeout_secs: u64,
    pub http_chunk_size: u64,
    pub buffer_size: u64,
    pub concurrent_fragments: u32,
    pub ffmpeg_location: Option<PathBuf>,
    pub playlist: PlaylistMode,
}

impl EngineOptions {
    pub fn for_request(
        request: &DownloadRequest,
        config: &EngineConfig,
        ffmpeg_location: Option<&Path>,
    ) -> Self {
        let (format_selector, audio_extraction) = match request.format() {
            MediaFormat::Audio => (
                AUDIO_SELECTOR.to_string(),
                Some(AudioExtraction {
                    codec: config.audio_codec.clone(),
                    quality: config.audio_quality.clone(),
                }),
            ),
            MediaFormat::Video => (VIDEO_SELECTOR.to_string(), None),
        };

        let playlist = if request.playlist() {
            PlaylistMode::Playlist {
                end: config.playlist_end,
            }
        } else {
            PlaylistMode::Single
        };

        Self {
            output_template: request.destination().join(OUTPUT_TEMPLATE),
            format_selector,
            audio_extraction,
            retries: config.retries,
            fragment_retries: config.fragment_retries,
            file_access_retries: config.file_access_retries,
            extractor_retries: config.extractor_retries,
            socket_timeout_secs: config.socket_timeout_secs,
            http_chunk_size: config.http_chunk_size,
            buffer_size: config.buffer_size,
            concurrent_fragments: config.concurrent_fragments,
            ffmpeg_location: ffmpeg_location.map(Path::to_path_buf),
            playlist,
        }
    }

    /// Render as yt-dlp command line arguments (without the URL).
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            self.format_selector.clone(),
            "-o".to_string(),
            self.output_template.to_string_lossy().to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--no-simulate".to_string(),
            "--progress-template".to_string(),
            format!("download:{}%(progress)j", PROGRESS_MARKER),
            "--progress-template".to_string(),
            format!(
                "postprocess:{}%(progress.postprocessor)s %(progress.status)s %(info.filepath)j",
                POSTPROCESS_MARKER
            ),
            "--retries".to_string(),
            self.retries.to_string(),
            "--fragment-retries".to_string(),
            self.fragment_retries.to_string(),
            "--file-access-retries".to_string(),
            self.file_access_retries.to_string(),
            "--extractor-retries".to_string(),
            self.extractor_retries.to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout_secs.to_string(),
            "--http-chunk-size".to_string(),
            self.http_chunk_size.to_string(),
            "--buffer-size".to_string(),
            self.buffer_size.to_string(),
            "--concurrent-fragments".to_string(),
            self.concurrent_fragments.to_string(),
        ];

        if let Some(location) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(location.to_string_lossy().to_string());
        }

        if let Some(audio) = &self.audio_extraction {
            args.push("--extract-audio".to_string());
            args.push("--audio-format".to_string());
            args.push(audio.codec.clone());
            args.push("--audio-quality".to_string());
            args.push(audio_quality_arg(&audio.quality));
        }

        match self.playlist {
            PlaylistMode::Single => args.push("--no-playlist".to_string()),
            PlaylistMode::Playlist { end } => {
                args.push("--yes-playlist".to_string());
                if let Some(end) = end {
                    args.push("--playlist-end".to_string());
                    args.push(end.to_string());
                }
            }
        }

        args
    }
}

// Numbers up to 10 are VBR levels; larger bare numbers are a bitrate in kbps.
fn audio_quality_arg(quality: &str) -> String {
    match quality.parse::<u32>() {
        Ok(n) if n > 10 => format!("{}K", n),
        _ => quality.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn audio_profile_requests_transcode() {
        let request = DownloadRequest::new(
            "https://youtu.be/abc",
            MediaFormat::Audio,
            PathBuf::from("/tmp/out"),
            false,
        );
        let options = EngineOptions::for_request(&request, &EngineConfig::default(), None);
        let args = options.to_args();

        assert_eq!(value_after(&args, "-f"), Some(AUDIO_SELECTOR));
        assert!(args.contains(&"--extract-audio".to_string()));
        assert_eq!(value_after(&args, "--audio-format"), Some("mp3"));
        assert_eq!(value_after(&args, "--audio-quality"), Some("192K"));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(!args.contains(&"--ffmpeg-location".to_string()));
    }

    #[test]
    fn progress_and_completion_share_one_stream() {
        let request = DownloadRequest::new(
            "https://youtu.be/abc",
            MediaFormat::Video,
            PathBuf::from("/tmp/out"),
            false,
        );
        let args = EngineOptions::for_request(&request, &EngineConfig::default(), None).to_args();

        // --print would make yt-dlp quiet and move progress to stderr.
        assert!(!args.contains(&"--print".to_string()));
        let templates: Vec<&str> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "--progress-template")
            .filter_map(|(i, _)| args.get(i + 1).map(String::as_str))
            .collect();
        assert_eq!(templates.len(), 2);
        assert!(templates[0].starts_with("download:tubefetch-progress "));
        assert!(templates[1].starts_with("postprocess:tubefetch-post "));
    }

    #[test]
    fn video_profile_has_fallback_and_resilience_knobs() {
        let request = DownloadRequest::new(
            "https://youtu.be/abc",
            MediaFormat::Video,
            PathBuf::from("/tmp/out"),
            false,
        );
        let options = EngineOptions::for_request(
            &request,
            &EngineConfig::default(),
            Some(Path::new("/opt/ffmpeg")),
        );
        let args = options.to_args();

        assert_eq!(value_after(&args, "-f"), Some(VIDEO_SELECTOR));
        assert!(VIDEO_SELECTOR.ends_with("/best"));
        assert!(!args.contains(&"--extract-audio".to_string()));
        assert_eq!(value_after(&args, "--retries"), Some("10"));
        assert_eq!(value_after(&args, "--fragment-retries"), Some("10"));
        assert_eq!(value_after(&args, "--file-access-retries"), Some("10"));
        assert_eq!(value_after(&args, "--extractor-retries"), Some("10"));
        assert_eq!(value_after(&args, "--socket-timeout"), Some("300"));
        assert_eq!(value_after(&args, "--http-chunk-size"), Some("10485760"));
        assert_eq!(value_after(&args, "--concurrent-fragments"), Some("10"));
        assert_eq!(value_after(&args, "--ffmpeg-location"), Some("/opt/ffmpeg"));
        assert!(
            value_after(&args, "-o")
                .unwrap()
                .ends_with("%(title)s.%(ext)s")
        );
    }

    #[test]
    fn playlist_mode_applies_end_limiter() {
        let request = DownloadRequest::new(
            "https://www.youtube.com/playlist?list=PL1",
            MediaFormat::Video,
            PathBuf::from("/tmp/out"),
            true,
        );
        let config = EngineConfig {
            playlist_end: Some(4),
            ..Default::default()
        };
        let args = EngineOptions::for_request(&request, &config, None).to_args();

        assert!(args.contains(&"--yes-playlist".to_string()));
        assert_eq!(value_after(&args, "--playlist-end"), Some("4"));
        assert!(!args.contains(&"--no-playlist".to_string()));
    }

    #[test]
    fn quality_suffix_only_for_bare_numbers() {
        assert_eq!(audio_quality_arg("192"), "192K");
        assert_eq!(audio_quality_arg("0"), "0");
        assert_eq!(audio_quality_arg("320K"), "320K");
    }
}
