use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tubefetch::MediaFormat;

#[derive(Parser)]
#[command(name = "tubefetch")]
#[command(about = "Download videos and audio from video-sharing sites")]
#[command(long_about = "
tubefetch downloads single videos or whole playlists as video or audio files,
with live progress, cancellation (Ctrl-C) and a history of finished downloads.
The ffmpeg transcoder is installed automatically on first use.

Examples:
  tubefetch get https://www.youtube.com/watch?v=dQw4w9WgXcQ
  tubefetch get https://youtu.be/dQw4w9WgXcQ --audio -o ~/Music
  tubefetch get 'https://www.youtube.com/playlist?list=PL123' --playlist
  tubefetch info https://youtu.be/dQw4w9WgXcQ
  tubefetch history
")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download a video, short or playlist
    #[command(visible_alias = "dl")]
    Get {
        /// Video or playlist URL
        url: String,

        /// Destination directory
        #[arg(short, long, value_name = "DIR")]
        #[arg(help = "Destination directory (defaults to general.output_directory)")]
        output: Option<PathBuf>,

        /// Extract audio only
        #[arg(short, long, conflicts_with = "video")]
        #[arg(help = "Download the best audio stream and convert it")]
        audio: bool,

        /// Download video
        #[arg(long)]
        #[arg(help = "Download video (overrides general.default_format)")]
        video: bool,

        /// Download every item of a playlist URL
        #[arg(short, long)]
        #[arg(help = "Download all items of the playlist")]
        playlist: bool,

        /// Skip the ffmpeg check
        #[arg(long)]
        #[arg(help = "Do not install or look for ffmpeg before downloading")]
        skip_setup: bool,
    },

    /// Show title, duration and uploader without downloading
    Info {
        /// Video URL
        url: String,

        /// Save the thumbnail image to a file
        #[arg(short, long, value_name = "FILE")]
        #[arg(help = "Write the thumbnail to FILE")]
        thumbnail: Option<PathBuf>,
    },

    /// Show or clear the download history
    #[command(visible_alias = "hist")]
    History {
        /// Maximum number of entries to show
        #[arg(short = 'n', long, default_value = "20", value_name = "N")]
        limit: usize,

        /// Remove all entries
        #[arg(long)]
        clear: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Install ffmpeg if it is missing
    Setup,

    /// Manage configuration
    #[command(visible_alias = "cfg")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Print the configuration file location
    Path,

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Set the default download directory
    SetOutput {
        /// Directory to download into
        dir: PathBuf,
    },
}

impl Cli {
    /// Validate CLI arguments and show helpful error messages
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Commands::Get { url, .. } | Commands::Info { url, .. } => {
                if url.trim().is_empty() {
                    return Err("URL cannot be empty".to_string());
                }
            }
            Commands::History { limit, .. } => {
                if *limit == 0 {
                    return Err("History limit must be greater than 0".to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Format requested on the command line, if any
    pub fn requested_format(&self) -> Option<MediaFormat> {
        match &self.command {
            Commands::Get { audio: true, .. } => Some(MediaFormat::Audio),
            Commands::Get { video: true, .. } => Some(MediaFormat::Video),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["tubefetch", "history"]).unwrap();
        assert!(matches!(cli.command, Commands::History { limit: 20, .. }));

        let cli = Cli::try_parse_from(["tubefetch", "setup", "-v"]).unwrap();
        assert!(matches!(cli.command, Commands::Setup));
        assert!(cli.verbose);
    }

    #[test]
    fn test_get_command_options() {
        let cli = Cli::try_parse_from([
            "tubefetch",
            "get",
            "https://youtu.be/abc",
            "--audio",
            "--playlist",
            "-o",
            "/tmp/music",
        ])
        .unwrap();

        assert_eq!(cli.requested_format(), Some(MediaFormat::Audio));
        if let Commands::Get {
            url,
            output,
            playlist,
            ..
        } = cli.command
        {
            assert_eq!(url, "https://youtu.be/abc");
            assert_eq!(output, Some(PathBuf::from("/tmp/music")));
            assert!(playlist);
        } else {
            panic!("Expected Get command");
        }
    }

    #[test]
    fn test_audio_and_video_conflict() {
        assert!(
            Cli::try_parse_from(["tubefetch", "get", "https://youtu.be/a", "--audio", "--video"])
                .is_err()
        );
    }

    #[test]
    fn test_config_subcommands() {
        let cli = Cli::try_parse_from(["tubefetch", "config", "set-output", "/srv/media"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::SetOutput { .. }
            }
        ));

        let cli = Cli::try_parse_from(["tubefetch", "config", "reset", "-y"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Reset { yes: true }
            }
        ));
    }

    #[test]
    fn test_validation() {
        let cli = Cli::try_parse_from(["tubefetch", "get", " "]).unwrap();
        assert!(cli.validate().is_err());

        let cli = Cli::try_parse_from(["tubefetch", "history", "-n", "0"]).unwrap();
        assert!(cli.validate().is_err());
    }
}
