use anyhow::{Context, Result};
use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tubefetch::config::ConfigManager;
use tubefetch::download::ProgressPhase;
use tubefetch::download::progress::{format_eta, format_speed};
use tubefetch::{DownloadController, DownloadError, DownloadOutcome, MediaFormat, SessionEvent};

pub async fn handle_get(
    config_manager: &ConfigManager,
    url: String,
    output: Option<PathBuf>,
    format: Option<MediaFormat>,
    playlist: bool,
    skip_setup: bool,
) -> Result<()> {
    let term = Term::stdout();
    let config = config_manager.config();
    let controller = DownloadController::from_config(config, config_manager.history_file());

    let destination = output
        .or_else(|| config.general.output_directory.clone())
        .or_else(|| std::env::current_dir().ok());
    let format = format.unwrap_or(config.general.default_format);

    if let Some(dir) = &destination {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create download directory: {:?}", dir))?;
    }

    if !skip_setup {
        super::setup::provision_with_progress(&controller, &term).await?;
    }

    if !playlist && controller.validator().is_playlist(&url) {
        term.write_line(&format!(
            "{} This is a playlist link; pass --playlist to download every item",
            style("💡").yellow()
        ))?;
    }

    let mut handle = match controller
        .start(&url, format, destination.as_deref(), playlist)
        .await
    {
        Ok(handle) => handle,
        Err(e) => {
            term.write_line(&format!("{} {}", style("❌").red(), e))?;
            process::exit(1);
        }
    };

    term.write_line(&format!(
        "{} Downloading {} as {}",
        style("⬇️").cyan(),
        style(&url).cyan().bold(),
        format
    ))?;
    if let Some(dir) = &destination {
        term.write_line(&format!(
            "{} Download directory: {}",
            style("📁").cyan(),
            style(dir.display()).cyan()
        ))?;
    }

    let cancel = handle.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received, cancelling download");
            cancel.cancel();
        }
    });

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix}[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    while let Some(event) = handle.next_event().await {
        match event {
            SessionEvent::Progress(progress) => {
                if let Some(position) = progress.playlist {
                    pb.set_prefix(format!("[{}/{}] ", position.current, position.total));
                }
                if progress.total_bytes > 0 {
                    pb.set_length(progress.total_bytes);
                }
                pb.set_position(progress.downloaded_bytes);
                match progress.phase() {
                    ProgressPhase::Finalizing => pb.set_message("Finalizing..."),
                    ProgressPhase::Downloading => pb.set_message(format!(
                        "({}, ETA {})",
                        format_speed(progress.speed_bps),
                        format_eta(progress.eta_secs)
                    )),
                }
            }
            SessionEvent::PlaylistResolved { total } => {
                pb.println(format!("{} Playlist with {} items", style("📋").cyan(), total));
            }
            SessionEvent::ItemFinished { position, path } => {
                pb.println(format!(
                    "{} [{}/{}] {}",
                    style("✅").green(),
                    position.current,
                    position.total,
                    path.display()
                ));
                pb.set_position(0);
            }
            SessionEvent::Completed(outcome) => {
                pb.finish_and_clear();
                match outcome {
                    DownloadOutcome::Single { path } => term.write_line(&format!(
                        "{} Download complete: {}",
                        style("✅").green(),
                        style(path.display()).cyan()
                    ))?,
                    DownloadOutcome::Batch { items } => term.write_line(&format!(
                        "{} Playlist complete: {} files",
                        style("✅").green(),
                        items.len()
                    ))?,
                }
            }
            SessionEvent::Failed(error) => {
                pb.abandon();
                match error {
                    DownloadError::Cancelled => term.write_line(&format!(
                        "{} Download cancelled",
                        style("🛑").yellow()
                    ))?,
                    other => term.write_line(&format!("{} {}", style("❌").red(), other))?,
                }
            }
        }
    }

    let result = handle.wait().await;
    if result.is_err() {
        process::exit(1);
    }
    Ok(())
}
