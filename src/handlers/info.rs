use anyhow::{Context, Result};
use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tubefetch::config::ConfigManager;
use tubefetch::{DownloadController, MetadataError, MetadataPanel, MetadataUpdate};

pub async fn handle_info(
    config_manager: &ConfigManager,
    url: String,
    thumbnail: Option<PathBuf>,
) -> Result<()> {
    let term = Term::stdout();
    let controller =
        DownloadController::from_config(config_manager.config(), config_manager.history_file());
    let (fetcher, mut updates) = controller.metadata_fetcher();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.blue} {msg}")
            .unwrap(),
    );
    spinner.set_message("Fetching video information...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let generation = fetcher.fetch(&url);
    let mut panel = MetadataPanel::default();

    while let Some(update) = updates.recv().await {
        let done = match &update {
            MetadataUpdate::Hidden { .. } | MetadataUpdate::Failed { .. } => true,
            MetadataUpdate::Loaded { metadata, .. } => metadata.thumbnail_url.is_empty(),
            MetadataUpdate::Thumbnail { .. } | MetadataUpdate::ThumbnailFailed { .. } => true,
        };
        panel.apply(update, generation);
        if done {
            break;
        }
    }
    spinner.finish_and_clear();

    let Some(metadata) = &panel.metadata else {
        let reason = panel
            .status
            .clone()
            .unwrap_or_else(|| MetadataError::InvalidUrl.to_string());
        term.write_line(&format!("{} {}", style("❌").red(), reason))?;
        process::exit(1);
    };

    term.write_line(&format!("{} Video details:", style("📦").cyan()))?;
    term.write_line(&format!(
        "   {}: {}",
        style("Title").dim(),
        style(&metadata.title).cyan().bold()
    ))?;
    term.write_line(&format!(
        "   {}: {}",
        style("Duration").dim(),
        metadata.duration
    ))?;
    if !metadata.uploader.is_empty() {
        term.write_line(&format!(
            "   {}: {}",
            style("Uploader").dim(),
            metadata.uploader
        ))?;
    }
    if !metadata.thumbnail_url.is_empty() {
        term.write_line(&format!(
            "   {}: {}",
            style("Thumbnail").dim(),
            metadata.thumbnail_url
        ))?;
    }

    if let Some(status) = &panel.status {
        term.write_line(&format!("{} {}", style("⚠️").yellow(), status))?;
    }

    if let Some(target) = thumbnail {
        match &panel.thumbnail {
            Some(bytes) => {
                std::fs::write(&target, bytes)
                    .with_context(|| format!("Failed to write thumbnail: {:?}", target))?;
                term.write_line(&format!(
                    "{} Thumbnail saved to {}",
                    style("✅").green(),
                    style(target.display()).cyan()
                ))?;
            }
            None => term.write_line(&format!(
                "{} No thumbnail available",
                style("⚠️").yellow()
            ))?,
        }
    }

    Ok(())
}
