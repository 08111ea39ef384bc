use anyhow::Result;
use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};
use std::process;
use std::time::Duration;
use tokio::sync::mpsc;
use tubefetch::config::ConfigManager;
use tubefetch::{DownloadController, ProvisionEvent, Ready, ReadySource};

pub async fn handle_setup(config_manager: &ConfigManager) -> Result<()> {
    let term = Term::stdout();
    let controller =
        DownloadController::from_config(config_manager.config(), config_manager.history_file());

    match provision_with_progress(&controller, &term).await? {
        Some(ready) => {
            term.write_line(&format!(
                "{} ffmpeg: {}",
                style("📁").cyan(),
                style(ready.ffmpeg.display()).cyan()
            ))?;
            Ok(())
        }
        None => process::exit(1),
    }
}

/// Run provisioning with a progress bar. Failures are reported, not returned.
pub async fn provision_with_progress(
    controller: &DownloadController,
    term: &Term,
) -> Result<Option<Ready>> {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}%")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message("Checking ffmpeg...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let render = {
        let pb = pb.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    ProvisionEvent::Downloading { percent } => {
                        pb.set_message("Downloading ffmpeg");
                        pb.set_position(percent.round() as u64);
                    }
                    ProvisionEvent::Verifying => pb.set_message("Verifying archive"),
                    ProvisionEvent::Extracting => pb.set_message("Extracting"),
                }
            }
        })
    };

    let result = controller.provision(Some(tx)).await;
    let _ = render.await;
    pb.finish_and_clear();

    match result {
        Ok(ready) => {
            let what = match ready.source {
                ReadySource::Installed => "ffmpeg installed",
                ReadySource::AlreadyPresent => "ffmpeg is available",
                ReadySource::System => "Using ffmpeg from PATH",
            };
            term.write_line(&format!("{} {}", style("✅").green(), what))?;
            Ok(Some(ready))
        }
        Err(e) => {
            term.write_line(&format!(
                "{} Could not set up ffmpeg: {}",
                style("⚠️").yellow(),
                e
            ))?;
            term.write_line(&format!(
                "{} Audio conversion and merging may fail until ffmpeg is installed",
                style("💡").yellow()
            ))?;
            Ok(None)
        }
    }
}
