use crate::cli::ConfigAction;
use anyhow::{Context, Result};
use console::{Term, style};
use dialoguer::Confirm;
use tubefetch::config::ConfigManager;

pub async fn handle_config(config_manager: &mut ConfigManager, action: ConfigAction) -> Result<()> {
    let term = Term::stdout();

    match action {
        ConfigAction::Show => {
            let config_content = toml::to_string_pretty(config_manager.config())
                .context("Failed to serialize config")?;

            term.write_line(&format!("{} Current configuration:", style("⚙️").cyan()))?;
            term.write_line("")?;
            term.write_line(&config_content)?;
        }

        ConfigAction::Path => {
            term.write_line(&format!(
                "{} Config file: {}",
                style("📝").cyan(),
                config_manager.config_file().display()
            ))?;
            term.write_line(&format!(
                "{} History file: {}",
                style("📜").cyan(),
                config_manager.history_file().display()
            ))?;
        }

        ConfigAction::Reset { yes } => {
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Are you sure you want to reset {}?",
                        style("the configuration").cyan()
                    ))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    term.write_line(&format!("{} Reset cancelled", style("❌").red()))?;
                    return Ok(());
                }
            }

            config_manager.reset()?;
            term.write_line(&format!(
                "{} Configuration reset to defaults",
                style("✅").green()
            ))?;
        }

        ConfigAction::SetOutput { dir } => {
            let dir = std::path::absolute(&dir)
                .with_context(|| format!("Invalid directory: {:?}", dir))?;
            config_manager.config_mut().general.output_directory = Some(dir.clone());
            config_manager.validate()?;
            config_manager.save()?;
            term.write_line(&format!(
                "{} Downloads will go to {}",
                style("✅").green(),
                style(dir.display()).cyan()
            ))?;
        }
    }

    Ok(())
}
