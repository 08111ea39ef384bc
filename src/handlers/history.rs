use anyhow::Result;
use console::{Term, style};
use dialoguer::Confirm;
use tubefetch::HistoryStore;
use tubefetch::config::ConfigManager;

pub async fn handle_history(
    config_manager: &ConfigManager,
    limit: usize,
    clear: bool,
    skip_confirmation: bool,
) -> Result<()> {
    let term = Term::stdout();
    let store = HistoryStore::with_limit(
        config_manager.history_file(),
        config_manager.config().history.max_entries,
    );

    if clear {
        if !skip_confirmation {
            let confirmed = Confirm::new()
                .with_prompt("Clear the download history?")
                .default(false)
                .interact()?;
            if !confirmed {
                term.write_line(&format!("{} Operation cancelled", style("❌").red()))?;
                return Ok(());
            }
        }
        store.clear()?;
        term.write_line(&format!("{} History cleared", style("✅").green()))?;
        return Ok(());
    }

    let records = store.newest_first(limit);
    if records.is_empty() {
        term.write_line(&format!("{} No downloads yet", style("📭").dim()))?;
        return Ok(());
    }

    term.write_line(&format!(
        "{} Recent downloads ({}):",
        style("📜").cyan(),
        records.len()
    ))?;
    for record in records {
        term.write_line(&format!(
            "   {} {}",
            style(record.timestamp.format("%Y-%m-%d %H:%M")).dim(),
            style(&record.filename).cyan()
        ))?;
        term.write_line(&format!("      {}", style(&record.url).dim()))?;
    }

    Ok(())
}
