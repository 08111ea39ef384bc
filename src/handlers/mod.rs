pub mod config;
pub mod get;
pub mod history;
pub mod info;
pub mod setup;

use crate::cli::{Commands, ConfigAction};

// Re-export all handlers
pub use config::handle_config;
pub use get::handle_get;
pub use history::handle_history;
pub use info::handle_info;
pub use setup::handle_setup;

/// Check if config validation should be skipped for certain commands
pub fn should_skip_config_validation(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Config {
            action: ConfigAction::Reset { .. } | ConfigAction::Path
        }
    )
}
