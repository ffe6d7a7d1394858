mod config;
pub mod database;

pub use config::{CallsConfig, Config, DonationsConfig, WalletConfig};
pub use database::{Charity, Database, User, Workout, WorkoutStatus};

use std::path::PathBuf;

use crate::error::{CoreError, Result};

/// Returns `~/.config/sweatpledge[-dev]/` based on SWEATPLEDGE_ENV.
///
/// Set SWEATPLEDGE_ENV=dev to use a separate development data directory.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("SWEATPLEDGE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("sweatpledge-dev")
    } else {
        base_dir.join("sweatpledge")
    };

    std::fs::create_dir_all(&dir).map_err(CoreError::Io)?;
    Ok(dir)
}
