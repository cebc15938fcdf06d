//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tl_core::SummaryConfig;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Seconds between heartbeat checkpoints while tracking.
    pub heartbeat_interval_secs: u64,

    /// Gap (seconds) below which a task change counts as a context switch.
    pub switch_threshold_secs: i64,

    /// Entries at least this many hours long are listed by `entries --long`.
    pub long_entry_hours: i64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("tl.db"),
            heartbeat_interval_secs: tl_db::DEFAULT_INTERVAL.as_secs(),
            switch_threshold_secs: tl_core::summary::SWITCH_THRESHOLD.num_seconds(),
            long_entry_hours: tl_core::summary::LONG_ENTRY_FLOOR.num_hours(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (TL_*)
        figment = figment.merge(Env::prefixed("TL_"));

        figment.extract()
    }

    /// Interval for the heartbeat worker, never shorter than one second.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Summary settings derived from this configuration.
    pub fn summary(&self) -> SummaryConfig {
        SummaryConfig {
            switch_threshold: chrono::Duration::seconds(self.switch_threshold_secs.max(0)),
            long_entry_floor: chrono::Duration::hours(self.long_entry_hours.max(0)),
        }
    }
}

/// Returns the platform-specific config directory for tl.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tl"))
}

/// Returns the platform-specific data directory for tl.
///
/// On Linux: `~/.local/share/tl`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("tl"))
}
