use directories::ProjectDirs;
use serde::Deserialize;
use std::path::PathBuf;

/// Application configuration loaded from a TOML config file.
/// All fields have sensible defaults — the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Recency window for the date filter, in days.
    pub window_days: i64,
    /// Max sample mismatch records printed in the report.
    pub sample_limit: usize,
    /// Synthetic dataset size for `bench` when no input file is given.
    pub bench_rows: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window_days: 365,
            sample_limit: 3,
            bench_rows: 500_000,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/skipscan/config.toml`.
    /// Returns default config if the file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
