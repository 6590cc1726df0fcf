use serde::Deserialize;
use std::path::Path;

use crate::config::balance::Balance;
use crate::events::EventCatalog;

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default = "default_seed")]
    pub seed: String,
    #[serde(default = "default_ticks_per_run")]
    pub ticks_per_run: u64,
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval: u32,
    /// Snapshots kept per world when pruning.
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: u32,
    #[serde(default = "default_snapshot_directory")]
    pub snapshot_directory: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default)]
    pub balance_file: Option<String>,
    #[serde(default)]
    pub event_catalog_file: Option<String>,
}

fn default_preset() -> String {
    "tess".to_string()
}
fn default_seed() -> String {
    "719-SUNDER".to_string()
}
fn default_ticks_per_run() -> u64 {
    1000
}
fn default_snapshot_interval() -> u32 {
    250
}
fn default_max_snapshots() -> u32 {
    10
}
fn default_snapshot_directory() -> String {
    "./snapshots".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            seed: default_seed(),
            ticks_per_run: default_ticks_per_run(),
            snapshot_interval: default_snapshot_interval(),
            max_snapshots: default_max_snapshots(),
            snapshot_directory: default_snapshot_directory(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            balance_file: None,
            event_catalog_file: None,
        }
    }
}

impl SimulationConfig {
    /// Load from a TOML file. A missing file is not an error: defaults apply.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: SimulationConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.ticks_per_run == 0 {
            errors.push(format!(
                "ticks_per_run must be > 0, got {}. Example: ticks_per_run = 1000",
                self.ticks_per_run
            ));
        }

        if self.snapshot_interval == 0 {
            errors.push(format!(
                "snapshot_interval must be > 0, got {}. Example: snapshot_interval = 250",
                self.snapshot_interval
            ));
        }

        if self.max_snapshots == 0 {
            errors.push(format!(
                "max_snapshots must be > 0, got {}. Example: max_snapshots = 10",
                self.max_snapshots
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level must be one of {:?}, got '{}'. Example: log_level = \"info\"",
                valid_levels, self.log_level
            ));
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            errors.push(format!(
                "log_format must be one of {:?}, got '{}'. Example: log_format = \"json\"",
                valid_formats, self.log_format
            ));
        }

        if self.seed.trim().is_empty() {
            errors.push("seed must not be empty. Example: seed = \"719-SUNDER\"".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }

    /// Balance tunables named by `balance_file`, or the built-in defaults.
    pub fn load_balance(&self) -> Result<Balance, String> {
        match &self.balance_file {
            Some(path) => Balance::from_file(Path::new(path)),
            None => Ok(Balance::default()),
        }
    }

    /// Event catalog named by `event_catalog_file`, or the built-in catalog.
    pub fn load_event_catalog(&self) -> Result<EventCatalog, String> {
        match &self.event_catalog_file {
            Some(path) => EventCatalog::from_file(Path::new(path)),
            None => Ok(EventCatalog::builtin()),
        }
    }
}
