//! LiveWeight configuration types and loading

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::simulator::SimulatorMode;
use crate::sync::SyncConfig;

/// Project-local config file name
const LOCAL_CONFIG: &str = ".liveweight.yml";

/// Main LiveWeight configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Polling and change detection
    pub sync: SyncConfig,

    /// Remote model and procedure names
    pub backend: BackendConfig,

    /// Scale simulator used by `lw simulate`
    pub simulator: SimulatorConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.sync.interval_ms == 0 {
            return Err(eyre!("sync.interval-ms must be greater than zero"));
        }
        if !self.sync.tolerance.is_finite() || self.sync.tolerance < 0.0 {
            return Err(eyre!(
                "sync.tolerance must be a non-negative number, got {}",
                self.sync.tolerance
            ));
        }
        if self.sync.fetch_timeout_ms == Some(0) {
            return Err(eyre!("sync.fetch-timeout-ms must be greater than zero when set"));
        }
        if self.backend.model.is_empty() {
            return Err(eyre!("backend.model must not be empty"));
        }
        if self.backend.api_key.as_deref().is_some_and(str::is_empty) {
            return Err(eyre!("backend.api-key must not be empty when set"));
        }
        if self.simulator.jitter < 0.0 {
            return Err(eyre!("simulator.jitter must not be negative"));
        }
        if self.simulator.interval_ms == 0 {
            return Err(eyre!("simulator.interval-ms must be greater than zero"));
        }
        if self.simulator.min_weight < 0.0 || self.simulator.min_weight > self.simulator.max_weight {
            return Err(eyre!(
                "simulator weight range is invalid: {}..{}",
                self.simulator.min_weight,
                self.simulator.max_weight
            ));
        }
        Ok(())
    }

    /// Files searched when no path is given, most specific first
    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("liveweight").join("liveweight.yml"));
        }
        paths
    }

    /// Load configuration: the explicit path, else the first search path
    /// that loads, else defaults
    ///
    /// An explicit path must load and validate. A broken file on the search
    /// path is logged and skipped.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for path in Self::search_paths().into_iter().filter(|p| p.exists()) {
            match Self::load_from_file(&path) {
                Ok(config) => return Ok(config),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unusable config file"),
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed: the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(path) => path.clone(),
            None => Self::search_paths().into_iter().find(|p| p.exists())?,
        };
        let content = fs::read_to_string(path).ok()?;
        let config: Self = serde_yaml::from_str(&content).ok()?;
        config.log_level
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Names of the remote model and procedures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Model holding the weighing records
    pub model: String,

    /// Global "most recent reading" procedure, used for unsaved records
    #[serde(rename = "latest-reading-procedure")]
    pub latest_reading_procedure: String,

    /// Procedure returning the newest open weighing
    #[serde(rename = "active-weighing-procedure")]
    pub active_weighing_procedure: String,

    /// Procedure the scale feed calls to attribute a reading to a record
    #[serde(rename = "update-weight-procedure")]
    pub update_weight_procedure: String,

    /// Key the scale-facing procedures require when set
    #[serde(rename = "api-key", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: "weighing.record".to_string(),
            latest_reading_procedure: "latest_reading".to_string(),
            active_weighing_procedure: "active_weighing".to_string(),
            update_weight_procedure: "update_weight".to_string(),
            api_key: None,
        }
    }
}

/// Scale simulator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub mode: SimulatorMode,

    /// Lower bound of a simulated vehicle weight in kg
    #[serde(rename = "min-weight")]
    pub min_weight: f64,

    /// Upper bound of a simulated vehicle weight in kg
    #[serde(rename = "max-weight")]
    pub max_weight: f64,

    /// Vibration amplitude in kg
    pub jitter: f64,

    /// Weight reported in fixed mode
    #[serde(rename = "fixed-weight")]
    pub fixed_weight: f64,

    /// Reading interval in milliseconds
    #[serde(rename = "interval-ms")]
    pub interval_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            mode: SimulatorMode::Random,
            min_weight: 5_000.0,
            max_weight: 35_000.0,
            jitter: 10.0,
            fixed_weight: 28_345.5,
            interval_ms: 1_000,
        }
    }
}

impl SimulatorConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interval_ms)
    }
}
