//! Scope Configuration - pipeline sizes, cadences and plot ranges as TOML values
//!
//! Each struct implements `Default` with the values in [`super::defaults`],
//! so a missing file or a partial file behaves exactly like the built-ins.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::render::AxisBounds;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "SCOPE_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "scope_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for both plot pipelines.
///
/// Load with `ScopeConfig::load()` which searches:
/// 1. `$SCOPE_CONFIG` env var
/// 2. `./scope_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ScopeConfig {
    /// Detrended time-series pipeline
    #[serde(default)]
    pub time_domain: TimeDomainConfig,

    /// Windowed spectrum pipeline
    #[serde(default)]
    pub spectral: SpectralConfig,

    /// Axis autoscale policy
    #[serde(default)]
    pub autoscale: AutoscaleConfig,
}

impl ScopeConfig {
    /// Load configuration using the standard search order:
    /// 1. `$SCOPE_CONFIG` environment variable
    /// 2. `./scope_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded scope config from SCOPE_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from SCOPE_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "SCOPE_CONFIG points to non-existent file, falling back");
            }
        }

        // 2. Check ./scope_config.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded scope config from ./scope_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./scope_config.toml, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No scope_config.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    ///
    /// Unknown keys are reported as warnings; parse and validation
    /// failures are errors.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for key in super::validation::unknown_keys(contents) {
            warn!(key = %key.path, suggestion = ?key.suggestion, "{}", key);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Write the config to `path`.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Scope config saved");
        Ok(())
    }

    /// Validate every parameter, collecting all violations.
    ///
    /// Rules:
    /// - Capacity and window size must be > 0, window size >= 2
    /// - Publish periods must be > 0
    /// - Autoscale interval must be > 0, margin finite and > 0
    /// - Initial ranges must be finite with min < max
    /// - Sample rate must be finite and > 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let t = &self.time_domain;
        if t.capacity == 0 {
            errors.push("time_domain.capacity must be > 0".to_string());
        }
        if t.publish_period_ms == 0 {
            errors.push("time_domain.publish_period_ms must be > 0".to_string());
        }
        check_range("time_domain.initial_range", t.initial_range, &mut errors);

        let s = &self.spectral;
        if s.window_size < 2 {
            errors.push(format!(
                "spectral.window_size ({}) must be >= 2",
                s.window_size
            ));
        }
        if s.publish_period_ms == 0 {
            errors.push("spectral.publish_period_ms must be > 0".to_string());
        }
        if !(s.sample_rate_hz.is_finite() && s.sample_rate_hz > 0.0) {
            errors.push(format!(
                "spectral.sample_rate_hz ({}) must be finite and > 0",
                s.sample_rate_hz
            ));
        }
        check_range("spectral.initial_range", s.initial_range, &mut errors);

        let a = &self.autoscale;
        if a.interval_samples == 0 {
            errors.push("autoscale.interval_samples must be > 0".to_string());
        }
        if !(a.margin.is_finite() && a.margin > 0.0) {
            errors.push(format!(
                "autoscale.margin ({}) must be finite and > 0",
                a.margin
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

fn check_range(name: &str, range: AxisBounds, errors: &mut Vec<String>) {
    if !(range.min.is_finite() && range.max.is_finite()) {
        errors.push(format!("{name} must be finite"));
    } else if range.min >= range.max {
        errors.push(format!(
            "{name}.min ({}) must be < {name}.max ({})",
            range.min, range.max
        ));
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Detrended time-series pipeline parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeDomainConfig {
    pub title: String,
    /// Buffer capacity C
    pub capacity: usize,
    pub publish_period_ms: u64,
    pub initial_range: AxisBounds,
}

impl Default for TimeDomainConfig {
    fn default() -> Self {
        Self {
            title: defaults::TIME_DOMAIN_TITLE.to_string(),
            capacity: defaults::TIME_DOMAIN_CAPACITY,
            publish_period_ms: defaults::TIME_DOMAIN_PERIOD_MS,
            initial_range: AxisBounds::new(
                defaults::TIME_DOMAIN_INITIAL_RANGE.0,
                defaults::TIME_DOMAIN_INITIAL_RANGE.1,
            ),
        }
    }
}

impl TimeDomainConfig {
    pub fn publish_period(&self) -> Duration {
        Duration::from_millis(self.publish_period_ms)
    }
}

/// Windowed spectrum pipeline parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    pub title: String,
    /// Window size W; also the spectral buffer capacity
    pub window_size: usize,
    pub publish_period_ms: u64,
    pub initial_range: AxisBounds,
    /// Only used to label bins in Hz
    pub sample_rate_hz: f64,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            title: defaults::SPECTRAL_TITLE.to_string(),
            window_size: defaults::SPECTRAL_WINDOW_SIZE,
            publish_period_ms: defaults::SPECTRAL_PERIOD_MS,
            initial_range: AxisBounds::new(
                defaults::SPECTRAL_INITIAL_RANGE.0,
                defaults::SPECTRAL_INITIAL_RANGE.1,
            ),
            sample_rate_hz: defaults::SAMPLE_RATE_HZ,
        }
    }
}

impl SpectralConfig {
    pub fn publish_period(&self) -> Duration {
        Duration::from_millis(self.publish_period_ms)
    }
}

/// Axis autoscale policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscaleConfig {
    /// Samples ingested between passes
    pub interval_samples: usize,
    /// Multiplier applied to both extremes
    pub margin: f64,
}

impl Default for AutoscaleConfig {
    fn default() -> Self {
        Self {
            interval_samples: defaults::AUTOSCALE_INTERVAL_SAMPLES,
            margin: defaults::AUTOSCALE_MARGIN,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Tests
// ============================================================================
