//! Configuration file resolution and loading
//!
//! Config file location priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/cadence/config.toml`)
//! 4. None: the caller falls back to compiled defaults
//!
//! A missing file is never fatal. It is logged and compiled defaults apply.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable checked for a config file path
pub const CONFIG_ENV_VAR: &str = "CADENCE_CONFIG";

/// Logging section shared by every Cadence binary
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Where the config file path came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    PlatformDefault(PathBuf),
    /// No file found anywhere; compiled defaults apply
    CompiledDefaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::CommandLine(p)
            | ConfigSource::Environment(p)
            | ConfigSource::PlatformDefault(p) => Some(p.as_path()),
            ConfigSource::CompiledDefaults => None,
        }
    }
}

/// Resolve which config file to read
///
/// A command-line or environment path is returned even if it does not exist,
/// so the loader can warn about it. The platform default is only returned when
/// the file exists.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> ConfigSource {
    if let Some(path) = cli_arg {
        return ConfigSource::CommandLine(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return ConfigSource::Environment(PathBuf::from(path));
        }
    }

    if let Some(path) = default_config_path() {
        if path.exists() {
            return ConfigSource::PlatformDefault(path);
        }
    }

    ConfigSource::CompiledDefaults
}

/// Platform config file location (`~/.config/cadence/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cadence").join("config.toml"))
}

/// Parse a TOML file into `T`
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    let value = toml::from_str(&content)?;
    Ok(value)
}

/// Load `T` from the resolved source, degrading to `T::default()` when the
/// file is missing
///
/// Parse errors are still returned: a present but broken file is a user
/// mistake worth surfacing.
pub fn load_or_default<T: DeserializeOwned + Default>(source: &ConfigSource) -> Result<T> {
    let Some(path) = source.path() else {
        debug!("No config file found, using compiled defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!("Config file {} not found, using compiled defaults", path.display());
        return Ok(T::default());
    }

    load_toml(path).map_err(|e| match e {
        Error::TomlParse(inner) => {
            Error::Config(format!("Failed to parse {}: {}", path.display(), inner))
        }
        other => other,
    })
}
