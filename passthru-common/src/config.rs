//! Bootstrap configuration loading
//!
//! The TOML file holds the settings keys shared with other components, the
//! location of the persistent settings file, the event bus capacity and the
//! logging setup. Everything has a compiled default, so a missing file is a
//! warning rather than a startup failure.
//!
//! Config file resolution order:
//! 1. Command-line argument (highest priority)
//! 2. `PASSTHRU_CONFIG` environment variable
//! 3. `<config dir>/passthru/config.toml` (e.g. `~/.config/passthru/config.toml`)
//! 4. Compiled defaults (no file)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "PASSTHRU_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Persistent settings file; settings live in memory only when absent
    #[serde(default)]
    pub settings_path: Option<PathBuf>,

    /// Number of events the bus buffers before lagging receivers drop old ones
    ///
    /// Must be at least 1.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default)]
    pub keys: SettingsKeys,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Reject values the daemon cannot start with
    ///
    /// # Errors
    /// `Error::Config` when `event_capacity` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            settings_path: None,
            event_capacity: default_event_capacity(),
            keys: SettingsKeys::default(),
            backend: BackendConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Names of the settings and backend keys the policy reads and writes
///
/// These are consumed by other components on the device, so the defaults
/// must match what those components look up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsKeys {
    /// Secure (per-user) integer: preferred compressed-audio output device
    pub preferred_device: String,
    /// Global integer flag (0/1): compressed passthrough available
    pub passthrough_available: String,
    /// System property receiving the sink's encoding list for observability
    pub encodings_property: String,
    /// Backend parameter key queried for the sink encoding descriptor
    pub descriptor_query: String,
}

impl Default for SettingsKeys {
    fn default() -> Self {
        Self {
            preferred_device: "amazon_settings_audio_format_compressed_pref".to_string(),
            passthrough_available: "firetv_hdmi_dolby_passthrough_available".to_string(),
            encodings_property: "persist.sys.hdmi.hdmiencodings".to_string(),
            descriptor_query: "hdmi_encodings".to_string(),
        }
    }
}

/// Behaviour of the in-process parameter backend used by the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Descriptor returned for the descriptor query
    pub descriptor: String,
    /// Status code returned from every `set_parameters` call
    pub status: i32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            descriptor: "hdmi_encodings=pcm".to_string(),
            status: 0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_event_capacity() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve which config file to read, if any
///
/// Returns `None` when neither the CLI nor the environment names a file and
/// no file exists at the per-user default location.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Per-user config directory
    dirs::config_dir()
        .map(|d| d.join("passthru").join("config.toml"))
        .filter(|p| p.exists())
}

/// Parse and validate a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
    let config: TomlConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration with graceful degradation
///
/// A missing or unreadable file logs a warning and yields the compiled
/// defaults. A file that exists but does not parse is an error.
pub fn load_or_default(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = resolve_config_path(cli_arg) else {
        info!("No config file found, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!("Config file {:?} does not exist, using compiled defaults", path);
        return Ok(TomlConfig::default());
    }

    let config = load_toml_config(&path)?;
    info!("Loaded configuration from {:?}", path);
    Ok(config)
}

/// Write a value as TOML atomically (temp file + rename)
pub fn write_toml_atomic<T: Serialize>(value: &T, target: &Path) -> Result<()> {
    let content = toml::to_string_pretty(value)?;

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_path_for(target);
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, target)?;
    Ok(())
}

/// Write the bootstrap config atomically
pub fn write_toml_config(config: &TomlConfig, target: &Path) -> Result<()> {
    write_toml_atomic(config, target)
}

fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "config.toml".into());
    name.push(".tmp");
    target.with_file_name(name)
}
