//! Configuration management for the passthru policy daemon
//!
//! Combines the TOML bootstrap file from passthru-common with command-line
//! overrides, and builds the collaborators the policy needs.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--settings, --log-level)
//! 2. Environment variable (PASSTHRU_CONFIG names the TOML file)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::backend::MemoryBackend;
use crate::error::Result;
use crate::settings::{FileSettings, MemorySettings, SettingsStore};
use passthru_common::config::{self as common_config, TomlConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub settings_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Complete daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bootstrap values after overrides
    pub toml: TomlConfig,
}

impl Config {
    /// Load the TOML bootstrap file (or defaults) and apply overrides
    ///
    /// # Errors
    ///
    /// Returns error if the resolved config file exists but cannot be parsed
    /// or holds values the daemon cannot start with.
    pub fn load(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let toml = common_config::load_or_default(config_path)?;
        Ok(Self::from_toml(toml, overrides))
    }

    pub fn from_toml(mut toml: TomlConfig, overrides: ConfigOverrides) -> Self {
        if let Some(path) = overrides.settings_path {
            toml.settings_path = Some(path);
        }
        if let Some(level) = overrides.log_level {
            toml.logging.level = level;
        }
        Self { toml }
    }

    /// Open the settings store named by the config
    ///
    /// Without a settings path the store lives in memory only.
    pub fn open_settings(&self) -> Result<Arc<dyn SettingsStore>> {
        match &self.toml.settings_path {
            Some(path) => {
                info!("Using settings file {:?}", path);
                Ok(Arc::new(FileSettings::open(path.clone())?))
            }
            None => {
                info!("No settings file configured, settings will not persist");
                Ok(Arc::new(MemorySettings::new()))
            }
        }
    }

    /// In-process backend seeded with the configured descriptor and status
    pub fn build_backend(&self) -> MemoryBackend {
        MemoryBackend::new()
            .with_response(&self.toml.backend.descriptor)
            .with_status(self.toml.backend.status)
    }
}
