//! Settings store access
//!
//! The policy reads and writes two integers: the per-user preferred device
//! (secure scope) and the passthrough-available flag (global scope). It also
//! sets one string system property for observability.
//!
//! `FileSettings` persists all three scopes to a TOML file:
//!
//! ```toml
//! [secure]
//! amazon_settings_audio_format_compressed_pref = 3
//!
//! [global]
//! firetv_hdmi_dolby_passthrough_available = 1
//!
//! [system]
//! "persist.sys.hdmi.hdmiencodings" = "[2, 5]"
//! ```

use crate::error::{Error, Result};
use passthru_common::config::write_toml_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Visibility scope of an integer setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsScope {
    /// Per-user, protected settings
    Secure,
    /// Device-wide settings readable by every component
    Global,
}

/// Persistent settings store
pub trait SettingsStore: Send + Sync {
    /// Read an integer; `Ok(None)` when the key was never written
    fn get_int(&self, scope: SettingsScope, key: &str) -> Result<Option<i32>>;

    fn put_int(&self, scope: SettingsScope, key: &str, value: i32) -> Result<()>;

    /// Set a string system property
    fn set_property(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SettingsData {
    #[serde(default)]
    secure: BTreeMap<String, i32>,
    #[serde(default)]
    global: BTreeMap<String, i32>,
    #[serde(default)]
    system: BTreeMap<String, String>,
}

impl SettingsData {
    fn table(&self, scope: SettingsScope) -> &BTreeMap<String, i32> {
        match scope {
            SettingsScope::Secure => &self.secure,
            SettingsScope::Global => &self.global,
        }
    }

    fn table_mut(&mut self, scope: SettingsScope) -> &mut BTreeMap<String, i32> {
        match scope {
            SettingsScope::Secure => &mut self.secure,
            SettingsScope::Global => &mut self.global,
        }
    }
}

/// Settings held in memory for the life of the process
#[derive(Debug, Default)]
pub struct MemorySettings {
    data: Mutex<SettingsData>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read back a system property
    pub fn property(&self, key: &str) -> Option<String> {
        self.lock().system.get(key).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, SettingsData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SettingsStore for MemorySettings {
    fn get_int(&self, scope: SettingsScope, key: &str) -> Result<Option<i32>> {
        Ok(self.lock().table(scope).get(key).copied())
    }

    fn put_int(&self, scope: SettingsScope, key: &str, value: i32) -> Result<()> {
        self.lock().table_mut(scope).insert(key.to_string(), value);
        Ok(())
    }

    fn set_property(&self, key: &str, value: &str) -> Result<()> {
        self.lock().system.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Settings persisted to a TOML file
///
/// The file is read once on open; every write rewrites it atomically. A
/// failed write leaves the in-memory value unchanged.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    data: Mutex<SettingsData>,
}

impl FileSettings {
    /// Open the settings file, starting empty if it does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content).map_err(|e| {
                Error::Settings(format!("Failed to parse settings file {:?}: {}", path, e))
            })?
        } else {
            info!("Settings file {:?} not found, starting empty", path);
            SettingsData::default()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back a system property
    pub fn property(&self, key: &str) -> Option<String> {
        self.lock().system.get(key).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, SettingsData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `update` to a copy, persist it, then commit it in memory
    fn write_with(&self, update: impl FnOnce(&mut SettingsData)) -> Result<()> {
        let mut data = self.lock();
        let mut next = data.clone();
        update(&mut next);

        write_toml_atomic(&next, &self.path)
            .map_err(|e| Error::Settings(format!("Failed to write {:?}: {}", self.path, e)))?;

        *data = next;
        debug!("Settings written to {:?}", self.path);
        Ok(())
    }
}

impl SettingsStore for FileSettings {
    fn get_int(&self, scope: SettingsScope, key: &str) -> Result<Option<i32>> {
        Ok(self.lock().table(scope).get(key).copied())
    }

    fn put_int(&self, scope: SettingsScope, key: &str, value: i32) -> Result<()> {
        self.write_with(|data| {
            data.table_mut(scope).insert(key.to_string(), value);
        })
    }

    fn set_property(&self, key: &str, value: &str) -> Result<()> {
        self.write_with(|data| {
            data.system.insert(key.to_string(), value.to_string());
        })
    }
}
