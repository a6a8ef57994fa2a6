//! Backend parameter interface
//!
//! The audio routing backend takes `key=value;` strings and answers key
//! queries with `key=value` strings. Calls are synchronous and return a
//! status code directly.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Audio backend parameter interface
pub trait ParameterBackend: Send + Sync {
    /// Apply a key-value string; 0 means success
    fn set_parameters(&self, key_values: &str) -> i32;

    /// Query a key; returns `key=value` or an empty string if unknown
    fn get_parameters(&self, key: &str) -> String;
}

/// In-process backend holding parameters in memory
///
/// Used by the daemon when no hardware backend is attached, and by tests.
/// Accepted strings are split into their `key=value` pairs so later queries
/// see the applied formats.
pub struct MemoryBackend {
    inner: Mutex<MemoryBackendInner>,
}

struct MemoryBackendInner {
    status: i32,
    values: BTreeMap<String, String>,
    submitted: Vec<String>,
}

impl MemoryBackend {
    /// Create a backend that accepts every assignment
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryBackendInner {
                status: 0,
                values: BTreeMap::new(),
                submitted: Vec::new(),
            }),
        }
    }

    /// Seed a backend with a full `key=value` response, e.g. the sink descriptor
    pub fn with_response(self, response: &str) -> Self {
        self.set_response(response);
        self
    }

    /// Status returned by every later `set_parameters` call
    pub fn with_status(self, status: i32) -> Self {
        self.set_status(status);
        self
    }

    pub fn set_status(&self, status: i32) {
        self.lock().status = status;
    }

    /// Replace the stored value for the key named in `response`
    pub fn set_response(&self, response: &str) {
        let (key, value) = response.split_once('=').unwrap_or((response, ""));
        self.lock().values.insert(key.to_string(), value.to_string());
    }

    /// Every string passed to `set_parameters`, accepted or not
    pub fn submitted(&self) -> Vec<String> {
        self.lock().submitted.clone()
    }

    /// The most recent string passed to `set_parameters`
    pub fn last_submitted(&self) -> Option<String> {
        self.lock().submitted.last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryBackendInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterBackend for MemoryBackend {
    fn set_parameters(&self, key_values: &str) -> i32 {
        let mut inner = self.lock();
        inner.submitted.push(key_values.to_string());
        if inner.status != 0 {
            return inner.status;
        }

        for pair in key_values.split(';').filter(|p| !p.is_empty()) {
            if let Some((key, value)) = pair.split_once('=') {
                inner.values.insert(key.to_string(), value.to_string());
            }
        }
        debug!("Backend applied {:?}", key_values);
        0
    }

    fn get_parameters(&self, key: &str) -> String {
        self.lock()
            .values
            .get(key)
            .map(|value| format!("{}={}", key, value))
            .unwrap_or_default()
    }
}
