//! Test helper modules for passthru-policy integration tests
//!
//! Provides reusable test infrastructure components:
//! - RecordingSettings: settings store that logs every write
//! - PolicyHarness: policy wired to in-memory collaborators

#![allow(dead_code)]

use passthru_common::config::SettingsKeys;
use passthru_common::{EventBus, PassthroughEvent};
use passthru_policy::backend::MemoryBackend;
use passthru_policy::error::{Error, Result};
use passthru_policy::settings::{MemorySettings, SettingsScope, SettingsStore};
use passthru_policy::PassthroughPolicy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// One integer write seen by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Write {
    pub scope: SettingsScope,
    pub key: String,
    pub value: i32,
}

/// Settings store recording every integer write
///
/// Writes can be made to fail on demand to exercise error paths.
#[derive(Default)]
pub struct RecordingSettings {
    inner: MemorySettings,
    writes: Mutex<Vec<Write>>,
    fail_writes: AtomicBool,
}

impl RecordingSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    /// Writes to the availability key only
    pub fn availability_writes(&self) -> Vec<i32> {
        let key = SettingsKeys::default().passthrough_available;
        self.writes()
            .into_iter()
            .filter(|w| w.scope == SettingsScope::Global && w.key == key)
            .map(|w| w.value)
            .collect()
    }

    pub fn preferred_device(&self) -> Option<i32> {
        self.inner
            .get_int(SettingsScope::Secure, &SettingsKeys::default().preferred_device)
            .unwrap()
    }

    pub fn set_preferred_device(&self, ordinal: i32) {
        self.inner
            .put_int(
                SettingsScope::Secure,
                &SettingsKeys::default().preferred_device,
                ordinal,
            )
            .unwrap();
    }

    pub fn property(&self, key: &str) -> Option<String> {
        self.inner.property(key)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl SettingsStore for RecordingSettings {
    fn get_int(&self, scope: SettingsScope, key: &str) -> Result<Option<i32>> {
        self.inner.get_int(scope, key)
    }

    fn put_int(&self, scope: SettingsScope, key: &str, value: i32) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Settings("injected write failure".to_string()));
        }
        self.writes.lock().unwrap().push(Write {
            scope,
            key: key.to_string(),
            value,
        });
        self.inner.put_int(scope, key, value)
    }

    fn set_property(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set_property(key, value)
    }
}

/// Policy wired to recording collaborators
pub struct PolicyHarness {
    pub policy: Arc<PassthroughPolicy>,
    pub settings: Arc<RecordingSettings>,
    pub backend: Arc<MemoryBackend>,
    pub events: broadcast::Receiver<PassthroughEvent>,
}

impl PolicyHarness {
    pub fn new() -> Self {
        Self::with_backend(MemoryBackend::new())
    }

    pub fn with_backend(backend: MemoryBackend) -> Self {
        let settings = Arc::new(RecordingSettings::new());
        let backend = Arc::new(backend);
        let bus = EventBus::new(256);
        let events = bus.subscribe();
        let policy = Arc::new(PassthroughPolicy::new(
            settings.clone(),
            backend.clone(),
            SettingsKeys::default(),
            bus,
        ));

        Self {
            policy,
            settings,
            backend,
            events,
        }
    }

    /// Drain every event emitted so far
    pub fn drain_events(&mut self) -> Vec<PassthroughEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}
