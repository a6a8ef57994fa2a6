//! Passthrough negotiation policy
//!
//! Owns the negotiated state and turns capability updates and preference
//! changes into backend assignments and a published availability flag.
//!
//! # Locking
//!
//! Every public operation takes the state mutex once and runs to completion
//! under it, including the settings and backend calls. A capability update
//! and a user preference change therefore never interleave, and the stored
//! device always agrees with the published availability flag.
//!
//! # Flow
//!
//! ```text
//! capability report ─► dolby_supported ─► on_capability_update
//!                                            │
//!                          resolve preferred device (default Auto_HDMI)
//!                                            │
//!                          apply assignment (Compressed_Dolby)
//!                                 │ success + compressed
//!                                 ├─► store device preference
//!                                 └─► recompute availability
//!                                            │
//!                          recompute availability ─► publish on change
//! ```

use crate::assignment::build_assignment;
use crate::backend::ParameterBackend;
use crate::capability::{self, CapabilityReport, Capabilities};
use crate::error::{Error, Result};
use crate::settings::{SettingsScope, SettingsStore};
use passthru_common::config::SettingsKeys;
use passthru_common::{Encoding, EventBus, OutputDevice, OutputFormat, PassthroughEvent};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// Device used when no preference is stored or the stored one is unusable
pub const DEFAULT_DEVICE: OutputDevice = OutputDevice::AutoHdmi;

/// Negotiated state owned by one policy instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyState {
    /// AC-3 was present in the last capability report
    pub dolby_supported: bool,
    /// Last value written to the availability flag (None until first publish)
    pub published_availability: Option<i32>,
}

impl PolicyState {
    /// Supported flag as the 0/1 value published for `Auto_HDMI`
    pub fn supported_flag(&self) -> i32 {
        i32::from(self.dolby_supported)
    }
}

/// Availability value implied by a device selection
///
/// `Auto_HDMI` follows the sink; every other selection is fixed.
pub fn availability_for(device: OutputDevice, supported_flag: i32) -> i32 {
    match device {
        OutputDevice::None | OutputDevice::ToslinkNone => 0,
        OutputDevice::Hdmi
        | OutputDevice::Toslink
        | OutputDevice::DolbyHdmi
        | OutputDevice::DolbyToslink => 1,
        OutputDevice::AutoHdmi => supported_flag,
    }
}

/// Passthrough policy with injected collaborators
pub struct PassthroughPolicy {
    state: Mutex<PolicyState>,
    settings: Arc<dyn SettingsStore>,
    backend: Arc<dyn ParameterBackend>,
    keys: SettingsKeys,
    events: EventBus,
}

impl PassthroughPolicy {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        backend: Arc<dyn ParameterBackend>,
        keys: SettingsKeys,
        events: EventBus,
    ) -> Self {
        Self::with_state(PolicyState::default(), settings, backend, keys, events)
    }

    /// Create a policy starting from an explicit state
    pub fn with_state(
        state: PolicyState,
        settings: Arc<dyn SettingsStore>,
        backend: Arc<dyn ParameterBackend>,
        keys: SettingsKeys,
        events: EventBus,
    ) -> Self {
        Self {
            state: Mutex::new(state),
            settings,
            backend,
            keys,
            events,
        }
    }

    /// Copy of the current negotiated state
    pub fn snapshot(&self) -> PolicyState {
        *self.lock()
    }

    /// Full inbound path for a sink capability report
    ///
    /// When the report carries an encoding list, the backend descriptor is
    /// queried and published as a system property. A malformed descriptor
    /// only means "no information" and never affects the decision.
    pub fn handle_capability_report(&self, report: &CapabilityReport) -> Capabilities {
        info!("Capability report encodings: {:?}", report.encodings);
        let dolby_supported = capability::dolby_supported(report.encodings.as_deref());

        let encodings = if report.encodings.is_some() {
            self.publish_sink_encodings()
        } else {
            None
        };

        self.events.emit_lossy(PassthroughEvent::CapabilityReported {
            dolby_supported,
            encodings: encodings.clone().unwrap_or_default(),
            timestamp: chrono::Utc::now(),
        });

        self.on_capability_update(dolby_supported);

        Capabilities {
            dolby_supported,
            encodings,
        }
    }

    /// React to a new capability verdict
    ///
    /// Re-applies the stored preference with the generic Dolby trigger, then
    /// re-derives availability. Failures are logged; none abort the update.
    pub fn on_capability_update(&self, dolby_supported: bool) {
        let mut state = self.lock();
        state.dolby_supported = dolby_supported;
        debug!("Dolby passthrough supported: {}", state.supported_flag());

        let device = match self.resolve_device() {
            Ok(device) => device,
            Err(e) => {
                error!(
                    "Unrecognized stored output device ({}), falling back to {}",
                    e, DEFAULT_DEVICE
                );
                DEFAULT_DEVICE
            }
        };

        if let Err(e) = self.apply_locked(&mut state, device, OutputFormat::CompressedDolby) {
            warn!("Capability update could not apply {}: {}", device, e);
        }

        self.recompute_locked(&mut state);
    }

    /// Re-derive the availability flag and publish it if it changed
    ///
    /// Returns the published value, or `None` when the stored device could not
    /// be resolved or the write failed.
    pub fn recompute_availability(&self) -> Option<i32> {
        let mut state = self.lock();
        self.recompute_locked(&mut state)
    }

    /// User-initiated device selection
    ///
    /// Builds and submits the assignment. On success with a compressed
    /// format the device becomes the stored preference and availability is
    /// recomputed. Returns the backend status (always 0 on `Ok`).
    ///
    /// # Errors
    /// - `Error::BackendRejected` when the backend returns a non-zero status
    /// - `Error::Settings` when the preference cannot be stored
    pub fn select_device(&self, device: OutputDevice, format: OutputFormat) -> Result<i32> {
        let mut state = self.lock();
        self.apply_locked(&mut state, device, format)
    }

    fn lock(&self) -> MutexGuard<'_, PolicyState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stored preference, `Auto_HDMI` when never written
    fn resolve_device(&self) -> Result<OutputDevice> {
        debug!("Request to get dolby device id");
        let stored = self
            .settings
            .get_int(SettingsScope::Secure, &self.keys.preferred_device)?;

        match stored {
            Some(ordinal) => Ok(OutputDevice::from_ordinal(ordinal)?),
            None => Ok(DEFAULT_DEVICE),
        }
    }

    fn apply_locked(
        &self,
        state: &mut PolicyState,
        device: OutputDevice,
        format: OutputFormat,
    ) -> Result<i32> {
        let assignment = build_assignment(device, format);
        let key_values = assignment.key_values();
        info!(
            "Applying {} with {} (effective {})",
            device, format, assignment.effective_format
        );

        let status = self.backend.set_parameters(&key_values);
        if status != 0 {
            error!(
                "Could not apply the parameters {:?}. Returned error code: {}",
                key_values, status
            );
            self.events.emit_lossy(PassthroughEvent::AssignmentRejected {
                device,
                format: assignment.effective_format,
                key_values: key_values.clone(),
                status,
                timestamp: chrono::Utc::now(),
            });
            return Err(Error::BackendRejected { status, key_values });
        }

        debug!("KeyValuePair: {} Status: {}", key_values, status);
        self.events.emit_lossy(PassthroughEvent::AssignmentApplied {
            device,
            format: assignment.effective_format,
            key_values,
            timestamp: chrono::Utc::now(),
        });

        if assignment.stores_preference() {
            self.store_device(device)?;
            self.recompute_locked(state);
        }

        Ok(status)
    }

    fn store_device(&self, device: OutputDevice) -> Result<()> {
        info!(
            "Storing new dolby device {} ({}) with id: {}",
            device,
            device.id(),
            device.ordinal()
        );
        self.settings
            .put_int(
                SettingsScope::Secure,
                &self.keys.preferred_device,
                device.ordinal(),
            )
            .inspect_err(|e| error!("Failed to store preferred device {}: {}", device, e))?;

        self.events.emit_lossy(PassthroughEvent::PreferenceStored {
            device,
            timestamp: chrono::Utc::now(),
        });
        Ok(())
    }

    fn recompute_locked(&self, state: &mut PolicyState) -> Option<i32> {
        let device = match self.resolve_device() {
            Ok(device) => device,
            Err(e) => {
                error!("Recompute availability: unrecognized output device: {}", e);
                return None;
            }
        };

        let value = availability_for(device, state.supported_flag());
        debug!(
            "Value calculated for Dolby passthrough availability: {} (device {})",
            value, device
        );

        if state.published_availability == Some(value) {
            return Some(value);
        }

        if let Err(e) = self.settings.put_int(
            SettingsScope::Global,
            &self.keys.passthrough_available,
            value,
        ) {
            error!("Failed to publish passthrough availability {}: {}", value, e);
            return None;
        }

        info!("Dolby passthrough availability: {}", value);
        let old_value = state.published_availability.replace(value);
        self.events.emit_lossy(PassthroughEvent::AvailabilityChanged {
            old_value,
            new_value: value,
            timestamp: chrono::Utc::now(),
        });
        Some(value)
    }

    /// Query the sink descriptor and publish it for observability
    fn publish_sink_encodings(&self) -> Option<Vec<Encoding>> {
        let raw = self.backend.get_parameters(&self.keys.descriptor_query);
        match capability::parse_descriptor(&raw) {
            Ok(encodings) => {
                let rendered = capability::format_encoding_codes(&encodings);
                info!("Sink encodings: {}", rendered);
                if let Err(e) = self
                    .settings
                    .set_property(&self.keys.encodings_property, &rendered)
                {
                    warn!("Failed to set {}: {}", self.keys.encodings_property, e);
                }
                Some(encodings)
            }
            Err(e) => {
                error!("Audio sink doesn't have necessary information: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::settings::MemorySettings;

    fn policy() -> (PassthroughPolicy, Arc<MemorySettings>, Arc<MemoryBackend>) {
        let settings = Arc::new(MemorySettings::new());
        let backend = Arc::new(MemoryBackend::new());
        let policy = PassthroughPolicy::new(
            settings.clone(),
            backend.clone(),
            SettingsKeys::default(),
            EventBus::new(32),
        );
        (policy, settings, backend)
    }

    fn stored_device(settings: &MemorySettings) -> Option<i32> {
        settings
            .get_int(
                SettingsScope::Secure,
                &SettingsKeys::default().preferred_device,
            )
            .unwrap()
    }

    fn published(settings: &MemorySettings) -> Option<i32> {
        settings
            .get_int(
                SettingsScope::Global,
                &SettingsKeys::default().passthrough_available,
            )
            .unwrap()
    }

    #[test]
    fn test_availability_table() {
        for flag in [0, 1] {
            assert_eq!(availability_for(OutputDevice::None, flag), 0);
            assert_eq!(availability_for(OutputDevice::ToslinkNone, flag), 0);
            assert_eq!(availability_for(OutputDevice::Hdmi, flag), 1);
            assert_eq!(availability_for(OutputDevice::Toslink, flag), 1);
            assert_eq!(availability_for(OutputDevice::DolbyHdmi, flag), 1);
            assert_eq!(availability_for(OutputDevice::DolbyToslink, flag), 1);
            assert_eq!(availability_for(OutputDevice::AutoHdmi, flag), flag);
        }
    }

    #[test]
    fn test_first_update_defaults_to_auto_hdmi() {
        let (policy, settings, backend) = policy();

        policy.on_capability_update(true);

        assert_eq!(
            backend.last_submitted().as_deref(),
            Some("spdif_format=0;hdmi_format=5;")
        );
        assert_eq!(stored_device(&settings), Some(OutputDevice::AutoHdmi.ordinal()));
        assert_eq!(published(&settings), Some(1));
        assert_eq!(
            policy.snapshot(),
            PolicyState {
                dolby_supported: true,
                published_availability: Some(1),
            }
        );
    }

    #[test]
    fn test_auto_hdmi_tracks_supported_flag() {
        let (policy, settings, _) = policy();

        policy.on_capability_update(false);
        assert_eq!(published(&settings), Some(0));

        policy.on_capability_update(true);
        assert_eq!(published(&settings), Some(1));

        policy.on_capability_update(false);
        assert_eq!(published(&settings), Some(0));
    }

    #[test]
    fn test_out_of_range_preference_falls_back_to_default() {
        let (policy, settings, backend) = policy();
        settings
            .put_int(
                SettingsScope::Secure,
                &SettingsKeys::default().preferred_device,
                42,
            )
            .unwrap();

        policy.on_capability_update(true);

        assert_eq!(
            backend.last_submitted().as_deref(),
            Some("spdif_format=0;hdmi_format=5;")
        );
        // The successful default assignment replaces the bad value
        assert_eq!(stored_device(&settings), Some(OutputDevice::AutoHdmi.ordinal()));
        assert_eq!(published(&settings), Some(1));
    }

    #[test]
    fn test_recompute_with_bad_preference_changes_nothing() {
        let (policy, settings, _) = policy();
        settings
            .put_int(
                SettingsScope::Secure,
                &SettingsKeys::default().preferred_device,
                -3,
            )
            .unwrap();

        assert_eq!(policy.recompute_availability(), None);
        assert_eq!(published(&settings), None);
        assert_eq!(policy.snapshot().published_availability, None);
    }

    #[test]
    fn test_select_dolby_hdmi_stores_preference() {
        let (policy, settings, backend) = policy();

        let status = policy
            .select_device(OutputDevice::DolbyHdmi, OutputFormat::CompressedDolby)
            .unwrap();

        assert_eq!(status, 0);
        assert_eq!(backend.last_submitted().as_deref(), Some("hdmi_format=4;"));
        assert_eq!(stored_device(&settings), Some(OutputDevice::DolbyHdmi.ordinal()));
        assert_eq!(published(&settings), Some(1));
    }

    #[test]
    fn test_rejected_selection_keeps_preference() {
        let (policy, settings, backend) = policy();
        policy
            .select_device(OutputDevice::None, OutputFormat::CompressedDolby)
            .unwrap();
        backend.set_status(-1);

        let result = policy.select_device(OutputDevice::Hdmi, OutputFormat::CompressedDolby);

        assert!(matches!(
            result,
            Err(Error::BackendRejected { status: -1, .. })
        ));
        assert_eq!(stored_device(&settings), Some(OutputDevice::None.ordinal()));
        assert_eq!(published(&settings), Some(0));
    }

    #[test]
    fn test_uncompressed_selection_does_not_store() {
        let (policy, settings, backend) = policy();

        policy
            .select_device(OutputDevice::Toslink, OutputFormat::Uncompressed)
            .unwrap();

        assert_eq!(backend.last_submitted().as_deref(), Some("spdif_format=0;"));
        assert_eq!(stored_device(&settings), None);
        assert_eq!(published(&settings), None);
    }

    #[test]
    fn test_report_publishes_descriptor_property() {
        let settings = Arc::new(MemorySettings::new());
        let backend = Arc::new(MemoryBackend::new().with_response("hdmi_encodings=pcm;ac3"));
        let policy = PassthroughPolicy::new(
            settings.clone(),
            backend,
            SettingsKeys::default(),
            EventBus::new(8),
        );

        let caps = policy.handle_capability_report(&CapabilityReport::new(vec![2, 5]));

        assert!(caps.dolby_supported);
        assert_eq!(
            caps.encodings,
            Some(vec![Encoding::Pcm16, Encoding::Ac3])
        );
        assert_eq!(
            settings
                .property(&SettingsKeys::default().encodings_property)
                .as_deref(),
            Some("[2, 5]")
        );
    }

    #[test]
    fn test_report_without_list_skips_descriptor() {
        let (policy, settings, _) = policy();

        let caps = policy.handle_capability_report(&CapabilityReport::default());

        assert!(!caps.dolby_supported);
        assert_eq!(caps.encodings, None);
        assert_eq!(
            settings.property(&SettingsKeys::default().encodings_property),
            None
        );
        assert_eq!(published(&settings), Some(0));
    }
}
