//! Event types for the passthru event system
//!
//! Provides the shared event definitions and the EventBus used to observe
//! policy decisions without coupling observers to the policy itself.

mod output_types;

pub use output_types::{Encoding, OutputDevice, OutputFormat, PhysicalOutput};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Passthrough policy events
///
/// Events are broadcast via EventBus and can be serialized for external
/// transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PassthroughEvent {
    /// A sink capability report was received and parsed
    CapabilityReported {
        /// Whether AC-3 appeared in the report
        dolby_supported: bool,
        /// Encodings from the backend descriptor (empty if unavailable)
        encodings: Vec<Encoding>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The backend accepted a key-value assignment
    AssignmentApplied {
        device: OutputDevice,
        /// Format after Dolby-device forcing
        format: OutputFormat,
        /// The exact string submitted to the backend
        key_values: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The backend returned a non-zero status for an assignment
    AssignmentRejected {
        device: OutputDevice,
        format: OutputFormat,
        key_values: String,
        status: i32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A device was stored as the user's compressed-audio preference
    PreferenceStored {
        device: OutputDevice,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The published passthrough-available flag changed
    AvailabilityChanged {
        /// Previously published value (None if never published)
        old_value: Option<i32>,
        new_value: i32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PassthroughEvent {
    /// Short event name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            PassthroughEvent::CapabilityReported { .. } => "CapabilityReported",
            PassthroughEvent::AssignmentApplied { .. } => "AssignmentApplied",
            PassthroughEvent::AssignmentRejected { .. } => "AssignmentRejected",
            PassthroughEvent::PreferenceStored { .. } => "PreferenceStored",
            PassthroughEvent::AvailabilityChanged { .. } => "AvailabilityChanged",
        }
    }
}

/// Central event distribution bus
///
/// Wraps a `tokio::sync::broadcast` channel. Sending does not need a runtime,
/// so the synchronous policy can emit directly.
///
/// # Examples
///
/// ```
/// use passthru_common::events::{EventBus, PassthroughEvent};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(PassthroughEvent::AvailabilityChanged {
///     old_value: None,
///     new_value: 1,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PassthroughEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PassthroughEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PassthroughEvent,
    ) -> Result<usize, broadcast::error::SendError<PassthroughEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PassthroughEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_err() {
        let bus = EventBus::new(4);
        let result = bus.emit(PassthroughEvent::PreferenceStored {
            device: OutputDevice::Hdmi,
            timestamp: chrono::Utc::now(),
        });
        assert!(result.is_err());
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 4);
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();

        bus.emit_lossy(PassthroughEvent::AvailabilityChanged {
            old_value: Some(0),
            new_value: 1,
            timestamp: chrono::Utc::now(),
        });

        match rx.recv().await.unwrap() {
            PassthroughEvent::AvailabilityChanged {
                old_value,
                new_value,
                ..
            } => {
                assert_eq!(old_value, Some(0));
                assert_eq!(new_value, 1);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = PassthroughEvent::AssignmentApplied {
            device: OutputDevice::DolbyHdmi,
            format: OutputFormat::CompressedAc3,
            key_values: "hdmi_format=4;".to_string(),
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "AssignmentApplied");
        assert_eq!(json["device"], "dolby_hdmi");
        assert_eq!(json["format"], "compressed_ac3");
        assert_eq!(event.event_type(), "AssignmentApplied");
    }
}
