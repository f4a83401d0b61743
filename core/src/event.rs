//! Event payload trait and the stored event envelope.
//!
//! Events are immutable facts. A domain module defines its events as a
//! serde enum implementing [`Event`]; the wiring core never inspects the
//! payload, only the envelope ([`PendingEvent`] before append,
//! [`EventRecord`] after the store has assigned a global sequence).
//!
//! # Design
//!
//! Payloads are serialized with `bincode`: compact, fast, and uniform for
//! all-Rust consumers. The type tag carried next to the bytes is a
//! versioned string (`"FlirtSent.v1"`), which is what makes replay of
//! historical payload shapes possible - a handler routes on the tag and
//! decodes only shapes it declared interest in, so unknown or newer types
//! pass it by untouched.
//!
//! # Example
//!
//! ```
//! use modulith_core::event::Event;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! enum MemberEvent {
//!     RegistrationApproved { member_id: uuid::Uuid, name: String },
//!     FlirtSent { from: uuid::Uuid, to: uuid::Uuid },
//! }
//!
//! impl Event for MemberEvent {
//!     fn event_type(&self) -> &'static str {
//!         match self {
//!             MemberEvent::RegistrationApproved { .. } => "RegistrationApproved.v1",
//!             MemberEvent::FlirtSent { .. } => "FlirtSent.v1",
//!         }
//!     }
//! }
//! ```

use crate::stream::{Sequence, StreamId};
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Error types for event (de)serialization.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize event to bytes.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from bytes.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),
}

/// Unique identifier of a single event, assigned at creation time.
///
/// Distinct from the [`Sequence`]: the id names the fact, the sequence
/// names its position in the log. Idempotent handlers that need explicit
/// deduplication key on the id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Create a fresh random event identifier.
    #[must_use]
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A domain event payload that can be stored in the log and replayed.
///
/// # Event Naming Convention
///
/// `event_type()` must return a stable identifier with a version suffix,
/// e.g. `"RegistrationApproved.v1"`. The version suffix is the schema
/// evolution mechanism: a breaking payload change gets a new suffix and
/// handlers keep decoding every historical version they subscribe to.
pub trait Event: Send + Sync + 'static {
    /// Returns the versioned type identifier for this event.
    fn event_type(&self) -> &'static str;

    /// Serialize this event to bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if the payload cannot be
    /// serialized; rare with bincode.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        bincode::serialize(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Deserialize an event from bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DeserializationError`] if the bytes do not
    /// decode as this event type - corrupted data or an incompatible
    /// schema change without a version bump.
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        bincode::deserialize(bytes).map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}

/// An event envelope before the store has assigned its sequence.
///
/// Built by command-side logic, handed to the bus (or directly to a
/// store), and turned into an [`EventRecord`] by `append`.
#[derive(Clone, Debug)]
pub struct PendingEvent {
    /// Identity of the fact itself.
    pub event_id: EventId,

    /// The stream this event belongs to.
    pub stream_id: StreamId,

    /// Versioned type tag (e.g. `"FlirtSent.v1"`).
    pub event_type: String,

    /// The bincode-serialized payload.
    pub data: Vec<u8>,

    /// Optional metadata in JSON form (correlation ids, acting user).
    pub metadata: Option<serde_json::Value>,

    /// When the fact occurred, assigned at creation.
    pub occurred_at: DateTime<Utc>,
}

impl PendingEvent {
    /// Build a pending event from a typed payload, timestamped now.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if the payload cannot be
    /// serialized.
    pub fn from_event<E: Event + Serialize>(
        event: &E,
        stream_id: StreamId,
    ) -> Result<Self, EventError> {
        Ok(Self {
            event_id: EventId::new_random(),
            stream_id,
            event_type: event.event_type().to_string(),
            data: event.to_bytes()?,
            metadata: None,
            occurred_at: Utc::now(),
        })
    }

    /// Attach metadata to the envelope.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Override the occurrence timestamp (deterministic tests use a fixed clock).
    #[must_use]
    pub const fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

impl fmt::Display for PendingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PendingEvent {{ type: {}, stream: {}, size: {} bytes }}",
            self.event_type,
            self.stream_id,
            self.data.len()
        )
    }
}

/// An appended, immutable event with its global log position.
///
/// Records are what the store returns, what the bus dispatches, and what
/// handlers fold into their view models. Once appended a record never
/// changes; there is no update or delete.
#[derive(Clone, Debug)]
pub struct EventRecord {
    /// Global log position, assigned by the store, monotonic, never reused.
    pub sequence: Sequence,

    /// Identity of the fact itself.
    pub event_id: EventId,

    /// The stream this event belongs to.
    pub stream_id: StreamId,

    /// Versioned type tag.
    pub event_type: String,

    /// The bincode-serialized payload.
    pub data: Vec<u8>,

    /// Optional metadata in JSON form.
    pub metadata: Option<serde_json::Value>,

    /// When the fact occurred.
    pub occurred_at: DateTime<Utc>,
}

impl EventRecord {
    /// Assemble a record from a pending envelope and its assigned sequence.
    ///
    /// Store adapters call this at append time; application code never
    /// constructs records by hand.
    #[must_use]
    pub fn from_pending(pending: PendingEvent, sequence: Sequence) -> Self {
        Self {
            sequence,
            event_id: pending.event_id,
            stream_id: pending.stream_id,
            event_type: pending.event_type,
            data: pending.data,
            metadata: pending.metadata,
            occurred_at: pending.occurred_at,
        }
    }

    /// Decode the payload as a concrete event type.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DeserializationError`] if the payload does
    /// not decode as `E`.
    pub fn decode<E: Event + DeserializeOwned>(&self) -> Result<E, EventError> {
        E::from_bytes(&self.data)
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EventRecord {{ seq: {}, type: {}, stream: {} }}",
            self.sequence, self.event_type, self.stream_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    enum TestEvent {
        Created { id: String, value: i32 },
        Renamed { id: String, name: String },
    }

    impl Event for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Created { .. } => "TestEvent.Created.v1",
                TestEvent::Renamed { .. } => "TestEvent.Renamed.v1",
            }
        }
    }

    #[test]
    fn event_type_returns_versioned_identifier() {
        let event = TestEvent::Created {
            id: "t-1".to_string(),
            value: 42,
        };
        assert_eq!(event.event_type(), "TestEvent.Created.v1");
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: Test will fail if serialization fails
    fn payload_roundtrip() {
        let event = TestEvent::Renamed {
            id: "t-1".to_string(),
            name: "after".to_string(),
        };

        let bytes = event.to_bytes().expect("serialization should succeed");
        let decoded = TestEvent::from_bytes(&bytes).expect("deserialization should succeed");

        assert_eq!(event, decoded);
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: Test will fail if serialization fails
    fn pending_event_carries_type_tag_and_timestamp() {
        let event = TestEvent::Created {
            id: "t-1".to_string(),
            value: 7,
        };
        let stream = StreamId::new_random();

        let pending =
            PendingEvent::from_event(&event, stream).expect("serialization should succeed");

        assert_eq!(pending.event_type, "TestEvent.Created.v1");
        assert_eq!(pending.stream_id, stream);
        assert!(pending.metadata.is_none());
        assert!(!pending.data.is_empty());
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: Test will fail if serialization fails
    fn record_decodes_back_to_payload() {
        let event = TestEvent::Created {
            id: "t-9".to_string(),
            value: 9,
        };
        let pending = PendingEvent::from_event(&event, StreamId::new_random())
            .expect("serialization should succeed");
        let record = EventRecord::from_pending(pending, Sequence::new(1));

        let decoded: TestEvent = record.decode().expect("decode should succeed");
        assert_eq!(decoded, event);
        assert_eq!(record.sequence, Sequence::new(1));
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: Test will fail if serialization fails
    fn metadata_builder() {
        let event = TestEvent::Created {
            id: "t-2".to_string(),
            value: 1,
        };
        let meta = serde_json::json!({ "correlation_id": "abc" });

        let pending = PendingEvent::from_event(&event, StreamId::new_random())
            .expect("serialization should succeed")
            .with_metadata(meta.clone());

        assert_eq!(pending.metadata, Some(meta));
    }

    #[test]
    fn decoding_wrong_shape_fails() {
        let record = EventRecord {
            sequence: Sequence::new(1),
            event_id: EventId::new_random(),
            stream_id: StreamId::new_random(),
            event_type: "TestEvent.Created.v1".to_string(),
            data: vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
            metadata: None,
            occurred_at: Utc::now(),
        };

        let decoded: Result<TestEvent, _> = record.decode();
        assert!(decoded.is_err());
    }
}
