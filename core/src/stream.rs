//! Stream identification and global sequence types.
//!
//! This module defines the two ordering primitives of the event log:
//! [`StreamId`], the per-entity partition key, and [`Sequence`], the
//! globally monotonic position assigned to every appended event.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error type for [`StreamId`] parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid stream ID: {0}")]
pub struct ParseStreamIdError(String);

/// Identifier of a logical event stream.
///
/// A stream is an ordered sub-sequence of the global log sharing one key,
/// typically one stream per entity (a member, an order, a conversation).
/// Order within a stream is guaranteed by the store; order across streams
/// is not.
///
/// # Design
///
/// `StreamId` is a newtype wrapper around [`Uuid`] that provides:
/// - Type safety (can't accidentally pass an unrelated identifier)
/// - Clear intent in function signatures
/// - Serialization support for storage
///
/// # Examples
///
/// ```
/// use modulith_core::stream::StreamId;
///
/// let a = StreamId::new_random();
/// let b = StreamId::new_random();
/// assert_ne!(a, b);
///
/// let parsed: StreamId = a.to_string().parse().unwrap();
/// assert_eq!(parsed, a);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(Uuid);

impl StreamId {
    /// Create a fresh random stream identifier.
    #[must_use]
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `StreamId` from an existing UUID.
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

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StreamId {
    type Err = ParseStreamIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| ParseStreamIdError(e.to_string()))
    }
}

impl From<Uuid> for StreamId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<StreamId> for Uuid {
    fn from(id: StreamId) -> Self {
        id.0
    }
}

/// Global log position assigned by the event store at append time.
///
/// Sequences start at 1 for the first appended event, increase
/// monotonically across the whole log, and are never reused. A sequence
/// of 0 ([`Sequence::ZERO`]) is the cursor position "before the first
/// event" and is never assigned to a record.
///
/// # Design
///
/// `Sequence` is a newtype wrapper around `u64` that provides:
/// - Type safety (can't accidentally use a plain integer)
/// - Clear intent in function signatures
/// - Ordering and cursor arithmetic
///
/// # Examples
///
/// ```
/// use modulith_core::stream::Sequence;
///
/// let first = Sequence::ZERO.next();
/// assert_eq!(first, Sequence::new(1));
/// assert!(Sequence::new(5) < Sequence::new(9));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Sequence(u64);

impl Sequence {
    /// The cursor position before the first event. Never assigned to a record.
    pub const ZERO: Self = Self(0);

    /// Create a new `Sequence` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the sequence number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next sequence (current + 1).
    ///
    /// # Overflow Behavior
    ///
    /// Reaching `u64::MAX` appended events is not a realistic concern for
    /// any log; plain addition is used.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Sequence {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Sequence> for u64 {
    fn from(sequence: Sequence) -> Self {
        sequence.0
    }
}
