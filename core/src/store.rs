//! Event log store trait and error taxonomy.
//!
//! The store is the source of truth: an append-only, globally ordered
//! sequence of events. Everything else in the system - the bus, module
//! view models, replay - is derived from it.
//!
//! # Adapters
//!
//! Two adapters ship with the workspace and are substitutable without any
//! change to bus or module code (the portability invariant):
//!
//! - `MemoryEventStore` (in `modulith-memory`): volatile, in-process, for
//!   development and tests
//! - `PostgresEventStore` (in `modulith-postgres`): durable, for
//!   production deployments
//!
//! # Dyn Compatibility
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so it can be used as a trait object (`Arc<dyn EventStore>`),
//! which is how the bus and modules hold their store handle.

use crate::event::{EventRecord, PendingEvent};
use crate::stream::{Sequence, StreamId};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors surfaced by event store adapters.
#[derive(Error, Debug)]
pub enum EventStoreError {
    /// The adapter could not confirm durability - replication quorum lost,
    /// pool exhausted, connection refused. The caller must assume the
    /// event was NOT recorded and either retry or fail its own request.
    #[error("Event store unavailable: {0}")]
    Unavailable(String),

    /// The event envelope could not be (de)serialized by the adapter.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A caller-supplied deadline fired before the append was applied.
    /// The event was not recorded; append is all-or-nothing.
    #[error("Operation cancelled; the event was not recorded")]
    Cancelled,
}

/// Boxed future type returned by store operations.
pub type StoreFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, EventStoreError>> + Send + 'a>>;

/// Append-only, ordered event log.
///
/// # Contract
///
/// - `append` is the only mutation. It atomically assigns the next global
///   [`Sequence`] and persists the event before returning; once it
///   returns `Ok`, the event is durable per the adapter's guarantee.
/// - `read_from` returns all records at or after a cursor, ascending by
///   sequence, finite as of call time. Restart a read by calling again
///   with a later cursor.
/// - `read_stream` returns the ordered sub-sequence of one stream.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` and safe for concurrent
/// appenders; internal ordering/locking is the adapter's job.
pub trait EventStore: Send + Sync {
    /// Append one event, assigning its global sequence atomically.
    ///
    /// # Errors
    ///
    /// - [`EventStoreError::Unavailable`]: durability could not be
    ///   confirmed; the event was not recorded
    /// - [`EventStoreError::Serialization`]: the envelope could not be
    ///   encoded for storage
    fn append(&self, event: PendingEvent) -> StoreFuture<'_, EventRecord>;

    /// Read all records with `sequence >= from`, ascending.
    ///
    /// An empty log (or a cursor past the end) yields an empty vector,
    /// not an error.
    ///
    /// # Errors
    ///
    /// - [`EventStoreError::Unavailable`]: the backing log could not be read
    /// - [`EventStoreError::Serialization`]: a stored record failed to decode
    fn read_from(&self, from: Sequence) -> StoreFuture<'_, Vec<EventRecord>>;

    /// Read the ordered records of a single stream.
    ///
    /// An unknown stream yields an empty vector - streams come into
    /// existence with their first event.
    ///
    /// # Errors
    ///
    /// - [`EventStoreError::Unavailable`]: the backing log could not be read
    /// - [`EventStoreError::Serialization`]: a stored record failed to decode
    fn read_stream(&self, stream_id: StreamId) -> StoreFuture<'_, Vec<EventRecord>>;
}
