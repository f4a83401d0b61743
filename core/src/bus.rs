//! In-process event bus: append-then-dispatch with per-module ordering.
//!
//! The bus owns a handle to the [`EventStore`] and a subscription table
//! that is sealed once module registration finishes. Publishing appends
//! the event (the store assigns its global sequence), then dispatches
//! every not-yet-dispatched record in sequence order to the handlers
//! subscribed to each record's event type.
//!
//! # Ordering
//!
//! A dispatch cursor guarded by an async mutex tracks the next sequence
//! to deliver. Whichever publisher holds the cursor drains the log from
//! the cursor forward until it is exhausted, so every module observes
//! events in strictly increasing sequence order even with concurrent
//! publishers. Across modules no relative order is promised; within one
//! module it is total.
//!
//! # Delivery semantics
//!
//! Dispatch is synchronous with respect to the publisher: `publish`
//! returns after all subscribed handlers have run. Slow handlers slow
//! down publishers; that backpressure is deliberate and keeps scripted
//! scenarios deterministic. Replay re-delivers already-dispatched
//! records, so handlers must be idempotent - the bus never deduplicates.
//!
//! Handlers may publish follow-up events. A publish made from inside a
//! handler appends immediately and returns without draining; the drain
//! already running on that task picks the new record up in its next
//! read and delivers it before the outer `publish` returns. A handler
//! chain must terminate - a handler that publishes on every delivery of
//! a type it subscribes to will drain forever.
//!
//! # Isolation
//!
//! A handler error is captured as a [`HandlerFailure`], logged through
//! `tracing`, and reported on the publisher's receipt. It never prevents
//! delivery to sibling modules and never rolls back the append.

use crate::event::{EventRecord, PendingEvent};
use crate::store::{EventStore, EventStoreError};
use crate::stream::Sequence;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::Instrument;

tokio::task_local! {
    /// Set while a drain is delivering to a handler on this task. A
    /// publish issued from inside that handler must append without
    /// re-entering the drain: the cursor mutex is already held here and
    /// awaiting it again would wedge the bus.
    static IN_DISPATCH: ();
}

/// Error raised by a module handler while processing one event.
///
/// Opaque to the bus; the message travels into the [`HandlerFailure`]
/// report and the observability sink.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    /// Create a handler error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Boxed future type returned by event handlers.
pub type HandlerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>>;

/// A module's event handler: the fold side of its view model.
///
/// One handler per module, declaring the event types it wants via
/// [`interests`](EventHandler::interests). The bus routes by type tag, so
/// a handler is never invoked for types it did not declare - unknown or
/// newer event types pass the module by untouched.
///
/// # Idempotency contract
///
/// Every handler must be safe to invoke twice with the same record
/// (crash-recovery replay re-delivers). Either fold naturally
/// idempotently, or detect an already-applied `event_id`/`sequence`
/// against the view model.
pub trait EventHandler: Send + Sync {
    /// Name of the owning module (stable, used in failure reports and spans).
    fn module(&self) -> &str;

    /// The versioned event type tags this handler subscribes to.
    fn interests(&self) -> &[&str];

    /// Process one record. Must be idempotent.
    ///
    /// A handler may publish follow-up events through its bus handle;
    /// the active drain delivers them after the current batch. A chain
    /// of follow-ups must terminate.
    fn handle<'a>(&'a self, record: &'a EventRecord) -> HandlerFuture<'a>;
}

/// Report of one handler failing on one record.
///
/// Failures are isolated: the append stands, sibling modules still
/// received the record.
#[derive(Clone, Debug)]
pub struct HandlerFailure {
    /// The module whose handler failed.
    pub module: String,
    /// Global sequence of the record that failed to process.
    pub sequence: Sequence,
    /// Type tag of the record.
    pub event_type: String,
    /// The handler's error message.
    pub message: String,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handler of module '{}' failed on {} (seq {}): {}",
            self.module, self.event_type, self.sequence, self.message
        )
    }
}

/// Outcome of a successful publish: the event is durably appended.
///
/// `handler_failures` lists the degraded consumers observed while this
/// publisher held the dispatch cursor. An empty list means every
/// subscriber processed cleanly.
#[derive(Debug)]
pub struct PublishReceipt {
    /// The appended record, with its assigned sequence.
    pub record: EventRecord,
    /// Handler failures observed during this publisher's dispatch drain.
    pub handler_failures: Vec<HandlerFailure>,
}

impl PublishReceipt {
    /// True when no subscriber failed during the drain.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.handler_failures.is_empty()
    }
}

/// Errors surfaced to a publisher.
///
/// The two variants keep the user-visible distinction exact: `Store`
/// means the action did not happen; `DispatchIncomplete` means it
/// durably happened but some consumers have not seen it yet (replay
/// will re-deliver).
#[derive(Error, Debug)]
pub enum PublishError {
    /// The append failed; the event was not recorded.
    #[error("append failed: {0}")]
    Store(#[from] EventStoreError),

    /// The event was appended (at `sequence`) but the dispatch drain hit a
    /// store read error before every subscriber was served.
    #[error("event at seq {sequence} was appended but dispatch did not complete: {source}")]
    DispatchIncomplete {
        /// Sequence of the record that IS durably in the log.
        sequence: Sequence,
        /// The store error that interrupted the drain.
        source: EventStoreError,
    },
}

/// Error returned when subscribing outside the registration window.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscribeError {
    /// Registration has finished; the subscription table is immutable.
    #[error("event bus is sealed; subscriptions are registration-time only")]
    Sealed,

    /// The handler declared no event types.
    #[error("handler of module '{0}' declares no event interests")]
    NoInterests(String),
}

/// In-process event dispatcher over an append-only store.
///
/// Created by the module registry before registration starts; handed to
/// modules (as `Arc<EventBus>`) so command-side code can publish. The
/// registry seals the bus when registration completes - after that,
/// [`subscribe`](EventBus::subscribe) is rejected.
pub struct EventBus {
    store: Arc<dyn EventStore>,
    subscriptions: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
    sealed: AtomicBool,
    /// Next global sequence to dispatch; guards delivery order.
    cursor: Mutex<Sequence>,
}

impl EventBus {
    /// Create a bus over the given store with an empty subscription table.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            subscriptions: RwLock::new(HashMap::new()),
            sealed: AtomicBool::new(false),
            cursor: Mutex::new(Sequence::ZERO.next()),
        }
    }

    /// The store backing this bus.
    #[must_use]
    pub fn store(&self) -> Arc<dyn EventStore> {
        Arc::clone(&self.store)
    }

    /// Register a handler for the event types it declares.
    ///
    /// Registration-time only; the registry seals the bus before the
    /// system serves traffic.
    ///
    /// # Errors
    ///
    /// - [`SubscribeError::Sealed`]: registration has already finished
    /// - [`SubscribeError::NoInterests`]: the handler declares no types
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) -> Result<(), SubscribeError> {
        if self.sealed.load(Ordering::Acquire) {
            return Err(SubscribeError::Sealed);
        }
        if handler.interests().is_empty() {
            return Err(SubscribeError::NoInterests(handler.module().to_string()));
        }
        let mut table = write_lock(&self.subscriptions);
        for event_type in handler.interests() {
            table
                .entry((*event_type).to_string())
                .or_default()
                .push(Arc::clone(&handler));
        }
        tracing::debug!(
            module = handler.module(),
            interests = ?handler.interests(),
            "module subscribed"
        );
        Ok(())
    }

    /// Freeze the subscription table. Called by the registry once all
    /// modules have registered; idempotent.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    /// Whether registration has finished.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Append an event and dispatch it (plus any earlier undispatched
    /// records) to all subscribers, in sequence order.
    ///
    /// Returns after every subscribed handler has run for the published
    /// event. The receipt separates "durably appended" from "a consumer
    /// is degraded" - handler failures never fail the publish.
    ///
    /// Safe to call from inside an event handler: the follow-up event is
    /// appended and the drain already running on this task delivers it.
    /// Such a nested publish returns a receipt with an empty failure
    /// list; failures of the follow-up delivery surface on the draining
    /// publisher's receipt and through `tracing`.
    ///
    /// # Errors
    ///
    /// - [`PublishError::Store`]: the append failed; the event did NOT happen
    /// - [`PublishError::DispatchIncomplete`]: the event IS in the log but
    ///   the dispatch drain was interrupted by a store read error
    pub async fn publish(&self, event: PendingEvent) -> Result<PublishReceipt, PublishError> {
        let record = self.store.append(event).await?;
        tracing::debug!(
            sequence = record.sequence.value(),
            event_type = %record.event_type,
            stream = %record.stream_id,
            "event appended"
        );
        let handler_failures = self.dispatch_appended(record.sequence).await?;
        Ok(PublishReceipt {
            record,
            handler_failures,
        })
    }

    /// [`publish`](EventBus::publish) with a caller-supplied deadline on
    /// the append.
    ///
    /// If the deadline fires before the store confirms the append, the
    /// event was not recorded and [`EventStoreError::Cancelled`] is
    /// returned. Once the append has been confirmed the event exists, so
    /// dispatch proceeds without the deadline - cancelling half a
    /// dispatch would break the all-or-nothing contract.
    ///
    /// # Errors
    ///
    /// As [`publish`](EventBus::publish), plus
    /// [`EventStoreError::Cancelled`] (wrapped in [`PublishError::Store`])
    /// when the deadline fires first.
    pub async fn publish_with_deadline(
        &self,
        event: PendingEvent,
        deadline: Duration,
    ) -> Result<PublishReceipt, PublishError> {
        let record = match tokio::time::timeout(deadline, self.store.append(event)).await {
            Ok(result) => result?,
            Err(_elapsed) => return Err(PublishError::Store(EventStoreError::Cancelled)),
        };
        let handler_failures = self.dispatch_appended(record.sequence).await?;
        Ok(PublishReceipt {
            record,
            handler_failures,
        })
    }

    /// Re-deliver the whole log to all subscribers, in sequence order.
    ///
    /// Used to rebuild view models from empty state (disaster recovery).
    /// Nothing is appended; handler idempotency makes re-delivery safe.
    ///
    /// # Errors
    ///
    /// Returns the store error if the log could not be read.
    pub async fn replay(&self) -> Result<Vec<HandlerFailure>, EventStoreError> {
        self.replay_from(Sequence::ZERO.next()).await
    }

    /// Re-deliver the log from `from` onward, in sequence order.
    ///
    /// # Errors
    ///
    /// Returns the store error if the log could not be read.
    pub async fn replay_from(
        &self,
        from: Sequence,
    ) -> Result<Vec<HandlerFailure>, EventStoreError> {
        let mut cursor = self.cursor.lock().await;
        let records = self.store.read_from(from).await?;
        tracing::info!(from = from.value(), count = records.len(), "replaying log");
        let mut failures = Vec::new();
        for record in &records {
            self.deliver(record, &mut failures).await;
        }
        if let Some(last) = records.last() {
            if last.sequence.next() > *cursor {
                *cursor = last.sequence.next();
            }
        }
        Ok(failures)
    }

    /// Dispatch after an append. A publish made from inside a handler
    /// lands here while the drain on this task holds the cursor; it must
    /// not drain again - the active drain reads past the new record
    /// before releasing the cursor.
    async fn dispatch_appended(
        &self,
        sequence: Sequence,
    ) -> Result<Vec<HandlerFailure>, PublishError> {
        if IN_DISPATCH.try_with(|_| ()).is_ok() {
            tracing::trace!(
                sequence = sequence.value(),
                "follow-up publish; the active drain delivers it"
            );
            return Ok(Vec::new());
        }
        self.drain()
            .await
            .map_err(|source| PublishError::DispatchIncomplete { sequence, source })
    }

    /// Deliver every undispatched record in sequence order until the log
    /// is exhausted. Holds the dispatch cursor for the whole drain, which
    /// is what serializes delivery across publishers; running to
    /// exhaustion picks up follow-up events handlers append mid-drain.
    async fn drain(&self) -> Result<Vec<HandlerFailure>, EventStoreError> {
        let mut cursor = self.cursor.lock().await;
        let mut failures = Vec::new();
        loop {
            let records = self.store.read_from(*cursor).await?;
            if records.is_empty() {
                break;
            }
            for record in &records {
                self.deliver(record, &mut failures).await;
                *cursor = record.sequence.next();
            }
        }
        Ok(failures)
    }

    /// Invoke every subscriber of one record's type, isolating failures.
    async fn deliver(&self, record: &EventRecord, failures: &mut Vec<HandlerFailure>) {
        let handlers: Vec<Arc<dyn EventHandler>> = {
            let table = read_lock(&self.subscriptions);
            table.get(&record.event_type).cloned().unwrap_or_default()
        };
        for handler in handlers {
            let span = tracing::debug_span!(
                "dispatch",
                module = handler.module(),
                sequence = record.sequence.value(),
                event_type = %record.event_type,
            );
            let outcome = IN_DISPATCH
                .scope((), handler.handle(record).instrument(span))
                .await;
            if let Err(error) = outcome {
                let failure = HandlerFailure {
                    module: handler.module().to_string(),
                    sequence: record.sequence,
                    event_type: record.event_type.clone(),
                    message: error.to_string(),
                };
                tracing::error!(%failure, "handler failed; sibling modules unaffected");
                failures.push(failure);
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("sealed", &self.is_sealed())
            .finish_non_exhaustive()
    }
}

/// Read the subscription table, recovering from a poisoned lock.
/// Subscribers only push into the table, so a poisoned write left it valid.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
