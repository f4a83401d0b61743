//! # Modulith Core
//!
//! Event dispatch and module-wiring core for a modular, event-sourced
//! backend. Independent modules communicate exclusively through an
//! immutable, ordered event log and expose capability-scoped HTTP
//! endpoints; this crate is the contract that wires them together.
//!
//! ## Core Concepts
//!
//! - **Event**: immutable fact with a versioned type tag and a globally
//!   monotonic sequence assigned at append time
//! - **Event Log Store**: append-only source of truth, volatile or
//!   durable, substitutable behind one trait
//! - **Event Bus**: in-process dispatcher - append, then fan out to
//!   subscribers in sequence order, isolating handler failures
//! - **Module / Context**: capability-object wiring - each module
//!   registers its routes, its event handler, and its reset callback
//!   through a short-lived [`module::Context`], and nothing else
//! - **View model**: module-private projection, a pure function of the
//!   event sequence the module received
//!
//! ## Architecture Principles
//!
//! - Modules never share storage; they interact via events and HTTP only
//! - Handlers are idempotent; replay rebuilds any view model from empty
//! - Registration is explicit, constructor-injected, and boot-time only
//! - Adapters (volatile vs. durable log) swap without touching modules
//!
//! ## Example
//!
//! ```ignore
//! use modulith_core::module::Registry;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryEventStore::new());
//! let mut registry = Registry::new(store);
//!
//! let members = MembersModule::new(registry.bus());
//! registry.register(&members)?;
//!
//! let app = registry.build(); // bus sealed; serve app.routes
//! ```

pub mod bus;
pub mod clock;
pub mod event;
pub mod module;
pub mod store;
pub mod stream;

// Re-export commonly used types
pub use bus::{EventBus, EventHandler, HandlerError, PublishError, PublishReceipt};
pub use event::{Event, EventId, EventRecord, PendingEvent};
pub use module::{App, Context, Module, Registry};
pub use store::{EventStore, EventStoreError};
pub use stream::{Sequence, StreamId};
