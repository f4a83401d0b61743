//! Test harness and mocks for Modulith modules.
//!
//! This crate provides:
//! - [`mocks`]: deterministic stand-ins for ambient collaborators
//!   (fixed clock, capturing event handler)
//! - [`scenario`]: a scripted-scenario harness that boots a registry
//!   over any store, dispatches event scripts, and resets between runs
//!
//! ## Example
//!
//! ```ignore
//! use modulith_testing::scenario::Scenario;
//! use modulith_memory::MemoryEventStore;
//!
//! #[tokio::test]
//! async fn flirt_workflow() {
//!     let mut builder = Scenario::over(Arc::new(MemoryEventStore::new()));
//!     let module = MembersModule::new(builder.bus());
//!     builder.register(&module)?;
//!     let scenario = builder.boot();
//!
//!     scenario.dispatch(&approved_bob, bob_stream).await?;
//!     assert_eq!(module.snapshot().member_count(), 1);
//!
//!     scenario.reset_all();
//! }
//! ```

/// Deterministic mock implementations for tests.
pub mod mocks {
    use chrono::{DateTime, Utc};
    use modulith_core::bus::{EventHandler, HandlerError, HandlerFuture};
    use modulith_core::clock::Clock;
    use modulith_core::event::EventRecord;
    use std::sync::{Mutex, MutexGuard};

    /// Fixed clock for deterministic tests.
    ///
    /// Always returns the same time, making derived values (ages,
    /// timestamps) reproducible across runs and stores.
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a fixed clock frozen at the given time.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Event handler that records every delivered record.
    ///
    /// Useful for asserting what a module would have observed: delivery
    /// order, redelivery during replay, which types passed it by.
    pub struct CapturingHandler {
        module: &'static str,
        interests: Vec<&'static str>,
        delivered: Mutex<Vec<EventRecord>>,
        fail_with: Option<String>,
    }

    impl CapturingHandler {
        /// Create a capturing handler subscribed to the given types.
        #[must_use]
        pub fn new(module: &'static str, interests: &[&'static str]) -> Self {
            Self {
                module,
                interests: interests.to_vec(),
                delivered: Mutex::new(Vec::new()),
                fail_with: None,
            }
        }

        /// Make every delivery fail with the given message, while still
        /// recording the record. For failure-isolation tests.
        #[must_use]
        pub fn failing_with(mut self, message: impl Into<String>) -> Self {
            self.fail_with = Some(message.into());
            self
        }

        /// The records delivered so far, in delivery order.
        #[must_use]
        pub fn delivered(&self) -> Vec<EventRecord> {
            self.lock().clone()
        }

        /// Global sequences of the delivered records, in delivery order.
        #[must_use]
        pub fn delivered_sequences(&self) -> Vec<u64> {
            self.lock().iter().map(|r| r.sequence.value()).collect()
        }

        fn lock(&self) -> MutexGuard<'_, Vec<EventRecord>> {
            match self.delivered.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            }
        }
    }

    impl EventHandler for CapturingHandler {
        fn module(&self) -> &str {
            self.module
        }

        fn interests(&self) -> &[&str] {
            &self.interests
        }

        fn handle<'a>(&'a self, record: &'a EventRecord) -> HandlerFuture<'a> {
            Box::pin(async move {
                self.lock().push(record.clone());
                match &self.fail_with {
                    Some(message) => Err(HandlerError::new(message.clone())),
                    None => Ok(()),
                }
            })
        }
    }
}

/// Scripted-scenario harness over a registry and a store.
pub mod scenario {
    use chrono::{DateTime, Utc};
    use modulith_core::bus::{EventBus, HandlerFailure, PublishError, PublishReceipt};
    use modulith_core::event::{Event, EventError, PendingEvent};
    use modulith_core::module::{App, Module, Registry, RegistrationError};
    use modulith_core::store::{EventStore, EventStoreError};
    use modulith_core::stream::StreamId;
    use serde::Serialize;
    use std::sync::Arc;
    use thiserror::Error;

    /// Errors from scripted dispatch.
    #[derive(Error, Debug)]
    pub enum ScenarioError {
        /// The event payload could not be serialized.
        #[error(transparent)]
        Event(#[from] EventError),

        /// The bus rejected or degraded the publish.
        #[error(transparent)]
        Publish(#[from] PublishError),
    }

    /// Builder phase of a scenario: modules may still register.
    pub struct ScenarioBuilder<H> {
        registry: Registry<H>,
    }

    impl<H> ScenarioBuilder<H> {
        /// Publisher handle for constructing modules.
        #[must_use]
        pub fn bus(&self) -> Arc<EventBus> {
            self.registry.bus()
        }

        /// Register one module.
        ///
        /// # Errors
        ///
        /// Any [`RegistrationError`], exactly as at production boot.
        pub fn register(&mut self, module: &dyn Module<H>) -> Result<(), RegistrationError> {
            self.registry.register(module)
        }

        /// Seal registration and produce the runnable scenario.
        #[must_use]
        pub fn boot(self) -> Scenario<H> {
            Scenario {
                app: self.registry.build(),
            }
        }
    }

    /// A booted system under test: sealed bus, routes, reset hooks.
    pub struct Scenario<H> {
        /// The built application parts, exposed for tests that serve the
        /// route table or inspect the reset hooks directly.
        pub app: App<H>,
    }

    impl<H> Scenario<H> {
        /// Start building a scenario over the given store.
        #[must_use]
        pub fn over(store: Arc<dyn EventStore>) -> ScenarioBuilder<H> {
            ScenarioBuilder {
                registry: Registry::new(store),
            }
        }

        /// Publish one scripted event onto the given stream.
        ///
        /// # Errors
        ///
        /// [`ScenarioError`] if serialization or the publish fails.
        pub async fn dispatch<E: Event + Serialize>(
            &self,
            event: &E,
            stream: StreamId,
        ) -> Result<PublishReceipt, ScenarioError> {
            let pending = PendingEvent::from_event(event, stream)?;
            Ok(self.app.bus.publish(pending).await?)
        }

        /// Publish one scripted event with a fixed occurrence time, so
        /// runs over different stores produce comparable view models.
        ///
        /// # Errors
        ///
        /// [`ScenarioError`] if serialization or the publish fails.
        pub async fn dispatch_at<E: Event + Serialize>(
            &self,
            event: &E,
            stream: StreamId,
            occurred_at: DateTime<Utc>,
        ) -> Result<PublishReceipt, ScenarioError> {
            let pending =
                PendingEvent::from_event(event, stream)?.with_occurred_at(occurred_at);
            Ok(self.app.bus.publish(pending).await?)
        }

        /// Wipe every module's view model. The log is untouched.
        pub fn reset_all(&self) {
            self.app.resets.reset_all();
        }

        /// Re-deliver the whole log to all modules.
        ///
        /// # Errors
        ///
        /// The store error if the log could not be read.
        pub async fn replay(&self) -> Result<Vec<HandlerFailure>, EventStoreError> {
            self.app.bus.replay().await
        }
    }
}

/// Install a test-friendly tracing subscriber, once per process.
///
/// Honors `RUST_LOG`; output is captured per test. Safe to call from
/// every test - later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
