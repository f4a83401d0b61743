//! Module contract and registration-time wiring.
//!
//! A module is a bounded-context unit owning its event subscriptions, its
//! HTTP routes, a private view model, and one reset callback. At boot the
//! [`Registry`] hands each module a [`Context`] - the sole capability
//! object through which a module attaches itself to the system. The four
//! `Context` operations are registration-time only; once every module has
//! registered, the registry seals the bus and yields the built [`App`]
//! parts, and no further wiring path exists.
//!
//! # Capability wiring, no magic
//!
//! Dependencies flow at construction time: a module that publishes gets
//! an `Arc<EventBus>` in its constructor, a module that calls a sibling
//! gets that sibling's public interface. There is no service locator and
//! no reflective injection.
//!
//! # HTTP handler genericity
//!
//! The wiring core is generic over the HTTP handler type `H` so it stays
//! web-framework free. The `modulith-web` crate instantiates `H` with an
//! axum `MethodRouter` and turns the collected [`RouteTable`] into a
//! serving router.

use crate::bus::{EventBus, EventHandler, SubscribeError};
use crate::store::EventStore;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Fatal registration problems. Boot must not proceed past any of these.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// Two registrations claimed the same HTTP path.
    #[error("duplicate HTTP path '{path}': module '{module}' collides with module '{registered_by}'")]
    DuplicatePath {
        /// The colliding path.
        path: String,
        /// The module attempting the registration.
        module: String,
        /// The module that already owns the path.
        registered_by: String,
    },

    /// Two modules registered under the same name.
    #[error("duplicate module name '{0}'")]
    DuplicateModule(String),

    /// The bus rejected the subscription.
    #[error(transparent)]
    Subscribe(#[from] SubscribeError),
}

/// Access requirement of a registered HTTP route.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    /// No identity requirement.
    Public,
    /// The authentication collaborator must establish an identity before
    /// the handler runs.
    Authenticated,
}

/// One registered HTTP route.
#[derive(Debug)]
pub struct Route<H> {
    /// The registered path (each module owns its own namespace).
    pub path: String,
    /// Public or authenticated.
    pub access: Access,
    /// Name of the registering module.
    pub module: String,
    /// The framework-level handler.
    pub handler: H,
}

/// Aggregated route registrations of all modules.
///
/// Duplicate paths are rejected at insert; by the time the table reaches
/// the web layer every path is unique.
#[derive(Debug)]
pub struct RouteTable<H> {
    routes: Vec<Route<H>>,
}

impl<H> RouteTable<H> {
    fn new() -> Self {
        Self { routes: Vec::new() }
    }

    fn add(
        &mut self,
        module: &str,
        path: String,
        access: Access,
        handler: H,
    ) -> Result<(), RegistrationError> {
        if let Some(existing) = self.routes.iter().find(|r| r.path == path) {
            return Err(RegistrationError::DuplicatePath {
                path,
                module: module.to_string(),
                registered_by: existing.module.clone(),
            });
        }
        self.routes.push(Route {
            path,
            access,
            module: module.to_string(),
            handler,
        });
        Ok(())
    }

    /// Iterate the registered routes.
    pub fn iter(&self) -> impl Iterator<Item = &Route<H>> {
        self.routes.iter()
    }

    /// Consume the table into its routes.
    #[must_use]
    pub fn into_routes(self) -> Vec<Route<H>> {
        self.routes
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes were registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Registry of per-module view-model reset callbacks.
///
/// Used exclusively by the test harness between scenarios; nothing routes
/// to it from production traffic.
#[derive(Default)]
pub struct ResetHooks {
    hooks: Vec<(String, Box<dyn Fn() + Send + Sync>)>,
}

impl ResetHooks {
    fn add(&mut self, module: &str, reset: Box<dyn Fn() + Send + Sync>) {
        self.hooks.push((module.to_string(), reset));
    }

    /// Invoke every registered reset callback, returning each module's
    /// view model to its post-construction empty state.
    pub fn reset_all(&self) {
        for (module, reset) in &self.hooks {
            tracing::debug!(module, "resetting module data");
            reset();
        }
    }

    /// Number of registered hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hooks were registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for ResetHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetHooks")
            .field("modules", &self.hooks.iter().map(|(m, _)| m).collect::<Vec<_>>())
            .finish()
    }
}

/// The interface every module implements to be wired into the system.
pub trait Module<H>: Send + Sync {
    /// Stable, unique module name.
    fn name(&self) -> &str;

    /// Attach this module via the given context. Called exactly once, at
    /// boot, before the system serves traffic.
    ///
    /// # Errors
    ///
    /// Any [`RegistrationError`] is fatal; the process must not start.
    fn register(&self, ctx: &mut Context<'_, H>) -> Result<(), RegistrationError>;
}

/// Capability object handed to a module during registration.
///
/// Valid only for the duration of [`Module::register`]; exposes exactly
/// the four wiring operations a module may perform.
pub struct Context<'a, H> {
    module: &'a str,
    bus: &'a EventBus,
    routes: &'a mut RouteTable<H>,
    resets: &'a mut ResetHooks,
}

impl<H> Context<'_, H> {
    /// Register an HTTP route that requires an established identity
    /// before the handler runs.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::DuplicatePath`] if the path is already taken.
    pub fn add_auth_http(
        &mut self,
        path: impl Into<String>,
        handler: H,
    ) -> Result<(), RegistrationError> {
        self.routes
            .add(self.module, path.into(), Access::Authenticated, handler)
    }

    /// Register a public HTTP route.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::DuplicatePath`] if the path is already taken.
    pub fn add_http_handler(
        &mut self,
        path: impl Into<String>,
        handler: H,
    ) -> Result<(), RegistrationError> {
        self.routes
            .add(self.module, path.into(), Access::Public, handler)
    }

    /// Subscribe the module's event handler for the event types it
    /// declares via [`EventHandler::interests`].
    ///
    /// # Errors
    ///
    /// [`RegistrationError::Subscribe`] if the handler declares no
    /// interests (or registration has already been sealed, which cannot
    /// happen through a live `Context`).
    pub fn register_event_handler(
        &mut self,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), RegistrationError> {
        self.bus.subscribe(handler)?;
        Ok(())
    }

    /// Record the callback that wipes this module's view-model storage
    /// back to empty. Invoked only by the test harness between scenarios.
    pub fn reset_data(&mut self, reset: impl Fn() + Send + Sync + 'static) {
        self.resets.add(self.module, Box::new(reset));
    }
}

/// The built application parts: a sealed bus, the merged route table, and
/// the reset hooks.
#[derive(Debug)]
pub struct App<H> {
    /// The sealed event bus.
    pub bus: Arc<EventBus>,
    /// All registered routes, public and authenticated.
    pub routes: RouteTable<H>,
    /// All registered reset callbacks.
    pub resets: ResetHooks,
}

/// Drives module registration and produces the built [`App`].
///
/// # Boot sequence
///
/// 1. `Registry::new(store)` creates the (unsealed) bus.
/// 2. Modules are constructed, receiving `registry.bus()` and any sibling
///    public interfaces they need.
/// 3. `registry.register(&module)` hands each module its [`Context`].
/// 4. `registry.build()` seals the bus and yields the [`App`]; only then
///    may the system serve traffic.
pub struct Registry<H> {
    bus: Arc<EventBus>,
    routes: RouteTable<H>,
    resets: ResetHooks,
    module_names: HashSet<String>,
}

impl<H> Registry<H> {
    /// Create a registry (and its bus) over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            bus: Arc::new(EventBus::new(store)),
            routes: RouteTable::new(),
            resets: ResetHooks::default(),
            module_names: HashSet::new(),
        }
    }

    /// Publisher handle for module construction.
    #[must_use]
    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    /// Register one module: hand it a context and collect its wiring.
    ///
    /// # Errors
    ///
    /// Any [`RegistrationError`] is fatal at boot.
    pub fn register(&mut self, module: &dyn Module<H>) -> Result<(), RegistrationError> {
        let name = module.name().to_string();
        if !self.module_names.insert(name.clone()) {
            return Err(RegistrationError::DuplicateModule(name));
        }
        tracing::info!(module = %name, "registering module");
        let mut ctx = Context {
            module: &name,
            bus: &self.bus,
            routes: &mut self.routes,
            resets: &mut self.resets,
        };
        module.register(&mut ctx)
    }

    /// Seal the bus and hand back the built application parts.
    #[must_use]
    pub fn build(self) -> App<H> {
        self.bus.seal();
        tracing::info!(
            modules = self.module_names.len(),
            routes = self.routes.len(),
            "registration sealed"
        );
        App {
            bus: self.bus,
            routes: self.routes,
            resets: self.resets,
        }
    }
}
