//! Axum capability router for Modulith modules.
//!
//! Modules register HTTP routes through their registration `Context`
//! using the [`WebHandler`] type; this crate turns the collected route
//! table into a serving `axum::Router` and supplies the glue the wiring
//! core leaves to the web layer:
//!
//! - identity verification for authenticated routes, delegated to an
//!   [`Authenticator`] collaborator
//! - HTTP mapping of the core error taxonomy ([`AppError`]), keeping
//!   "the action did not happen" (503) distinct from "the action
//!   happened but a consumer is degraded" (202)
//!
//! # Example
//!
//! ```ignore
//! use modulith_web::{capability_router, WebHandler};
//! use modulith_core::module::Registry;
//!
//! let mut registry: Registry<WebHandler> = Registry::new(store);
//! registry.register(&members)?;
//! let app = registry.build();
//!
//! let router = capability_router(app.routes, authenticator);
//! axum::serve(listener, router).await?;
//! ```

pub mod auth;
pub mod error;
pub mod router;

// Re-export key types for convenience
pub use auth::{AuthError, Authenticator, Identity};
pub use error::{AppError, publish_response};
pub use router::{WebHandler, capability_router};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
