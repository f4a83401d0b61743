//! Capability router: the registered route tables, served.
//!
//! Merges the public and authenticated routes collected during module
//! registration into one `axum::Router`. Authenticated routes pass
//! through an identity-verifying layer before the module handler runs;
//! public routes do not. Path matching is exact (axum route syntax);
//! duplicate paths were already rejected at registration time.

use axum::Router;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use modulith_core::module::{Access, RouteTable};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::Authenticator;
use crate::error::AppError;

/// The HTTP handler type modules register through their `Context`.
///
/// A state-free axum `MethodRouter`; modules capture their own state
/// (view model, bus handle) in the handler closures.
pub type WebHandler = MethodRouter;

/// Build the serving router from the registered route table.
///
/// `authenticator` is the external collaborator verifying identity for
/// routes registered via `add_auth_http`; it is never consulted for
/// public routes.
#[must_use]
pub fn capability_router(
    routes: RouteTable<WebHandler>,
    authenticator: Arc<dyn Authenticator>,
) -> Router {
    let mut public = Router::new();
    let mut authenticated = Router::new();
    for route in routes.into_routes() {
        tracing::debug!(path = %route.path, module = %route.module, access = ?route.access, "mounting route");
        match route.access {
            Access::Public => public = public.route(&route.path, route.handler),
            Access::Authenticated => {
                authenticated = authenticated.route(&route.path, route.handler);
            }
        }
    }

    let authenticated = authenticated.route_layer(middleware::from_fn(
        move |request: Request, next: Next| {
            let authenticator = Arc::clone(&authenticator);
            async move { require_identity(authenticator, request, next).await }
        },
    ));

    public
        .merge(authenticated)
        .layer(TraceLayer::new_for_http())
}

/// Establish an identity or reject with 401, before the handler runs.
async fn require_identity(
    authenticator: Arc<dyn Authenticator>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticator.authenticate(request.headers()).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(error) => AppError::from(error).into_response(),
    }
}
