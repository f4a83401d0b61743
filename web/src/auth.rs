//! Authentication collaborator seam.
//!
//! Session/credential mechanics are an external collaborator's business;
//! the router only needs the narrow contract below: given the request
//! headers, either an [`Identity`] is established or the request is
//! rejected before any module handler runs.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;

/// Errors from the authentication collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No credentials were presented.
    #[error("missing credentials")]
    MissingCredentials,

    /// Credentials were presented but did not verify.
    #[error("invalid credentials")]
    InvalidCredentials,
}

/// The identity established for an authenticated request.
///
/// Injected into request extensions by the router's auth layer; module
/// handlers receive it as an axum extractor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// The authenticated user.
    pub user_id: Uuid,
}

/// Boxed future type returned by authenticators.
pub type AuthFuture<'a> = Pin<Box<dyn Future<Output = Result<Identity, AuthError>> + Send + 'a>>;

/// The external authentication collaborator.
///
/// Implementations verify whatever credential scheme the deployment
/// uses (sessions, tokens); the capability router invokes this before
/// any handler registered via `add_auth_http` and never for public
/// routes.
pub trait Authenticator: Send + Sync {
    /// Establish an identity from the request headers, or reject.
    fn authenticate<'a>(&'a self, headers: &'a HeaderMap) -> AuthFuture<'a>;
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("no identity established for this request"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_display() {
        assert_eq!(AuthError::MissingCredentials.to_string(), "missing credentials");
        assert_eq!(AuthError::InvalidCredentials.to_string(), "invalid credentials");
    }
}
