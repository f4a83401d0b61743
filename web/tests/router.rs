//! Capability router behavior: public vs. authenticated dispatch.

use axum::Json;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::routing::get;
use modulith_core::module::{Context, Module, Registry, RegistrationError};
use modulith_memory::MemoryEventStore;
use modulith_web::auth::{AuthError, AuthFuture, Authenticator, Identity};
use modulith_web::{WebHandler, capability_router};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Authenticator that trusts an `x-user-id` header carrying a UUID.
struct HeaderAuthenticator;

impl Authenticator for HeaderAuthenticator {
    fn authenticate<'a>(&'a self, headers: &'a HeaderMap) -> AuthFuture<'a> {
        Box::pin(async move {
            let value = headers
                .get("x-user-id")
                .ok_or(AuthError::MissingCredentials)?;
            let user_id = value
                .to_str()
                .ok()
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or(AuthError::InvalidCredentials)?;
            Ok(Identity { user_id })
        })
    }
}

struct PingModule;

impl Module<WebHandler> for PingModule {
    fn name(&self) -> &str {
        "ping"
    }

    fn register(&self, ctx: &mut Context<'_, WebHandler>) -> Result<(), RegistrationError> {
        ctx.add_http_handler("/ping", get(|| async { Json(json!({"pong": true})) }))?;
        ctx.add_auth_http(
            "/whoami",
            get(|identity: Identity| async move {
                Json(json!({"user_id": identity.user_id}))
            }),
        )?;
        Ok(())
    }
}

#[allow(clippy::expect_used)] // Panics: Test will fail if wiring fails
fn server() -> axum_test::TestServer {
    let mut registry: Registry<WebHandler> = Registry::new(Arc::new(MemoryEventStore::new()));
    registry
        .register(&PingModule)
        .expect("registration should succeed");
    let app = registry.build();
    let router = capability_router(app.routes, Arc::new(HeaderAuthenticator));
    axum_test::TestServer::new(router).expect("server should build")
}

#[tokio::test]
async fn public_route_needs_no_identity() {
    let server = server();
    let response = server.get("/ping").await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn auth_route_rejects_missing_credentials() {
    let server = server();
    let response = server.get("/whoami").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn auth_route_rejects_garbage_credentials() {
    let server = server();
    let response = server
        .get("/whoami")
        .add_header(
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_static("not-a-uuid"),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[allow(clippy::expect_used)] // Panics: Test will fail if the response shape changes
async fn auth_route_passes_identity_to_the_handler() {
    let server = server();
    let user_id = Uuid::new_v4();
    let response = server
        .get("/whoami")
        .add_header(
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_str(&user_id.to_string()).expect("uuid is a valid header value"),
        )
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["user_id"], json!(user_id));
}

#[tokio::test]
async fn unknown_path_is_404() {
    let server = server();
    let response = server.get("/nope").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}
