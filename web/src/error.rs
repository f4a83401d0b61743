//! HTTP error mapping for module handlers.
//!
//! Bridges the core error taxonomy to HTTP responses. The one mapping
//! that matters most: a failed append ("the action did not happen",
//! 503) must never look like a degraded consumer ("the action happened
//! but a module lagged", 202) - see [`publish_response`].

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use modulith_core::bus::{PublishError, PublishReceipt};
use modulith_core::store::EventStoreError;
use serde::Serialize;
use serde_json::json;

use crate::auth::AuthError;

/// Application error type for web handlers.
///
/// Wraps domain errors with an HTTP status and a stable machine-readable
/// code; implements `IntoResponse` so handlers can `?`-propagate.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: String,
    /// Internal error for logging, never exposed to the client.
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            message.into(),
            "UNAUTHORIZED".to_string(),
        )
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            message.into(),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error: the triggering action did
    /// not happen and may be retried.
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_ERROR".to_string(),
        )
    }

    /// The HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

/// JSON body of an error response.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(source) = &self.source {
            tracing::error!(code = %self.code, error = %source, "request failed");
        } else if self.status.is_server_error() {
            tracing::error!(code = %self.code, message = %self.message, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(error: AuthError) -> Self {
        Self::unauthorized(error.to_string())
    }
}

impl From<EventStoreError> for AppError {
    fn from(error: EventStoreError) -> Self {
        match error {
            EventStoreError::Unavailable(_) | EventStoreError::Cancelled => {
                Self::service_unavailable("the event was not recorded; retry the request")
                    .with_source(error.into())
            }
            EventStoreError::Serialization(_) => {
                Self::internal("event could not be encoded").with_source(error.into())
            }
        }
    }
}

/// Map a publish outcome to the response its error taxonomy requires.
///
/// - Clean receipt → 200 with the assigned sequence
/// - Receipt with handler failures, or an interrupted dispatch → 202:
///   the event durably happened, some consumers are degraded
/// - Append failure → 503: the action did not happen
#[must_use]
pub fn publish_response(result: Result<PublishReceipt, PublishError>) -> Response {
    match result {
        Ok(receipt) if receipt.is_clean() => (
            StatusCode::OK,
            Json(json!({
                "sequence": receipt.record.sequence.value(),
                "event_id": receipt.record.event_id.as_uuid(),
            })),
        )
            .into_response(),
        Ok(receipt) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "sequence": receipt.record.sequence.value(),
                "event_id": receipt.record.event_id.as_uuid(),
                "degraded_consumers": receipt.handler_failures.len(),
            })),
        )
            .into_response(),
        Err(PublishError::DispatchIncomplete { sequence, source }) => {
            tracing::error!(sequence = sequence.value(), error = %source, "dispatch incomplete");
            (
                StatusCode::ACCEPTED,
                Json(json!({
                    "sequence": sequence.value(),
                    "degraded_consumers": "unknown",
                })),
            )
                .into_response()
        }
        Err(PublishError::Store(error)) => AppError::from(error).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modulith_core::bus::HandlerFailure;
    use modulith_core::event::{Event, EventRecord, PendingEvent};
    use modulith_core::stream::{Sequence, StreamId};
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Ping;

    impl Event for Ping {
        fn event_type(&self) -> &'static str {
            "Ping.v1"
        }
    }

    #[allow(clippy::expect_used)] // Panics: Test will fail if serialization fails
    fn record(sequence: u64) -> EventRecord {
        let pending = PendingEvent::from_event(&Ping, StreamId::new_random())
            .expect("serialization should succeed");
        EventRecord::from_pending(pending, Sequence::new(sequence))
    }

    fn failure(module: &str, sequence: u64) -> HandlerFailure {
        HandlerFailure {
            module: module.to_string(),
            sequence: Sequence::new(sequence),
            event_type: "Ping.v1".to_string(),
            message: "view wedged".to_string(),
        }
    }

    #[allow(clippy::expect_used)] // Panics: Test will fail if the body is not JSON
    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    #[test]
    fn store_unavailable_maps_to_503() {
        let error = AppError::from(EventStoreError::Unavailable("quorum lost".to_string()));
        assert_eq!(error.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn cancelled_maps_to_503() {
        let error = AppError::from(EventStoreError::Cancelled);
        assert_eq!(error.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn auth_error_maps_to_401() {
        let error = AppError::from(AuthError::InvalidCredentials);
        assert_eq!(error.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn clean_receipt_maps_to_200_with_the_sequence() {
        let response = publish_response(Ok(PublishReceipt {
            record: record(7),
            handler_failures: Vec::new(),
        }));

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["sequence"], json!(7));
        assert!(body.get("degraded_consumers").is_none());
    }

    #[tokio::test]
    async fn degraded_consumers_map_to_202_with_the_failure_count() {
        let response = publish_response(Ok(PublishReceipt {
            record: record(7),
            handler_failures: vec![failure("members", 7), failure("audit", 7)],
        }));

        // The event durably happened; 202, never 200 and never 5xx.
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["sequence"], json!(7));
        assert_eq!(body["degraded_consumers"], json!(2));
    }

    #[tokio::test]
    async fn interrupted_dispatch_maps_to_202() {
        let response = publish_response(Err(PublishError::DispatchIncomplete {
            sequence: Sequence::new(7),
            source: EventStoreError::Unavailable("read failed".to_string()),
        }));

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["sequence"], json!(7));
    }

    #[tokio::test]
    async fn failed_append_maps_to_503() {
        let response = publish_response(Err(PublishError::Store(
            EventStoreError::Unavailable("quorum lost".to_string()),
        )));

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], json!("SERVICE_UNAVAILABLE"));
    }
}
