use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::background::panic_message;
use crate::error::AppError;
use crate::rate_limiter::ClientLimiter;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Logging middleware for request/response tracking
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = Uuid::new_v4().to_string();

    info!(
        target: "greenlight::middleware",
        %request_id,
        method = %method,
        uri = %uri,
        "Incoming request"
    );

    let mut response = next.run(request).await;

    info!(
        target: "greenlight::middleware",
        %request_id,
        method = %method,
        uri = %uri,
        status = %response.status(),
        "Request completed"
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Admission check run before every handler. Answers 429 with `Retry-After`
/// when the client has no token left.
pub async fn rate_limit(
    State(limiter): State<Arc<ClientLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if !limiter.config().enabled {
        return next.run(request).await;
    }

    let identity = match client_identity(&request) {
        Ok(identity) => identity,
        Err(err) => return err.into_response(),
    };

    if let Err(wait) = limiter.check(&identity) {
        warn!(client = %identity, uri = %request.uri(), retry_after = ?wait, "Rate limit exceeded");
        let mut response = AppError::RateLimitExceeded.into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs(wait)));
        return response;
    }

    next.run(request).await
}

/// Whole seconds for `Retry-After`, rounded up and never zero.
fn retry_after_secs(wait: Duration) -> u64 {
    wait.as_secs_f64().ceil().max(1.0) as u64
}

/// The peer IP of the connection. Forwarding headers are not trusted.
fn client_identity(request: &Request) -> Result<String, AppError> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .ok_or_else(|| AppError::IdentityResolution("request carries no peer address".to_string()))
}

/// Response for a handler that panicked. The connection is closed after it.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic_message(payload.as_ref());
    let mut response = AppError::Internal(format!("handler panicked: {detail}")).into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_client_identity_from_connect_info() {
        let mut request = Request::new(axum::body::Body::empty());
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 1], 54321))));

        assert_eq!(client_identity(&request).unwrap(), "192.168.1.1");
    }

    #[test]
    fn test_forwarded_headers_are_ignored() {
        let mut request = Request::new(axum::body::Body::empty());
        request
            .headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([203, 0, 113, 1], 80))));

        assert_eq!(client_identity(&request).unwrap(), "203.0.113.1");
    }

    #[test]
    fn test_missing_peer_address_is_identity_error() {
        let request = Request::new(axum::body::Body::empty());
        assert!(matches!(
            client_identity(&request),
            Err(AppError::IdentityResolution(_))
        ));
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(500)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_panic_response_closes_connection() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONNECTION], "close");
    }
}
