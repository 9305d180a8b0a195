//! # HTTP Middleware Pipeline
//!
//! Seven ordered stages applied to every request on the main router, plus a
//! separate admin-auth layer scoped only to the nested `/admin` subrouter:
//!
//! 1. Recovery — `tower_http::catch_panic::CatchPanicLayer`, applied as the
//!    outermost layer in `server::build_router` (not an `from_fn` stage
//!    here, since a panic inside a later `from_fn` middleware must still be
//!    caught by this one).
//! 2. Logging — debug-level start, info-level completion with status and
//!    latency. Never reads the body.
//! 3. Metrics — per-route request/status/duration counters, active
//!    connection gauge.
//! 4. Rate limit — per-client sliding window, fails open on internal error.
//! 5. Compression — hand-rolled gzip via `async-compression`'s Tokio
//!    encoder; skipped for small/already-compressed/metrics/health bodies.
//! 6. CORS — short-circuits `OPTIONS` with a bare 200.
//! 7. Admin auth — nested-router-only, compares a configured header.
//!
//! Order matters: rate limiting must see the real client id before
//! compression touches the body, and CORS must run after rate limiting so a
//! rate-limited preflight still gets CORS headers.

pub mod compression;
pub mod rate_limit;

use crate::metrics::metrics as metrics_collector;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};
use uuid::Uuid;

use crate::server::AppState;

/// Stage 2. `debug!` on entry (method, path), `info!` on completion
/// (status, latency_ms). Assigns a request id used for log correlation.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    tracing::debug!(%request_id, %method, %path, "request started");

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    tracing::info!(
        %request_id,
        %method,
        %path,
        status = response.status().as_u16(),
        latency_ms = elapsed.as_secs_f64() * 1000.0,
        "request completed"
    );
    response
}

/// Stage 3. Skips `/metrics` itself to avoid the exposition endpoint
/// inflating its own counters on every scrape.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if path == "/metrics" {
        return next.run(request).await;
    }
    let method = request.method().to_string();
    metrics_collector().connection_opened();
    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();
    metrics_collector().connection_closed();
    metrics_collector().record_request(&method, &path, response.status().as_u16(), elapsed);
    response
}

/// Stage 4. Resolves the client id from `X-Forwarded-For` → `X-Real-IP` →
/// the connection's socket address, then delegates to
/// [`rate_limit::RateLimiter`]. A limiter-internal failure fails open
/// (allows the request) rather than blocking traffic on a bookkeeping bug.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.rate_limit.enabled {
        return next.run(request).await;
    }

    let client_id = client_identifier(&request);
    match state.rate_limiter.check(&client_id) {
        Ok(()) => next.run(request).await,
        Err(rate_limit::RateLimitExceeded {
            retry_after_secs,
            reset_epoch_secs,
        }) => {
            metrics_collector().record_rate_limit_rejection();
            (
                StatusCode::TOO_MANY_REQUESTS,
                [
                    ("X-RateLimit-Limit", state.rate_limiter.limit().to_string()),
                    ("X-RateLimit-Reset", reset_epoch_secs.to_string()),
                    ("Retry-After", retry_after_secs.to_string()),
                ],
                axum::Json(serde_json::json!({
                    "error": "rate_limit_exceeded",
                    "message": "rate limit exceeded",
                    "retry_after": retry_after_secs,
                    "reset_time": reset_epoch_secs,
                })),
            )
                .into_response()
        }
    }
}

fn client_identifier(request: &Request) -> String {
    if let Some(value) = request.headers().get("x-forwarded-for") {
        if let Ok(text) = value.to_str() {
            if let Some(first) = text.split(',').next() {
                return first.trim().to_string();
            }
        }
    }
    if let Some(value) = request.headers().get("x-real-ip") {
        if let Ok(text) = value.to_str() {
            return text.trim().to_string();
        }
    }
    request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Stage 5. Delegates to [`compression::maybe_compress`], which decides per
/// response whether gzip is worth it (body size, content type, accepted
/// encodings) before touching anything.
pub async fn compression_middleware(request: Request, next: Next) -> Response {
    let accepts_gzip = request
        .headers()
        .get("accept-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("gzip"))
        .unwrap_or(false);
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    if !accepts_gzip || path == "/metrics" || path == "/health" {
        metrics_collector().record_compression_skipped();
        return response;
    }
    compression::maybe_compress(response).await
}

/// Stage 6. `tower_http::cors::CorsLayer` already implements
/// origin-reflection, wildcard and preflight short-circuiting, so it's used
/// directly as a `Layer` in `server::build_router` rather than reimplemented
/// as an `from_fn` stage.
pub fn build_cors_layer(config: &crate::config::CorsConfig) -> CorsLayer {
    let mut layer = CorsLayer::new();
    layer = if config.allowed_origins.iter().any(|o| o == "*") {
        layer.allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        layer.allow_origin(origins)
    };
    let methods: Vec<Method> = config
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();
    layer = layer.allow_methods(methods);
    layer = layer.allow_headers(tower_http::cors::Any);
    if let Some(max_age) = config.max_age {
        layer = layer.max_age(max_age);
    }
    layer
}

/// Stage 7. Scoped only to the `/admin` nested router (see
/// `server::build_admin_router`) — never applied to `/mcp` or the health
/// endpoints.
pub async fn admin_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = &state.config.admin.api_key else {
        return next.run(request).await;
    };
    let header_name = &state.config.admin.api_key_header;
    let provided = request
        .headers()
        .get(header_name.as_str())
        .and_then(|v| v.to_str().ok());

    if provided == Some(expected.as_str()) {
        metrics_collector().record_admin_auth(true);
        next.run(request).await
    } else {
        metrics_collector().record_admin_auth(false);
        (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({ "error": "authentication_required" })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderMap;

    fn headers_with(name: &str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
        headers
    }

    #[test]
    fn client_identifier_prefers_forwarded_for() {
        let mut request = Request::builder().body(Body::empty()).unwrap();
        *request.headers_mut() = headers_with("x-forwarded-for", "203.0.113.5, 10.0.0.1");
        assert_eq!(client_identifier(&request), "203.0.113.5");
    }

    #[test]
    fn client_identifier_falls_back_to_real_ip() {
        let mut request = Request::builder().body(Body::empty()).unwrap();
        *request.headers_mut() = headers_with("x-real-ip", "198.51.100.9");
        assert_eq!(client_identifier(&request), "198.51.100.9");
    }
}
