//! # Gateway Error Type
//!
//! The top-level error the HTTP surface deals in. `GatewayError` pairs a
//! `GatewayErrorKind` (the thiserror enum wrapping every core-crate leaf
//! error plus the gateway's own transport-level failures) with an
//! [`ErrorContext`] — service/operation/context/suggestions/trace id/
//! timestamp — so a caller or a log line has enough to act on, not just a
//! message string. Knows how to render itself both as a JSON-RPC error
//! object and as an admin-REST HTTP response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use mcp_gateway_core::{ErrorKind, LoadBalancerError, PluginError, ProviderDispatchError, RegistryError};
use serde_json::Value;
use uuid::Uuid;

use mcp_gateway_core::JsonRpcError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayErrorKind {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    LoadBalancer(#[from] LoadBalancerError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Dispatch(#[from] ProviderDispatchError),

    #[error("malformed JSON-RPC request: {0}")]
    MalformedRequest(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("authorization denied: {0}")]
    Authorization(String),

    #[error("rate limit exceeded")]
    RateLimit,

    #[error("admin authentication failed")]
    AdminAuth,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayErrorKind {
    fn kind(&self) -> ErrorKind {
        match self {
            GatewayErrorKind::Registry(e) => e.kind(),
            GatewayErrorKind::LoadBalancer(e) => e.kind(),
            GatewayErrorKind::Plugin(e) => e.kind(),
            GatewayErrorKind::Dispatch(e) => e.kind(),
            GatewayErrorKind::MalformedRequest(_) => ErrorKind::Validation,
            GatewayErrorKind::Authentication(_) => ErrorKind::Authentication,
            GatewayErrorKind::Authorization(_) => ErrorKind::Authorization,
            GatewayErrorKind::RateLimit => ErrorKind::RateLimit,
            GatewayErrorKind::AdminAuth => ErrorKind::Authentication,
            GatewayErrorKind::Internal(_) => ErrorKind::Internal,
        }
    }

    fn http_status(&self) -> StatusCode {
        match self {
            GatewayErrorKind::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            GatewayErrorKind::Authentication(_) => StatusCode::UNAUTHORIZED,
            GatewayErrorKind::AdminAuth => StatusCode::UNAUTHORIZED,
            GatewayErrorKind::Authorization(_) => StatusCode::FORBIDDEN,
            GatewayErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            GatewayErrorKind::Registry(RegistryError::NotFound { .. }) => StatusCode::NOT_FOUND,
            GatewayErrorKind::Registry(RegistryError::DuplicateId { .. }) => StatusCode::CONFLICT,
            GatewayErrorKind::Registry(_) => StatusCode::BAD_REQUEST,
            GatewayErrorKind::LoadBalancer(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayErrorKind::Plugin(PluginError::NotFound { .. })
            | GatewayErrorKind::Plugin(PluginError::ToolNotFound { .. })
            | GatewayErrorKind::Plugin(PluginError::ResourceNotFound { .. })
            | GatewayErrorKind::Plugin(PluginError::PromptNotFound { .. }) => StatusCode::NOT_FOUND,
            GatewayErrorKind::Plugin(PluginError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            GatewayErrorKind::Plugin(PluginError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            GatewayErrorKind::Plugin(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayErrorKind::Dispatch(_) => StatusCode::BAD_GATEWAY,
            GatewayErrorKind::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Rich error envelope attached to every `GatewayError`: carries enough
/// context for a caller to retry intelligently or a dashboard to display
/// something actionable, rather than a bare message string.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub service: Option<String>,
    pub operation: Option<String>,
    pub context: Value,
    pub suggestions: Vec<String>,
    pub trace_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            service: None,
            operation: None,
            context: Value::Null,
            suggestions: Vec::new(),
            trace_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub context: ErrorContext,
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.kind)
    }
}

impl<E> From<E> for GatewayError
where
    GatewayErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        Self {
            kind: GatewayErrorKind::from(err),
            context: ErrorContext::default(),
        }
    }
}

impl GatewayError {
    pub fn malformed_request(message: impl Into<String>) -> Self {
        GatewayErrorKind::MalformedRequest(message.into()).into()
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        GatewayErrorKind::Authentication(message.into()).into()
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        GatewayErrorKind::Authorization(message.into()).into()
    }

    pub fn rate_limit() -> Self {
        GatewayErrorKind::RateLimit.into()
    }

    pub fn admin_auth() -> Self {
        GatewayErrorKind::AdminAuth.into()
    }

    pub fn internal(message: impl Into<String>) -> Self {
        GatewayErrorKind::Internal(message.into()).into()
    }

    /// Attaches the name of the subsystem that raised this error.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.context.service = Some(service.into());
        self
    }

    /// Attaches the operation being performed when this error was raised.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(suggestion.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind.kind()
    }

    pub fn retryable(&self) -> bool {
        self.kind().retryable()
    }

    fn http_status(&self) -> StatusCode {
        self.kind.http_status()
    }

    /// Renders this error as a JSON-RPC error object, embedding the kind and
    /// this error's trace id for correlation with server-side logs.
    pub fn to_jsonrpc(&self) -> JsonRpcError {
        let mut err = JsonRpcError::from_kind(self.kind(), self.to_string());
        err.data = Some(serde_json::json!({
            "kind": self.kind().as_str(),
            "retryable": self.retryable(),
            "trace_id": self.context.trace_id.to_string(),
        }));
        err
    }
}

/// Admin-REST rendering. JSON-RPC responses over HTTP use their own 200-OK
/// envelope via [`GatewayError::to_jsonrpc`]; this impl is only reached by
/// the admin API's handlers, which return `Result<_, GatewayError>`
/// directly.
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        let body = serde_json::json!({
            "error": {
                "kind": self.kind().as_str(),
                "message": self.to_string(),
                "retryable": self.retryable(),
                "trace_id": self.context.trace_id.to_string(),
                "service": self.context.service,
                "operation": self.context.operation,
            }
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_maps_to_429() {
        let err = GatewayError::rate_limit();
        assert_eq!(err.http_status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.kind().jsonrpc_code(), -32003);
    }

    #[test]
    fn registry_not_found_maps_to_404() {
        let err: GatewayError = RegistryError::NotFound { id: "x".to_string() }.into();
        assert_eq!(err.http_status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn to_jsonrpc_embeds_kind_and_trace_id() {
        let err = GatewayError::internal("boom");
        let rpc = err.to_jsonrpc();
        assert_eq!(rpc.code, -32603);
        let data = rpc.data.unwrap();
        assert_eq!(data.get("trace_id").unwrap(), &err.context.trace_id.to_string());
    }

    #[test]
    fn with_service_and_operation_are_carried_into_the_response_body() {
        let err = GatewayError::authorization("nope")
            .with_service("admin")
            .with_operation("put_config");
        assert_eq!(err.context.service.as_deref(), Some("admin"));
        assert_eq!(err.context.operation.as_deref(), Some("put_config"));
    }
}
