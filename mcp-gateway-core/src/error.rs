//! # Core Error Types
//!
//! Error types for the registry, load balancer, plugin runtime and RBAC
//! engine. These are the leaf errors the gateway crate wraps into
//! `GatewayError` and ultimately serializes as JSON-RPC error objects.
//!
//! Every error here carries the `ErrorKind` it maps to, so the gateway
//! crate never has to re-derive a JSON-RPC `code` from a bare string.

use thiserror::Error;

/// The fixed error-kind taxonomy from the error handling design.
///
/// Each kind maps to exactly one JSON-RPC error code and, where relevant,
/// one HTTP status for the admin REST surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    RateLimit,
    Timeout,
    Unavailable,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    /// JSON-RPC 2.0 error code for this kind.
    ///
    /// Standard JSON-RPC codes (-32700..-32600) are reserved for protocol
    /// framing errors handled outside this enum (parse failures, malformed
    /// envelopes); application-level kinds live in the -32000..-32099
    /// server-error range per the spec.
    pub fn jsonrpc_code(&self) -> i64 {
        match self {
            ErrorKind::Validation => -32602,
            ErrorKind::Authentication => -32001,
            ErrorKind::Authorization => -32002,
            ErrorKind::RateLimit => -32003,
            ErrorKind::Timeout => -32004,
            ErrorKind::Unavailable => -32005,
            ErrorKind::NotFound => -32006,
            ErrorKind::Conflict => -32007,
            ErrorKind::Internal => -32603,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Authorization => "authorization",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::Unavailable)
    }
}

/// Registry-level failures: registration validation, duplicate ids, lookup
/// misses.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid endpoint scheme: {endpoint}")]
    InvalidEndpoint { endpoint: String },

    #[error("provider id already registered: {id}")]
    DuplicateId { id: String },

    #[error("provider not found: {id}")]
    NotFound { id: String },

    #[error("provider failed health check on registration: {id}")]
    RegistrationHealthCheckFailed { id: String },
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::MissingField { .. } | RegistryError::InvalidEndpoint { .. } => {
                ErrorKind::Validation
            }
            RegistryError::DuplicateId { .. } => ErrorKind::Conflict,
            RegistryError::NotFound { .. } => ErrorKind::NotFound,
            RegistryError::RegistrationHealthCheckFailed { .. } => ErrorKind::Unavailable,
        }
    }
}

/// Load-balancer selection failures.
#[derive(Error, Debug)]
pub enum LoadBalancerError {
    #[error("no healthy candidates available for type {provider_type}")]
    NoCandidates { provider_type: String },

    #[error("provider circuit is open: {id}")]
    CircuitOpen { id: String },
}

impl LoadBalancerError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Unavailable
    }
}

/// In-process plugin dispatch failures.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("plugin not found: {name}")]
    NotFound { name: String },

    #[error("tool not found on plugin {plugin}: {tool}")]
    ToolNotFound { plugin: String, tool: String },

    #[error("resource not found on plugin {plugin}: {resource}")]
    ResourceNotFound { plugin: String, resource: String },

    #[error("prompt not found on plugin {plugin}: {prompt}")]
    PromptNotFound { plugin: String, prompt: String },

    #[error("plugin {plugin} execution failed: {message}")]
    ExecutionFailed { plugin: String, message: String },

    #[error("plugin {plugin} call timed out")]
    Timeout { plugin: String },

    #[error("invalid resource uri: {uri}")]
    InvalidUri { uri: String },

    #[error("plugin {plugin} denied: {message}")]
    Forbidden { plugin: String, message: String },
}

impl PluginError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PluginError::NotFound { .. }
            | PluginError::ToolNotFound { .. }
            | PluginError::ResourceNotFound { .. }
            | PluginError::PromptNotFound { .. } => ErrorKind::NotFound,
            PluginError::ExecutionFailed { .. } => ErrorKind::Internal,
            PluginError::Timeout { .. } => ErrorKind::Timeout,
            PluginError::InvalidUri { .. } => ErrorKind::Validation,
            PluginError::Forbidden { .. } => ErrorKind::Authorization,
        }
    }
}

/// Errors surfaced while dispatching to an external (HTTP) MCP provider.
#[derive(Error, Debug)]
pub enum ProviderDispatchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned status {status}")]
    Status { status: u16 },

    #[error("provider response could not be parsed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("provider call timed out")]
    Timeout,
}

impl ProviderDispatchError {
    /// Classifies a dispatch failure the way the health monitor and load
    /// balancer both need to: timeout / connection / status / unknown.
    pub fn classify(&self) -> &'static str {
        match self {
            ProviderDispatchError::Timeout => "timeout",
            ProviderDispatchError::Transport(e) if e.is_timeout() => "timeout",
            ProviderDispatchError::Transport(e) if e.is_connect() => "connection",
            ProviderDispatchError::Status { .. } => "status",
            _ => "unknown",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderDispatchError::Timeout => ErrorKind::Timeout,
            ProviderDispatchError::Transport(e) if e.is_timeout() => ErrorKind::Timeout,
            _ => ErrorKind::Unavailable,
        }
    }
}
