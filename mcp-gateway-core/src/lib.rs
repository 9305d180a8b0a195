//! # MCP Gateway Core
//!
//! Domain logic for the MCP gateway: the service registry, health monitor,
//! load balancer with integrated circuit breaker, in-process plugin
//! runtime, and the JSON-RPC envelope types the gateway crate's HTTP
//! surface builds on.
//!
//! This crate performs no HTTP listening of its own — the gateway binary
//! owns the axum router, middleware pipeline and admin API, and calls into
//! the types here to do the actual dispatch work.

pub mod error;
pub mod health;
pub mod jsonrpc;
pub mod load_balancer;
pub mod plugin;
pub mod plugin_handler;
pub mod plugins;
pub mod registry;
pub mod types;

pub use error::{ErrorKind, LoadBalancerError, PluginError, ProviderDispatchError, RegistryError};
pub use health::{HealthCheckConfig, HealthMonitor, ProbeResult};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use load_balancer::{LoadBalancer, LoadBalancerConfig, SelectionCriteria, Strategy};
pub use plugin::{Plugin, PluginHealth};
pub use plugin_handler::{PluginHandler, PluginHandlerConfig, ResourceContent};
pub use registry::{RegistryConfig, ServiceRegistry};
pub use types::{
    CapabilitiesByType, HealthState, PermissionRecord, ProcessedCapabilities, Prompt,
    PromptArgument, Provider, ProviderCounters, ProviderRegistration, ProviderStatus,
    RateLimitSpec, Resource, SecurityBlock, Tool, PLUGIN_ENDPOINT,
};
