//! # Health Monitor
//!
//! Periodic liveness probing for registered providers. Plugin-backed
//! providers never induce outbound I/O — their health is taken directly
//! from the plugin's in-process `HealthCheck` result. External providers
//! are probed over HTTP with a short timeout and keep-alives disabled.

use crate::plugin::{Plugin, PluginHealth};
use crate::types::{HealthState, Provider};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    pub timeout: Duration,
    pub default_path: String,
    pub expected_statuses: Vec<u16>,
    pub healthy_values: Vec<String>,
    pub expected_content: Option<String>,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            default_path: "/health".to_string(),
            expected_statuses: vec![200, 204],
            healthy_values: vec!["ok".to_string(), "healthy".to_string(), "up".to_string()],
            expected_content: None,
        }
    }
}

pub enum ProbeAuth {
    None,
    ApiKey { header: String, value: String },
    Bearer { token: String },
    Basic { username: String, password: String },
}

pub struct HealthMonitor {
    client: reqwest::Client,
    config: HealthCheckConfig,
}

pub struct ProbeResult {
    pub healthy: bool,
    pub state: HealthState,
    pub error_class: Option<&'static str>,
}

impl HealthMonitor {
    pub fn new(config: HealthCheckConfig) -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .timeout(config.timeout)
            .build()
            .expect("reqwest client for health probes");
        Self { client, config }
    }

    fn probe_url(endpoint: &str, path: &str, metadata: &HashMap<String, Value>) -> String {
        if endpoint.contains("://") {
            format!("{}{}", endpoint.trim_end_matches('/'), path)
        } else {
            let scheme = if metadata.get("tls").and_then(Value::as_bool).unwrap_or(false) {
                "https"
            } else {
                "http"
            };
            format!("{scheme}://{endpoint}{path}")
        }
    }

    fn auth_from_metadata(metadata: &HashMap<String, Value>) -> ProbeAuth {
        if let Some(key) = metadata.get("api_key").and_then(Value::as_str) {
            let header = metadata
                .get("api_key_header")
                .and_then(Value::as_str)
                .unwrap_or("X-API-Key")
                .to_string();
            return ProbeAuth::ApiKey {
                header,
                value: key.to_string(),
            };
        }
        if let Some(token) = metadata.get("bearer_token").and_then(Value::as_str) {
            return ProbeAuth::Bearer {
                token: token.to_string(),
            };
        }
        if let (Some(u), Some(p)) = (
            metadata.get("basic_username").and_then(Value::as_str),
            metadata.get("basic_password").and_then(Value::as_str),
        ) {
            return ProbeAuth::Basic {
                username: u.to_string(),
                password: p.to_string(),
            };
        }
        ProbeAuth::None
    }

    /// Probes a single external (non-plugin) provider.
    pub async fn probe_external(&self, provider: &Provider) -> ProbeResult {
        let path = provider
            .metadata
            .get("health_path")
            .and_then(Value::as_str)
            .unwrap_or(&self.config.default_path);
        let url = Self::probe_url(&provider.endpoint, path, &provider.metadata);

        let mut request = self.client.get(&url);
        request = match Self::auth_from_metadata(&provider.metadata) {
            ProbeAuth::None => request,
            ProbeAuth::ApiKey { header, value } => request.header(header, value),
            ProbeAuth::Bearer { token } => request.bearer_auth(token),
            ProbeAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        };

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return ProbeResult {
                    healthy: false,
                    state: HealthState::Unhealthy,
                    error_class: Some("timeout"),
                }
            }
            Err(e) if e.is_connect() => {
                return ProbeResult {
                    healthy: false,
                    state: HealthState::Unhealthy,
                    error_class: Some("connection"),
                }
            }
            Err(_) => {
                return ProbeResult {
                    healthy: false,
                    state: HealthState::Unhealthy,
                    error_class: Some("unknown"),
                }
            }
        };

        let status = response.status().as_u16();
        if !self.config.expected_statuses.contains(&status) {
            return ProbeResult {
                healthy: false,
                state: HealthState::Unhealthy,
                error_class: Some("status"),
            };
        }

        let bytes = response
            .bytes()
            .await
            .map(|b| b.slice(0..b.len().min(4096)))
            .unwrap_or_default();

        if bytes.first() == Some(&b'{') {
            if let Ok(body) = serde_json::from_slice::<Value>(&bytes) {
                if let Some(status_field) = body.get("status").and_then(Value::as_str) {
                    let matches = self
                        .config
                        .healthy_values
                        .iter()
                        .any(|v| v.eq_ignore_ascii_case(status_field));
                    if !matches {
                        return ProbeResult {
                            healthy: false,
                            state: HealthState::Degraded,
                            error_class: Some("status"),
                        };
                    }
                }
            }
        }

        if let Some(expected) = &self.config.expected_content {
            let text = String::from_utf8_lossy(&bytes);
            if !text.contains(expected.as_str()) {
                return ProbeResult {
                    healthy: false,
                    state: HealthState::Degraded,
                    error_class: Some("status"),
                };
            }
        }

        ProbeResult {
            healthy: true,
            state: HealthState::Healthy,
            error_class: None,
        }
    }

    /// Probes an in-process plugin directly, with no outbound I/O.
    pub async fn probe_plugin(&self, plugin: &Arc<dyn Plugin>) -> ProbeResult {
        match plugin.health_check().await {
            PluginHealth::Healthy => ProbeResult {
                healthy: true,
                state: HealthState::Healthy,
                error_class: None,
            },
            PluginHealth::Degraded => ProbeResult {
                healthy: false,
                state: HealthState::Degraded,
                error_class: None,
            },
            PluginHealth::Unhealthy => ProbeResult {
                healthy: false,
                state: HealthState::Unhealthy,
                error_class: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_url_uses_http_when_endpoint_has_no_scheme() {
        let metadata = HashMap::new();
        let url = HealthMonitor::probe_url("localhost:9000", "/health", &metadata);
        assert_eq!(url, "http://localhost:9000/health");
    }

    #[test]
    fn probe_url_prefers_https_when_tls_flagged() {
        let mut metadata = HashMap::new();
        metadata.insert("tls".to_string(), Value::Bool(true));
        let url = HealthMonitor::probe_url("service.internal", "/health", &metadata);
        assert_eq!(url, "https://service.internal/health");
    }

    #[test]
    fn probe_url_appends_path_when_scheme_present() {
        let metadata = HashMap::new();
        let url = HealthMonitor::probe_url("http://host:8080/", "/health", &metadata);
        assert_eq!(url, "http://host:8080/health");
    }
}
