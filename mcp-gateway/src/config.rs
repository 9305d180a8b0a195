//! # Configuration Management Module
//!
//! Loading, validation, and environment variable overrides for all gateway
//! settings: HTTP server, registry/health/load-balancer tuning, RBAC, rate
//! limiting, compression, CORS, admin auth, logging and metrics.
//!
//! ## Configuration File Example
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 3000
//! timeout = 30
//! max_body_size = 10485760
//!
//! [server.cors]
//! enabled = true
//! allowed_origins = ["*"]
//!
//! [rbac]
//! enabled = true
//! jwt_secret = "your-jwt-secret"
//!
//! [rate_limit]
//! requests_per_second = 50
//!
//! [admin]
//! api_key_header = "X-Admin-API-Key"
//! api_key = "your-admin-key"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub registry: RegistryTuning,
    pub load_balancer: LoadBalancerTuning,
    pub rbac: RbacConfig,
    pub rate_limit: RateLimitConfig,
    pub compression: CompressionConfig,
    pub admin: AdminConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    pub max_body_size: usize,
    pub cors: CorsConfig,
    #[serde(with = "duration_secs")]
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    #[serde(default)]
    pub max_age: Option<Duration>,
}

/// Tuning knobs for the Service Registry's background loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryTuning {
    #[serde(with = "duration_secs")]
    pub discovery_interval: Duration,
    #[serde(with = "duration_secs")]
    pub health_check_interval: Duration,
    #[serde(with = "duration_secs")]
    pub cleanup_interval: Duration,
    #[serde(with = "duration_secs")]
    pub inactive_service_timeout: Duration,
    pub max_failures: u32,
    #[serde(with = "duration_secs")]
    pub health_probe_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancerTuning {
    pub strategy: String,
    pub healthy_threshold: f64,
    #[serde(with = "duration_secs")]
    pub circuit_breaker_timeout: Duration,
    pub circuit_breaker_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RbacConfig {
    pub enabled: bool,
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    #[serde(with = "duration_secs")]
    pub clock_skew_tolerance: Duration,
    /// Whether a request with no token is granted anonymous (read-only)
    /// capabilities, or rejected outright.
    pub allow_anonymous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_second: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub min_body_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub api_key_header: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(host) = env::var("GATEWAY_HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }
        if let Ok(port_str) = env::var("GATEWAY_PORT") {
            let port: u16 = port_str
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid GATEWAY_PORT: {port_str}"))?;
            self.server.port = port;
        }
        if let Ok(level) = env::var("GATEWAY_LOG_LEVEL") {
            let valid = ["trace", "debug", "info", "warn", "error"];
            if !valid.contains(&level.as_str()) {
                return Err(anyhow::anyhow!("invalid GATEWAY_LOG_LEVEL: {level}"));
            }
            self.logging.level = level;
        }
        if let Ok(secret) = env::var("GATEWAY_JWT_SECRET") {
            if !secret.is_empty() {
                self.rbac.jwt_secret = secret;
            }
        }
        if let Ok(key) = env::var("GATEWAY_ADMIN_API_KEY") {
            self.admin.api_key = Some(key);
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("server host cannot be empty"));
        }
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("server port must be between 1 and 65535"));
        }
        if self.server.max_body_size == 0 {
            return Err(anyhow::anyhow!("server max_body_size cannot be 0"));
        }
        if self.server.cors.enabled && self.server.cors.allowed_origins.is_empty() {
            return Err(anyhow::anyhow!("CORS enabled but no allowed origins specified"));
        }
        if self.registry.max_failures == 0 {
            return Err(anyhow::anyhow!("registry max_failures cannot be 0"));
        }
        if self.load_balancer.healthy_threshold <= 0.0 || self.load_balancer.healthy_threshold > 1.0
        {
            return Err(anyhow::anyhow!(
                "load_balancer healthy_threshold must be in (0.0, 1.0]"
            ));
        }
        if mcp_gateway_core::Strategy::parse(&self.load_balancer.strategy).is_none() {
            return Err(anyhow::anyhow!(
                "unknown load balancer strategy: {}",
                self.load_balancer.strategy
            ));
        }
        if self.rbac.enabled && self.rbac.jwt_secret.is_empty() {
            return Err(anyhow::anyhow!("rbac enabled but jwt_secret is empty"));
        }
        if self.rate_limit.enabled && self.rate_limit.requests_per_second == 0 {
            return Err(anyhow::anyhow!(
                "rate_limit enabled but requests_per_second is 0"
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                timeout: Duration::from_secs(30),
                max_body_size: 1024 * 1024,
                cors: CorsConfig {
                    enabled: true,
                    allowed_origins: vec!["*".to_string()],
                    allowed_methods: vec!["GET".to_string(), "POST".to_string()],
                    allowed_headers: vec!["*".to_string()],
                    max_age: Some(Duration::from_secs(3600)),
                },
                shutdown_timeout: Duration::from_secs(30),
            },
            registry: RegistryTuning {
                discovery_interval: Duration::from_secs(60),
                health_check_interval: Duration::from_secs(30),
                cleanup_interval: Duration::from_secs(120),
                inactive_service_timeout: Duration::from_secs(300),
                max_failures: 5,
                health_probe_timeout: Duration::from_secs(5),
            },
            load_balancer: LoadBalancerTuning {
                strategy: "round_robin".to_string(),
                healthy_threshold: 0.95,
                circuit_breaker_timeout: Duration::from_secs(30),
                circuit_breaker_enabled: true,
            },
            rbac: RbacConfig {
                enabled: false,
                jwt_secret: String::new(),
                issuer: "mcp-gateway".to_string(),
                audience: "mcp-gateway-clients".to_string(),
                clock_skew_tolerance: Duration::from_secs(60),
                allow_anonymous: true,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                requests_per_second: 50,
            },
            compression: CompressionConfig {
                enabled: true,
                min_body_size: 1024,
            },
            admin: AdminConfig {
                api_key_header: "X-Admin-API-Key".to_string(),
                api_key: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
            metrics: MetricsConfig { enabled: true },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PluginConfigMap(pub HashMap<String, serde_json::Value>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_port_fails_validation() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_strategy_fails_validation() {
        let mut config = Config::default();
        config.load_balancer.strategy = "bogus".to_string();
        assert!(config.validate().is_err());
    }
}
