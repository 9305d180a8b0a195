//! # RBAC and Principal Resolution
//!
//! Resolves the calling principal's per-plugin permissions from the
//! `Authorization: Bearer <jwt>` header, validating signature, expiry,
//! issuer and audience. Requests with no token fall back to an anonymous
//! principal when the configuration allows it.

use crate::config::RbacConfig;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use mcp_gateway_core::{PermissionRecord, ProcessedCapabilities};
use serde::{Deserialize, Serialize};

/// Claims carried by gateway-issued or upstream-issued access tokens.
///
/// `capabilities` maps plugin name (or `"*"` for a wildcard grant) to the
/// permission flags the bearer is authorized for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: u64,
    pub iat: u64,
    #[serde(default)]
    pub capabilities: std::collections::HashMap<String, PermissionRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum RbacError {
    #[error("missing authorization token")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

/// Resolves a principal's [`ProcessedCapabilities`] from an optional
/// bearer token, per the configured RBAC policy.
pub struct RbacEngine {
    config: RbacConfig,
}

impl RbacEngine {
    pub fn new(config: RbacConfig) -> Self {
        Self { config }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Resolves capabilities for a request carrying `Authorization: Bearer
    /// <token>` (or no token at all). Token validation checks signature,
    /// expiry (with configured clock-skew tolerance), issuer and audience.
    pub fn resolve(&self, authorization_header: Option<&str>) -> Result<ProcessedCapabilities, RbacError> {
        if !self.config.enabled {
            return Ok(ProcessedCapabilities::wildcard(PermissionRecord::full()));
        }

        let token = authorization_header.and_then(|h| h.strip_prefix("Bearer "));
        let Some(token) = token else {
            return if self.config.allow_anonymous {
                Ok(ProcessedCapabilities::wildcard(PermissionRecord {
                    can_read: true,
                    can_write: false,
                    can_execute: false,
                    can_admin: false,
                }))
            } else {
                Err(RbacError::MissingToken)
            };
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.audience.clone()]);
        validation.set_issuer(&[self.config.issuer.clone()]);
        validation.leeway = self.config.clock_skew_tolerance.as_secs();

        let data = decode::<GatewayClaims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| RbacError::InvalidToken(e.to_string()))?;

        Ok(ProcessedCapabilities {
            permissions: data.claims.capabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn config(enabled: bool) -> RbacConfig {
        RbacConfig {
            enabled,
            jwt_secret: "test-secret".to_string(),
            issuer: "mcp-gateway".to_string(),
            audience: "mcp-gateway-clients".to_string(),
            clock_skew_tolerance: std::time::Duration::from_secs(60),
            allow_anonymous: true,
        }
    }

    fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    #[test]
    fn disabled_rbac_grants_full_wildcard() {
        let engine = RbacEngine::new(config(false));
        let caps = engine.resolve(None).unwrap();
        assert!(caps.permissions.get("*").unwrap().can_admin);
    }

    #[test]
    fn missing_token_falls_back_to_anonymous_when_allowed() {
        let engine = RbacEngine::new(config(true));
        let caps = engine.resolve(None).unwrap();
        let grant = caps.permissions.get("*").unwrap();
        assert!(grant.can_read);
        assert!(!grant.can_write);
    }

    #[test]
    fn missing_token_rejected_when_anonymous_disallowed() {
        let mut cfg = config(true);
        cfg.allow_anonymous = false;
        let engine = RbacEngine::new(cfg);
        assert!(matches!(engine.resolve(None), Err(RbacError::MissingToken)));
    }

    #[test]
    fn valid_token_decodes_capabilities() {
        let cfg = config(true);
        let mut capabilities = std::collections::HashMap::new();
        capabilities.insert("memory".to_string(), PermissionRecord::full());
        let claims = GatewayClaims {
            sub: "user-1".to_string(),
            iss: cfg.issuer.clone(),
            aud: cfg.audience.clone(),
            exp: now() + 3600,
            iat: now(),
            capabilities,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
        )
        .unwrap();

        let engine = RbacEngine::new(cfg);
        let header = format!("Bearer {token}");
        let caps = engine.resolve(Some(&header)).unwrap();
        assert!(caps.permissions.get("memory").unwrap().can_admin);
    }

    #[test]
    fn expired_token_is_rejected() {
        let cfg = config(true);
        let claims = GatewayClaims {
            sub: "user-1".to_string(),
            iss: cfg.issuer.clone(),
            aud: cfg.audience.clone(),
            exp: now() - 7200,
            iat: now() - 7300,
            capabilities: Default::default(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
        )
        .unwrap();

        let engine = RbacEngine::new(cfg);
        let header = format!("Bearer {token}");
        assert!(matches!(
            engine.resolve(Some(&header)),
            Err(RbacError::InvalidToken(_))
        ));
    }
}
