//! # Service Registry
//!
//! In-memory index of registered providers (plugin-backed or external
//! HTTP-backed): by id, by type, and an aggregated capability view per
//! type. Registration, lookup and capability aggregation are guarded by a
//! single read-write lock so readers see a consistent snapshot while
//! writers never hold the lock across I/O.

use crate::error::RegistryError;
use crate::types::{CapabilitiesByType, Provider, ProviderRegistration, ProviderStatus};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct RegistryState {
    services: HashMap<String, Provider>,
    by_type: HashMap<String, HashSet<String>>,
    capabilities: HashMap<String, CapabilitiesByType>,
}

pub struct RegistryConfig {
    pub discovery_interval: std::time::Duration,
    pub health_check_interval: std::time::Duration,
    pub cleanup_interval: std::time::Duration,
    pub inactive_service_timeout: std::time::Duration,
    pub max_failures: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            discovery_interval: std::time::Duration::from_secs(60),
            health_check_interval: std::time::Duration::from_secs(30),
            cleanup_interval: std::time::Duration::from_secs(120),
            inactive_service_timeout: std::time::Duration::from_secs(300),
            max_failures: 5,
        }
    }
}

pub struct ServiceRegistry {
    state: RwLock<RegistryState>,
    config: RegistryConfig,
}

impl ServiceRegistry {
    pub fn new(config: RegistryConfig) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(RegistryState::default()),
            config,
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn validate_registration(req: &ProviderRegistration) -> Result<(), RegistryError> {
        if req.name.is_empty() {
            return Err(RegistryError::MissingField { field: "name" });
        }
        if req.r#type.is_empty() {
            return Err(RegistryError::MissingField { field: "type" });
        }
        if req.version.is_empty() {
            return Err(RegistryError::MissingField { field: "version" });
        }
        if req.endpoint.is_empty() {
            return Err(RegistryError::MissingField { field: "endpoint" });
        }
        let ok = req.endpoint.starts_with("http://")
            || req.endpoint.starts_with("https://")
            || req.endpoint.starts_with("plugin://");
        if !ok {
            return Err(RegistryError::InvalidEndpoint {
                endpoint: req.endpoint.clone(),
            });
        }
        Ok(())
    }

    /// Synthesizes a stable provider id: `{type}-{name}-{registration-timestamp}`.
    fn synthesize_id(req: &ProviderRegistration, now: chrono::DateTime<Utc>) -> String {
        format!("{}-{}-{}", req.r#type, req.name, now.timestamp_millis())
    }

    /// `RegisterService(req)`. Validates required fields, rejects a
    /// duplicate id, and folds the provider into the type index and
    /// capability aggregate.
    pub async fn register(
        &self,
        req: ProviderRegistration,
    ) -> Result<Provider, RegistryError> {
        Self::validate_registration(&req)?;
        let now = Utc::now();
        let id = Self::synthesize_id(&req, now);

        let provider = Provider {
            id: id.clone(),
            name: req.name,
            r#type: req.r#type.clone(),
            version: req.version,
            endpoint: req.endpoint,
            protocol: req.protocol,
            tools: req.tools,
            resources: req.resources,
            prompts: req.prompts,
            status: ProviderStatus::Active,
            health: if req.endpoint_is_plugin() {
                crate::types::HealthState::Healthy
            } else {
                crate::types::HealthState::Unknown
            },
            registered_at: now,
            last_seen: now,
            last_health_check: None,
            counters: Default::default(),
            tags: req.tags,
            metadata: req.metadata,
            configuration: req.configuration,
            security: req.security,
        };

        let mut state = self.state.write().await;
        if state.services.contains_key(&id) {
            return Err(RegistryError::DuplicateId { id });
        }
        state
            .by_type
            .entry(req.r#type.clone())
            .or_default()
            .insert(id.clone());
        state
            .capabilities
            .entry(req.r#type)
            .or_default()
            .add(&provider);
        state.services.insert(id, provider.clone());
        Ok(provider)
    }

    /// `UnregisterService(id)`: marks draining, removes from indexes,
    /// decrements capability aggregates.
    pub async fn unregister(&self, id: &str) -> Result<(), RegistryError> {
        let mut state = self.state.write().await;
        let provider = state
            .services
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;
        provider.status = ProviderStatus::Draining;
        let provider = provider.clone();

        if let Some(set) = state.by_type.get_mut(&provider.r#type) {
            set.remove(id);
        }
        if let Some(caps) = state.capabilities.get_mut(&provider.r#type) {
            caps.remove_counts(&provider);
        }
        state.services.remove(id);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Option<Provider> {
        self.state.read().await.services.get(id).cloned()
    }

    pub async fn get_by_type(&self, r#type: &str) -> Vec<Provider> {
        let state = self.state.read().await;
        state
            .by_type
            .get(r#type)
            .map(|ids| ids.iter().filter_map(|id| state.services.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    /// `GetAllServices()` — defensive snapshot copy, never a live reference.
    pub async fn get_all(&self) -> Vec<Provider> {
        self.state.read().await.services.values().cloned().collect()
    }

    pub async fn get_healthy(&self) -> Vec<Provider> {
        self.state
            .read()
            .await
            .services
            .values()
            .filter(|p| p.is_selectable())
            .cloned()
            .collect()
    }

    pub async fn capabilities(&self) -> HashMap<String, CapabilitiesByType> {
        self.state.read().await.capabilities.clone()
    }

    pub async fn types(&self) -> Vec<String> {
        self.state.read().await.by_type.keys().cloned().collect()
    }

    /// Records the outcome of a health probe for one provider: updates
    /// `health`, `last_health_check`, and the consecutive-failure counter,
    /// applying the `max_failures` threshold to flip `status`.
    pub async fn record_health_result(
        &self,
        id: &str,
        healthy: bool,
        health_state: crate::types::HealthState,
    ) {
        let mut state = self.state.write().await;
        if let Some(provider) = state.services.get_mut(id) {
            provider.last_health_check = Some(Utc::now());
            provider.health = health_state;
            if healthy {
                provider.counters.consecutive_failures = 0;
                if provider.status == ProviderStatus::Unavailable {
                    provider.status = ProviderStatus::Active;
                }
            } else {
                provider.counters.consecutive_failures += 1;
                provider.counters.error_count += 1;
                if provider.counters.consecutive_failures >= self.config.max_failures {
                    provider.status = ProviderStatus::Unavailable;
                }
            }
        }
    }

    pub async fn touch(&self, id: &str) {
        let mut state = self.state.write().await;
        if let Some(provider) = state.services.get_mut(id) {
            provider.last_seen = Utc::now();
        }
    }

    /// `TriggerDiscovery()`: one discovery reconciliation pass. Rebuilds
    /// the by-type index and capability aggregates from the live service
    /// map, correcting any drift a partial write or crashed registration
    /// may have left behind. Returns the number of providers reconciled.
    pub async fn reconcile_discovery(&self) -> usize {
        let mut state = self.state.write().await;
        let mut by_type: HashMap<String, HashSet<String>> = HashMap::new();
        let mut capabilities: HashMap<String, CapabilitiesByType> = HashMap::new();
        for provider in state.services.values() {
            by_type
                .entry(provider.r#type.clone())
                .or_default()
                .insert(provider.id.clone());
            capabilities
                .entry(provider.r#type.clone())
                .or_default()
                .add(provider);
        }
        let count = state.services.len();
        state.by_type = by_type;
        state.capabilities = capabilities;
        count
    }

    /// Inactivity sweep: removes providers whose `last_seen` predates
    /// `inactive_service_timeout`.
    pub async fn sweep_inactive(&self) -> Vec<String> {
        let cutoff = Utc::now() - chrono::Duration::from_std(self.config.inactive_service_timeout).unwrap();
        let mut state = self.state.write().await;
        let stale: Vec<String> = state
            .services
            .values()
            .filter(|p| p.last_seen < cutoff)
            .map(|p| p.id.clone())
            .collect();
        for id in &stale {
            if let Some(provider) = state.services.remove(id) {
                if let Some(set) = state.by_type.get_mut(&provider.r#type) {
                    set.remove(id);
                }
                if let Some(caps) = state.capabilities.get_mut(&provider.r#type) {
                    caps.remove_counts(&provider);
                }
            }
        }
        stale
    }
}

impl ProviderRegistration {
    fn endpoint_is_plugin(&self) -> bool {
        self.endpoint.starts_with("plugin://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SecurityBlock;

    fn sample_registration(name: &str, r#type: &str) -> ProviderRegistration {
        ProviderRegistration {
            name: name.to_string(),
            r#type: r#type.to_string(),
            version: "1.0.0".to_string(),
            endpoint: "plugin://internal".to_string(),
            protocol: "mcp".to_string(),
            tools: vec![],
            resources: vec![],
            prompts: vec![],
            configuration: Default::default(),
            metadata: Default::default(),
            tags: vec![],
            security: SecurityBlock::default(),
        }
    }

    #[tokio::test]
    async fn register_then_unregister_restores_empty_state() {
        let registry = ServiceRegistry::new(RegistryConfig::default());
        let provider = registry
            .register(sample_registration("memory", "mcp_plugin"))
            .await
            .unwrap();
        assert_eq!(registry.get_all().await.len(), 1);

        registry.unregister(&provider.id).await.unwrap();
        assert_eq!(registry.get_all().await.len(), 0);
        let caps = registry.capabilities().await;
        assert_eq!(caps.get("mcp_plugin").unwrap().tool_count, 0);
    }

    #[tokio::test]
    async fn missing_required_field_is_rejected() {
        let registry = ServiceRegistry::new(RegistryConfig::default());
        let mut req = sample_registration("memory", "mcp_plugin");
        req.name = String::new();
        let err = registry.register(req).await.unwrap_err();
        assert!(matches!(err, RegistryError::MissingField { field: "name" }));
    }

    #[tokio::test]
    async fn invalid_endpoint_scheme_is_rejected() {
        let registry = ServiceRegistry::new(RegistryConfig::default());
        let mut req = sample_registration("memory", "mcp_plugin");
        req.endpoint = "ftp://example.com".to_string();
        let err = registry.register(req).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidEndpoint { .. }));
    }

    #[tokio::test]
    async fn reconcile_discovery_rebuilds_capability_aggregate() {
        let registry = ServiceRegistry::new(RegistryConfig::default());
        registry
            .register(sample_registration("memory", "mcp_plugin"))
            .await
            .unwrap();
        registry
            .register(sample_registration("vcs", "mcp_plugin"))
            .await
            .unwrap();

        let reconciled = registry.reconcile_discovery().await;
        assert_eq!(reconciled, 2);
        assert_eq!(registry.types().await, vec!["mcp_plugin".to_string()]);
        assert_eq!(registry.get_by_type("mcp_plugin").await.len(), 2);
    }

    #[tokio::test]
    async fn healthy_services_is_subset_of_all_services() {
        let registry = ServiceRegistry::new(RegistryConfig::default());
        registry
            .register(sample_registration("memory", "mcp_plugin"))
            .await
            .unwrap();
        let healthy = registry.get_healthy().await;
        let all = registry.get_all().await;
        assert!(healthy.len() <= all.len());
        for p in &healthy {
            assert_eq!(p.status, ProviderStatus::Active);
            assert_eq!(p.health, crate::types::HealthState::Healthy);
        }
    }
}
