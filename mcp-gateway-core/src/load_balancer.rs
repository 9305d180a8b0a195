//! # Load Balancer
//!
//! Strategy-driven provider selection with an integrated circuit breaker.
//! `ServiceState` carries both the selection bookkeeping (active/total
//! requests, running latency average, `last_used`) and the breaker state
//! (`open`, `opened_at`) for one provider; the breaker is folded directly
//! into this type rather than wrapped in a separate generic type, since its
//! open/close transitions are driven by the same request counters the
//! selection pass already reads.

use crate::error::LoadBalancerError;
use crate::types::Provider;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    RoundRobin,
    LeastConnections,
    Weighted,
    Hash,
    Random,
}

impl Strategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "round_robin" => Some(Strategy::RoundRobin),
            "least_connections" => Some(Strategy::LeastConnections),
            "weighted" => Some(Strategy::Weighted),
            "hash" => Some(Strategy::Hash),
            "random" => Some(Strategy::Random),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadBalancerConfig {
    pub strategy: Strategy,
    pub healthy_threshold: f64,
    pub circuit_breaker_timeout: Duration,
    pub circuit_breaker_enabled: bool,
    pub min_requests_for_ratio: u64,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::RoundRobin,
            healthy_threshold: 0.95,
            circuit_breaker_timeout: Duration::from_secs(30),
            circuit_breaker_enabled: true,
            min_requests_for_ratio: 10,
        }
    }
}

/// Per-provider selection and circuit-breaker bookkeeping. Counters live
/// behind a plain `Mutex` since every mutation here is a short, synchronous
/// arithmetic update — no await is ever held across the lock.
struct ServiceState {
    weight: u32,
    active_requests: u64,
    total_requests: u64,
    success_requests: u64,
    failed_requests: u64,
    average_latency_ms: f64,
    last_used: Instant,
    open: bool,
    opened_at: Option<Instant>,
}

impl ServiceState {
    fn new(weight: u32) -> Self {
        Self {
            weight: weight.max(1),
            active_requests: 0,
            total_requests: 0,
            success_requests: 0,
            failed_requests: 0,
            average_latency_ms: 0.0,
            last_used: Instant::now() - Duration::from_secs(3600),
            open: false,
            opened_at: None,
        }
    }

    fn success_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            self.success_requests as f64 / self.total_requests as f64
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct SelectionCriteria {
    pub load_balancing: Option<String>,
    pub preferred_region: Option<String>,
}

pub struct LoadBalancer {
    states: RwLock<HashMap<String, Mutex<ServiceState>>>,
    config: LoadBalancerConfig,
    round_robin_cursor: Mutex<()>,
}

impl LoadBalancer {
    pub fn new(config: LoadBalancerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
            round_robin_cursor: Mutex::new(()),
        }
    }

    async fn ensure_state(&self, id: &str, weight: u32) {
        let states = self.states.read().await;
        if states.contains_key(id) {
            return;
        }
        drop(states);
        let mut states = self.states.write().await;
        states
            .entry(id.to_string())
            .or_insert_with(|| Mutex::new(ServiceState::new(weight)));
    }

    /// `SelectService(candidates, criteria)`.
    pub async fn select(
        &self,
        candidates: &[Provider],
        criteria: &SelectionCriteria,
    ) -> Result<Provider, LoadBalancerError> {
        let provider_type = candidates
            .first()
            .map(|p| p.r#type.clone())
            .unwrap_or_default();

        for provider in candidates {
            self.ensure_state(&provider.id, 1).await;
        }

        let mut eligible = Vec::new();
        {
            let states = self.states.read().await;
            for provider in candidates {
                if !provider.is_selectable() {
                    continue;
                }
                let Some(state) = states.get(&provider.id) else {
                    continue;
                };
                let mut state = state.lock().unwrap();

                if state.open {
                    let elapsed = state
                        .opened_at
                        .map(|t| t.elapsed())
                        .unwrap_or(Duration::MAX);
                    if elapsed >= self.config.circuit_breaker_timeout {
                        state.open = false;
                        state.opened_at = None;
                    } else {
                        continue;
                    }
                }

                if state.total_requests > self.config.min_requests_for_ratio
                    && state.success_ratio() < self.config.healthy_threshold
                {
                    continue;
                }

                eligible.push(provider.clone());
            }
        }

        if eligible.is_empty() {
            return Err(LoadBalancerError::NoCandidates { provider_type });
        }

        let chosen = self.apply_strategy(&eligible, criteria).await;

        let states = self.states.read().await;
        if let Some(state) = states.get(&chosen.id) {
            let mut state = state.lock().unwrap();
            state.active_requests += 1;
            state.total_requests += 1;
            state.last_used = Instant::now();
        }

        Ok(chosen)
    }

    async fn apply_strategy(
        &self,
        eligible: &[Provider],
        criteria: &SelectionCriteria,
    ) -> Provider {
        match self.config.strategy {
            Strategy::RoundRobin => {
                let _guard = self.round_robin_cursor.lock().unwrap();
                let states = self.states.read().await;
                let mut best_idx = 0;
                let mut best_last_used = Instant::now() + Duration::from_secs(3600);
                for (idx, p) in eligible.iter().enumerate() {
                    if let Some(state) = states.get(&p.id) {
                        let last_used = state.lock().unwrap().last_used;
                        if last_used < best_last_used {
                            best_last_used = last_used;
                            best_idx = idx;
                        }
                    }
                }
                eligible[best_idx].clone()
            }
            Strategy::LeastConnections => {
                let states = self.states.read().await;
                let mut best_idx = 0;
                let mut best_active = u64::MAX;
                for (idx, p) in eligible.iter().enumerate() {
                    if let Some(state) = states.get(&p.id) {
                        let active = state.lock().unwrap().active_requests;
                        if active < best_active {
                            best_active = active;
                            best_idx = idx;
                        }
                    }
                }
                eligible[best_idx].clone()
            }
            Strategy::Weighted => {
                let states = self.states.read().await;
                let weights: Vec<u32> = eligible
                    .iter()
                    .map(|p| {
                        states
                            .get(&p.id)
                            .map(|s| s.lock().unwrap().weight)
                            .unwrap_or(1)
                    })
                    .collect();
                let total: u32 = weights.iter().sum();
                let pick = rand::random::<u32>() % total.max(1);
                let mut cumulative = 0u32;
                for (idx, w) in weights.iter().enumerate() {
                    cumulative += w;
                    if pick < cumulative {
                        return eligible[idx].clone();
                    }
                }
                eligible[eligible.len() - 1].clone()
            }
            Strategy::Hash => {
                let key = criteria
                    .load_balancing
                    .clone()
                    .or_else(|| criteria.preferred_region.clone())
                    .unwrap_or_else(|| "default".to_string());
                let hash = fnv1a(key.as_bytes());
                let idx = (hash as usize) % eligible.len();
                eligible[idx].clone()
            }
            Strategy::Random => {
                let idx = (rand::random::<u32>() as usize) % eligible.len();
                eligible[idx].clone()
            }
        }
    }

    /// `RecordSuccess(provider, duration)`.
    pub async fn record_success(&self, id: &str, duration: Duration) {
        let states = self.states.read().await;
        if let Some(state) = states.get(id) {
            let mut state = state.lock().unwrap();
            state.active_requests = state.active_requests.saturating_sub(1);
            state.success_requests += 1;
            let n = state.total_requests.max(1) as f64;
            let d = duration.as_secs_f64() * 1000.0;
            state.average_latency_ms = state.average_latency_ms * (n - 1.0) / n + d / n;
        }
    }

    /// `RecordFailure(provider, err)`. Returns `true` if this call opened
    /// the circuit.
    pub async fn record_failure(&self, id: &str) -> bool {
        let states = self.states.read().await;
        let Some(state) = states.get(id) else {
            return false;
        };
        let mut state = state.lock().unwrap();
        state.active_requests = state.active_requests.saturating_sub(1);
        state.failed_requests += 1;

        if !self.config.circuit_breaker_enabled || state.open {
            return false;
        }
        if state.total_requests <= self.config.min_requests_for_ratio {
            return false;
        }
        let error_rate = 1.0 - state.success_ratio();
        if error_rate > 1.0 - self.config.healthy_threshold {
            state.open = true;
            state.opened_at = Some(Instant::now());
            return true;
        }
        false
    }

    /// `ResetCircuitBreaker(id)` (admin).
    pub async fn reset_circuit_breaker(&self, id: &str) -> bool {
        let states = self.states.read().await;
        if let Some(state) = states.get(id) {
            let mut state = state.lock().unwrap();
            state.open = false;
            state.opened_at = None;
            true
        } else {
            false
        }
    }

    pub async fn is_circuit_open(&self, id: &str) -> bool {
        let states = self.states.read().await;
        states
            .get(id)
            .map(|s| s.lock().unwrap().open)
            .unwrap_or(false)
    }

    /// `CleanupStaleState`: drops load-balancer state for providers no
    /// longer present in the registry.
    pub async fn cleanup_stale_state(&self, live_ids: &[String]) {
        let mut states = self.states.write().await;
        states.retain(|id, _| live_ids.contains(id));
    }
}

fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c9dc5;
    for b in bytes {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(0x01000193);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HealthState, ProviderStatus, SecurityBlock};
    use chrono::Utc;

    fn provider(id: &str) -> Provider {
        Provider {
            id: id.to_string(),
            name: id.to_string(),
            r#type: "mcp_plugin".to_string(),
            version: "1.0.0".to_string(),
            endpoint: "plugin://internal".to_string(),
            protocol: "mcp".to_string(),
            tools: vec![],
            resources: vec![],
            prompts: vec![],
            status: ProviderStatus::Active,
            health: HealthState::Healthy,
            registered_at: Utc::now(),
            last_seen: Utc::now(),
            last_health_check: None,
            counters: Default::default(),
            tags: vec![],
            metadata: Default::default(),
            configuration: Default::default(),
            security: SecurityBlock::default(),
        }
    }

    #[tokio::test]
    async fn round_robin_picks_oldest_last_used_first() {
        let lb = LoadBalancer::new(LoadBalancerConfig {
            strategy: Strategy::RoundRobin,
            ..Default::default()
        });
        let candidates = vec![provider("a"), provider("b")];
        let criteria = SelectionCriteria::default();

        let first = lb.select(&candidates, &criteria).await.unwrap();
        let second = lb.select(&candidates, &criteria).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn circuit_opens_after_eleven_requests_below_threshold() {
        let lb = LoadBalancer::new(LoadBalancerConfig::default());
        let candidates = vec![provider("only")];
        let criteria = SelectionCriteria::default();

        for _ in 0..11 {
            lb.select(&candidates, &criteria).await.unwrap();
            lb.record_failure("only").await;
        }
        assert!(lb.is_circuit_open("only").await);

        let err = lb.select(&candidates, &criteria).await.unwrap_err();
        assert!(matches!(err, LoadBalancerError::NoCandidates { .. }));
    }

    #[tokio::test]
    async fn first_ten_failures_never_open_circuit_early() {
        let lb = LoadBalancer::new(LoadBalancerConfig::default());
        let candidates = vec![provider("only")];
        let criteria = SelectionCriteria::default();

        for _ in 0..10 {
            lb.select(&candidates, &criteria).await.unwrap();
            lb.record_failure("only").await;
        }
        assert!(!lb.is_circuit_open("only").await);
    }

    #[tokio::test]
    async fn reset_circuit_breaker_reopens_selection() {
        let lb = LoadBalancer::new(LoadBalancerConfig::default());
        let candidates = vec![provider("only")];
        let criteria = SelectionCriteria::default();

        for _ in 0..11 {
            lb.select(&candidates, &criteria).await.unwrap();
            lb.record_failure("only").await;
        }
        assert!(lb.is_circuit_open("only").await);
        lb.reset_circuit_breaker("only").await;
        assert!(!lb.is_circuit_open("only").await);
        assert!(lb.select(&candidates, &criteria).await.is_ok());
    }

    #[tokio::test]
    async fn least_connections_prefers_idle_provider() {
        let lb = LoadBalancer::new(LoadBalancerConfig {
            strategy: Strategy::LeastConnections,
            ..Default::default()
        });
        let candidates = vec![provider("busy"), provider("idle")];
        let criteria = SelectionCriteria::default();

        lb.select(&[candidates[0].clone()], &criteria).await.unwrap();
        let chosen = lb.select(&candidates, &criteria).await.unwrap();
        assert_eq!(chosen.id, "idle");
    }
}
