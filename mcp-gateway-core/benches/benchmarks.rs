use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mcp_gateway_core::{
    HealthState, LoadBalancer, LoadBalancerConfig, Provider, ProviderCounters, ProviderStatus,
    SecurityBlock, SelectionCriteria, Strategy,
};
use std::collections::HashMap;

fn sample_provider(id: &str) -> Provider {
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
        registered_at: chrono::Utc::now(),
        last_seen: chrono::Utc::now(),
        last_health_check: None,
        counters: ProviderCounters::default(),
        tags: vec![],
        metadata: HashMap::new(),
        configuration: HashMap::new(),
        security: SecurityBlock::default(),
    }
}

fn bench_round_robin_selection(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let lb = LoadBalancer::new(LoadBalancerConfig {
        strategy: Strategy::RoundRobin,
        ..Default::default()
    });
    let candidates: Vec<Provider> = (0..16).map(|i| sample_provider(&format!("p{i}"))).collect();
    let criteria = SelectionCriteria::default();

    c.bench_function("load_balancer_round_robin_select", |b| {
        b.iter(|| {
            rt.block_on(async {
                let _ = lb.select(black_box(&candidates), black_box(&criteria)).await;
            });
        });
    });
}

fn bench_weighted_selection(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let lb = LoadBalancer::new(LoadBalancerConfig {
        strategy: Strategy::Weighted,
        ..Default::default()
    });
    let candidates: Vec<Provider> = (0..16).map(|i| sample_provider(&format!("p{i}"))).collect();
    let criteria = SelectionCriteria::default();

    c.bench_function("load_balancer_weighted_select", |b| {
        b.iter(|| {
            rt.block_on(async {
                let _ = lb.select(black_box(&candidates), black_box(&criteria)).await;
            });
        });
    });
}

fn bench_record_success_and_failure(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let lb = LoadBalancer::new(LoadBalancerConfig::default());
    let candidates = vec![sample_provider("p0")];
    let criteria = SelectionCriteria::default();

    c.bench_function("load_balancer_record_outcome", |b| {
        b.iter(|| {
            rt.block_on(async {
                let _ = lb.select(&candidates, &criteria).await;
                lb.record_success("p0", std::time::Duration::from_millis(12))
                    .await;
            });
        });
    });
}

criterion_group!(
    benches,
    bench_round_robin_selection,
    bench_weighted_selection,
    bench_record_success_and_failure
);
criterion_main!(benches);
