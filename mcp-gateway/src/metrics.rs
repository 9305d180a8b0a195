//! # Metrics and Monitoring
//!
//! Collects HTTP request counters/latency, per-provider health and error
//! counts, compression savings, and rate-limit rejections, and renders them
//! as Prometheus text exposition for `GET /metrics`.
//!
//! A single global collector is shared across the whole process via a
//! [`OnceLock`], mirroring how the rest of the request path reaches shared
//! state without threading it through every call site.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

static METRICS: OnceLock<Arc<MetricsCollector>> = OnceLock::new();

pub fn metrics() -> &'static Arc<MetricsCollector> {
    METRICS.get_or_init(|| Arc::new(MetricsCollector::new()))
}

#[derive(Debug, Default, Serialize)]
pub struct HttpMethodStats {
    pub requests_total: u64,
    pub status_2xx: u64,
    pub status_4xx: u64,
    pub status_5xx: u64,
    pub duration_ms_sum: f64,
}

#[derive(Debug, Default, Serialize)]
pub struct ProviderStats {
    pub requests_total: u64,
    pub errors_total: u64,
    pub average_latency_ms: f64,
    pub health_checks_total: u64,
    pub health_check_failures: u64,
}

/// Process-wide metrics collector. Every counter is either a plain atomic
/// or a `DashMap` keyed by label value, so increments never contend with
/// the request hot path beyond a single shard lock.
pub struct MetricsCollector {
    start_time: Instant,
    active_connections: AtomicU64,
    by_route: DashMap<(String, String), HttpMethodStats>,
    by_provider: DashMap<String, ProviderStats>,
    rate_limit_rejections: AtomicU64,
    compression_bytes_in: AtomicU64,
    compression_bytes_out: AtomicU64,
    compression_skipped: AtomicU64,
    admin_auth_success: AtomicU64,
    admin_auth_failure: AtomicU64,
}

impl MetricsCollector {
    fn new() -> Self {
        Self {
            start_time: Instant::now(),
            active_connections: AtomicU64::new(0),
            by_route: DashMap::new(),
            by_provider: DashMap::new(),
            rate_limit_rejections: AtomicU64::new(0),
            compression_bytes_in: AtomicU64::new(0),
            compression_bytes_out: AtomicU64::new(0),
            compression_skipped: AtomicU64::new(0),
            admin_auth_success: AtomicU64::new(0),
            admin_auth_failure: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self, method: &str, path: &str, status: u16, duration: Duration) {
        let mut entry = self
            .by_route
            .entry((method.to_string(), path.to_string()))
            .or_default();
        entry.requests_total += 1;
        entry.duration_ms_sum += duration.as_secs_f64() * 1000.0;
        match status {
            200..=299 => entry.status_2xx += 1,
            400..=499 => entry.status_4xx += 1,
            500..=599 => entry.status_5xx += 1,
            _ => {}
        }
    }

    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_provider_request(&self, provider_id: &str, success: bool, latency: Duration) {
        let mut entry = self.by_provider.entry(provider_id.to_string()).or_default();
        entry.requests_total += 1;
        if !success {
            entry.errors_total += 1;
        }
        let n = entry.requests_total as f64;
        let ms = latency.as_secs_f64() * 1000.0;
        entry.average_latency_ms = entry.average_latency_ms * (n - 1.0) / n + ms / n;
    }

    pub fn record_health_check(&self, provider_id: &str, healthy: bool) {
        let mut entry = self.by_provider.entry(provider_id.to_string()).or_default();
        entry.health_checks_total += 1;
        if !healthy {
            entry.health_check_failures += 1;
        }
    }

    pub fn record_rate_limit_rejection(&self) {
        self.rate_limit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compression(&self, original: usize, compressed: usize) {
        self.compression_bytes_in
            .fetch_add(original as u64, Ordering::Relaxed);
        self.compression_bytes_out
            .fetch_add(compressed as u64, Ordering::Relaxed);
    }

    pub fn record_compression_skipped(&self) {
        self.compression_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admin_auth(&self, success: bool) {
        if success {
            self.admin_auth_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.admin_auth_failure.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Renders all collected metrics as Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP gateway_uptime_seconds Seconds since process start\n");
        out.push_str("# TYPE gateway_uptime_seconds counter\n");
        out.push_str(&format!("gateway_uptime_seconds {}\n", self.uptime_seconds()));

        out.push_str("# HELP gateway_active_connections In-flight HTTP connections\n");
        out.push_str("# TYPE gateway_active_connections gauge\n");
        out.push_str(&format!(
            "gateway_active_connections {}\n",
            self.active_connections.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP gateway_http_requests_total HTTP requests by method, path and outcome\n");
        out.push_str("# TYPE gateway_http_requests_total counter\n");
        for entry in self.by_route.iter() {
            let (method, path) = entry.key();
            let stats = entry.value();
            out.push_str(&format!(
                "gateway_http_requests_total{{method=\"{method}\",path=\"{path}\"}} {}\n",
                stats.requests_total
            ));
            out.push_str(&format!(
                "gateway_http_request_duration_ms_sum{{method=\"{method}\",path=\"{path}\"}} {}\n",
                stats.duration_ms_sum
            ));
            out.push_str(&format!(
                "gateway_http_responses_total{{method=\"{method}\",path=\"{path}\",class=\"2xx\"}} {}\n",
                stats.status_2xx
            ));
            out.push_str(&format!(
                "gateway_http_responses_total{{method=\"{method}\",path=\"{path}\",class=\"4xx\"}} {}\n",
                stats.status_4xx
            ));
            out.push_str(&format!(
                "gateway_http_responses_total{{method=\"{method}\",path=\"{path}\",class=\"5xx\"}} {}\n",
                stats.status_5xx
            ));
        }

        out.push_str("# HELP gateway_provider_requests_total Dispatch attempts per provider\n");
        out.push_str("# TYPE gateway_provider_requests_total counter\n");
        for entry in self.by_provider.iter() {
            let id = entry.key();
            let stats = entry.value();
            out.push_str(&format!(
                "gateway_provider_requests_total{{provider=\"{id}\"}} {}\n",
                stats.requests_total
            ));
            out.push_str(&format!(
                "gateway_provider_errors_total{{provider=\"{id}\"}} {}\n",
                stats.errors_total
            ));
            out.push_str(&format!(
                "gateway_provider_latency_ms{{provider=\"{id}\"}} {}\n",
                stats.average_latency_ms
            ));
            out.push_str(&format!(
                "gateway_provider_health_checks_total{{provider=\"{id}\"}} {}\n",
                stats.health_checks_total
            ));
            out.push_str(&format!(
                "gateway_provider_health_check_failures_total{{provider=\"{id}\"}} {}\n",
                stats.health_check_failures
            ));
        }

        out.push_str("# HELP gateway_rate_limit_rejections_total Requests rejected by the rate limiter\n");
        out.push_str("# TYPE gateway_rate_limit_rejections_total counter\n");
        out.push_str(&format!(
            "gateway_rate_limit_rejections_total {}\n",
            self.rate_limit_rejections.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP gateway_compression_bytes_in_total Bytes seen by the compression stage before encoding\n");
        out.push_str("# TYPE gateway_compression_bytes_in_total counter\n");
        out.push_str(&format!(
            "gateway_compression_bytes_in_total {}\n",
            self.compression_bytes_in.load(Ordering::Relaxed)
        ));
        out.push_str("# HELP gateway_compression_bytes_out_total Bytes written after gzip encoding\n");
        out.push_str("# TYPE gateway_compression_bytes_out_total counter\n");
        out.push_str(&format!(
            "gateway_compression_bytes_out_total {}\n",
            self.compression_bytes_out.load(Ordering::Relaxed)
        ));
        out.push_str("# HELP gateway_compression_skipped_total Responses the compression stage chose not to encode\n");
        out.push_str("# TYPE gateway_compression_skipped_total counter\n");
        out.push_str(&format!(
            "gateway_compression_skipped_total {}\n",
            self.compression_skipped.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP gateway_admin_auth_total Admin API authentication attempts\n");
        out.push_str("# TYPE gateway_admin_auth_total counter\n");
        out.push_str(&format!(
            "gateway_admin_auth_total{{result=\"success\"}} {}\n",
            self.admin_auth_success.load(Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "gateway_admin_auth_total{{result=\"failure\"}} {}\n",
            self.admin_auth_failure.load(Ordering::Relaxed)
        ));

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_request_buckets_by_status_class() {
        let collector = MetricsCollector::new();
        collector.record_request("GET", "/mcp", 200, Duration::from_millis(10));
        collector.record_request("GET", "/mcp", 500, Duration::from_millis(10));
        let entry = collector
            .by_route
            .get(&("GET".to_string(), "/mcp".to_string()))
            .unwrap();
        assert_eq!(entry.status_2xx, 1);
        assert_eq!(entry.status_5xx, 1);
    }

    #[test]
    fn provider_latency_is_a_running_mean() {
        let collector = MetricsCollector::new();
        collector.record_provider_request("p0", true, Duration::from_millis(100));
        collector.record_provider_request("p0", true, Duration::from_millis(200));
        let entry = collector.by_provider.get("p0").unwrap();
        assert!((entry.average_latency_ms - 150.0).abs() < 1.0);
    }

    #[test]
    fn prometheus_output_includes_uptime_and_connections() {
        let collector = MetricsCollector::new();
        let text = collector.render_prometheus();
        assert!(text.contains("gateway_uptime_seconds"));
        assert!(text.contains("gateway_active_connections"));
    }
}
