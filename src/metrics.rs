use crate::{ProxyError, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Proxy and discovery counters, owned by the process and shared by handle.
/// Registered against an instance-level registry, not the global one.
pub struct ProxyMetrics {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub upstream_errors_total: IntCounter,
    pub backends: IntGauge,
    pub discovery_restarts_total: IntCounter,
}

impl ProxyMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                "jolokia_proxy_requests_total",
                "Proxied requests by response status",
            ),
            &["status"],
        )
        .map_err(|e| ProxyError::Metrics(e.to_string()))?;

        let upstream_errors_total = IntCounter::new(
            "jolokia_proxy_upstream_errors_total",
            "Requests that failed against the backend (unreachable or timed out)",
        )
        .map_err(|e| ProxyError::Metrics(e.to_string()))?;

        let backends = IntGauge::new(
            "jolokia_proxy_backends",
            "Routable backends in the current registry snapshot",
        )
        .map_err(|e| ProxyError::Metrics(e.to_string()))?;

        let discovery_restarts_total = IntCounter::new(
            "jolokia_proxy_discovery_restarts_total",
            "Times the pod watch stream was restarted",
        )
        .map_err(|e| ProxyError::Metrics(e.to_string()))?;

        registry
            .register(Box::new(requests_total.clone()))
            .map_err(|e| ProxyError::Metrics(e.to_string()))?;
        registry
            .register(Box::new(upstream_errors_total.clone()))
            .map_err(|e| ProxyError::Metrics(e.to_string()))?;
        registry
            .register(Box::new(backends.clone()))
            .map_err(|e| ProxyError::Metrics(e.to_string()))?;
        registry
            .register(Box::new(discovery_restarts_total.clone()))
            .map_err(|e| ProxyError::Metrics(e.to_string()))?;

        Ok(Self {
            registry,
            requests_total,
            upstream_errors_total,
            backends,
            discovery_restarts_total,
        })
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| ProxyError::Metrics(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| ProxyError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_registered_metrics() {
        let metrics = ProxyMetrics::new().unwrap();
        metrics.requests_total.with_label_values(&["200"]).inc();
        metrics.backends.set(3);

        let text = metrics.render().unwrap();
        assert!(text.contains("jolokia_proxy_requests_total{status=\"200\"} 1"));
        assert!(text.contains("jolokia_proxy_backends 3"));
    }

    #[test]
    fn test_instances_are_independent() {
        let a = ProxyMetrics::new().unwrap();
        let b = ProxyMetrics::new().unwrap();
        a.upstream_errors_total.inc();

        assert_eq!(a.upstream_errors_total.get(), 1);
        assert_eq!(b.upstream_errors_total.get(), 0);
    }
}
