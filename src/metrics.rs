//! Prometheus counters exposed on `GET /metrics`.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Gateway counters, registered on a private registry.
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,

    /// Chat completion requests, labelled by `mode` ("stream" or "complete").
    pub requests: IntCounterVec,

    /// Backend calls that failed (transport, status, worker panic).
    pub backend_failures: IntCounter,

    /// Content chunks written to event streams.
    pub stream_chunks: IntCounter,

    /// Backend clients constructed by the client cache.
    pub client_builds: IntCounter,
}

impl GatewayMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("gateway_requests_total", "Chat completion requests"),
            &["mode"],
        )?;
        let backend_failures =
            IntCounter::new("gateway_backend_failures_total", "Failed backend calls")?;
        let stream_chunks =
            IntCounter::new("gateway_stream_chunks_total", "Streamed content chunks")?;
        let client_builds =
            IntCounter::new("gateway_client_builds_total", "Backend clients constructed")?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(backend_failures.clone()))?;
        registry.register(Box::new(stream_chunks.clone()))?;
        registry.register(Box::new(client_builds.clone()))?;

        Ok(Self {
            registry,
            requests,
            backend_failures,
            stream_chunks,
            client_builds,
        })
    }

    /// Render every registered metric in the text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_counters() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.requests.with_label_values(&["stream"]).inc();
        metrics.stream_chunks.inc_by(3);

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"gateway_requests_total{mode="stream"} 1"#));
        assert!(text.contains("gateway_stream_chunks_total 3"));
    }
}
