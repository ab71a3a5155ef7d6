//! Prometheus metrics.
//!
//! A [`Metrics`] value owns its own [`Registry`]. It is built once at startup
//! and handed to the HTTP layer; nothing registers into the process-global
//! default registry.

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use thiserror::Error;

const NAMESPACE: &str = "svc";
const SUBSYSTEM: &str = "wallets_processing";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to register metric: {0}")]
    Register(#[from] prometheus::Error),

    #[error("failed to encode metrics: {0}")]
    Encode(String),
}

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// Request latency by matched route template and status code.
    pub response_time: HistogramVec,
    /// Mutating requests by idempotency outcome (`executed`, `already_completed`, `failed`).
    pub idempotent_requests: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let response_time = register_histogram_vec_with_registry!(
            HistogramOpts::new("response_time_seconds", "Request processing time in seconds")
                .namespace(NAMESPACE)
                .subsystem(SUBSYSTEM),
            &["route", "status_code"],
            registry
        )?;

        let idempotent_requests = register_int_counter_vec_with_registry!(
            Opts::new("idempotent_requests_total", "Mutating requests by idempotency outcome")
                .namespace(NAMESPACE)
                .subsystem(SUBSYSTEM),
            &["outcome"],
            registry
        )?;

        Ok(Self {
            registry,
            response_time,
            idempotent_requests,
        })
    }

    pub fn observe_response(&self, route: &str, status_code: u16, seconds: f64) {
        let status_code = status_code.to_string();
        self.response_time
            .with_label_values(&[route, status_code.as_str()])
            .observe(seconds);
    }

    pub fn record_idempotent_outcome(&self, outcome: &str) {
        self.idempotent_requests.with_label_values(&[outcome]).inc();
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(|e| MetricsError::Encode(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| MetricsError::Encode(e.to_string()))
    }
}
