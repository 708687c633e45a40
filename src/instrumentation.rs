//! Backend latency metrics.
//!
//! Every proxied request records its total backend latency, in
//! milliseconds, into the `proxy_backend_duration_ms` histogram labeled
//! by service, and bumps `proxy_requests_total`. Values go through the
//! `metrics` facade; [`install`] wires a Prometheus recorder whose
//! handle the router renders at `GET /metrics`.

use metrics::Unit;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::FrontgateError;
use crate::proxy::trace::TraceStats;

pub const BACKEND_DURATION: &str = "proxy_backend_duration_ms";
pub const REQUESTS_TOTAL: &str = "proxy_requests_total";

const QUANTILES: &[f64] = &[0.5, 0.9, 0.99, 1.0];

fn builder() -> Result<PrometheusBuilder, FrontgateError> {
    PrometheusBuilder::new()
        .set_quantiles(QUANTILES)
        .map_err(|e| FrontgateError::Metrics {
            source: Box::new(e),
        })
}

/// Install the process-wide Prometheus recorder.
pub fn install() -> Result<PrometheusHandle, FrontgateError> {
    let handle = builder()?
        .install_recorder()
        .map_err(|e| FrontgateError::Metrics {
            source: Box::new(e),
        })?;
    describe();
    Ok(handle)
}

fn describe() {
    metrics::describe_histogram!(
        BACKEND_DURATION,
        Unit::Milliseconds,
        "Proxy latency distributions for backend requests."
    );
    metrics::describe_counter!(REQUESTS_TOTAL, "Proxied requests by service and status.");
}

/// Record one proxied request. Traces without a connection carry no
/// latency and only count toward the request total.
pub fn record(service: &str, status: u16, stats: &TraceStats) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "service" => service.to_owned(),
        "status" => status.to_string()
    )
    .increment(1);

    if stats.has_timing() {
        metrics::histogram!(BACKEND_DURATION, "service" => service.to_owned())
            .record(stats.total_ms());
    }
}
