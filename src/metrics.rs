//! Prometheus metrics for intercepted requests.
//!
//! The recorder is process-global; [`init`] installs it once and hands out the
//! same handle afterwards, so building several routers (as tests do) is fine.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::warn;

static HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the Prometheus recorder (first call only) and return its handle.
///
/// Returns `None` if another recorder was already installed by someone else.
pub fn init() -> Option<PrometheusHandle> {
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Prometheus recorder not installed: {}", e);
                None
            }
        })
        .clone()
}

/// Count one completed request. `kind` is `manifest`, `subtitle` or `redirect`.
pub fn record_request(kind: &'static str, status: u16) {
    counter!(
        "subweave_requests_total",
        "kind" => kind,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_duration(kind: &'static str, start: Instant) {
    histogram!("subweave_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

/// Count a failed origin or caption fetch.
pub fn record_upstream_error() {
    counter!("subweave_upstream_errors_total").increment(1);
}
