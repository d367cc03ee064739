//! Service middleware for metrics and request correlation.
//!
//! ## Metrics
//!
//! Emitted as structured log events under the `service_graph::metrics`
//! target, aggregated downstream from logs:
//!
//! - `request_metric`: path pattern, method, status, latency
//! - `batch_metric`: items per bulk-save and their outcome
//! - `restore_metric`: restored and skipped record counts

use axum::{extract::Request, middleware::Next, response::Response};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::info;

use super::state::CorrelationId;
use crate::types::RestoreResult;

/// Metrics middleware that records request counts and latency.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "service_graph::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Attach a [`CorrelationId`] to the request so handlers and logs agree on it.
pub async fn correlation_middleware(request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let id = CorrelationId::from_parts(&parts);
    parts.extensions.insert(id);
    next.run(Request::from_parts(parts, body)).await
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Replaces numeric id segments with `:id`.
pub fn normalize_path(path: &str) -> String {
    static ID_SEGMENT: OnceLock<regex_lite::Regex> = OnceLock::new();
    let re = ID_SEGMENT.get_or_init(|| {
        regex_lite::Regex::new(r"/\d+(/|$)").expect("id segment pattern is valid")
    });
    // Adjacent id segments share a slash, so run until stable.
    let mut current = path.to_string();
    loop {
        let next = re.replace_all(&current, "/:id$1").to_string();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Record the outcome of a bulk-save.
pub fn record_batch_metrics(items: usize, success: bool, latency_ms: u64) {
    let status = if success { "committed" } else { "rolled_back" };
    info!(
        target: "service_graph::metrics",
        metric_type = "batch",
        items = items,
        status = status,
        latency_ms = latency_ms,
        "batch_metric"
    );
}

/// Record the outcome of a restore.
pub fn record_restore_metrics(result: &RestoreResult) {
    info!(
        target: "service_graph::metrics",
        metric_type = "restore",
        restored_services = result.restored_services,
        restored_dependencies = result.restored_dependencies,
        skipped_services = result.skipped_services,
        skipped_dependencies = result.skipped_dependencies,
        backup = result.backup_snapshot_id.is_some(),
        "restore_metric"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_ids() {
        assert_eq!(normalize_path("/projects/42/bulk-save"), "/projects/:id/bulk-save");
        assert_eq!(normalize_path("/snapshots/7"), "/snapshots/:id");
    }

    #[test]
    fn test_normalize_path_preserves_regular_path() {
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
        assert_eq!(normalize_path("/v2/health"), "/v2/health");
    }
}
