//! Service Graph REST Service
//!
//! Exposes the [`GraphEngine`](crate::GraphEngine) over HTTP.
//!
//! ## Endpoints
//!
//! - `POST /projects/:id/bulk-save` - Apply a batch of graph changes atomically
//! - `GET /projects/:id/snapshots` - List snapshots, newest first
//! - `POST /projects/:id/snapshots` - Capture the live graph
//! - `GET /snapshots/:id` - Fetch one snapshot
//! - `POST /snapshots/:id/restore` - Restore a snapshot (`{"force": true}` skips the backup)
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//!
//! Every graph endpoint requires an `X-Actor-Id` header.

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{
    correlation_middleware, metrics_middleware, normalize_path, record_batch_metrics,
    record_restore_metrics,
};
pub use routes::{create_router, status_for, ErrorResponse};
pub use state::{
    Caller, CorrelationId, JsonBody, OptionalJsonBody, ServiceState, ACTOR_HEADER, TRACE_HEADER,
};
