//! Axum routes for the service graph API.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::middleware::{
    correlation_middleware, metrics_middleware, record_batch_metrics, record_restore_metrics,
};
use super::state::{Caller, JsonBody, OptionalJsonBody, ServiceState};
use crate::error::GraphError;
use crate::store::GraphStore;
use crate::types::{BulkChanges, BulkResult, ProjectId, RestoreResult, Snapshot, SnapshotId};
use crate::SNAPSHOT_FORMAT_VERSION;

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response to a committed bulk-save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkSaveResponse {
    pub message: String,
    pub result: BulkResult,
}

/// Request to create a snapshot. The body is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSnapshotRequest {
    #[serde(default)]
    pub notes: String,
}

/// Response to a created snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotCreatedResponse {
    pub message: String,
    pub snapshot: Snapshot,
}

/// A project's snapshots, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotListResponse {
    pub snapshots: Vec<Snapshot>,
    pub total: usize,
}

/// A single snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub snapshot: Snapshot,
}

/// Request to restore a snapshot. The body is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestoreRequest {
    /// Skip the automatic pre-restore backup.
    #[serde(default)]
    pub force: bool,
}

/// Response to a committed restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreResponse {
    pub message: String,
    pub snapshot: RestoreResult,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub snapshot_format_version: String,
    /// Whether the storage backend answered a ping.
    pub storage: bool,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub storage: bool,
    pub details: Option<String>,
}

/// Structured error response with correlation ID for tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Correlation ID for request tracing (matches X-Cloud-Trace-Context or generated UUID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            correlation_id: None,
            details: None,
        }
    }

    /// Add a correlation ID to the error.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// HTTP status for an engine error.
pub fn status_for(err: &GraphError) -> StatusCode {
    match err {
        GraphError::Validation(_) => StatusCode::BAD_REQUEST,
        GraphError::NotFound { .. } => StatusCode::NOT_FOUND,
        GraphError::Conflict(_) => StatusCode::CONFLICT,
        GraphError::Storage(_) | GraphError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn api_error(err: GraphError, caller: &Caller) -> ApiError {
    let status = status_for(&err);
    let body = if status.is_server_error() {
        // Storage internals stay in the logs.
        tracing::error!(
            correlation_id = %caller.correlation_id,
            code = err.code(),
            error = %err,
            "Request failed"
        );
        ErrorResponse::new(err.code(), "Internal error while processing the request")
    } else {
        tracing::warn!(
            correlation_id = %caller.correlation_id,
            code = err.code(),
            error = %err,
            "Request error"
        );
        ErrorResponse::new(err.code(), err.to_string())
    };
    (status, Json(body.with_correlation_id(&caller.correlation_id)))
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Apply a batch of graph changes atomically.
async fn bulk_save_handler<S: GraphStore + 'static>(
    State(state): State<ServiceState<S>>,
    Path(project_id): Path<i64>,
    caller: Caller,
    JsonBody(changes): JsonBody<BulkChanges>,
) -> Result<Json<BulkSaveResponse>, ApiError> {
    let items = changes.len();
    let start = Instant::now();
    let outcome = state
        .engine
        .apply_bulk_changes(ProjectId(project_id), caller.actor, changes)
        .await;
    record_batch_metrics(items, outcome.is_ok(), start.elapsed().as_millis() as u64);

    let result = outcome.map_err(|e| api_error(e, &caller))?;
    Ok(Json(BulkSaveResponse {
        message: "Bulk changes saved successfully".to_string(),
        result,
    }))
}

/// List a project's snapshots, newest first.
async fn list_snapshots_handler<S: GraphStore + 'static>(
    State(state): State<ServiceState<S>>,
    Path(project_id): Path<i64>,
    caller: Caller,
) -> Result<Json<SnapshotListResponse>, ApiError> {
    let snapshots = state
        .engine
        .list_snapshots(ProjectId(project_id))
        .await
        .map_err(|e| api_error(e, &caller))?;
    Ok(Json(SnapshotListResponse {
        total: snapshots.len(),
        snapshots,
    }))
}

/// Capture the live graph as a new snapshot.
async fn create_snapshot_handler<S: GraphStore + 'static>(
    State(state): State<ServiceState<S>>,
    Path(project_id): Path<i64>,
    caller: Caller,
    body: OptionalJsonBody<CreateSnapshotRequest>,
) -> Result<(StatusCode, Json<SnapshotCreatedResponse>), ApiError> {
    let request = body.unwrap_or_default();
    let snapshot = state
        .engine
        .create_snapshot(ProjectId(project_id), caller.actor, request.notes)
        .await
        .map_err(|e| api_error(e, &caller))?;
    Ok((
        StatusCode::CREATED,
        Json(SnapshotCreatedResponse {
            message: "Snapshot created successfully".to_string(),
            snapshot,
        }),
    ))
}

/// Fetch one snapshot.
async fn get_snapshot_handler<S: GraphStore + 'static>(
    State(state): State<ServiceState<S>>,
    Path(snapshot_id): Path<i64>,
    caller: Caller,
) -> Result<Json<SnapshotResponse>, ApiError> {
    let snapshot = state
        .engine
        .get_snapshot(SnapshotId(snapshot_id))
        .await
        .map_err(|e| api_error(e, &caller))?;
    Ok(Json(SnapshotResponse { snapshot }))
}

/// Replace the live graph with a snapshot.
async fn restore_handler<S: GraphStore + 'static>(
    State(state): State<ServiceState<S>>,
    Path(snapshot_id): Path<i64>,
    caller: Caller,
    body: OptionalJsonBody<RestoreRequest>,
) -> Result<Json<RestoreResponse>, ApiError> {
    let request = body.unwrap_or_default();
    let result = state
        .engine
        .restore_snapshot(SnapshotId(snapshot_id), caller.actor, request.force)
        .await
        .map_err(|e| api_error(e, &caller))?;
    record_restore_metrics(&result);

    Ok(Json(RestoreResponse {
        message: "Snapshot restored successfully".to_string(),
        snapshot: result,
    }))
}

/// Health check endpoint (detailed).
async fn health_handler<S: GraphStore + 'static>(
    State(state): State<ServiceState<S>>,
) -> Json<HealthResponse> {
    let storage = state.engine.ping().await.is_ok();
    Json(HealthResponse {
        status: if storage { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        snapshot_format_version: SNAPSHOT_FORMAT_VERSION.to_string(),
        storage,
    })
}

/// Liveness probe endpoint. Does NOT check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint. Returns 503 while storage is unreachable.
async fn readiness_handler<S: GraphStore + 'static>(
    State(state): State<ServiceState<S>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    match state.engine.ping().await {
        Ok(()) => Ok(Json(ReadinessResponse {
            ready: true,
            storage: true,
            details: None,
        })),
        Err(err) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                storage: false,
                details: Some(err.to_string()),
            }),
        )),
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the service graph API.
pub fn create_router<S: GraphStore + 'static>(state: ServiceState<S>) -> Router {
    Router::new()
        // Graph synchronization
        .route("/projects/:id/bulk-save", post(bulk_save_handler::<S>))
        // Snapshots
        .route(
            "/projects/:id/snapshots",
            get(list_snapshots_handler::<S>).post(create_snapshot_handler::<S>),
        )
        .route("/snapshots/:id", get(get_snapshot_handler::<S>))
        .route("/snapshots/:id/restore", post(restore_handler::<S>))
        // Health checks
        .route("/health", get(health_handler::<S>))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler::<S>))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(correlation_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryGraphStore;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(ServiceState::new(InMemoryGraphStore::new()))
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("X-Actor-Id", "7")
            .header("content-type", "application/json");
        match body {
            Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_bulk_save_then_snapshot_and_restore() {
        let app = app();
        let (status, body) = send(
            &app,
            request(
                "POST",
                "/projects/1/bulk-save",
                Some(json!({
                    "services": [
                        {"name": "gateway", "type": "api", "client_ref": "gw"},
                        {"name": "users", "type": "api", "client_ref": "users"}
                    ],
                    "dependencies": [{"source_id": "gw", "target_id": "users", "protocol": "http"}]
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["result"]["created_services"].as_array().unwrap().len(), 2);
        assert_eq!(body["result"]["created_services"][0]["created_by"], 7);

        let (status, body) = send(
            &app,
            request("POST", "/projects/1/snapshots", Some(json!({"notes": "baseline"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["snapshot"]["version_num"], 1);
        let snapshot_id = body["snapshot"]["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            request("POST", &format!("/snapshots/{snapshot_id}/restore"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["snapshot"]["version"], 1);
        assert_eq!(body["snapshot"]["backup_version_num"], 2);
        assert_eq!(body["snapshot"]["restored_dependencies"], 1);

        let (status, body) = send(&app, request("GET", "/projects/1/snapshots", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["snapshots"][0]["version_num"], 2);
    }

    #[tokio::test]
    async fn test_missing_actor_is_unauthorized() {
        let app = app();
        let request = Request::builder()
            .method("GET")
            .uri("/projects/1/snapshots")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "MISSING_ACTOR");
        assert!(body["correlation_id"].is_string());
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let app = app();

        let (status, body) = send(&app, request("GET", "/snapshots/99", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/projects/1/bulk-save",
                Some(json!({"services": [{"name": "x", "type": "api"}]})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn test_malformed_batch_items_are_validation_errors() {
        let app = app();

        for body in [
            json!({"dependencies": [{"source_id": 1}]}),
            json!({"services": [{"name": "gateway", "type": "api", "status": "paused"}]}),
        ] {
            let (status, body) = send(&app, request("POST", "/projects/1/bulk-save", Some(body))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(body["code"], "VALIDATION_FAILED");
            assert!(body["correlation_id"].is_string());
        }

        let (status, body) = send(&app, request("POST", "/projects/1/bulk-save", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn test_optional_body_may_be_absent_but_not_malformed() {
        let app = app();

        let (status, body) = send(
            &app,
            request("POST", "/projects/1/snapshots", Some(json!({"notes": 5}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");
        let (_, body) = send(&app, request("GET", "/projects/1/snapshots", None)).await;
        assert_eq!(body["total"], 0);

        let (status, body) = send(&app, request("POST", "/projects/1/snapshots", None)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["snapshot"]["notes"], "");
        let snapshot_id = body["snapshot"]["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            request(
                "POST",
                &format!("/snapshots/{snapshot_id}/restore"),
                Some(json!({"force": "yes"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");
        let (_, body) = send(&app, request("GET", "/projects/1/snapshots", None)).await;
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn test_upstream_trace_id_is_echoed() {
        let app = app();
        let request = Request::builder()
            .method("GET")
            .uri("/snapshots/5")
            .header("X-Actor-Id", "1")
            .header("X-Cloud-Trace-Context", "abc123/1;o=1")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["correlation_id"], "abc123");
    }

    #[tokio::test]
    async fn test_health_probes() {
        let app = app();
        let (status, body) = send(&app, request("GET", "/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, _) = send(&app, request("GET", "/health/ready", None)).await;
        assert_eq!(status, StatusCode::OK);
    }
}
