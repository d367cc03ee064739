//! Service state and request context.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    Json,
};
use serde::de::DeserializeOwned;

use super::routes::ErrorResponse;
use crate::engine::GraphEngine;
use crate::error::GraphError;
use crate::store::GraphStore;
use crate::types::UserId;

/// Header carrying the authenticated actor's user id.
pub const ACTOR_HEADER: &str = "X-Actor-Id";

/// Header carrying an upstream trace id.
pub const TRACE_HEADER: &str = "X-Cloud-Trace-Context";

/// Shared service state.
pub struct ServiceState<S: GraphStore + 'static> {
    /// The engine every handler calls into.
    pub engine: Arc<GraphEngine<S>>,
}

impl<S: GraphStore + 'static> ServiceState<S> {
    /// Create service state over a graph store.
    pub fn new(store: S) -> Self {
        Self {
            engine: Arc::new(GraphEngine::new(store)),
        }
    }
}

impl<S: GraphStore + 'static> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

/// Correlation id attached to a request by the logging middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    /// Take the upstream trace id if present, otherwise generate one.
    pub fn from_parts(parts: &Parts) -> Self {
        if let Some(existing) = parts.extensions.get::<CorrelationId>() {
            return existing.clone();
        }
        let id = parts
            .headers
            .get(TRACE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split('/').next())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self(id)
    }
}

/// Who is calling, and under which correlation id.
///
/// Identity is trusted: the actor comes straight from [`ACTOR_HEADER`].
#[derive(Debug, Clone)]
pub struct Caller {
    pub actor: UserId,
    pub correlation_id: String,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = CorrelationId::from_parts(parts).0;
        let actor = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(UserId)
            .filter(|id| id.is_valid());

        match actor {
            Some(actor) => Ok(Self {
                actor,
                correlation_id,
            }),
            None => Err((
                StatusCode::UNAUTHORIZED,
                Json(
                    ErrorResponse::new(
                        "MISSING_ACTOR",
                        format!("{ACTOR_HEADER} header with a positive user id is required"),
                    )
                    .with_correlation_id(correlation_id),
                ),
            )),
        }
    }
}

/// JSON request body whose decode failures are reported as validation errors.
///
/// Unlike [`axum::Json`], a malformed body becomes a `400 VALIDATION_FAILED`
/// [`ErrorResponse`] carrying the request's correlation id.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

/// Optional JSON request body: an empty body is `None`, a malformed one is rejected.
#[derive(Debug, Clone)]
pub struct OptionalJsonBody<T>(pub Option<T>);

impl<T: Default> OptionalJsonBody<T> {
    /// The decoded body, or the default when none was sent.
    pub fn unwrap_or_default(self) -> T {
        self.0.unwrap_or_default()
    }
}

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match read_json(req, state).await? {
            (Some(value), _) => Ok(Self(value)),
            (None, correlation_id) => Err(invalid_body("request body is required", correlation_id)),
        }
    }
}

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (value, _) = read_json(req, state).await?;
        Ok(Self(value))
    }
}

/// Decode a JSON body, treating a blank body as absent.
async fn read_json<T, S>(
    req: Request,
    state: &S,
) -> Result<(Option<T>, String), (StatusCode, Json<ErrorResponse>)>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    let (parts, body) = req.into_parts();
    let correlation_id = CorrelationId::from_parts(&parts).0;
    let bytes = Bytes::from_request(Request::from_parts(parts, body), state)
        .await
        .map_err(|rejection| {
            (
                rejection.status(),
                Json(
                    ErrorResponse::new("INVALID_BODY", rejection.body_text())
                        .with_correlation_id(correlation_id.clone()),
                ),
            )
        })?;

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok((None, correlation_id));
    }
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok((Some(value), correlation_id)),
        Err(err) => Err(invalid_body(format!("invalid request body: {err}"), correlation_id)),
    }
}

fn invalid_body(
    message: impl Into<String>,
    correlation_id: String,
) -> (StatusCode, Json<ErrorResponse>) {
    let err = GraphError::validation(message);
    tracing::warn!(correlation_id = %correlation_id, error = %err, "Rejected request body");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(err.code(), err.to_string()).with_correlation_id(correlation_id)),
    )
}
