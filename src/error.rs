//! Error taxonomy for the graph engine.
//!
//! Every engine operation returns [`GraphError`]. Storage backends keep their
//! own error types and convert into it; the conversion decides which storage
//! failures surface as conflicts or validation errors.

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by the bulk synchronizer, snapshot store and restorer.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A batch item or request is malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist or belongs to another project.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up.
        entity: &'static str,
        /// Identifier that failed to resolve.
        id: String,
    },

    /// A uniqueness constraint was violated in storage.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transactional I/O failed.
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A snapshot payload could not be produced or parsed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl GraphError {
    /// Build a `NotFound` error for an entity kind and id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Build a `Validation` error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Machine-readable code for API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_FAILED",
        }
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convert a backend error into a [`GraphError`].
///
/// Used as `.map_err(storage)?` on store calls, where the backend error type
/// is only known to implement `Into<GraphError>`.
pub(crate) fn storage<E: Into<GraphError>>(err: E) -> GraphError {
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = GraphError::not_found("service", 12);
        assert_eq!(err.to_string(), "service not found: 12");
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_json_error_is_serialization() {
        let err: GraphError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, GraphError::Serialization(_)));
    }
}
