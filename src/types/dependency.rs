//! Dependency (graph edge) types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{DependencyId, ServiceId, UserId};
use super::service::merge_text;
use crate::error::{GraphError, Result};

/// A directed dependency edge between two services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// Storage-assigned identity.
    pub id: DependencyId,
    /// Service the edge starts at.
    pub source_id: ServiceId,
    /// Service the edge points to.
    pub target_id: ServiceId,
    /// Relationship type tag.
    #[serde(default, rename = "type")]
    pub dependency_type: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Protocol tag (e.g. "http", "grpc").
    #[serde(default)]
    pub protocol: String,
    /// HTTP-style method tag.
    #[serde(default)]
    pub method: String,
    /// Creator identity.
    #[serde(default)]
    pub created_by: UserId,
    /// Last updater identity.
    #[serde(default)]
    pub updated_by: Option<UserId>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Dependency {
    /// Strip identity and timestamps, producing an insertable draft.
    pub fn to_draft(&self) -> DependencyDraft {
        DependencyDraft {
            source_id: self.source_id,
            target_id: self.target_id,
            dependency_type: self.dependency_type.clone(),
            description: self.description.clone(),
            protocol: self.protocol.clone(),
            method: self.method.clone(),
            created_by: self.created_by,
            updated_by: self.updated_by,
        }
    }
}

/// A resolved dependency ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyDraft {
    pub source_id: ServiceId,
    pub target_id: ServiceId,
    pub dependency_type: String,
    pub description: String,
    pub protocol: String,
    pub method: String,
    pub created_by: UserId,
    pub updated_by: Option<UserId>,
}

/// Reference to an edge endpoint in a batch.
///
/// A JSON number names an existing service; a JSON string names the
/// `client_ref` of a service created earlier in the same batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EndpointRef {
    /// A persisted service id.
    Id(ServiceId),
    /// A placeholder resolved after node creation.
    Placeholder(String),
}

impl EndpointRef {
    fn is_valid(&self) -> bool {
        match self {
            Self::Id(id) => id.is_valid(),
            Self::Placeholder(name) => !name.trim().is_empty(),
        }
    }
}

impl fmt::Display for EndpointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Placeholder(name) => write!(f, "{name:?}"),
        }
    }
}

impl From<ServiceId> for EndpointRef {
    fn from(id: ServiceId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for EndpointRef {
    fn from(placeholder: &str) -> Self {
        Self::Placeholder(placeholder.to_string())
    }
}

/// Request to create a dependency inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDependency {
    pub source_id: EndpointRef,
    pub target_id: EndpointRef,
    #[serde(default, rename = "type")]
    pub dependency_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub method: String,
}

impl NewDependency {
    /// Create a request between two endpoints.
    pub fn new(source: impl Into<EndpointRef>, target: impl Into<EndpointRef>) -> Self {
        Self {
            source_id: source.into(),
            target_id: target.into(),
            dependency_type: String::new(),
            description: String::new(),
            protocol: String::new(),
            method: String::new(),
        }
    }

    /// Set the relationship type tag.
    pub fn with_type(mut self, dependency_type: impl Into<String>) -> Self {
        self.dependency_type = dependency_type.into();
        self
    }

    /// Both endpoints are required.
    pub fn validate(&self) -> Result<()> {
        if !self.source_id.is_valid() {
            return Err(GraphError::validation("dependency requires a source_id"));
        }
        if !self.target_id.is_valid() {
            return Err(GraphError::validation("dependency requires a target_id"));
        }
        Ok(())
    }
}

/// Partial update of an existing dependency; blank fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyUpdate {
    pub id: DependencyId,
    #[serde(default, rename = "type")]
    pub dependency_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
}

impl DependencyUpdate {
    /// The id is required.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_valid() {
            Ok(())
        } else {
            Err(GraphError::validation("updated dependency requires an id"))
        }
    }

    /// Merge into a stored dependency and stamp the updater.
    pub fn apply_to(&self, dependency: &mut Dependency, actor: UserId) {
        merge_text(&mut dependency.dependency_type, &self.dependency_type);
        merge_text(&mut dependency.description, &self.description);
        merge_text(&mut dependency.protocol, &self.protocol);
        merge_text(&mut dependency.method, &self.method);
        dependency.updated_by = Some(actor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_ref_accepts_ids_and_placeholders() {
        let dep: NewDependency =
            serde_json::from_value(json!({"source_id": 4, "target_id": "new-cache"})).unwrap();
        assert_eq!(dep.source_id, EndpointRef::Id(ServiceId(4)));
        assert_eq!(dep.target_id, EndpointRef::Placeholder("new-cache".into()));
    }

    #[test]
    fn test_missing_endpoint_is_invalid() {
        let dep = NewDependency::new(ServiceId(0), ServiceId(2));
        assert!(dep.validate().is_err());
        let dep = NewDependency::new(ServiceId(1), "");
        assert!(dep.validate().is_err());
    }

    #[test]
    fn test_update_keeps_blank_fields() {
        let mut dep: Dependency = serde_json::from_value(json!({
            "id": 3, "source_id": 1, "target_id": 2, "type": "sync", "protocol": "http"
        }))
        .unwrap();
        let update = DependencyUpdate {
            id: DependencyId(3),
            protocol: Some("grpc".into()),
            method: Some(String::new()),
            ..DependencyUpdate::default()
        };
        update.apply_to(&mut dep, UserId(8));
        assert_eq!(dep.dependency_type, "sync");
        assert_eq!(dep.protocol, "grpc");
        assert_eq!(dep.method, "");
        assert_eq!(dep.updated_by, Some(UserId(8)));
    }
}
