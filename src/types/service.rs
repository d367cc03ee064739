//! Service (graph node) types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::{ProjectId, ServiceId, UserId};
use crate::error::{GraphError, Result};

/// Allowed length of a service name, in characters.
pub const NAME_LENGTH: std::ops::RangeInclusive<usize> = 2..=100;

/// Allowed length of a service type tag, in characters.
pub const TYPE_LENGTH: std::ops::RangeInclusive<usize> = 2..=50;

/// Lifecycle status of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Running / in use.
    #[default]
    Active,
    /// Retired or paused.
    Inactive,
}

impl FromStr for ServiceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("status must be one of active, inactive (got {other:?})")),
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// Deployment environment of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Production deployment.
    #[default]
    Production,
    /// Development deployment.
    Development,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            other => Err(format!(
                "environment must be one of production, development (got {other:?})"
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Development => write!(f, "development"),
        }
    }
}

/// Deserialize an optional tag where a blank string means "not provided".
pub(crate) fn blank_as_none<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = String>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(s) if !s.trim().is_empty() => s.parse().map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

/// A service node as stored and as captured in snapshot payloads.
///
/// Everything except `id`, `name` and `type` defaults when absent so that
/// payloads written by older versions still decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Storage-assigned identity.
    pub id: ServiceId,
    /// Owning project (immutable after creation).
    #[serde(default)]
    pub project_id: ProjectId,
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Type tag (e.g. "api", "database").
    #[serde(rename = "type")]
    pub service_type: String,
    /// Lifecycle status.
    #[serde(default)]
    pub status: ServiceStatus,
    /// Semantic version string.
    #[serde(default)]
    pub version: String,
    /// Implementation language tag.
    #[serde(default)]
    pub language: String,
    /// Deployment environment.
    #[serde(default)]
    pub environment: Environment,
    /// Deployment URL.
    #[serde(default)]
    pub deploy_url: String,
    /// Domain name.
    #[serde(default)]
    pub domain: String,
    /// Source repository URL.
    #[serde(default)]
    pub git_repo: String,
    /// Arbitrary health metrics blob.
    #[serde(default)]
    pub health_metrics: Option<serde_json::Value>,
    /// Arbitrary metadata blob.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// Layout position, x.
    #[serde(default)]
    pub pos_x: i32,
    /// Layout position, y.
    #[serde(default)]
    pub pos_y: i32,
    /// Free-text notes.
    #[serde(default)]
    pub notes: String,
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

impl Service {
    /// Strip identity and timestamps, producing an insertable draft.
    pub fn to_draft(&self) -> ServiceDraft {
        ServiceDraft {
            project_id: self.project_id,
            name: self.name.clone(),
            description: self.description.clone(),
            service_type: self.service_type.clone(),
            status: self.status,
            version: self.version.clone(),
            language: self.language.clone(),
            environment: self.environment,
            deploy_url: self.deploy_url.clone(),
            domain: self.domain.clone(),
            git_repo: self.git_repo.clone(),
            health_metrics: self.health_metrics.clone(),
            metadata: self.metadata.clone(),
            pos_x: self.pos_x,
            pos_y: self.pos_y,
            notes: self.notes.clone(),
            created_by: self.created_by,
            updated_by: self.updated_by,
        }
    }
}

/// A fully-resolved service ready for insertion; storage assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDraft {
    pub project_id: ProjectId,
    pub name: String,
    pub description: String,
    pub service_type: String,
    pub status: ServiceStatus,
    pub version: String,
    pub language: String,
    pub environment: Environment,
    pub deploy_url: String,
    pub domain: String,
    pub git_repo: String,
    pub health_metrics: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub pos_x: i32,
    pub pos_y: i32,
    pub notes: String,
    pub created_by: UserId,
    pub updated_by: Option<UserId>,
}

/// Request to create a service inside a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewService {
    /// Client-side placeholder that new dependencies in the same batch may reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub service_type: String,
    /// Defaults to `active` when absent or blank.
    #[serde(default, deserialize_with = "blank_as_none")]
    pub status: Option<ServiceStatus>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub language: String,
    /// Defaults to `production` when absent or blank.
    #[serde(default, deserialize_with = "blank_as_none")]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub deploy_url: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub git_repo: String,
    #[serde(default)]
    pub health_metrics: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub pos_x: i32,
    #[serde(default)]
    pub pos_y: i32,
    #[serde(default)]
    pub notes: String,
}

impl NewService {
    /// Create a request with the two required attributes.
    pub fn new(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
            ..Self::default()
        }
    }

    /// Attach a client-side placeholder.
    pub fn with_client_ref(mut self, client_ref: impl Into<String>) -> Self {
        self.client_ref = Some(client_ref.into());
        self
    }

    /// Set the layout position.
    pub fn at(mut self, pos_x: i32, pos_y: i32) -> Self {
        self.pos_x = pos_x;
        self.pos_y = pos_y;
        self
    }

    /// Check required attributes and length bounds.
    pub fn validate(&self) -> Result<()> {
        check_length("name", &self.name, NAME_LENGTH)?;
        check_length("type", &self.service_type, TYPE_LENGTH)?;
        if let Some(client_ref) = &self.client_ref {
            if client_ref.trim().is_empty() {
                return Err(GraphError::validation("client_ref must not be blank"));
            }
        }
        Ok(())
    }

    /// Resolve defaults and ownership into an insertable draft.
    pub fn into_draft(self, project_id: ProjectId, actor: UserId) -> ServiceDraft {
        ServiceDraft {
            project_id,
            name: self.name,
            description: self.description,
            service_type: self.service_type,
            status: self.status.unwrap_or_default(),
            version: self.version,
            language: self.language,
            environment: self.environment.unwrap_or_default(),
            deploy_url: self.deploy_url,
            domain: self.domain,
            git_repo: self.git_repo,
            health_metrics: self.health_metrics,
            metadata: self.metadata,
            pos_x: self.pos_x,
            pos_y: self.pos_y,
            notes: self.notes,
            created_by: actor,
            updated_by: None,
        }
    }
}

/// Partial update of an existing service.
///
/// Absent or blank fields leave the stored value alone. Position is the
/// exception: `pos_x`/`pos_y` are always written, so `0` moves the node to
/// the origin instead of meaning "unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceUpdate {
    pub id: ServiceId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub service_type: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub status: Option<ServiceStatus>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub deploy_url: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub git_repo: Option<String>,
    #[serde(default)]
    pub health_metrics: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub pos_x: i32,
    #[serde(default)]
    pub pos_y: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ServiceUpdate {
    /// An update that only moves the node.
    pub fn position(id: ServiceId, pos_x: i32, pos_y: i32) -> Self {
        Self {
            id,
            pos_x,
            pos_y,
            ..Self::default()
        }
    }

    /// Check the id and any supplied bounded attributes.
    pub fn validate(&self) -> Result<()> {
        if !self.id.is_valid() {
            return Err(GraphError::validation("updated service requires an id"));
        }
        if let Some(name) = non_blank(&self.name) {
            check_length("name", name, NAME_LENGTH)?;
        }
        if let Some(service_type) = non_blank(&self.service_type) {
            check_length("type", service_type, TYPE_LENGTH)?;
        }
        Ok(())
    }

    /// Merge this update into a stored service and stamp the updater.
    pub fn apply_to(&self, service: &mut Service, actor: UserId) {
        merge_text(&mut service.name, &self.name);
        merge_text(&mut service.description, &self.description);
        merge_text(&mut service.service_type, &self.service_type);
        if let Some(status) = self.status {
            service.status = status;
        }
        merge_text(&mut service.version, &self.version);
        merge_text(&mut service.language, &self.language);
        if let Some(environment) = self.environment {
            service.environment = environment;
        }
        merge_text(&mut service.deploy_url, &self.deploy_url);
        merge_text(&mut service.domain, &self.domain);
        merge_text(&mut service.git_repo, &self.git_repo);
        merge_text(&mut service.notes, &self.notes);
        if let Some(health_metrics) = &self.health_metrics {
            service.health_metrics = Some(health_metrics.clone());
        }
        if let Some(metadata) = &self.metadata {
            service.metadata = Some(metadata.clone());
        }
        service.pos_x = self.pos_x;
        service.pos_y = self.pos_y;
        service.updated_by = Some(actor);
    }
}

pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

pub(crate) fn merge_text(target: &mut String, value: &Option<String>) {
    if let Some(v) = non_blank(value) {
        *target = v.to_string();
    }
}

fn check_length(field: &str, value: &str, bounds: std::ops::RangeInclusive<usize>) -> Result<()> {
    let len = value.chars().count();
    if bounds.contains(&len) {
        Ok(())
    } else {
        Err(GraphError::validation(format!(
            "{field} must be between {} and {} characters (got {len})",
            bounds.start(),
            bounds.end()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored() -> Service {
        serde_json::from_value(json!({
            "id": 1,
            "project_id": 9,
            "name": "billing",
            "type": "api",
            "description": "handles invoices",
            "pos_x": 120,
            "pos_y": 80,
            "created_by": 3
        }))
        .unwrap()
    }

    #[test]
    fn test_new_service_defaults() {
        let draft = NewService::new("auth", "api").into_draft(ProjectId(1), UserId(5));
        assert_eq!(draft.status, ServiceStatus::Active);
        assert_eq!(draft.environment, Environment::Production);
        assert_eq!(draft.created_by, UserId(5));
        assert_eq!(draft.updated_by, None);
    }

    #[test]
    fn test_blank_status_is_absent() {
        let req: NewService =
            serde_json::from_value(json!({"name": "auth", "type": "api", "status": ""})).unwrap();
        assert_eq!(req.status, None);

        let bad = serde_json::from_value::<NewService>(
            json!({"name": "auth", "type": "api", "status": "paused"}),
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_tags_are_case_sensitive() {
        assert_eq!("inactive".parse::<ServiceStatus>(), Ok(ServiceStatus::Inactive));
        assert!("Active".parse::<ServiceStatus>().is_err());
        assert!("PRODUCTION".parse::<Environment>().is_err());

        let bad = serde_json::from_value::<NewService>(
            json!({"name": "auth", "type": "api", "environment": "Development"}),
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_name_bounds() {
        assert!(NewService::new("a", "api").validate().is_err());
        assert!(NewService::new("ab", "api").validate().is_ok());
        assert!(NewService::new("x".repeat(101), "api").validate().is_err());
        assert!(NewService::new("auth", "").validate().is_err());
    }

    #[test]
    fn test_update_merges_only_non_empty_fields() {
        let mut service = stored();
        let update = ServiceUpdate {
            id: ServiceId(1),
            name: Some("payments".into()),
            description: Some(String::new()),
            pos_x: 10,
            pos_y: 20,
            ..ServiceUpdate::default()
        };
        update.apply_to(&mut service, UserId(4));

        assert_eq!(service.name, "payments");
        assert_eq!(service.description, "handles invoices");
        assert_eq!(service.service_type, "api");
        assert_eq!((service.pos_x, service.pos_y), (10, 20));
        assert_eq!(service.updated_by, Some(UserId(4)));
    }

    #[test]
    fn test_zero_position_overwrites() {
        let mut service = stored();
        ServiceUpdate::position(ServiceId(1), 0, 0).apply_to(&mut service, UserId(4));
        assert_eq!((service.pos_x, service.pos_y), (0, 0));
        assert_eq!(service.name, "billing");
    }

    #[test]
    fn test_update_requires_id() {
        assert!(ServiceUpdate::default().validate().is_err());
    }

    #[test]
    fn test_service_decodes_with_missing_optional_fields() {
        let service = stored();
        assert_eq!(service.status, ServiceStatus::Active);
        assert_eq!(service.updated_by, None);
        assert_eq!(service.to_draft().project_id, ProjectId(9));
    }
}
