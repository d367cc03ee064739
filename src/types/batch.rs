//! Batch request and result shapes for bulk synchronization and restore.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::dependency::{Dependency, DependencyUpdate, NewDependency};
use super::ids::{DependencyId, ProjectId, ServiceId, SnapshotId};
use super::service::{NewService, Service, ServiceUpdate};
use crate::error::{GraphError, Result};

/// One call's worth of graph mutations.
///
/// Field names follow the bulk-save request body: `services` and
/// `dependencies` are creates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkChanges {
    #[serde(default)]
    pub services: Vec<NewService>,
    #[serde(default)]
    pub dependencies: Vec<NewDependency>,
    #[serde(default)]
    pub updated_services: Vec<ServiceUpdate>,
    #[serde(default)]
    pub updated_dependencies: Vec<DependencyUpdate>,
    #[serde(default)]
    pub deleted_services: Vec<ServiceId>,
    #[serde(default)]
    pub deleted_dependencies: Vec<DependencyId>,
}

impl BulkChanges {
    /// Whether the batch contains no mutations at all.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
            && self.dependencies.is_empty()
            && self.updated_services.is_empty()
            && self.updated_dependencies.is_empty()
            && self.deleted_services.is_empty()
            && self.deleted_dependencies.is_empty()
    }

    /// Total number of items across all six lists.
    pub fn len(&self) -> usize {
        self.services.len()
            + self.dependencies.len()
            + self.updated_services.len()
            + self.updated_dependencies.len()
            + self.deleted_services.len()
            + self.deleted_dependencies.len()
    }

    /// Validate every item before any storage work starts.
    ///
    /// Also rejects duplicate `client_ref` placeholders, since an edge
    /// naming one could not be resolved unambiguously.
    pub fn validate(&self) -> Result<()> {
        let mut refs = BTreeSet::new();
        for (index, service) in self.services.iter().enumerate() {
            service
                .validate()
                .map_err(|e| item_error("services", index, e))?;
            if let Some(client_ref) = &service.client_ref {
                if !refs.insert(client_ref.as_str()) {
                    return Err(GraphError::validation(format!(
                        "duplicate client_ref {client_ref:?} in services"
                    )));
                }
            }
        }
        for (index, update) in self.updated_services.iter().enumerate() {
            update
                .validate()
                .map_err(|e| item_error("updated_services", index, e))?;
        }
        for (index, dependency) in self.dependencies.iter().enumerate() {
            dependency
                .validate()
                .map_err(|e| item_error("dependencies", index, e))?;
        }
        for (index, update) in self.updated_dependencies.iter().enumerate() {
            update
                .validate()
                .map_err(|e| item_error("updated_dependencies", index, e))?;
        }
        Ok(())
    }
}

fn item_error(list: &str, index: usize, err: GraphError) -> GraphError {
    match err {
        GraphError::Validation(msg) => GraphError::Validation(format!("{list}[{index}]: {msg}")),
        other => other,
    }
}

/// Materialized outcome of a committed batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkResult {
    pub created_services: Vec<Service>,
    pub created_dependencies: Vec<Dependency>,
    pub updated_services: Vec<Service>,
    pub updated_dependencies: Vec<Dependency>,
    pub deleted_services_count: u64,
    pub deleted_dependencies_count: u64,
}

/// Outcome of a committed restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreResult {
    /// Snapshot that was restored.
    pub id: SnapshotId,
    /// Its version number.
    #[serde(rename = "version")]
    pub version_num: i32,
    pub project_id: ProjectId,
    /// Automatic backup taken before the restore, unless forced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_snapshot_id: Option<SnapshotId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_version_num: Option<i32>,
    pub restored_services: usize,
    pub restored_dependencies: usize,
    /// Payload records that failed to decode.
    pub skipped_services: usize,
    /// Payload records that failed to decode or whose endpoints were not restored.
    pub skipped_dependencies: usize,
}

impl RestoreResult {
    /// Whether every payload record made it back into the live graph.
    pub fn is_exact(&self) -> bool {
        self.skipped_services == 0 && self.skipped_dependencies == 0
    }
}
