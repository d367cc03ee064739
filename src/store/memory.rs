//! In-memory graph store for tests, benchmarks and embedding.
//!
//! Transactions take a store-wide lock and work on a private copy of the
//! tables; commit swaps the copy in, anything else discards it. This gives
//! serializable isolation, so uncommitted writes are never observable.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{GraphStore, GraphTransaction};
use crate::error::GraphError;
use crate::types::{
    Dependency, DependencyDraft, DependencyId, NewSnapshot, ProjectId, Service, ServiceDraft,
    ServiceId, Snapshot, SnapshotId,
};

/// Store operations that can be made to fail for rollback testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreOp {
    InsertService,
    UpdateService,
    DeleteServices,
    InsertDependency,
    UpdateDependency,
    DeleteDependencies,
    InsertSnapshot,
    Commit,
}

/// Error type for in-memory store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {
    /// A dependency endpoint does not exist (foreign-key violation).
    #[error("Dependency endpoint does not exist: service {0}")]
    MissingEndpoint(ServiceId),
    /// Update of a service row that does not exist.
    #[error("Service not found: {0}")]
    ServiceNotFound(ServiceId),
    /// Update of a dependency row that does not exist.
    #[error("Dependency not found: {0}")]
    DependencyNotFound(DependencyId),
    /// A snapshot version was inserted twice for one project.
    #[error("Duplicate snapshot version {version} for project {project_id}")]
    DuplicateVersion {
        /// Project of the offending row.
        project_id: ProjectId,
        /// Version that already exists.
        version: i32,
    },
    /// Failure injected through [`InMemoryGraphStore::fail_on`].
    #[error("Injected failure at {0:?}")]
    Injected(StoreOp),
}

impl From<InMemoryError> for GraphError {
    fn from(err: InMemoryError) -> Self {
        match err {
            InMemoryError::MissingEndpoint(_) => GraphError::Validation(err.to_string()),
            InMemoryError::ServiceNotFound(id) => GraphError::not_found("service", id),
            InMemoryError::DependencyNotFound(id) => GraphError::not_found("dependency", id),
            InMemoryError::DuplicateVersion { .. } => GraphError::Conflict(err.to_string()),
            InMemoryError::Injected(_) => GraphError::Storage(Box::new(err)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Tables {
    services: BTreeMap<ServiceId, Service>,
    dependencies: BTreeMap<DependencyId, Dependency>,
    snapshots: BTreeMap<SnapshotId, Snapshot>,
    version_counters: BTreeMap<ProjectId, i32>,
    last_service_id: i64,
    last_dependency_id: i64,
    last_snapshot_id: i64,
}

impl Tables {
    fn project_services(&self, project_id: ProjectId) -> impl Iterator<Item = &Service> {
        self.services
            .values()
            .filter(move |s| s.project_id == project_id)
    }

    fn in_project(&self, project_id: ProjectId, service: ServiceId) -> bool {
        self.services
            .get(&service)
            .map_or(false, |s| s.project_id == project_id)
    }

    fn dependency_in_project(&self, project_id: ProjectId, dependency: &Dependency) -> bool {
        self.in_project(project_id, dependency.source_id)
            || self.in_project(project_id, dependency.target_id)
    }

    fn remove_services(&mut self, ids: &BTreeSet<ServiceId>) -> u64 {
        let before = self.services.len();
        self.services.retain(|id, _| !ids.contains(id));
        // ON DELETE CASCADE
        self.dependencies
            .retain(|_, d| !ids.contains(&d.source_id) && !ids.contains(&d.target_id));
        (before - self.services.len()) as u64
    }
}

/// Everything held by an [`InMemoryGraphStore`], for before/after comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreContents {
    /// All services, ordered by id.
    pub services: Vec<Service>,
    /// All dependencies, ordered by id.
    pub dependencies: Vec<Dependency>,
    /// All snapshots, ordered by id.
    pub snapshots: Vec<Snapshot>,
}

/// In-memory graph store.
///
/// Uses BTreeMap for deterministic iteration order. Cloning shares the
/// underlying tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraphStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<parking_lot::Mutex<BTreeSet<StoreOp>>>,
}

impl InMemoryGraphStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `op` fail with [`InMemoryError::Injected`].
    pub fn fail_on(&self, op: StoreOp) {
        self.faults.lock().insert(op);
    }

    /// Insert a service directly, committed immediately.
    pub async fn seed_service(&self, draft: ServiceDraft) -> Service {
        let mut tables = self.tables.lock().await;
        insert_service(&mut tables, &draft)
    }

    /// Insert a dependency directly, committed immediately.
    pub async fn seed_dependency(&self, draft: DependencyDraft) -> Result<Dependency, InMemoryError> {
        let mut tables = self.tables.lock().await;
        insert_dependency(&mut tables, &draft)
    }

    /// Committed services of a project.
    pub async fn services(&self, project_id: ProjectId) -> Vec<Service> {
        let tables = self.tables.lock().await;
        tables.project_services(project_id).cloned().collect()
    }

    /// Committed dependencies belonging to a project.
    pub async fn dependencies(&self, project_id: ProjectId) -> Vec<Dependency> {
        let tables = self.tables.lock().await;
        tables
            .dependencies
            .values()
            .filter(|d| tables.dependency_in_project(project_id, d))
            .cloned()
            .collect()
    }

    /// Full committed contents of the store.
    pub async fn contents(&self) -> StoreContents {
        let tables = self.tables.lock().await;
        StoreContents {
            services: tables.services.values().cloned().collect(),
            dependencies: tables.dependencies.values().cloned().collect(),
            snapshots: tables.snapshots.values().cloned().collect(),
        }
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    type Error = InMemoryError;
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx, Self::Error> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            faults: Arc::clone(&self.faults),
        })
    }

    async fn get_snapshot(&self, id: SnapshotId) -> Result<Option<Snapshot>, Self::Error> {
        Ok(self.tables.lock().await.snapshots.get(&id).cloned())
    }

    async fn list_snapshots(&self, project_id: ProjectId) -> Result<Vec<Snapshot>, Self::Error> {
        let tables = self.tables.lock().await;
        let mut snapshots: Vec<Snapshot> = tables
            .snapshots
            .values()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect();
        snapshots.sort_by(|a, b| b.version_num.cmp(&a.version_num));
        Ok(snapshots)
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Open transaction on an [`InMemoryGraphStore`].
///
/// Holds the store lock until it is committed, rolled back or dropped.
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    faults: Arc<parking_lot::Mutex<BTreeSet<StoreOp>>>,
}

impl InMemoryTransaction {
    fn check(&self, op: StoreOp) -> Result<(), InMemoryError> {
        if self.faults.lock().remove(&op) {
            Err(InMemoryError::Injected(op))
        } else {
            Ok(())
        }
    }
}

fn insert_service(tables: &mut Tables, draft: &ServiceDraft) -> Service {
    tables.last_service_id += 1;
    let now = Utc::now();
    let service = Service {
        id: ServiceId(tables.last_service_id),
        project_id: draft.project_id,
        name: draft.name.clone(),
        description: draft.description.clone(),
        service_type: draft.service_type.clone(),
        status: draft.status,
        version: draft.version.clone(),
        language: draft.language.clone(),
        environment: draft.environment,
        deploy_url: draft.deploy_url.clone(),
        domain: draft.domain.clone(),
        git_repo: draft.git_repo.clone(),
        health_metrics: draft.health_metrics.clone(),
        metadata: draft.metadata.clone(),
        pos_x: draft.pos_x,
        pos_y: draft.pos_y,
        notes: draft.notes.clone(),
        created_by: draft.created_by,
        updated_by: draft.updated_by,
        created_at: now,
        updated_at: now,
    };
    tables.services.insert(service.id, service.clone());
    service
}

fn insert_dependency(tables: &mut Tables, draft: &DependencyDraft) -> Result<Dependency, InMemoryError> {
    for endpoint in [draft.source_id, draft.target_id] {
        if !tables.services.contains_key(&endpoint) {
            return Err(InMemoryError::MissingEndpoint(endpoint));
        }
    }
    tables.last_dependency_id += 1;
    let now = Utc::now();
    let dependency = Dependency {
        id: DependencyId(tables.last_dependency_id),
        source_id: draft.source_id,
        target_id: draft.target_id,
        dependency_type: draft.dependency_type.clone(),
        description: draft.description.clone(),
        protocol: draft.protocol.clone(),
        method: draft.method.clone(),
        created_by: draft.created_by,
        updated_by: draft.updated_by,
        created_at: now,
        updated_at: now,
    };
    tables.dependencies.insert(dependency.id, dependency.clone());
    Ok(dependency)
}

#[async_trait]
impl GraphTransaction for InMemoryTransaction {
    type Error = InMemoryError;

    async fn find_service(
        &mut self,
        project_id: ProjectId,
        id: ServiceId,
    ) -> Result<Option<Service>, Self::Error> {
        Ok(self
            .working
            .services
            .get(&id)
            .filter(|s| s.project_id == project_id)
            .cloned())
    }

    async fn project_services(&mut self, project_id: ProjectId) -> Result<Vec<Service>, Self::Error> {
        Ok(self.working.project_services(project_id).cloned().collect())
    }

    async fn insert_service(&mut self, draft: &ServiceDraft) -> Result<Service, Self::Error> {
        self.check(StoreOp::InsertService)?;
        Ok(insert_service(&mut self.working, draft))
    }

    async fn update_service(&mut self, service: &Service) -> Result<Service, Self::Error> {
        self.check(StoreOp::UpdateService)?;
        let stored = self
            .working
            .services
            .get_mut(&service.id)
            .ok_or(InMemoryError::ServiceNotFound(service.id))?;
        let updated = Service {
            id: stored.id,
            project_id: stored.project_id,
            created_by: stored.created_by,
            created_at: stored.created_at,
            updated_at: Utc::now(),
            ..service.clone()
        };
        *stored = updated.clone();
        Ok(updated)
    }

    async fn delete_services(
        &mut self,
        project_id: ProjectId,
        ids: &[ServiceId],
    ) -> Result<u64, Self::Error> {
        self.check(StoreOp::DeleteServices)?;
        let scoped: BTreeSet<ServiceId> = ids
            .iter()
            .copied()
            .filter(|id| self.working.in_project(project_id, *id))
            .collect();
        Ok(self.working.remove_services(&scoped))
    }

    async fn delete_project_services(&mut self, project_id: ProjectId) -> Result<u64, Self::Error> {
        self.check(StoreOp::DeleteServices)?;
        let all: BTreeSet<ServiceId> = self.working.project_services(project_id).map(|s| s.id).collect();
        Ok(self.working.remove_services(&all))
    }

    async fn find_dependency(
        &mut self,
        project_id: ProjectId,
        id: DependencyId,
    ) -> Result<Option<Dependency>, Self::Error> {
        Ok(self
            .working
            .dependencies
            .get(&id)
            .filter(|d| self.working.dependency_in_project(project_id, d))
            .cloned())
    }

    async fn project_dependencies(
        &mut self,
        project_id: ProjectId,
    ) -> Result<Vec<Dependency>, Self::Error> {
        Ok(self
            .working
            .dependencies
            .values()
            .filter(|d| self.working.dependency_in_project(project_id, d))
            .cloned()
            .collect())
    }

    async fn insert_dependency(&mut self, draft: &DependencyDraft) -> Result<Dependency, Self::Error> {
        self.check(StoreOp::InsertDependency)?;
        insert_dependency(&mut self.working, draft)
    }

    async fn update_dependency(&mut self, dependency: &Dependency) -> Result<Dependency, Self::Error> {
        self.check(StoreOp::UpdateDependency)?;
        let stored = self
            .working
            .dependencies
            .get_mut(&dependency.id)
            .ok_or(InMemoryError::DependencyNotFound(dependency.id))?;
        stored.dependency_type = dependency.dependency_type.clone();
        stored.description = dependency.description.clone();
        stored.protocol = dependency.protocol.clone();
        stored.method = dependency.method.clone();
        stored.updated_by = dependency.updated_by;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_dependencies(
        &mut self,
        project_id: ProjectId,
        ids: &[DependencyId],
    ) -> Result<u64, Self::Error> {
        self.check(StoreOp::DeleteDependencies)?;
        let scoped: BTreeSet<DependencyId> = ids
            .iter()
            .copied()
            .filter(|id| {
                self.working
                    .dependencies
                    .get(id)
                    .map_or(false, |d| self.working.dependency_in_project(project_id, d))
            })
            .collect();
        let before = self.working.dependencies.len();
        self.working.dependencies.retain(|id, _| !scoped.contains(id));
        Ok((before - self.working.dependencies.len()) as u64)
    }

    async fn next_snapshot_version(&mut self, project_id: ProjectId) -> Result<i32, Self::Error> {
        let existing_max = self
            .working
            .snapshots
            .values()
            .filter(|s| s.project_id == project_id)
            .map(|s| s.version_num)
            .max()
            .unwrap_or(0);
        let counter = self.working.version_counters.entry(project_id).or_insert(0);
        *counter = (*counter).max(existing_max) + 1;
        Ok(*counter)
    }

    async fn insert_snapshot(&mut self, snapshot: &NewSnapshot) -> Result<Snapshot, Self::Error> {
        self.check(StoreOp::InsertSnapshot)?;
        let duplicate = self.working.snapshots.values().any(|s| {
            s.project_id == snapshot.project_id && s.version_num == snapshot.version_num
        });
        if duplicate {
            return Err(InMemoryError::DuplicateVersion {
                project_id: snapshot.project_id,
                version: snapshot.version_num,
            });
        }
        self.working.last_snapshot_id += 1;
        let stored = Snapshot {
            id: SnapshotId(self.working.last_snapshot_id),
            project_id: snapshot.project_id,
            version_num: snapshot.version_num,
            snapshot: snapshot.payload.clone(),
            created_by: snapshot.created_by,
            created_at: Utc::now(),
            notes: snapshot.notes.clone(),
        };
        self.working.snapshots.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_snapshot(&mut self, id: SnapshotId) -> Result<Option<Snapshot>, Self::Error> {
        Ok(self.working.snapshots.get(&id).cloned())
    }

    async fn commit(mut self) -> Result<(), Self::Error> {
        self.check(StoreOp::Commit)?;
        *self.guard = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), Self::Error> {
        Ok(())
    }
}
