//! Graph storage backends.
//!
//! The engine only talks to storage through [`GraphStore`] (connection-level
//! reads and `begin`) and [`GraphTransaction`] (everything that must see or
//! produce uncommitted state). One transaction is used per engine call.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::error::GraphError;
use crate::types::{
    Dependency, DependencyDraft, DependencyId, NewSnapshot, ProjectId, Service, ServiceDraft,
    ServiceId, Snapshot, SnapshotId,
};

/// Trait for graph storage backends.
///
/// Implementations must return list results in a deterministic order.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Into<GraphError> + Send + Sync + 'static;

    /// Transaction handle produced by [`GraphStore::begin`].
    type Tx: GraphTransaction<Error = Self::Error>;

    /// Open a transaction. Dropping it without commit rolls back.
    async fn begin(&self) -> Result<Self::Tx, Self::Error>;

    /// Fetch a snapshot by id, outside any transaction.
    async fn get_snapshot(&self, id: SnapshotId) -> Result<Option<Snapshot>, Self::Error>;

    /// List a project's snapshots, newest version first.
    async fn list_snapshots(&self, project_id: ProjectId) -> Result<Vec<Snapshot>, Self::Error>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), Self::Error>;
}

/// Operations available inside one open transaction.
#[async_trait]
pub trait GraphTransaction: Send {
    /// Error type for transaction operations.
    type Error: std::error::Error + Into<GraphError> + Send + Sync + 'static;

    /// Fetch a service, only if it belongs to `project_id`.
    async fn find_service(
        &mut self,
        project_id: ProjectId,
        id: ServiceId,
    ) -> Result<Option<Service>, Self::Error>;

    /// All services of a project, ordered by id.
    async fn project_services(&mut self, project_id: ProjectId) -> Result<Vec<Service>, Self::Error>;

    /// Insert a service; storage assigns id and timestamps.
    async fn insert_service(&mut self, draft: &ServiceDraft) -> Result<Service, Self::Error>;

    /// Persist every mutable attribute of a stored service and bump `updated_at`.
    ///
    /// `project_id`, `created_by` and `created_at` are never written.
    async fn update_service(&mut self, service: &Service) -> Result<Service, Self::Error>;

    /// Delete the listed services of a project, cascading their dependencies.
    ///
    /// Ids of other projects are ignored. Returns the number of services deleted.
    async fn delete_services(
        &mut self,
        project_id: ProjectId,
        ids: &[ServiceId],
    ) -> Result<u64, Self::Error>;

    /// Delete every service of a project, cascading their dependencies.
    async fn delete_project_services(&mut self, project_id: ProjectId) -> Result<u64, Self::Error>;

    /// Fetch a dependency whose source or target belongs to `project_id`.
    async fn find_dependency(
        &mut self,
        project_id: ProjectId,
        id: DependencyId,
    ) -> Result<Option<Dependency>, Self::Error>;

    /// All dependencies whose source or target belongs to the project, ordered by id.
    async fn project_dependencies(
        &mut self,
        project_id: ProjectId,
    ) -> Result<Vec<Dependency>, Self::Error>;

    /// Insert a dependency. Both endpoints must exist.
    async fn insert_dependency(&mut self, draft: &DependencyDraft) -> Result<Dependency, Self::Error>;

    /// Persist the mutable attributes of a stored dependency and bump `updated_at`.
    async fn update_dependency(&mut self, dependency: &Dependency) -> Result<Dependency, Self::Error>;

    /// Delete the listed dependencies that belong to the project.
    ///
    /// Unknown or foreign ids are ignored. Returns the number deleted.
    async fn delete_dependencies(
        &mut self,
        project_id: ProjectId,
        ids: &[DependencyId],
    ) -> Result<u64, Self::Error>;

    /// Reserve the next snapshot version for a project.
    ///
    /// The reservation is held until the transaction ends, so concurrent
    /// callers for the same project serialize here and never share a number.
    async fn next_snapshot_version(&mut self, project_id: ProjectId) -> Result<i32, Self::Error>;

    /// Insert an immutable snapshot row.
    async fn insert_snapshot(&mut self, snapshot: &NewSnapshot) -> Result<Snapshot, Self::Error>;

    /// Fetch a snapshot by id.
    async fn find_snapshot(&mut self, id: SnapshotId) -> Result<Option<Snapshot>, Self::Error>;

    /// Commit all work done in this transaction.
    async fn commit(self) -> Result<(), Self::Error>;

    /// Discard all work done in this transaction.
    async fn rollback(self) -> Result<(), Self::Error>;
}

pub use memory::{InMemoryGraphStore, InMemoryTransaction, StoreOp};

#[cfg(feature = "postgres")]
pub use postgres::PostgresGraphStore;
