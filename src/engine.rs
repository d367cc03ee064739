//! Transactional facade over a [`GraphStore`].
//!
//! Each method opens one transaction, runs the operation, and commits only
//! if every step succeeded. Any error rolls the whole call back.

use std::time::Instant;

use crate::error::{storage, GraphError, Result};
use crate::store::{GraphStore, GraphTransaction};
use crate::types::{BulkChanges, BulkResult, ProjectId, RestoreResult, Snapshot, SnapshotId, UserId};
use crate::{restore, snapshot, sync};

/// Entry point for bulk synchronization, snapshots and restore.
#[derive(Debug, Clone)]
pub struct GraphEngine<S> {
    store: S,
}

impl<S: GraphStore> GraphEngine<S> {
    /// Create an engine over a store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Apply a batch of creates, updates and deletes atomically.
    ///
    /// The batch is validated before any storage work starts.
    pub async fn apply_bulk_changes(
        &self,
        project_id: ProjectId,
        actor: UserId,
        changes: BulkChanges,
    ) -> Result<BulkResult> {
        check_ids(project_id, actor)?;
        changes.validate()?;
        let items = changes.len();
        let start = Instant::now();

        let mut tx = self.store.begin().await.map_err(storage)?;
        let outcome = sync::apply_in(&mut tx, project_id, actor, changes).await;
        let result = finish(tx, outcome, "bulk_save").await?;

        tracing::info!(
            project_id = %project_id,
            actor = %actor,
            items,
            deleted_services = result.deleted_services_count,
            deleted_dependencies = result.deleted_dependencies_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Bulk changes committed"
        );
        Ok(result)
    }

    /// Capture the project's live graph as a new versioned snapshot.
    pub async fn create_snapshot(
        &self,
        project_id: ProjectId,
        actor: UserId,
        notes: impl Into<String>,
    ) -> Result<Snapshot> {
        check_ids(project_id, actor)?;
        let mut tx = self.store.begin().await.map_err(storage)?;
        let outcome = snapshot::capture_in(&mut tx, project_id, actor, notes.into()).await;
        let created = finish(tx, outcome, "create_snapshot").await?;

        tracing::info!(
            project_id = %project_id,
            snapshot_id = %created.id,
            version_num = created.version_num,
            "Snapshot created"
        );
        Ok(created)
    }

    /// Fetch one snapshot.
    pub async fn get_snapshot(&self, id: SnapshotId) -> Result<Snapshot> {
        self.store
            .get_snapshot(id)
            .await
            .map_err(storage)?
            .ok_or_else(|| GraphError::not_found("snapshot", id))
    }

    /// List a project's snapshots, newest version first.
    pub async fn list_snapshots(&self, project_id: ProjectId) -> Result<Vec<Snapshot>> {
        self.store.list_snapshots(project_id).await.map_err(storage)
    }

    /// Replace the project's live graph with a snapshot's content.
    ///
    /// Without `force`, a backup snapshot of the current graph is committed
    /// together with the restore.
    pub async fn restore_snapshot(
        &self,
        id: SnapshotId,
        actor: UserId,
        force: bool,
    ) -> Result<RestoreResult> {
        if !actor.is_valid() {
            return Err(GraphError::validation("actor id must be positive"));
        }
        let mut tx = self.store.begin().await.map_err(storage)?;
        let outcome = restore::restore_in(&mut tx, id, actor, force).await;
        let result = finish(tx, outcome, "restore_snapshot").await?;

        tracing::info!(
            snapshot_id = %id,
            project_id = %result.project_id,
            force,
            backup_snapshot_id = ?result.backup_snapshot_id.map(|s| s.get()),
            restored_services = result.restored_services,
            restored_dependencies = result.restored_dependencies,
            skipped_services = result.skipped_services,
            skipped_dependencies = result.skipped_dependencies,
            "Snapshot restored"
        );
        Ok(result)
    }

    /// Check that storage is reachable.
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await.map_err(storage)
    }
}

fn check_ids(project_id: ProjectId, actor: UserId) -> Result<()> {
    if !project_id.is_valid() {
        return Err(GraphError::validation("project id must be positive"));
    }
    if !actor.is_valid() {
        return Err(GraphError::validation("actor id must be positive"));
    }
    Ok(())
}

/// Commit on success; roll back and return the original error otherwise.
async fn finish<T: GraphTransaction, R>(
    tx: T,
    outcome: Result<R>,
    operation: &'static str,
) -> Result<R> {
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(storage)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(operation, error = %rollback_err, "Rollback failed");
            }
            tracing::warn!(operation, code = err.code(), error = %err, "Transaction rolled back");
            Err(err)
        }
    }
}
