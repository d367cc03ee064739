//! Restoring a project's live graph from a snapshot.
//!
//! The live graph is replaced wholesale. Stored ids are not reused: every
//! service gets a fresh id on insert and dependencies are re-pointed through
//! an old-id to new-id table built while services are re-created.

use std::collections::BTreeMap;

use crate::error::{storage, GraphError, Result};
use crate::snapshot::{capture_payload, persist};
use crate::store::GraphTransaction;
use crate::types::{RestoreResult, ServiceId, SnapshotId, SnapshotPayload, UserId};

/// Restore a snapshot inside an open transaction.
///
/// Unless `force` is set, the live graph is first saved as a backup snapshot
/// in the same transaction. Records that fail to decode, and dependencies
/// whose endpoints were not restored, are skipped and counted.
pub async fn restore_in<T: GraphTransaction>(
    tx: &mut T,
    snapshot_id: SnapshotId,
    actor: UserId,
    force: bool,
) -> Result<RestoreResult> {
    let snapshot = tx
        .find_snapshot(snapshot_id)
        .await
        .map_err(storage)?
        .ok_or_else(|| GraphError::not_found("snapshot", snapshot_id))?;
    let project_id = snapshot.project_id;

    let decoded = SnapshotPayload::decode(&snapshot.snapshot)?;
    if decoded.content_hash_matches() == Some(false) {
        tracing::warn!(
            snapshot_id = %snapshot_id,
            "Snapshot content hash does not match its payload, restoring anyway"
        );
    }

    let mut result = RestoreResult {
        id: snapshot.id,
        version_num: snapshot.version_num,
        project_id,
        backup_snapshot_id: None,
        backup_version_num: None,
        restored_services: 0,
        restored_dependencies: 0,
        skipped_services: decoded.skipped_services,
        skipped_dependencies: decoded.skipped_dependencies,
    };

    if !force {
        let backup = capture_payload(tx, project_id, actor)
            .await?
            .as_backup_of(snapshot_id);
        let notes = format!(
            "Automatic backup before restore of snapshot {} (version {})",
            snapshot.id, snapshot.version_num
        );
        let stored = persist(tx, project_id, actor, notes, &backup).await?;
        result.backup_snapshot_id = Some(stored.id);
        result.backup_version_num = Some(stored.version_num);
    }

    let removed = tx.delete_project_services(project_id).await.map_err(storage)?;
    tracing::debug!(project_id = %project_id, removed, "Cleared live graph");

    let mut remap: BTreeMap<ServiceId, ServiceId> = BTreeMap::new();
    for service in &decoded.services {
        let mut draft = service.to_draft();
        draft.project_id = project_id;
        draft.created_by = actor;
        draft.updated_by = Some(actor);
        let created = tx.insert_service(&draft).await.map_err(storage)?;
        remap.insert(service.id, created.id);
        result.restored_services += 1;
    }

    for dependency in &decoded.dependencies {
        let endpoints = (
            remap.get(&dependency.source_id),
            remap.get(&dependency.target_id),
        );
        let (Some(&source_id), Some(&target_id)) = endpoints else {
            tracing::warn!(
                snapshot_id = %snapshot_id,
                dependency_id = %dependency.id,
                source_id = %dependency.source_id,
                target_id = %dependency.target_id,
                "Skipping dependency whose endpoints were not restored"
            );
            result.skipped_dependencies += 1;
            continue;
        };
        let mut draft = dependency.to_draft();
        draft.source_id = source_id;
        draft.target_id = target_id;
        draft.created_by = actor;
        draft.updated_by = Some(actor);
        tx.insert_dependency(&draft).await.map_err(storage)?;
        result.restored_dependencies += 1;
    }

    Ok(result)
}
