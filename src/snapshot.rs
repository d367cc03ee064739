//! Versioned snapshots of a project's live graph.

use crate::error::{storage, Result};
use crate::store::GraphTransaction;
use crate::types::{NewSnapshot, ProjectId, Snapshot, SnapshotPayload, UserId};

/// Capture the live graph of a project as a payload, without persisting it.
pub async fn capture_payload<T: GraphTransaction>(
    tx: &mut T,
    project_id: ProjectId,
    actor: UserId,
) -> Result<SnapshotPayload> {
    let services = tx.project_services(project_id).await.map_err(storage)?;
    let dependencies = tx.project_dependencies(project_id).await.map_err(storage)?;
    SnapshotPayload::capture(services, dependencies, actor)
}

/// Persist a payload under the project's next version number.
pub async fn persist<T: GraphTransaction>(
    tx: &mut T,
    project_id: ProjectId,
    actor: UserId,
    notes: String,
    payload: &SnapshotPayload,
) -> Result<Snapshot> {
    let version_num = tx.next_snapshot_version(project_id).await.map_err(storage)?;
    let snapshot = tx
        .insert_snapshot(&NewSnapshot {
            project_id,
            version_num,
            payload: payload.encode()?,
            created_by: actor,
            notes,
        })
        .await
        .map_err(storage)?;

    tracing::debug!(
        project_id = %project_id,
        snapshot_id = %snapshot.id,
        version_num,
        services = payload.metadata.service_count,
        dependencies = payload.metadata.dependency_count,
        "Snapshot persisted"
    );
    Ok(snapshot)
}

/// Capture and persist the live graph of a project inside an open transaction.
pub async fn capture_in<T: GraphTransaction>(
    tx: &mut T,
    project_id: ProjectId,
    actor: UserId,
    notes: String,
) -> Result<Snapshot> {
    let payload = capture_payload(tx, project_id, actor).await?;
    persist(tx, project_id, actor, notes, &payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{GraphStore, InMemoryGraphStore};
    use crate::types::{DependencyDraft, NewService};

    #[tokio::test]
    async fn test_capture_includes_services_and_edges() {
        let store = InMemoryGraphStore::new();
        let a = store
            .seed_service(NewService::new("gateway", "api").into_draft(ProjectId(1), UserId(1)))
            .await;
        let b = store
            .seed_service(NewService::new("users", "api").into_draft(ProjectId(1), UserId(1)))
            .await;
        store
            .seed_dependency(DependencyDraft {
                source_id: a.id,
                target_id: b.id,
                dependency_type: "sync".into(),
                description: String::new(),
                protocol: "grpc".into(),
                method: String::new(),
                created_by: UserId(1),
                updated_by: None,
            })
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        let snapshot = capture_in(&mut tx, ProjectId(1), UserId(2), "first".into())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(snapshot.version_num, 1);
        assert_eq!(snapshot.snapshot["services"].as_array().unwrap().len(), 2);
        assert_eq!(snapshot.snapshot["dependencies"].as_array().unwrap().len(), 1);
        assert_eq!(snapshot.snapshot["metadata"]["created_by"], 2);
    }

    #[tokio::test]
    async fn test_empty_project_snapshot() {
        let store = InMemoryGraphStore::new();
        let mut tx = store.begin().await.unwrap();
        let snapshot = capture_in(&mut tx, ProjectId(5), UserId(1), String::new())
            .await
            .unwrap();
        assert_eq!(snapshot.version_num, 1);
        assert_eq!(snapshot.snapshot["metadata"]["service_count"], 0);
    }
}
