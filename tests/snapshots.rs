//! Integration tests for snapshot versioning.

use std::collections::BTreeSet;

use service_graph_kernel::store::{GraphStore, GraphTransaction, InMemoryGraphStore};
use service_graph_kernel::{
    BulkChanges, GraphEngine, GraphError, NewDependency, NewService, ProjectId, SnapshotId,
    SnapshotPayload, StoreOp, UserId,
};

const PROJECT: ProjectId = ProjectId(3);
const ACTOR: UserId = UserId(1);

async fn engine_with_graph() -> GraphEngine<InMemoryGraphStore> {
    let engine = GraphEngine::new(InMemoryGraphStore::new());
    engine
        .apply_bulk_changes(
            PROJECT,
            ACTOR,
            BulkChanges {
                services: vec![
                    NewService::new("gateway", "api").with_client_ref("gw"),
                    NewService::new("orders", "worker").with_client_ref("orders"),
                ],
                dependencies: vec![NewDependency::new("gw", "orders")],
                ..BulkChanges::default()
            },
        )
        .await
        .unwrap();
    engine
}

#[tokio::test]
async fn test_versions_increase_per_project() {
    let engine = engine_with_graph().await;

    let first = engine.create_snapshot(PROJECT, ACTOR, "first").await.unwrap();
    let second = engine.create_snapshot(PROJECT, ACTOR, "second").await.unwrap();
    let other = engine.create_snapshot(ProjectId(4), ACTOR, "").await.unwrap();

    assert_eq!(first.version_num, 1);
    assert_eq!(second.version_num, 2);
    assert_eq!(other.version_num, 1);
    assert_eq!(second.notes, "second");
}

#[tokio::test]
async fn test_payload_captures_live_graph() {
    let engine = engine_with_graph().await;
    let snapshot = engine.create_snapshot(PROJECT, UserId(8), "").await.unwrap();

    let decoded = SnapshotPayload::decode(&snapshot.snapshot).unwrap();
    assert_eq!(decoded.services, engine.store().services(PROJECT).await);
    assert_eq!(decoded.dependencies, engine.store().dependencies(PROJECT).await);
    let metadata = decoded.metadata.as_ref().unwrap();
    assert_eq!(metadata.created_by, UserId(8));
    assert_eq!(metadata.service_count, 2);
    assert_eq!(metadata.dependency_count, 1);
    assert!(!metadata.backup_before_restore);
    assert_eq!(decoded.content_hash_matches(), Some(true));
}

#[tokio::test]
async fn test_list_is_newest_first_and_get_round_trips() {
    let engine = engine_with_graph().await;
    for notes in ["a", "b", "c"] {
        engine.create_snapshot(PROJECT, ACTOR, notes).await.unwrap();
    }

    let listed = engine.list_snapshots(PROJECT).await.unwrap();
    let versions: Vec<i32> = listed.iter().map(|s| s.version_num).collect();
    assert_eq!(versions, vec![3, 2, 1]);

    let fetched = engine.get_snapshot(listed[1].id).await.unwrap();
    assert_eq!(fetched, listed[1]);
    assert!(engine.list_snapshots(ProjectId(77)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_unknown_snapshot_is_not_found() {
    let engine = engine_with_graph().await;
    let err = engine.get_snapshot(SnapshotId(42)).await.unwrap_err();
    assert!(matches!(err, GraphError::NotFound { entity: "snapshot", .. }));
}

#[tokio::test]
async fn test_failed_insert_does_not_consume_version() {
    let engine = engine_with_graph().await;
    engine.store().fail_on(StoreOp::InsertSnapshot);

    assert!(engine.create_snapshot(PROJECT, ACTOR, "").await.is_err());
    assert!(engine.list_snapshots(PROJECT).await.unwrap().is_empty());

    let retry = engine.create_snapshot(PROJECT, ACTOR, "").await.unwrap();
    assert_eq!(retry.version_num, 1);
}

#[tokio::test]
async fn test_duplicate_version_is_conflict() {
    let store = InMemoryGraphStore::new();
    let engine = GraphEngine::new(store.clone());
    engine.create_snapshot(PROJECT, ACTOR, "").await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx
        .insert_snapshot(&service_graph_kernel::types::NewSnapshot {
            project_id: PROJECT,
            version_num: 1,
            payload: serde_json::json!({}),
            created_by: ACTOR,
            notes: String::new(),
        })
        .await
        .unwrap_err();
    let err: GraphError = err.into();
    assert!(matches!(err, GraphError::Conflict(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_snapshots_never_share_a_version() {
    let engine = std::sync::Arc::new(engine_with_graph().await);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let engine = std::sync::Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .create_snapshot(PROJECT, ACTOR, format!("run {i}"))
                    .await
                    .unwrap()
                    .version_num
            })
        })
        .collect();

    let mut versions = BTreeSet::new();
    for handle in handles {
        assert!(versions.insert(handle.await.unwrap()));
    }
    assert_eq!(versions, (1..=16).collect::<BTreeSet<i32>>());
}
