//! Property tests for position overwrite and version monotonicity.

use proptest::prelude::*;

use service_graph_kernel::store::InMemoryGraphStore;
use service_graph_kernel::{
    BulkChanges, GraphEngine, NewService, ProjectId, ServiceUpdate, UserId,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever the starting point, an update always lands on the requested position.
    #[test]
    fn prop_update_always_sets_position(
        start in (any::<i32>(), any::<i32>()),
        target in prop_oneof![Just((0, 0)), (any::<i32>(), any::<i32>())],
    ) {
        let (x, y) = runtime().block_on(async {
            let engine = GraphEngine::new(InMemoryGraphStore::new());
            let created = engine
                .apply_bulk_changes(ProjectId(1), UserId(1), BulkChanges {
                    services: vec![NewService::new("gateway", "api").at(start.0, start.1)],
                    ..BulkChanges::default()
                })
                .await
                .unwrap();
            let id = created.created_services[0].id;
            let updated = engine
                .apply_bulk_changes(ProjectId(1), UserId(2), BulkChanges {
                    updated_services: vec![ServiceUpdate::position(id, target.0, target.1)],
                    ..BulkChanges::default()
                })
                .await
                .unwrap();
            let service = &updated.updated_services[0];
            (service.pos_x, service.pos_y)
        });
        prop_assert_eq!((x, y), target);
    }

    /// Snapshots across interleaved projects number 1..=n within each project.
    #[test]
    fn prop_versions_are_dense_per_project(projects in prop::collection::vec(1i64..4, 1..20)) {
        let per_project = runtime().block_on(async {
            let engine = GraphEngine::new(InMemoryGraphStore::new());
            for project in &projects {
                engine.create_snapshot(ProjectId(*project), UserId(1), "").await.unwrap();
            }
            let mut out = Vec::new();
            for project in 1..4 {
                let versions: Vec<i32> = engine
                    .list_snapshots(ProjectId(project))
                    .await
                    .unwrap()
                    .iter()
                    .map(|s| s.version_num)
                    .collect();
                let expected = projects.iter().filter(|p| **p == project).count() as i32;
                out.push((versions, expected));
            }
            out
        });
        for (versions, expected) in per_project {
            let mut want: Vec<i32> = (1..=expected).collect();
            want.reverse();
            prop_assert_eq!(versions, want);
        }
    }
}
