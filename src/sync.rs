//! Bulk synchronization of a project's service graph.
//!
//! A batch is applied in a fixed order inside one transaction:
//!
//! 1. delete dependencies
//! 2. delete services (their dependencies cascade)
//! 3. update services
//! 4. create services
//! 5. update dependencies
//! 6. create dependencies
//!
//! Deletes run first so a batch can free up a node and re-wire its
//! neighbours in one call. Dependency creation runs last so new edges can
//! point at services created in step 4, either by id or by `client_ref`
//! placeholder. The order also means an edge to a node deleted in step 2
//! fails to resolve.

use std::collections::BTreeMap;

use crate::error::{storage, GraphError, Result};
use crate::store::GraphTransaction;
use crate::types::{
    BulkChanges, BulkResult, DependencyDraft, EndpointRef, NewDependency, ProjectId, ServiceId,
    UserId,
};

/// Apply a validated batch inside an open transaction.
///
/// Does not commit. On error the caller must discard the transaction; the
/// steps already executed are not undone here.
pub async fn apply_in<T: GraphTransaction>(
    tx: &mut T,
    project_id: ProjectId,
    actor: UserId,
    changes: BulkChanges,
) -> Result<BulkResult> {
    let mut result = BulkResult::default();

    // 1. Delete dependencies
    if !changes.deleted_dependencies.is_empty() {
        result.deleted_dependencies_count = tx
            .delete_dependencies(project_id, &changes.deleted_dependencies)
            .await
            .map_err(storage)?;
        tracing::debug!(
            project_id = %project_id,
            requested = changes.deleted_dependencies.len(),
            deleted = result.deleted_dependencies_count,
            "Deleted dependencies"
        );
    }

    // 2. Delete services
    if !changes.deleted_services.is_empty() {
        result.deleted_services_count = tx
            .delete_services(project_id, &changes.deleted_services)
            .await
            .map_err(storage)?;
        tracing::debug!(
            project_id = %project_id,
            requested = changes.deleted_services.len(),
            deleted = result.deleted_services_count,
            "Deleted services"
        );
    }

    // 3. Update services
    for update in &changes.updated_services {
        let mut service = tx
            .find_service(project_id, update.id)
            .await
            .map_err(storage)?
            .ok_or_else(|| GraphError::not_found("service", update.id))?;
        update.apply_to(&mut service, actor);
        let updated = tx.update_service(&service).await.map_err(storage)?;
        result.updated_services.push(updated);
    }

    // 4. Create services
    let mut placeholders: BTreeMap<String, ServiceId> = BTreeMap::new();
    for new_service in changes.services {
        let client_ref = new_service.client_ref.clone();
        let draft = new_service.into_draft(project_id, actor);
        let created = tx.insert_service(&draft).await.map_err(storage)?;
        if let Some(client_ref) = client_ref {
            placeholders.insert(client_ref, created.id);
        }
        result.created_services.push(created);
    }

    // 5. Update dependencies
    for update in &changes.updated_dependencies {
        let mut dependency = tx
            .find_dependency(project_id, update.id)
            .await
            .map_err(storage)?
            .ok_or_else(|| GraphError::not_found("dependency", update.id))?;
        update.apply_to(&mut dependency, actor);
        let updated = tx.update_dependency(&dependency).await.map_err(storage)?;
        result.updated_dependencies.push(updated);
    }

    // 6. Create dependencies
    for new_dependency in &changes.dependencies {
        let draft = resolve_dependency(tx, project_id, actor, &placeholders, new_dependency).await?;
        let created = tx.insert_dependency(&draft).await.map_err(storage)?;
        result.created_dependencies.push(created);
    }

    tracing::debug!(
        project_id = %project_id,
        created_services = result.created_services.len(),
        updated_services = result.updated_services.len(),
        created_dependencies = result.created_dependencies.len(),
        updated_dependencies = result.updated_dependencies.len(),
        "Batch applied"
    );

    Ok(result)
}

async fn resolve_dependency<T: GraphTransaction>(
    tx: &mut T,
    project_id: ProjectId,
    actor: UserId,
    placeholders: &BTreeMap<String, ServiceId>,
    request: &NewDependency,
) -> Result<DependencyDraft> {
    let source_id = resolve_endpoint(tx, project_id, placeholders, &request.source_id, "source").await?;
    let target_id = resolve_endpoint(tx, project_id, placeholders, &request.target_id, "target").await?;
    Ok(DependencyDraft {
        source_id,
        target_id,
        dependency_type: request.dependency_type.clone(),
        description: request.description.clone(),
        protocol: request.protocol.clone(),
        method: request.method.clone(),
        created_by: actor,
        updated_by: None,
    })
}

async fn resolve_endpoint<T: GraphTransaction>(
    tx: &mut T,
    project_id: ProjectId,
    placeholders: &BTreeMap<String, ServiceId>,
    endpoint: &EndpointRef,
    side: &str,
) -> Result<ServiceId> {
    match endpoint {
        EndpointRef::Placeholder(name) => placeholders.get(name).copied().ok_or_else(|| {
            GraphError::validation(format!(
                "{side} {endpoint} does not name a service created in this batch"
            ))
        }),
        EndpointRef::Id(id) => match tx.find_service(project_id, *id).await.map_err(storage)? {
            Some(_) => Ok(*id),
            None => Err(GraphError::validation(format!(
                "{side} service {id} does not exist in project {project_id}"
            ))),
        },
    }
}
