//! Core types for the service graph.

pub mod ids;
pub mod service;
pub mod dependency;
pub mod snapshot;
pub mod batch;

pub use ids::{ProjectId, ServiceId, DependencyId, SnapshotId, UserId};
pub use service::{Service, ServiceDraft, NewService, ServiceUpdate, ServiceStatus, Environment};
pub use dependency::{Dependency, DependencyDraft, NewDependency, DependencyUpdate, EndpointRef};
pub use snapshot::{Snapshot, NewSnapshot, SnapshotMetadata, SnapshotPayload, DecodedPayload};
pub use batch::{BulkChanges, BulkResult, RestoreResult};
