//! # service-graph-kernel
//!
//! Atomic bulk synchronization and versioned snapshots for project
//! service-dependency graphs.
//!
//! A project's graph is a set of services (nodes) and directed dependencies
//! (edges). The kernel offers three things:
//!
//! 1. **Bulk sync**: apply a mixed batch of creates, updates and deletes in a
//!    fixed order, all-or-nothing
//! 2. **Snapshots**: capture the live graph as an immutable, per-project
//!    versioned payload
//! 3. **Restore**: replace the live graph with a snapshot, taking a backup of
//!    the current graph first unless forced
//!
//! ## Architecture
//!
//! ```text
//! HTTP routes ─→ GraphEngine ─→ sync / snapshot / restore
//!                    │                    │
//!                    └── begin/commit ────┴─→ GraphTransaction
//!                                                  ↑
//!                                  GraphStore (Postgres or Memory)
//! ```
//!
//! ## Guarantees
//!
//! - One transaction per engine call; any error rolls back everything
//! - Version numbers are unique and increasing per project
//! - Restored services get fresh ids; dependencies follow them

#![warn(clippy::all)]

pub mod canonical;
pub mod config;
pub mod engine;
pub mod error;
pub mod restore;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod types;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use config::{LogFormat, ServiceConfig};
pub use engine::GraphEngine;
pub use error::{GraphError, Result};
pub use store::{GraphStore, GraphTransaction, InMemoryGraphStore, StoreOp};
#[cfg(feature = "postgres")]
pub use store::PostgresGraphStore;
#[cfg(feature = "postgres")]
pub use store::postgres::{PostgresConfig, GRAPH_SCHEMA};
pub use types::{
    BulkChanges, BulkResult, Dependency, DependencyId, DependencyUpdate, EndpointRef,
    Environment, NewDependency, NewService, ProjectId, RestoreResult, Service, ServiceId,
    ServiceStatus, ServiceUpdate, Snapshot, SnapshotId, SnapshotPayload, UserId,
};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};

#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

/// Format version written into every snapshot payload's metadata.
/// Increment on breaking changes to the payload layout.
pub const SNAPSHOT_FORMAT_VERSION: &str = "1.0.0";
