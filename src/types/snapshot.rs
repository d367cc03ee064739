//! Snapshot records and the payload codec.
//!
//! A payload is a JSON object with three members:
//!
//! ```text
//! {
//!   "services":     [Service, ...],
//!   "dependencies": [Dependency, ...],
//!   "metadata":     SnapshotMetadata
//! }
//! ```
//!
//! Encoding is strict. Decoding is strict about the envelope but lenient per
//! item: a service or dependency record that does not decode is counted and
//! skipped rather than failing the whole payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dependency::Dependency;
use super::ids::{ProjectId, SnapshotId, UserId};
use super::service::Service;
use crate::canonical::canonical_hash_hex;
use crate::error::{GraphError, Result};
use crate::SNAPSHOT_FORMAT_VERSION;

/// A stored, immutable snapshot of one project's graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub project_id: ProjectId,
    /// Per-project version, starting at 1.
    pub version_num: i32,
    /// Encoded [`SnapshotPayload`].
    pub snapshot: serde_json::Value,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub notes: String,
}

/// A snapshot row ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSnapshot {
    pub project_id: ProjectId,
    pub version_num: i32,
    pub payload: serde_json::Value,
    pub created_by: UserId,
    pub notes: String,
}

/// Descriptive block stored alongside the captured lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub format_version: String,
    pub created_by: UserId,
    pub captured_at: DateTime<Utc>,
    pub service_count: usize,
    pub dependency_count: usize,
    /// Canonical xxh64 of `(services, dependencies)`.
    pub content_hash: String,
    /// Set on snapshots taken automatically before a restore.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub backup_before_restore: bool,
    /// Snapshot whose restore triggered this backup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_from: Option<SnapshotId>,
}

/// The full graph content captured by a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub services: Vec<Service>,
    pub dependencies: Vec<Dependency>,
    pub metadata: SnapshotMetadata,
}

impl SnapshotPayload {
    /// Capture a graph state, computing its content hash.
    pub fn capture(
        services: Vec<Service>,
        dependencies: Vec<Dependency>,
        created_by: UserId,
    ) -> Result<Self> {
        let content_hash = content_hash(&services, &dependencies)?;
        let metadata = SnapshotMetadata {
            format_version: SNAPSHOT_FORMAT_VERSION.to_string(),
            created_by,
            captured_at: Utc::now(),
            service_count: services.len(),
            dependency_count: dependencies.len(),
            content_hash,
            backup_before_restore: false,
            restored_from: None,
        };
        Ok(Self {
            services,
            dependencies,
            metadata,
        })
    }

    /// Mark this payload as the automatic backup taken before restoring `source`.
    pub fn as_backup_of(mut self, source: SnapshotId) -> Self {
        self.metadata.backup_before_restore = true;
        self.metadata.restored_from = Some(source);
        self
    }

    /// Encode to the stored JSON representation.
    pub fn encode(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode a stored payload, skipping records that do not decode.
    ///
    /// Fails with [`GraphError::Serialization`] only when the envelope itself
    /// is unusable (not an object, or a list member that is not an array).
    pub fn decode(value: &serde_json::Value) -> Result<DecodedPayload> {
        if !value.is_object() {
            return Err(GraphError::Serialization(
                "snapshot payload is not a JSON object".to_string(),
            ));
        }
        let raw: RawPayload = serde_json::from_value(value.clone())?;

        let mut decoded = DecodedPayload {
            metadata: raw
                .metadata
                .and_then(|m| serde_json::from_value(m).ok()),
            ..DecodedPayload::default()
        };

        for item in raw.services.unwrap_or_default() {
            match serde_json::from_value::<Service>(item) {
                Ok(service) => decoded.services.push(service),
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping undecodable service in snapshot payload");
                    decoded.skipped_services += 1;
                }
            }
        }

        for item in raw.dependencies.unwrap_or_default() {
            match serde_json::from_value::<Dependency>(item) {
                Ok(dependency) => decoded.dependencies.push(dependency),
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping undecodable dependency in snapshot payload");
                    decoded.skipped_dependencies += 1;
                }
            }
        }

        Ok(decoded)
    }
}

/// Result of a lenient payload decode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedPayload {
    pub services: Vec<Service>,
    pub dependencies: Vec<Dependency>,
    pub metadata: Option<SnapshotMetadata>,
    pub skipped_services: usize,
    pub skipped_dependencies: usize,
}

impl DecodedPayload {
    /// Compare the recorded content hash with the decoded lists.
    ///
    /// Returns `None` when there is nothing to compare against (no metadata,
    /// or records were skipped so the lists are known to differ).
    pub fn content_hash_matches(&self) -> Option<bool> {
        let metadata = self.metadata.as_ref()?;
        if self.skipped_services + self.skipped_dependencies > 0 {
            return None;
        }
        let actual = content_hash(&self.services, &self.dependencies).ok()?;
        Some(actual == metadata.content_hash)
    }
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(default)]
    services: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    dependencies: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

fn content_hash(services: &[Service], dependencies: &[Dependency]) -> Result<String> {
    Ok(canonical_hash_hex(&(services, dependencies))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service(id: i64, name: &str) -> Service {
        serde_json::from_value(json!({
            "id": id, "project_id": 1, "name": name, "type": "api",
            "health_metrics": {"uptime": 99.5, "latency_ms": 12}
        }))
        .unwrap()
    }

    fn dependency(id: i64, source: i64, target: i64) -> Dependency {
        serde_json::from_value(json!({
            "id": id, "source_id": source, "target_id": target, "protocol": "http"
        }))
        .unwrap()
    }

    #[test]
    fn test_encode_decode_preserves_records() {
        let payload = SnapshotPayload::capture(
            vec![service(1, "gateway"), service(2, "users")],
            vec![dependency(5, 1, 2)],
            UserId(3),
        )
        .unwrap();

        let decoded = SnapshotPayload::decode(&payload.encode().unwrap()).unwrap();
        assert_eq!(decoded.services, payload.services);
        assert_eq!(decoded.dependencies, payload.dependencies);
        assert_eq!(decoded.metadata.as_ref().unwrap().service_count, 2);
        assert_eq!(decoded.content_hash_matches(), Some(true));
    }

    #[test]
    fn test_undecodable_items_are_skipped() {
        let value = json!({
            "services": [
                {"id": 1, "name": "gateway", "type": "api"},
                {"id": 2, "type": "api"},
                {"id": 3, "name": "cache", "type": "store", "status": "exploded"}
            ],
            "dependencies": [
                {"id": 1, "source_id": 1, "target_id": 2},
                {"id": 2, "source_id": "one"}
            ]
        });

        let decoded = SnapshotPayload::decode(&value).unwrap();
        assert_eq!(decoded.services.len(), 1);
        assert_eq!(decoded.skipped_services, 2);
        assert_eq!(decoded.dependencies.len(), 1);
        assert_eq!(decoded.skipped_dependencies, 1);
        assert_eq!(decoded.content_hash_matches(), None);
    }

    #[test]
    fn test_missing_lists_decode_as_empty() {
        let decoded = SnapshotPayload::decode(&json!({"services": null})).unwrap();
        assert!(decoded.services.is_empty());
        assert!(decoded.dependencies.is_empty());
        assert!(decoded.metadata.is_none());
    }

    #[test]
    fn test_non_object_payload_is_serialization_error() {
        let err = SnapshotPayload::decode(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, GraphError::Serialization(_)));

        let err = SnapshotPayload::decode(&json!({"services": "all of them"})).unwrap_err();
        assert!(matches!(err, GraphError::Serialization(_)));
    }

    #[test]
    fn test_tampered_payload_hash_mismatch() {
        let payload =
            SnapshotPayload::capture(vec![service(1, "gateway")], vec![], UserId(3)).unwrap();
        let mut value = payload.encode().unwrap();
        value["services"][0]["name"] = json!("renamed");

        let decoded = SnapshotPayload::decode(&value).unwrap();
        assert_eq!(decoded.content_hash_matches(), Some(false));
    }

    #[test]
    fn test_backup_marker() {
        let payload = SnapshotPayload::capture(vec![], vec![], UserId(1))
            .unwrap()
            .as_backup_of(SnapshotId(4));
        let value = payload.encode().unwrap();
        assert_eq!(value["metadata"]["backup_before_restore"], json!(true));
        assert_eq!(value["metadata"]["restored_from"], json!(4));
    }
}
