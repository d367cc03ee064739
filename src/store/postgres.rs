//! PostgreSQL graph store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)
//!
//! ## Tables
//!
//! `services`, `dependencies` and `diagram_versions` hold the live graph and
//! its snapshots. `snapshot_version_counters` hands out per-project version
//! numbers; its row lock serializes concurrent snapshot creation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Executor, FromRow, Postgres, Transaction};
use std::time::Duration;

use super::{GraphStore, GraphTransaction};
use crate::error::GraphError;
use crate::types::{
    Dependency, DependencyDraft, DependencyId, NewSnapshot, ProjectId, Service, ServiceDraft,
    ServiceId, Snapshot, SnapshotId, UserId,
};

/// SQL schema for the graph tables. Every statement is idempotent.
pub const GRAPH_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS services (
    id BIGSERIAL PRIMARY KEY,
    project_id BIGINT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    type TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    version TEXT NOT NULL DEFAULT '',
    language TEXT NOT NULL DEFAULT '',
    environment TEXT NOT NULL DEFAULT 'production',
    deploy_url TEXT NOT NULL DEFAULT '',
    domain TEXT NOT NULL DEFAULT '',
    git_repo TEXT NOT NULL DEFAULT '',
    health_metrics JSONB,
    metadata JSONB,
    pos_x INTEGER NOT NULL DEFAULT 0,
    pos_y INTEGER NOT NULL DEFAULT 0,
    notes TEXT NOT NULL DEFAULT '',
    created_by BIGINT NOT NULL,
    updated_by BIGINT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT services_status_check CHECK (status IN ('active', 'inactive')),
    CONSTRAINT services_environment_check CHECK (environment IN ('production', 'development'))
);

CREATE INDEX IF NOT EXISTS idx_services_project
    ON services(project_id);

CREATE TABLE IF NOT EXISTS dependencies (
    id BIGSERIAL PRIMARY KEY,
    source_id BIGINT NOT NULL REFERENCES services(id) ON DELETE CASCADE,
    target_id BIGINT NOT NULL REFERENCES services(id) ON DELETE CASCADE,
    type TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    protocol TEXT NOT NULL DEFAULT '',
    method TEXT NOT NULL DEFAULT '',
    created_by BIGINT NOT NULL,
    updated_by BIGINT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_dependencies_source
    ON dependencies(source_id);
CREATE INDEX IF NOT EXISTS idx_dependencies_target
    ON dependencies(target_id);

CREATE TABLE IF NOT EXISTS diagram_versions (
    id BIGSERIAL PRIMARY KEY,
    project_id BIGINT NOT NULL,
    version_num INTEGER NOT NULL,
    snapshot JSONB NOT NULL,
    created_by BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    notes TEXT NOT NULL DEFAULT '',

    CONSTRAINT diagram_versions_project_version_key UNIQUE (project_id, version_num)
);

CREATE TABLE IF NOT EXISTS snapshot_version_counters (
    project_id BIGINT PRIMARY KEY,
    last_version INTEGER NOT NULL
);
"#;

/// Configuration for PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Unparseable numeric values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let number = |key: &str, default: u64| {
            lookup(key)
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };
        let count = |key: &str, default: u32| {
            lookup(key)
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };
        Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "postgresql://localhost/service_graph".to_string()),
            max_connections: count("DB_MAX_CONNECTIONS", 10),
            min_connections: count("DB_MIN_CONNECTIONS", 2),
            connect_timeout_secs: number("DB_CONNECT_TIMEOUT_SECS", 10),
            idle_timeout_secs: number("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: number("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// PostgreSQL graph store.
///
/// Uses connection pooling; each engine call runs in one pooled transaction.
pub struct PostgresGraphStore {
    pool: PgPool,
}

impl PostgresGraphStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the graph tables if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), PostgresError> {
        (&self.pool).execute(GRAPH_SCHEMA).await?;
        tracing::info!("Graph schema ensured");
        Ok(())
    }

    /// Get the connection pool for health checks.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database is reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

/// Error type for PostgreSQL store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A stored value could not be mapped onto its domain type.
    #[error("Invalid stored value: {0}")]
    Decode(String),
    /// Update of a row that does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Table entity name.
        entity: &'static str,
        /// Row id.
        id: i64,
    },
}

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

impl From<PostgresError> for GraphError {
    fn from(err: PostgresError) -> Self {
        let code = match &err {
            PostgresError::Database(sqlx::Error::Database(db)) => {
                db.code().map(|c| c.into_owned())
            }
            _ => None,
        };
        match (code.as_deref(), err) {
            (Some(UNIQUE_VIOLATION), err) => GraphError::Conflict(err.to_string()),
            (Some(FOREIGN_KEY_VIOLATION), err) => GraphError::Validation(err.to_string()),
            (_, PostgresError::NotFound { entity, id }) => GraphError::not_found(entity, id),
            (_, PostgresError::Decode(msg)) => GraphError::Serialization(msg),
            (_, err) => GraphError::Storage(Box::new(err)),
        }
    }
}

#[derive(Debug, FromRow)]
struct ServiceRow {
    id: i64,
    project_id: i64,
    name: String,
    description: String,
    #[sqlx(rename = "type")]
    service_type: String,
    status: String,
    version: String,
    language: String,
    environment: String,
    deploy_url: String,
    domain: String,
    git_repo: String,
    health_metrics: Option<serde_json::Value>,
    metadata: Option<serde_json::Value>,
    pos_x: i32,
    pos_y: i32,
    notes: String,
    created_by: i64,
    updated_by: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ServiceRow> for Service {
    type Error = PostgresError;

    fn try_from(row: ServiceRow) -> Result<Self, Self::Error> {
        Ok(Service {
            id: ServiceId(row.id),
            project_id: ProjectId(row.project_id),
            name: row.name,
            description: row.description,
            service_type: row.service_type,
            status: row.status.parse().map_err(PostgresError::Decode)?,
            version: row.version,
            language: row.language,
            environment: row.environment.parse().map_err(PostgresError::Decode)?,
            deploy_url: row.deploy_url,
            domain: row.domain,
            git_repo: row.git_repo,
            health_metrics: row.health_metrics,
            metadata: row.metadata,
            pos_x: row.pos_x,
            pos_y: row.pos_y,
            notes: row.notes,
            created_by: UserId(row.created_by),
            updated_by: row.updated_by.map(UserId),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct DependencyRow {
    id: i64,
    source_id: i64,
    target_id: i64,
    #[sqlx(rename = "type")]
    dependency_type: String,
    description: String,
    protocol: String,
    method: String,
    created_by: i64,
    updated_by: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DependencyRow> for Dependency {
    fn from(row: DependencyRow) -> Self {
        Dependency {
            id: DependencyId(row.id),
            source_id: ServiceId(row.source_id),
            target_id: ServiceId(row.target_id),
            dependency_type: row.dependency_type,
            description: row.description,
            protocol: row.protocol,
            method: row.method,
            created_by: UserId(row.created_by),
            updated_by: row.updated_by.map(UserId),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    id: i64,
    project_id: i64,
    version_num: i32,
    snapshot: serde_json::Value,
    created_by: i64,
    created_at: DateTime<Utc>,
    notes: String,
}

impl From<SnapshotRow> for Snapshot {
    fn from(row: SnapshotRow) -> Self {
        Snapshot {
            id: SnapshotId(row.id),
            project_id: ProjectId(row.project_id),
            version_num: row.version_num,
            snapshot: row.snapshot,
            created_by: UserId(row.created_by),
            created_at: row.created_at,
            notes: row.notes,
        }
    }
}

#[async_trait]
impl GraphStore for PostgresGraphStore {
    type Error = PostgresError;
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx, Self::Error> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }

    async fn get_snapshot(&self, id: SnapshotId) -> Result<Option<Snapshot>, Self::Error> {
        let row = sqlx::query_as::<_, SnapshotRow>("SELECT * FROM diagram_versions WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Snapshot::from))
    }

    async fn list_snapshots(&self, project_id: ProjectId) -> Result<Vec<Snapshot>, Self::Error> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT * FROM diagram_versions
            WHERE project_id = $1
            ORDER BY version_num DESC
            "#,
        )
        .bind(project_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Snapshot::from).collect())
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Open transaction on a [`PostgresGraphStore`].
///
/// Dropping it without commit rolls back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl GraphTransaction for PostgresTransaction {
    type Error = PostgresError;

    async fn find_service(
        &mut self,
        project_id: ProjectId,
        id: ServiceId,
    ) -> Result<Option<Service>, Self::Error> {
        let row = sqlx::query_as::<_, ServiceRow>(
            "SELECT * FROM services WHERE id = $1 AND project_id = $2",
        )
        .bind(id.0)
        .bind(project_id.0)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Service::try_from).transpose()
    }

    async fn project_services(&mut self, project_id: ProjectId) -> Result<Vec<Service>, Self::Error> {
        let rows = sqlx::query_as::<_, ServiceRow>(
            "SELECT * FROM services WHERE project_id = $1 ORDER BY id",
        )
        .bind(project_id.0)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(Service::try_from).collect()
    }

    async fn insert_service(&mut self, draft: &ServiceDraft) -> Result<Service, Self::Error> {
        let row = sqlx::query_as::<_, ServiceRow>(
            r#"
            INSERT INTO services (
                project_id, name, description, type, status, version, language,
                environment, deploy_url, domain, git_repo, health_metrics, metadata,
                pos_x, pos_y, notes, created_by, updated_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING *
            "#,
        )
        .bind(draft.project_id.0)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(&draft.service_type)
        .bind(draft.status.to_string())
        .bind(&draft.version)
        .bind(&draft.language)
        .bind(draft.environment.to_string())
        .bind(&draft.deploy_url)
        .bind(&draft.domain)
        .bind(&draft.git_repo)
        .bind(&draft.health_metrics)
        .bind(&draft.metadata)
        .bind(draft.pos_x)
        .bind(draft.pos_y)
        .bind(&draft.notes)
        .bind(draft.created_by.0)
        .bind(draft.updated_by.map(|u| u.0))
        .fetch_one(&mut *self.tx)
        .await?;
        Service::try_from(row)
    }

    async fn update_service(&mut self, service: &Service) -> Result<Service, Self::Error> {
        let row = sqlx::query_as::<_, ServiceRow>(
            r#"
            UPDATE services SET
                name = $2, description = $3, type = $4, status = $5, version = $6,
                language = $7, environment = $8, deploy_url = $9, domain = $10,
                git_repo = $11, health_metrics = $12, metadata = $13, pos_x = $14,
                pos_y = $15, notes = $16, updated_by = $17, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(service.id.0)
        .bind(&service.name)
        .bind(&service.description)
        .bind(&service.service_type)
        .bind(service.status.to_string())
        .bind(&service.version)
        .bind(&service.language)
        .bind(service.environment.to_string())
        .bind(&service.deploy_url)
        .bind(&service.domain)
        .bind(&service.git_repo)
        .bind(&service.health_metrics)
        .bind(&service.metadata)
        .bind(service.pos_x)
        .bind(service.pos_y)
        .bind(&service.notes)
        .bind(service.updated_by.map(|u| u.0))
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(PostgresError::NotFound {
            entity: "service",
            id: service.id.0,
        })?;
        Service::try_from(row)
    }

    async fn delete_services(
        &mut self,
        project_id: ProjectId,
        ids: &[ServiceId],
    ) -> Result<u64, Self::Error> {
        let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let result = sqlx::query("DELETE FROM services WHERE project_id = $1 AND id = ANY($2)")
            .bind(project_id.0)
            .bind(&ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_project_services(&mut self, project_id: ProjectId) -> Result<u64, Self::Error> {
        let result = sqlx::query("DELETE FROM services WHERE project_id = $1")
            .bind(project_id.0)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_dependency(
        &mut self,
        project_id: ProjectId,
        id: DependencyId,
    ) -> Result<Option<Dependency>, Self::Error> {
        let row = sqlx::query_as::<_, DependencyRow>(
            r#"
            SELECT d.* FROM dependencies d
            WHERE d.id = $2
              AND EXISTS (
                  SELECT 1 FROM services s
                  WHERE s.project_id = $1 AND (s.id = d.source_id OR s.id = d.target_id)
              )
            "#,
        )
        .bind(project_id.0)
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Dependency::from))
    }

    async fn project_dependencies(
        &mut self,
        project_id: ProjectId,
    ) -> Result<Vec<Dependency>, Self::Error> {
        let rows = sqlx::query_as::<_, DependencyRow>(
            r#"
            SELECT d.* FROM dependencies d
            WHERE EXISTS (
                SELECT 1 FROM services s
                WHERE s.project_id = $1 AND (s.id = d.source_id OR s.id = d.target_id)
            )
            ORDER BY d.id
            "#,
        )
        .bind(project_id.0)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Dependency::from).collect())
    }

    async fn insert_dependency(&mut self, draft: &DependencyDraft) -> Result<Dependency, Self::Error> {
        let row = sqlx::query_as::<_, DependencyRow>(
            r#"
            INSERT INTO dependencies (
                source_id, target_id, type, description, protocol, method, created_by, updated_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(draft.source_id.0)
        .bind(draft.target_id.0)
        .bind(&draft.dependency_type)
        .bind(&draft.description)
        .bind(&draft.protocol)
        .bind(&draft.method)
        .bind(draft.created_by.0)
        .bind(draft.updated_by.map(|u| u.0))
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.into())
    }

    async fn update_dependency(&mut self, dependency: &Dependency) -> Result<Dependency, Self::Error> {
        let row = sqlx::query_as::<_, DependencyRow>(
            r#"
            UPDATE dependencies SET
                type = $2, description = $3, protocol = $4, method = $5,
                updated_by = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(dependency.id.0)
        .bind(&dependency.dependency_type)
        .bind(&dependency.description)
        .bind(&dependency.protocol)
        .bind(&dependency.method)
        .bind(dependency.updated_by.map(|u| u.0))
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(PostgresError::NotFound {
            entity: "dependency",
            id: dependency.id.0,
        })?;
        Ok(row.into())
    }

    async fn delete_dependencies(
        &mut self,
        project_id: ProjectId,
        ids: &[DependencyId],
    ) -> Result<u64, Self::Error> {
        let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let result = sqlx::query(
            r#"
            DELETE FROM dependencies d
            WHERE d.id = ANY($2)
              AND EXISTS (
                  SELECT 1 FROM services s
                  WHERE s.project_id = $1 AND (s.id = d.source_id OR s.id = d.target_id)
              )
            "#,
        )
        .bind(project_id.0)
        .bind(&ids)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn next_snapshot_version(&mut self, project_id: ProjectId) -> Result<i32, Self::Error> {
        // Seeded from existing rows so tables populated before the counter
        // existed keep counting upward.
        let (version,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO snapshot_version_counters AS c (project_id, last_version)
            VALUES (
                $1,
                COALESCE((SELECT MAX(version_num) FROM diagram_versions WHERE project_id = $1), 0) + 1
            )
            ON CONFLICT (project_id) DO UPDATE SET last_version = GREATEST(
                c.last_version,
                COALESCE((SELECT MAX(version_num) FROM diagram_versions WHERE project_id = $1), 0)
            ) + 1
            RETURNING last_version
            "#,
        )
        .bind(project_id.0)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(version)
    }

    async fn insert_snapshot(&mut self, snapshot: &NewSnapshot) -> Result<Snapshot, Self::Error> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            INSERT INTO diagram_versions (project_id, version_num, snapshot, created_by, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(snapshot.project_id.0)
        .bind(snapshot.version_num)
        .bind(&snapshot.payload)
        .bind(snapshot.created_by.0)
        .bind(&snapshot.notes)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.into())
    }

    async fn find_snapshot(&mut self, id: SnapshotId) -> Result<Option<Snapshot>, Self::Error> {
        let row = sqlx::query_as::<_, SnapshotRow>("SELECT * FROM diagram_versions WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Snapshot::from))
    }

    async fn commit(self) -> Result<(), Self::Error> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), Self::Error> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_defaults() {
        let config = PostgresConfig::from_lookup(|_| None);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.max_lifetime_secs, 1800);
    }

    #[test]
    fn test_config_overrides_and_bad_numbers() {
        let vars: HashMap<&str, &str> = [
            ("DATABASE_URL", "postgresql://db/graph"),
            ("DB_MAX_CONNECTIONS", "32"),
            ("DB_IDLE_TIMEOUT_SECS", "soon"),
        ]
        .into_iter()
        .collect();
        let config = PostgresConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.database_url, "postgresql://db/graph");
        assert_eq!(config.max_connections, 32);
        assert_eq!(config.idle_timeout_secs, 300);
    }

    #[test]
    fn test_out_of_range_pool_size_uses_default() {
        let config = PostgresConfig::from_lookup(|k| match k {
            "DB_MAX_CONNECTIONS" => Some("4294967297".to_string()),
            "DB_MIN_CONNECTIONS" => Some("-1".to_string()),
            _ => None,
        });
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
    }

    #[test]
    fn test_not_found_maps_to_graph_error() {
        let err: GraphError = PostgresError::NotFound {
            entity: "service",
            id: 7,
        }
        .into();
        assert!(matches!(err, GraphError::NotFound { entity: "service", .. }));
    }

    #[test]
    fn test_schema_declares_cascade_and_unique_version() {
        assert!(GRAPH_SCHEMA.contains("ON DELETE CASCADE"));
        assert!(GRAPH_SCHEMA.contains("UNIQUE (project_id, version_num)"));
    }
}
