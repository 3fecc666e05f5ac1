//! Startup and health-check validation of the SQLite schema.

use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

/// Tables the API cannot run without.
pub const REQUIRED_TABLES: &[&str] = &[
    "users",
    "sessions",
    "topics",
    "documents",
    "flashcards",
    "generations",
    "generation_errors",
];

#[derive(Debug, Error)]
pub enum DatabaseValidationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("database not initialized")]
    NotInitialized,
    #[error("missing tables: {}", .0.join(", "))]
    MissingTables(Vec<String>),
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaReport {
    pub migrations_applied: i64,
    pub latest_migration: Option<String>,
    pub missing_tables: Vec<String>,
}

impl SchemaReport {
    pub fn is_ok(&self) -> bool {
        self.missing_tables.is_empty()
    }
}

pub struct DatabaseValidator {
    pool: SqlitePool,
}

impl DatabaseValidator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Collects migration state and missing tables without failing on them.
    pub async fn inspect(&self) -> Result<SchemaReport, DatabaseValidationError> {
        if !self.table_exists("_sqlx_migrations").await? {
            warn!("Database not initialized - _sqlx_migrations table does not exist");
            return Err(DatabaseValidationError::NotInitialized);
        }

        let migrations_applied =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
                .fetch_one(&self.pool)
                .await?;

        let latest_migration = sqlx::query_scalar::<_, String>(
            "SELECT description FROM _sqlx_migrations WHERE success = 1 ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let mut missing_tables = Vec::new();
        for table in REQUIRED_TABLES {
            if !self.table_exists(table).await? {
                missing_tables.push(table.to_string());
            }
        }

        Ok(SchemaReport {
            migrations_applied,
            latest_migration,
            missing_tables,
        })
    }

    /// Fails unless every required table is present.
    pub async fn validate(&self) -> Result<SchemaReport, DatabaseValidationError> {
        let report = self.inspect().await?;
        if !report.is_ok() {
            warn!(missing = ?report.missing_tables, "Database schema incomplete");
            return Err(DatabaseValidationError::MissingTables(report.missing_tables));
        }
        info!(
            migrations_applied = report.migrations_applied,
            latest_migration = report.latest_migration.as_deref().unwrap_or("none"),
            "Database validation complete"
        );
        Ok(report)
    }

    async fn table_exists(&self, name: &str) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use db::DBService;

    use super::*;

    #[tokio::test]
    async fn migrated_database_passes() {
        let db = DBService::new_in_memory().await.unwrap();
        let report = DatabaseValidator::new(db.pool.clone()).validate().await.unwrap();
        assert!(report.migrations_applied >= 1);
        assert_eq!(report.latest_migration.as_deref(), Some("init"));
    }

    #[tokio::test]
    async fn dropped_table_is_reported() {
        let db = DBService::new_in_memory().await.unwrap();
        sqlx::query("DROP TABLE generation_errors")
            .execute(&db.pool)
            .await
            .unwrap();

        let err = DatabaseValidator::new(db.pool.clone()).validate().await.unwrap_err();
        match err {
            DatabaseValidationError::MissingTables(tables) => {
                assert_eq!(tables, vec!["generation_errors".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_database_is_not_initialized() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let err = DatabaseValidator::new(pool).inspect().await.unwrap_err();
        assert!(matches!(err, DatabaseValidationError::NotInitialized));
    }
}
