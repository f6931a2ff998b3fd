//! Storage gateway
//!
//! Thin layer over a lazily-connecting `PgPool`. The pool is the reusable
//! connection factory; a *session* is one pooled connection checked out for a
//! single operation and handed back when it is dropped, on every exit path.

use brt_common::VehicleRecord;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::Value;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::Executor;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::StorageError;

pub mod provision;
pub mod warehouse;

pub use provision::{ensure_schema, ensure_table, TableDefinition};
pub use warehouse::PgWarehouse;

pub type DbResult<T> = Result<T, StorageError>;

/// Schema-qualified table name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    schema: String,
    table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Quoted `"schema"."table"` for use in SQL text
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Quote a SQL identifier, doubling embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// One persisted payload row
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredRow {
    pub id: i32,
    pub extracted_at: DateTime<Utc>,
    pub payload: Value,
}

impl StoredRow {
    /// Number of vehicle records in the payload document
    pub fn vehicle_count(&self) -> usize {
        self.payload.as_array().map_or(0, Vec::len)
    }
}

/// Database handle shared by the provisioner and the loader
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Build the pool without opening a connection.
    ///
    /// Connectivity problems surface on the first operation as `StorageError`.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy_with(config.connect_options());

        tracing::debug!(
            url = %config.redacted_url(),
            max_connections = config.max_connections,
            "Database pool configured"
        );

        Self { pool }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reusable connection factory for statements outside a session scope
    pub fn engine(&self) -> &PgPool {
        &self.pool
    }

    /// Run `f` with one exclusive session.
    ///
    /// The connection returns to the pool when `f` finishes, fails or panics.
    /// Driver errors are passed through unchanged.
    pub async fn with_session<T, F>(&self, f: F) -> DbResult<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, sqlx::Error>> + Send,
    {
        let mut session = self.pool.acquire().await?;
        let result = f(&mut *session).await;
        drop(session);
        Ok(result?)
    }

    /// Execute raw statement text in its own transaction.
    ///
    /// Used for schema bootstrap only. The transaction rolls back and the
    /// connection is released if execution or commit fails.
    pub async fn execute_raw(&self, sql: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        tx.execute(sqlx::raw_sql(sql)).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Insert the whole vehicle sequence as one JSON array document.
    pub async fn insert_payload(
        &self,
        table: &TableRef,
        records: &[VehicleRecord],
    ) -> DbResult<StoredRow> {
        let sql = format!(
            "INSERT INTO {} (payload) VALUES ($1) RETURNING id, extracted_at, payload",
            table.qualified()
        );
        let payload = Value::Array(records.iter().cloned().map(Value::Object).collect());

        self.with_session(move |conn| {
            Box::pin(async move {
                sqlx::query_as::<_, StoredRow>(&sql)
                    .bind(payload)
                    .fetch_one(conn)
                    .await
            })
        })
        .await
    }

    pub async fn count_rows(&self, table: &TableRef) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.qualified());
        self.with_session(move |conn| {
            Box::pin(async move { sqlx::query_scalar::<_, i64>(&sql).fetch_one(conn).await })
        })
        .await
    }

    /// Most recent rows first
    pub async fn latest_rows(&self, table: &TableRef, limit: i64) -> DbResult<Vec<StoredRow>> {
        let sql = format!(
            "SELECT id, extracted_at, payload FROM {} ORDER BY id DESC LIMIT $1",
            table.qualified()
        );
        self.with_session(move |conn| {
            Box::pin(async move {
                sqlx::query_as::<_, StoredRow>(&sql)
                    .bind(limit)
                    .fetch_all(conn)
                    .await
            })
        })
        .await
    }

    pub async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(StorageError::from)
    }
}
