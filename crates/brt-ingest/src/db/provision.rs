//! Schema provisioning
//!
//! Idempotent "create if absent" DDL issued through the raw-SQL path before
//! any load. Objects are never altered or dropped.

use tracing::{debug, info};

use super::{quote_ident, Database, TableRef};
use crate::error::{IngestError, IngestResult};

/// Shape of the payload table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    table: TableRef,
}

impl TableDefinition {
    /// Surrogate key, server-side ingestion timestamp, non-null JSONB payload
    pub fn payload_table(table: TableRef) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn create_statement(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                 id SERIAL PRIMARY KEY,\n    \
                 extracted_at TIMESTAMPTZ NOT NULL DEFAULT now(),\n    \
                 payload JSONB NOT NULL\n\
             )",
            self.table.qualified()
        )
    }
}

pub fn create_schema_statement(name: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(name))
}

/// Create the schema unless it already exists
pub async fn ensure_schema(db: &Database, name: &str) -> IngestResult<()> {
    let sql = create_schema_statement(name);
    debug!(%sql, "Ensuring schema");

    db.execute_raw(&sql)
        .await
        .map_err(|source| IngestError::Provisioning {
            object: format!("schema {}", name),
            source,
        })?;

    info!(schema = name, "Schema ready");
    Ok(())
}

/// Create the payload table unless it already exists
pub async fn ensure_table(db: &Database, definition: &TableDefinition) -> IngestResult<()> {
    let sql = definition.create_statement();
    debug!(%sql, "Ensuring table");

    db.execute_raw(&sql)
        .await
        .map_err(|source| IngestError::Provisioning {
            object: format!("table {}", definition.table()),
            source,
        })?;

    info!(table = %definition.table(), "Table ready");
    Ok(())
}
