//! PostgreSQL-backed warehouse used by the pipeline

use async_trait::async_trait;
use brt_common::VehicleRecord;
use tracing::info;

use super::{provision, Database, StoredRow, TableDefinition, TableRef};
use crate::error::IngestResult;
use crate::pipeline::Warehouse;

/// Provisions and loads the payload table of one schema
#[derive(Debug, Clone)]
pub struct PgWarehouse {
    db: Database,
    definition: TableDefinition,
}

impl PgWarehouse {
    pub fn new(db: Database, table: TableRef) -> Self {
        Self {
            db,
            definition: TableDefinition::payload_table(table),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn table(&self) -> &TableRef {
        self.definition.table()
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn ensure_schema(&self) -> IngestResult<()> {
        provision::ensure_schema(&self.db, self.table().schema()).await
    }

    async fn ensure_table(&self) -> IngestResult<()> {
        provision::ensure_table(&self.db, &self.definition).await
    }

    async fn insert_rows(&self, records: &[VehicleRecord]) -> IngestResult<StoredRow> {
        let row = self.db.insert_payload(self.table(), records).await?;
        info!(
            row_id = row.id,
            vehicles = records.len(),
            table = %self.table(),
            "Payload inserted"
        );
        Ok(row)
    }
}
