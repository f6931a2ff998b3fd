//! Pipeline orchestration
//!
//! One run executes, in order and without overlap:
//!
//! 1. provision: ensure schema, then ensure table
//! 2. fetch the feed
//! 3. persist the snapshot under a timestamped name
//! 4. reload the vehicle records from that file
//! 5. insert them as one payload row, skipped when there are none
//!
//! The first failing stage stops the run. Nothing is retried and nothing
//! already written (file or row) is rolled back.

use async_trait::async_trait;
use brt_common::VehicleRecord;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::db::StoredRow;
use crate::error::IngestResult;
use crate::fetch::Fetcher;
use crate::snapshot::SnapshotStore;

/// Step of a pipeline run, used to attribute failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Provision,
    Fetch,
    Persist,
    Reload,
    Insert,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Provision => "provision",
            Stage::Fetch => "fetch",
            Stage::Persist => "persist",
            Stage::Reload => "reload",
            Stage::Insert => "insert",
        };
        f.write_str(name)
    }
}

/// Destination of reloaded records.
///
/// Both `ensure_*` calls must be idempotent.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn ensure_schema(&self) -> IngestResult<()>;

    async fn ensure_table(&self) -> IngestResult<()>;

    /// Store the records as a single row and return it
    async fn insert_rows(&self, records: &[VehicleRecord]) -> IngestResult<StoredRow>;
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Records were inserted as `row`
    Loaded {
        run_id: Uuid,
        path: PathBuf,
        row: StoredRow,
    },
    /// The snapshot had no vehicles; nothing was inserted
    Empty { run_id: Uuid, path: PathBuf },
}

impl RunOutcome {
    pub fn run_id(&self) -> Uuid {
        match self {
            RunOutcome::Loaded { run_id, .. } | RunOutcome::Empty { run_id, .. } => *run_id,
        }
    }

    /// Snapshot file written by the run
    pub fn path(&self) -> &Path {
        match self {
            RunOutcome::Loaded { path, .. } | RunOutcome::Empty { path, .. } => path,
        }
    }

    pub fn inserted(&self) -> Option<&StoredRow> {
        match self {
            RunOutcome::Loaded { row, .. } => Some(row),
            RunOutcome::Empty { .. } => None,
        }
    }
}

pub struct Pipeline<W> {
    warehouse: W,
    fetcher: Fetcher,
    store: SnapshotStore,
}

impl<W: Warehouse> Pipeline<W> {
    pub fn new(warehouse: W, fetcher: Fetcher, store: SnapshotStore) -> Self {
        Self {
            warehouse,
            fetcher,
            store,
        }
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    /// Execute one full run
    pub async fn run(&self) -> IngestResult<RunOutcome> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline_run", %run_id);

        async move {
            info!(url = %self.fetcher.url(), "Pipeline run started");
            let outcome = self.execute(run_id).await.inspect_err(|e| {
                error!(stage = %e.stage(), error = %e, "Pipeline run failed");
            })?;
            info!(
                path = %outcome.path().display(),
                inserted = outcome.inserted().is_some(),
                "Pipeline run finished"
            );
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    /// Provision, then reload and insert an existing snapshot file
    pub async fn replay(&self, path: &Path) -> IngestResult<RunOutcome> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline_replay", %run_id, path = %path.display());

        async move {
            self.provision().await?;
            self.load(run_id, path.to_path_buf()).await
        }
        .instrument(span)
        .await
        .inspect_err(|e| error!(%run_id, stage = %e.stage(), error = %e, "Replay failed"))
    }

    /// Ensure schema and table exist
    pub async fn provision(&self) -> IngestResult<()> {
        self.warehouse.ensure_schema().await?;
        self.warehouse.ensure_table().await
    }

    async fn execute(&self, run_id: Uuid) -> IngestResult<RunOutcome> {
        self.provision().await?;

        let snapshot = self.fetcher.fetch().await?;
        if !snapshot.has_vehicles() {
            warn!("Feed response has no vehicles key");
        }

        let name = self.store.name_for(chrono::Local::now().naive_local());
        let path = self.store.persist(&name, &snapshot)?;

        self.load(run_id, path).await
    }

    async fn load(&self, run_id: Uuid, path: PathBuf) -> IngestResult<RunOutcome> {
        let records = self.store.reload(&path)?;
        if records.is_empty() {
            info!(path = %path.display(), "No vehicles to insert");
            return Ok(RunOutcome::Empty { run_id, path });
        }

        let row = self.warehouse.insert_rows(&records).await?;
        Ok(RunOutcome::Loaded { run_id, path, row })
    }
}
