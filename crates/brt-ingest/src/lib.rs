//! BRT Ingest Library
//!
//! Pulls the public BRT GPS feed of Rio de Janeiro, keeps every response as a
//! timestamped file and loads the vehicle records into PostgreSQL as raw JSONB.
//!
//! # Pipeline
//!
//! Each run provisions the target schema and table, fetches the feed,
//! persists the snapshot, reloads it from disk and inserts one payload row.
//! See [`pipeline`] for the failure rules.
//!
//! # Example
//!
//! ```no_run
//! use brt_ingest::{config::Config, Database, Fetcher, PgWarehouse, Pipeline, SnapshotStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let db = Database::connect_lazy(&config.database);
//!     let pipeline = Pipeline::new(
//!         PgWarehouse::new(db, config.database.table_ref()),
//!         Fetcher::new(&config.feed)?,
//!         SnapshotStore::from_config(&config.snapshot),
//!     );
//!     pipeline.run().await?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod scheduler;
pub mod snapshot;

pub use db::{Database, PgWarehouse, StoredRow, TableRef};
pub use error::{IngestError, IngestResult, StorageError};
pub use fetch::Fetcher;
pub use pipeline::{Pipeline, RunOutcome, Stage, Warehouse};
pub use scheduler::Scheduler;
pub use snapshot::{SnapshotFormat, SnapshotStore};
