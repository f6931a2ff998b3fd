//! BRT Common Library
//!
//! Shared types, error handling and logging for the BRT GPS ingestion workspace.
//!
//! # Overview
//!
//! - **Types**: the open-ended [`VehicleRecord`] and the [`Snapshot`] envelope
//!   returned by the GPS feed
//! - **Error Handling**: [`BrtError`] and the crate [`Result`] alias
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use brt_common::{Result, Snapshot};
//!
//! fn count(body: &[u8]) -> Result<usize> {
//!     let snapshot = Snapshot::from_slice(body)?;
//!     Ok(snapshot.vehicle_count())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{BrtError, Result};
pub use types::{Snapshot, VehicleRecord, VEHICLES_KEY};
