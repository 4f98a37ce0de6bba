//! Whole-table row store: the only persistence primitive the engine needs.
//!
//! Every table is read in full and overwritten in full. Writes carry the
//! version token of the snapshot they were derived from; a store that sees a
//! different current version refuses the write.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::records::{Row, Table};

/// Version token of a table that does not exist yet.
pub const UNPROVISIONED: u64 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableSnapshot {
    pub version: u64,
    pub rows: Vec<Row>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("table {table} changed concurrently (expected version {expected}, found {found})")]
    VersionMismatch { table: Table, expected: u64, found: u64 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[async_trait]
pub trait TableStore: Send + Sync {
    /// A missing table reads as empty at [`UNPROVISIONED`].
    async fn read_table(&self, table: Table) -> Result<TableSnapshot, StoreError>;

    /// Overwrite `table` if its current version is still `expected_version`.
    /// Returns the new version.
    async fn write_table(
        &self,
        table: Table,
        rows: Vec<Row>,
        expected_version: u64,
    ) -> Result<u64, StoreError>;
}
