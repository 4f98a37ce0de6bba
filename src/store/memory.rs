use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::records::{Row, Table};

use super::{StoreError, TableSnapshot, TableStore, UNPROVISIONED};

/// In-process table store. Versions are a per-table counter.
pub struct MemoryStore {
    tables: DashMap<Table, TableSnapshot>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Overwrite a table unconditionally, bypassing version checks.
    pub fn seed(&self, table: Table, rows: Vec<Row>) {
        let mut entry = self.tables.entry(table).or_default();
        entry.version += 1;
        entry.rows = rows;
    }

    pub fn rows(&self, table: Table) -> Vec<Row> {
        self.tables
            .get(&table)
            .map(|e| e.rows.clone())
            .unwrap_or_default()
    }

    pub fn version(&self, table: Table) -> u64 {
        self.tables.get(&table).map_or(UNPROVISIONED, |e| e.version)
    }

    /// Simulate losing the connection to the backing store.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".into()))
        }
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn read_table(&self, table: Table) -> Result<TableSnapshot, StoreError> {
        self.check_available()?;
        Ok(self
            .tables
            .get(&table)
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }

    async fn write_table(
        &self,
        table: Table,
        rows: Vec<Row>,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        self.check_available()?;
        // The entry guard holds the shard lock across compare and swap.
        let mut entry = self.tables.entry(table).or_default();
        if entry.version != expected_version {
            return Err(StoreError::VersionMismatch {
                table,
                expected: expected_version,
                found: entry.version,
            });
        }
        entry.version += 1;
        entry.rows = rows;
        Ok(entry.version)
    }
}
