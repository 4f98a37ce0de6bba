mod admission;
mod availability;
mod error;
mod feasibility;
mod ledger;
mod mutations;
mod overlap;
mod queries;
mod snapshot;

pub use admission::{Admitted, admit};
pub use availability::{free_windows, merge_overlapping, subtract_intervals};
pub use error::{EngineError, Rejection, Shortfall};
pub use feasibility::{cargo_limit, cargo_load, feasible_vehicles, is_feasible};
pub use ledger::{instantaneous_status, usage};
pub use overlap::{busy_vehicles, overlapping, vehicle_conflicts};
pub use snapshot::Snapshot;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::limits::*;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability::{
    ADMISSION_DURATION_SECONDS, ADMISSIONS_TOTAL, COMMIT_CONFLICTS_TOTAL, STORE_DURATION_SECONDS,
};
use crate::records::Table;
use crate::store::{StoreError, TableStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Upper bound on any single store call.
    pub store_timeout: Duration,
    /// Read-validate-write rounds before giving up on a busy table.
    pub max_commit_attempts: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }
}

pub struct Engine {
    store: Arc<dyn TableStore>,
    fleet: Fleet,
    pub notify: Arc<NotifyHub>,
    /// Serializes read-validate-write inside this process. Other writers
    /// sharing the store are caught by the version check.
    commit_lock: Mutex<()>,
    options: EngineOptions,
}

/// Table a mutation event rewrites.
fn event_table(event: &Event) -> Table {
    match event {
        Event::ReservationCreated { .. }
        | Event::ReservationUpdated { .. }
        | Event::ReservationCancelled { .. } => Table::Reservations,
        Event::EquipmentUpserted { .. } | Event::EquipmentRemoved { .. } => Table::Equipment,
        Event::UserRegistered { .. } => Table::Users,
    }
}

impl Engine {
    /// Connect to the store and take a first snapshot. An unreachable store
    /// is fatal here. Reservation rows that predate the `Id` column get their
    /// ids written back once.
    pub async fn open(
        store: Arc<dyn TableStore>,
        fleet: Fleet,
        notify: Arc<NotifyHub>,
        options: EngineOptions,
    ) -> Result<Self, EngineError> {
        let engine = Self {
            store,
            fleet,
            notify,
            commit_lock: Mutex::new(()),
            options,
        };
        let snapshot = engine.snapshot().await?;
        info!(
            "engine open: {} reservations, {} equipment items, {} users, {} fleet vehicles",
            snapshot.reservations.len(),
            snapshot.catalog.items().len(),
            snapshot.users.len(),
            engine.fleet.vehicles().len(),
        );
        if !snapshot.fresh_ids().is_empty() {
            engine.backfill_ids().await?;
        }
        Ok(engine)
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Bound a store call by `store_timeout`.
    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, EngineError> {
        let started = Instant::now();
        let result = tokio::time::timeout(self.options.store_timeout, call).await;
        metrics::histogram!(STORE_DURATION_SECONDS, "op" => op)
            .record(started.elapsed().as_secs_f64());
        match result {
            Ok(inner) => inner.map_err(EngineError::from),
            Err(_) => {
                warn!("store {op} exceeded {:?}", self.options.store_timeout);
                Err(EngineError::StoreTimeout(self.options.store_timeout))
            }
        }
    }

    /// Fresh read of all three tables.
    pub async fn snapshot(&self) -> Result<Snapshot, EngineError> {
        let (reservations, equipment, users) = self
            .bounded("read", async {
                tokio::try_join!(
                    self.store.read_table(Table::Reservations),
                    self.store.read_table(Table::Equipment),
                    self.store.read_table(Table::Users),
                )
            })
            .await?;
        Ok(Snapshot::from_tables(reservations, equipment, users))
    }

    /// Read, validate and write one table under the commit lock.
    ///
    /// `apply` edits the snapshot in place and names the event it produced;
    /// the event's table is written back with the version it was read at.
    /// A concurrent writer makes the write fail, and the whole round is
    /// repeated on a fresh read. The event is published after the lock is
    /// released and cannot fail the commit.
    ///
    /// Only the written table's version is checked. A catalog edit landing
    /// between the read and a reservation write is accepted: stock changes
    /// never re-check existing reservations, and the ledger clamps at zero.
    pub(super) async fn transact<T>(
        &self,
        op: &'static str,
        mut apply: impl FnMut(&mut Snapshot) -> Result<(T, Event), EngineError>,
    ) -> Result<T, EngineError> {
        let started = Instant::now();
        let result = self.commit_rounds(op, &mut apply).await;
        metrics::histogram!(ADMISSION_DURATION_SECONDS, "op" => op)
            .record(started.elapsed().as_secs_f64());

        let outcome = match &result {
            Ok(_) => "committed",
            Err(EngineError::Rejected(r)) => r.reason(),
            Err(EngineError::NotFound(_)) => "not_found",
            Err(e) if e.is_retryable() => "retryable",
            Err(_) => "invalid",
        };
        metrics::counter!(ADMISSIONS_TOTAL, "op" => op, "outcome" => outcome).increment(1);

        let (value, event) = result?;
        self.notify.publish(event);
        Ok(value)
    }

    async fn commit_rounds<T>(
        &self,
        op: &'static str,
        apply: &mut impl FnMut(&mut Snapshot) -> Result<(T, Event), EngineError>,
    ) -> Result<(T, Event), EngineError> {
        let _guard = self.commit_lock.lock().await;
        let attempts = self.options.max_commit_attempts.max(1);
        for attempt in 1..=attempts {
            let mut snapshot = self.snapshot().await?;
            let (value, event) = apply(&mut snapshot)?;
            let table = event_table(&event);
            let rows = snapshot.rows(table);
            let expected = snapshot.version(table);
            match self
                .bounded("write", self.store.write_table(table, rows, expected))
                .await
            {
                Ok(version) => {
                    debug!("{op}: {table} committed at version {version}");
                    return Ok((value, event));
                }
                Err(EngineError::Contended(_)) => {
                    metrics::counter!(COMMIT_CONFLICTS_TOTAL).increment(1);
                    warn!("{op}: {table} changed during attempt {attempt}/{attempts}, re-validating");
                }
                Err(e) => return Err(e),
            }
        }
        Err(EngineError::Contended(attempts))
    }

    /// Persist ids minted for legacy reservation rows.
    async fn backfill_ids(&self) -> Result<(), EngineError> {
        let _guard = self.commit_lock.lock().await;
        let attempts = self.options.max_commit_attempts.max(1);
        for _ in 0..attempts {
            let snapshot = self.snapshot().await?;
            let fresh = snapshot.fresh_ids().len();
            if fresh == 0 {
                return Ok(());
            }
            let write = self.store.write_table(
                Table::Reservations,
                snapshot.rows(Table::Reservations),
                snapshot.version(Table::Reservations),
            );
            match self.bounded("write", write).await {
                Ok(_) => {
                    info!("assigned ids to {fresh} legacy reservations");
                    return Ok(());
                }
                Err(EngineError::Contended(_)) => {
                    metrics::counter!(COMMIT_CONFLICTS_TOTAL).increment(1);
                }
                Err(e) => return Err(e),
            }
        }
        Err(EngineError::Contended(attempts))
    }
}
