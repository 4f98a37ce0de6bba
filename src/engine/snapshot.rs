use std::collections::HashSet;

use crate::model::*;
use crate::observability::MALFORMED_ROWS_TOTAL;
use crate::records::{self, Row, Table};
use crate::store::TableSnapshot;

/// Typed view of all three tables as read at one point in time.
///
/// Rows that fail to parse, or repeat an id or a name already seen, are left
/// out of the view but kept verbatim, so writing the table back never loses
/// them.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub reservations: Vec<Reservation>,
    pub catalog: Catalog,
    pub users: Vec<User>,
    versions: [u64; 3],
    unparsed: [Vec<Row>; 3],
    fresh_ids: Vec<ReservationId>,
}

fn slot(table: Table) -> usize {
    match table {
        Table::Reservations => 0,
        Table::Equipment => 1,
        Table::Users => 2,
    }
}

impl Snapshot {
    pub fn from_tables(
        reservations: TableSnapshot,
        equipment: TableSnapshot,
        users: TableSnapshot,
    ) -> Self {
        let mut snap = Snapshot {
            versions: [reservations.version, equipment.version, users.version],
            ..Default::default()
        };

        let mut seen_ids = HashSet::new();
        for row in reservations.rows {
            match records::reservation_from_row(&row) {
                Ok(decoded) if seen_ids.insert(decoded.reservation.id) => {
                    if decoded.fresh_id {
                        snap.fresh_ids.push(decoded.reservation.id);
                    }
                    snap.reservations.push(decoded.reservation);
                }
                Ok(decoded) => snap.skip(
                    Table::Reservations,
                    row,
                    &format!("duplicate id {}", decoded.reservation.id),
                ),
                Err(e) => snap.skip(Table::Reservations, row, &e.to_string()),
            }
        }

        let mut items = Vec::new();
        for row in equipment.rows {
            match records::equipment_from_row(&row) {
                Ok(item) if items.iter().all(|i: &EquipmentItem| i.name != item.name) => {
                    items.push(item)
                }
                Ok(item) => snap.skip(Table::Equipment, row, &format!("duplicate item {}", item.name)),
                Err(e) => snap.skip(Table::Equipment, row, &e.to_string()),
            }
        }
        snap.catalog = Catalog::new(items);

        for row in users.rows {
            match records::user_from_row(&row) {
                Ok(user) if snap.users.iter().all(|u| u.name != user.name) => snap.users.push(user),
                Ok(user) => snap.skip(Table::Users, row, &format!("duplicate user {}", user.name)),
                Err(e) => snap.skip(Table::Users, row, &e.to_string()),
            }
        }

        snap
    }

    fn skip(&mut self, table: Table, row: Row, reason: &str) {
        tracing::warn!("ignoring {table} row {row:?}: {reason}");
        metrics::counter!(MALFORMED_ROWS_TOTAL, "table" => table.name()).increment(1);
        self.unparsed[slot(table)].push(row);
    }

    /// Version token each table had when it was read.
    pub fn version(&self, table: Table) -> u64 {
        self.versions[slot(table)]
    }

    /// Full row set to write back: the typed view followed by ignored rows.
    pub fn rows(&self, table: Table) -> Vec<Row> {
        let mut rows: Vec<Row> = match table {
            Table::Reservations => self
                .reservations
                .iter()
                .map(records::reservation_to_row)
                .collect(),
            Table::Equipment => self
                .catalog
                .items()
                .iter()
                .map(records::equipment_to_row)
                .collect(),
            Table::Users => self.users.iter().map(records::user_to_row).collect(),
        };
        rows.extend(self.unparsed[slot(table)].iter().cloned());
        rows
    }

    pub fn unparsed(&self, table: Table) -> &[Row] {
        &self.unparsed[slot(table)]
    }

    /// Ids minted during this read for rows that had none.
    pub fn fresh_ids(&self) -> &[ReservationId] {
        &self.fresh_ids
    }

    pub fn reservation(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }
}
