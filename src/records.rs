//! Row schema of the three persisted tables and typed conversion.
//!
//! Rows are plain string vectors in the table's canonical column order; the
//! store adapter owns the physical layout.

use chrono::{DateTime, Datelike, NaiveDateTime};
use thiserror::Error;
use ulid::Ulid;

use crate::codec;
use crate::model::*;

pub type Row = Vec<String>;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Reservations,
    Equipment,
    Users,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Reservations, Table::Equipment, Table::Users];

    /// Column names. `Id` is appended after the legacy reservation columns.
    pub fn headers(self) -> &'static [&'static str] {
        match self {
            Table::Reservations => &[
                "User",
                "Task",
                "Car",
                "People",
                "Equipment",
                "Location",
                "Start_Time",
                "End_Time",
                "Id",
            ],
            Table::Equipment => &["ItemName", "TotalQty", "VolumeScore", "Description"],
            Table::Users => &["Name", "Department"],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Table::Reservations => "reservations",
            Table::Equipment => "equipment",
            Table::Users => "users",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRecord {
    #[error("row has {found} columns, expected at least {expected}")]
    ShortRow { expected: usize, found: usize },
    #[error("column {column}: cannot parse {value:?}")]
    BadValue { column: &'static str, value: String },
    #[error("start {start} is not before end {end}")]
    InvertedSpan { start: String, end: String },
    #[error("empty key column {0}")]
    EmptyKey(&'static str),
}

// ── Timestamps ───────────────────────────────────────────────────

pub fn parse_timestamp(text: &str) -> Option<Ms> {
    let text = text.trim();
    let naive = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        // Sheets sometimes drop the seconds.
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M"))
        .ok()?;
    Some(naive.and_utc().timestamp_millis())
}

/// Whether `ms` survives a format and parse round trip: a four-digit year.
pub fn is_storable(ms: Ms) -> bool {
    DateTime::from_timestamp_millis(ms).is_some_and(|dt| (1..=9999).contains(&dt.year()))
}

/// Rows carry whole seconds only.
pub fn truncate_to_second(ms: Ms) -> Ms {
    ms - ms.rem_euclid(1000)
}

pub fn format_timestamp(ms: Ms) -> String {
    match DateTime::from_timestamp_millis(ms) {
        Some(dt) => dt.naive_utc().format(TIMESTAMP_FORMAT).to_string(),
        None => ms.to_string(),
    }
}

// ── Reservations ─────────────────────────────────────────────────

/// Decoded reservation row; `fresh_id` is set when the row predates the `Id` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedReservation {
    pub reservation: Reservation,
    pub fresh_id: bool,
}

pub fn reservation_to_row(r: &Reservation) -> Row {
    vec![
        r.requester.clone(),
        r.task.clone(),
        r.vehicle.clone(),
        r.headcount.to_string(),
        codec::encode(&r.equipment),
        r.location.clone(),
        format_timestamp(r.span.start),
        format_timestamp(r.span.end),
        r.id.to_string(),
    ]
}

pub fn reservation_from_row(row: &[String]) -> Result<DecodedReservation, MalformedRecord> {
    let expected = Table::Reservations.headers().len() - 1;
    if row.len() < expected {
        return Err(MalformedRecord::ShortRow {
            expected,
            found: row.len(),
        });
    }
    let headcount = parse_number(&row[3], "People")?;
    let start = parse_timestamp(&row[6]).ok_or_else(|| bad("Start_Time", &row[6]))?;
    let end = parse_timestamp(&row[7]).ok_or_else(|| bad("End_Time", &row[7]))?;
    if start >= end {
        return Err(MalformedRecord::InvertedSpan {
            start: row[6].clone(),
            end: row[7].clone(),
        });
    }
    let raw_id = row.get(8).map(|s| s.trim()).unwrap_or_default();
    let (id, fresh_id) = if raw_id.is_empty() {
        (Ulid::new(), true)
    } else {
        (Ulid::from_string(raw_id).map_err(|_| bad("Id", raw_id))?, false)
    };
    Ok(DecodedReservation {
        reservation: Reservation {
            id,
            requester: row[0].trim().to_string(),
            task: row[1].trim().to_string(),
            vehicle: row[2].trim().to_string(),
            headcount,
            equipment: codec::decode(&row[4]),
            location: row[5].trim().to_string(),
            span: Span::new(start, end),
        },
        fresh_id,
    })
}

// ── Equipment catalog ────────────────────────────────────────────

pub fn equipment_to_row(item: &EquipmentItem) -> Row {
    vec![
        item.name.clone(),
        item.total_qty.to_string(),
        item.volume_score.to_string(),
        item.description.clone(),
    ]
}

pub fn equipment_from_row(row: &[String]) -> Result<EquipmentItem, MalformedRecord> {
    if row.len() < 3 {
        return Err(MalformedRecord::ShortRow {
            expected: 3,
            found: row.len(),
        });
    }
    let name = row[0].trim();
    if name.is_empty() {
        return Err(MalformedRecord::EmptyKey("ItemName"));
    }
    Ok(EquipmentItem {
        name: name.to_string(),
        total_qty: parse_number(&row[1], "TotalQty")?,
        volume_score: parse_number(&row[2], "VolumeScore")?,
        description: row.get(3).map(|s| s.trim().to_string()).unwrap_or_default(),
    })
}

// ── Users ────────────────────────────────────────────────────────

pub fn user_to_row(user: &User) -> Row {
    vec![user.name.clone(), user.department.clone()]
}

pub fn user_from_row(row: &[String]) -> Result<User, MalformedRecord> {
    let name = row.first().map(|s| s.trim()).unwrap_or_default();
    if name.is_empty() {
        return Err(MalformedRecord::EmptyKey("Name"));
    }
    Ok(User {
        name: name.to_string(),
        department: row.get(1).map(|s| s.trim().to_string()).unwrap_or_default(),
    })
}

/// Spreadsheet exports write integers as `3.0`.
fn parse_number(text: &str, column: &'static str) -> Result<u32, MalformedRecord> {
    let t = text.trim();
    if let Ok(n) = t.parse::<u32>() {
        return Ok(n);
    }
    match t.parse::<f64>() {
        Ok(f) if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => Ok(f as u32),
        _ => Err(bad(column, text)),
    }
}

fn bad(column: &'static str, value: &str) -> MalformedRecord {
    MalformedRecord::BadValue {
        column,
        value: value.to_string(),
    }
}
