use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::config::ConfigError;
use crate::limits::DEFAULT_PER_PASSENGER_PENALTY;

/// Unix milliseconds of a naive wall-clock instant. The only time type.
pub type Ms = i64;

pub type ReservationId = Ulid;

/// Item name to requested quantity (always >= 1).
pub type EquipmentMap = BTreeMap<String, u32>;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Degenerate `[t, t]` query used for point-in-time status. Never stored.
    pub fn at(t: Ms) -> Self {
        Self { start: t, end: t }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// The one conflict predicate. Back-to-back spans do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    /// Exclusive in time: one reservation at a time.
    Fleet,
    /// Personal car / no vehicle. Never conflicts.
    Unscheduled,
}

/// Whether cargo shares volume with passengers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CargoLayout {
    #[default]
    Shared,
    /// Physically separate compartment, e.g. a pickup bed.
    Separate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub name: String,
    pub max_seats: u32,
    pub cargo_score: u32,
    pub class: VehicleClass,
    #[serde(default)]
    pub cargo: CargoLayout,
}

impl Vehicle {
    pub fn fleet(name: &str, max_seats: u32, cargo_score: u32, cargo: CargoLayout) -> Self {
        Self {
            name: name.to_string(),
            max_seats,
            cargo_score,
            class: VehicleClass::Fleet,
            cargo,
        }
    }

    /// Unscheduled entries carry sentinel capacities so they never fail feasibility.
    pub fn unscheduled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            max_seats: u32::MAX,
            cargo_score: u32::MAX,
            class: VehicleClass::Unscheduled,
            cargo: CargoLayout::Separate,
        }
    }

    pub fn is_fleet(&self) -> bool {
        self.class == VehicleClass::Fleet
    }
}

/// Vehicle catalog in declaration order plus the cargo policy applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fleet {
    vehicles: Vec<Vehicle>,
    pub per_passenger_penalty: u32,
}

impl Fleet {
    pub fn new(vehicles: Vec<Vehicle>, per_passenger_penalty: u32) -> Result<Self, ConfigError> {
        if vehicles.is_empty() {
            return Err(ConfigError::Fleet("fleet has no vehicles".into()));
        }
        for (i, v) in vehicles.iter().enumerate() {
            if v.name.trim().is_empty() {
                return Err(ConfigError::Fleet(format!("vehicle #{i} has an empty name")));
            }
            if v.max_seats == 0 {
                return Err(ConfigError::Fleet(format!("vehicle {} has no seats", v.name)));
            }
            if vehicles[..i].iter().any(|o| o.name == v.name) {
                return Err(ConfigError::Fleet(format!("duplicate vehicle {}", v.name)));
            }
        }
        Ok(Self {
            vehicles,
            per_passenger_penalty,
        })
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn get(&self, name: &str) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.name == name)
    }
}

impl Default for Fleet {
    fn default() -> Self {
        Self {
            vehicles: vec![
                Vehicle::fleet("Honda Jazz 2019", 5, 400, CargoLayout::Shared),
                Vehicle::fleet("Isuzu Mu-X", 7, 1000, CargoLayout::Shared),
                Vehicle::fleet("Isuzu D-max 4 Doors", 5, 2500, CargoLayout::Separate),
                Vehicle::unscheduled("Personal vehicle"),
                Vehicle::unscheduled("No vehicle needed"),
            ],
            per_passenger_penalty: DEFAULT_PER_PASSENGER_PENALTY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentItem {
    pub name: String,
    pub total_qty: u32,
    pub volume_score: u32,
    pub description: String,
}

/// Equipment catalog in sheet order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    items: Vec<EquipmentItem>,
}

impl Catalog {
    pub fn new(items: Vec<EquipmentItem>) -> Self {
        let mut catalog = Self::default();
        for item in items {
            catalog.upsert(item);
        }
        catalog
    }

    pub fn items(&self) -> &[EquipmentItem] {
        &self.items
    }

    pub fn get(&self, name: &str) -> Option<&EquipmentItem> {
        self.items.iter().find(|i| i.name == name)
    }

    /// Replace in place (keeping position) or append.
    pub fn upsert(&mut self, item: EquipmentItem) -> Option<EquipmentItem> {
        match self.items.iter_mut().find(|i| i.name == item.name) {
            Some(slot) => Some(std::mem::replace(slot, item)),
            None => {
                self.items.push(item);
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<EquipmentItem> {
        let pos = self.items.iter().position(|i| i.name == name)?;
        Some(self.items.remove(pos))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub department: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub requester: String,
    pub task: String,
    pub location: String,
    pub headcount: u32,
    pub vehicle: String,
    pub equipment: EquipmentMap,
    pub span: Span,
}

/// Request-scoped input for a new reservation or an edit. Carries raw
/// `start`/`end` because an inverted window is a rejection, not a panic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub requester: String,
    pub task: String,
    pub location: String,
    pub headcount: u32,
    /// `None` picks the first feasible, free vehicle.
    pub vehicle: Option<String>,
    pub equipment: EquipmentMap,
    pub start: Ms,
    pub end: Ms,
}

impl ReservationRequest {
    /// Zero quantities mean "not requested".
    pub fn requested_equipment(&self) -> impl Iterator<Item = (&str, u32)> {
        self.equipment
            .iter()
            .filter(|(_, q)| **q > 0)
            .map(|(n, q)| (n.as_str(), *q))
    }
}

/// Mutations, as broadcast to subscribers and rendered for outbound notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ReservationCreated {
        reservation: Reservation,
    },
    ReservationUpdated {
        previous: Reservation,
        reservation: Reservation,
    },
    ReservationCancelled {
        reservation: Reservation,
    },
    EquipmentUpserted {
        item: EquipmentItem,
    },
    EquipmentRemoved {
        name: String,
    },
    UserRegistered {
        user: User,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EquipmentUsage {
    pub total: u32,
    pub used: u32,
    pub available: u32,
}

/// Read-only preview for a draft request. Advisory: commit re-checks everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub cargo_load: u64,
    pub feasible: Vec<String>,
    pub busy: Vec<String>,
    /// First feasible vehicle in declaration order, busy or not.
    pub default_vehicle: Option<String>,
    /// First feasible fleet vehicle that is not busy. This is what
    /// auto-pick would take.
    pub recommended: Option<String>,
    pub equipment: BTreeMap<String, EquipmentUsage>,
}
