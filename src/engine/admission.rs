//! The admission chain: pure checks from a draft request to an admitted
//! (vehicle, span) pair. The first failing step decides the rejection.

use crate::limits::{MAX_HEADCOUNT, MIN_HEADCOUNT};
use crate::model::*;
use crate::records::{is_storable, truncate_to_second};

use super::error::{Rejection, Shortfall};
use super::feasibility::{cargo_load, feasible_vehicles, is_feasible};
use super::ledger::usage;
use super::overlap::{busy_vehicles, vehicle_conflicts};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admitted {
    pub vehicle: String,
    pub span: Span,
    pub cargo_load: u64,
}

pub fn admit(
    existing: &[Reservation],
    catalog: &Catalog,
    fleet: &Fleet,
    request: &ReservationRequest,
    editing: Option<ReservationId>,
) -> Result<Admitted, Rejection> {
    let span = checked_span(request)?;
    check_fields(request)?;
    check_equipment(existing, catalog, request, &span, editing)?;

    let load = cargo_load(catalog, request.requested_equipment());
    let headcount = request.headcount;
    let no_fit = || Rejection::NoFeasibleVehicle {
        headcount,
        cargo_load: load,
    };

    let vehicle = match requested_vehicle(request) {
        Some(name) => {
            let vehicle = fleet
                .get(name)
                .ok_or_else(|| Rejection::UnknownVehicle(name.to_string()))?;
            if !is_feasible(vehicle, headcount, load, fleet.per_passenger_penalty) {
                return Err(no_fit());
            }
            if let Some(conflict) = conflict_for(existing, vehicle, &span, editing) {
                return Err(conflict);
            }
            vehicle
        }
        None => {
            let candidates: Vec<&Vehicle> = feasible_vehicles(fleet, headcount, load)
                .into_iter()
                .filter(|v| v.is_fleet())
                .collect();
            let Some(first) = candidates.first() else {
                return Err(no_fit());
            };
            match candidates
                .iter()
                .find(|v| conflict_for(existing, v, &span, editing).is_none())
            {
                Some(free) => *free,
                None => {
                    return Err(conflict_for(existing, first, &span, editing)
                        .unwrap_or_else(no_fit));
                }
            }
        }
    };

    Ok(Admitted {
        vehicle: vehicle.name.clone(),
        span,
        cargo_load: load,
    })
}

/// Advisory preview of a draft. Runs the same building blocks as [`admit`]
/// but reports everything instead of stopping at the first failure.
pub fn suggest(
    existing: &[Reservation],
    catalog: &Catalog,
    fleet: &Fleet,
    request: &ReservationRequest,
    editing: Option<ReservationId>,
) -> Result<Suggestion, Rejection> {
    let span = checked_span(request)?;
    let load = cargo_load(catalog, request.requested_equipment());
    let feasible = feasible_vehicles(fleet, request.headcount, load);
    let busy = busy_vehicles(existing, fleet, &span, editing);
    let recommended = feasible
        .iter()
        .find(|v| v.is_fleet() && !busy.iter().any(|b| b.name == v.name))
        .map(|v| v.name.clone());

    Ok(Suggestion {
        cargo_load: load,
        default_vehicle: feasible.first().map(|v| v.name.clone()),
        feasible: feasible.iter().map(|v| v.name.clone()).collect(),
        busy: busy.iter().map(|v| v.name.clone()).collect(),
        recommended,
        equipment: usage(existing, catalog, &span, editing),
    })
}

/// The admitted span is exactly what the stored row will read back as.
fn checked_span(request: &ReservationRequest) -> Result<Span, Rejection> {
    if !is_storable(request.start) || !is_storable(request.end) {
        return Err(Rejection::InvalidInterval);
    }
    let start = truncate_to_second(request.start);
    let end = truncate_to_second(request.end);
    if start >= end {
        return Err(Rejection::InvalidInterval);
    }
    Ok(Span::new(start, end))
}

fn check_fields(request: &ReservationRequest) -> Result<(), Rejection> {
    if request.requester.trim().is_empty() {
        return Err(Rejection::MissingField("requester"));
    }
    if request.task.trim().is_empty() {
        return Err(Rejection::MissingField("task"));
    }
    if !(MIN_HEADCOUNT..=MAX_HEADCOUNT).contains(&request.headcount) {
        return Err(Rejection::HeadcountOutOfRange(request.headcount));
    }
    Ok(())
}

fn check_equipment(
    existing: &[Reservation],
    catalog: &Catalog,
    request: &ReservationRequest,
    span: &Span,
    editing: Option<ReservationId>,
) -> Result<(), Rejection> {
    let stock = usage(existing, catalog, span, editing);
    let shortfalls: Vec<Shortfall> = request
        .requested_equipment()
        .filter_map(|(name, requested)| {
            let available = stock.get(name).map_or(0, |u| u.available);
            (requested > available).then(|| Shortfall {
                item: name.to_string(),
                available,
                requested,
            })
        })
        .collect();
    if shortfalls.is_empty() {
        Ok(())
    } else {
        Err(Rejection::EquipmentUnavailable(shortfalls))
    }
}

fn requested_vehicle(request: &ReservationRequest) -> Option<&str> {
    request
        .vehicle
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// First overlapping booking of a fleet vehicle. Unscheduled vehicles never conflict.
fn conflict_for(
    existing: &[Reservation],
    vehicle: &Vehicle,
    span: &Span,
    editing: Option<ReservationId>,
) -> Option<Rejection> {
    if !vehicle.is_fleet() {
        return None;
    }
    vehicle_conflicts(existing, &vehicle.name, span, editing)
        .next()
        .map(|r| Rejection::VehicleConflict {
            vehicle: vehicle.name.clone(),
            reservation: r.id,
            requester: r.requester.clone(),
            span: r.span,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    const H: Ms = 3_600_000;

    fn fleet() -> Fleet {
        Fleet::new(
            vec![
                Vehicle::fleet("Van-A", 7, 1000, CargoLayout::Shared),
                Vehicle::fleet("Van-B", 7, 1000, CargoLayout::Shared),
                Vehicle::fleet("Hatchback", 4, 300, CargoLayout::Shared),
                Vehicle::unscheduled("Personal vehicle"),
            ],
            20,
        )
        .unwrap()
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            EquipmentItem { name: "Tripod".into(), total_qty: 1, volume_score: 30, description: String::new() },
            EquipmentItem { name: "Drone".into(), total_qty: 2, volume_score: 120, description: String::new() },
        ])
    }

    fn request(vehicle: Option<&str>, start: Ms, end: Ms) -> ReservationRequest {
        ReservationRequest {
            requester: "Nok".into(),
            task: "Survey".into(),
            location: "Lamphun".into(),
            headcount: 2,
            vehicle: vehicle.map(str::to_string),
            equipment: EquipmentMap::new(),
            start,
            end,
        }
    }

    fn booked(vehicle: &str, start: Ms, end: Ms, items: &[(&str, u32)]) -> Reservation {
        Reservation {
            id: Ulid::new(),
            requester: "Lek".into(),
            task: "Delivery".into(),
            location: String::new(),
            headcount: 2,
            vehicle: vehicle.into(),
            equipment: items.iter().map(|(n, q)| (n.to_string(), *q)).collect(),
            span: Span::new(start, end),
        }
    }

    #[test]
    fn admits_free_vehicle() {
        let admitted = admit(&[], &catalog(), &fleet(), &request(Some("Van-A"), 9 * H, 12 * H), None).unwrap();
        assert_eq!(admitted.vehicle, "Van-A");
        assert_eq!(admitted.span, Span::new(9 * H, 12 * H));
    }

    #[test]
    fn conflict_reports_holder() {
        let existing = vec![booked("Van-A", 9 * H, 12 * H, &[])];
        let err = admit(&existing, &catalog(), &fleet(), &request(Some("Van-A"), 11 * H, 14 * H), None)
            .unwrap_err();
        match err {
            Rejection::VehicleConflict { vehicle, reservation, requester, span } => {
                assert_eq!(vehicle, "Van-A");
                assert_eq!(reservation, existing[0].id);
                assert_eq!(requester, "Lek");
                assert_eq!(span, Span::new(9 * H, 12 * H));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn back_to_back_is_admitted() {
        let existing = vec![booked("Van-A", 9 * H, 12 * H, &[])];
        assert!(admit(&existing, &catalog(), &fleet(), &request(Some("Van-A"), 12 * H, 14 * H), None).is_ok());
    }

    #[test]
    fn unscheduled_never_conflicts() {
        let existing = vec![booked("Personal vehicle", 9 * H, 12 * H, &[])];
        let r = request(Some("Personal vehicle"), 9 * H, 12 * H);
        assert!(admit(&existing, &catalog(), &fleet(), &r, None).is_ok());
    }

    #[test]
    fn edit_excludes_itself() {
        let existing = vec![booked("Van-A", 9 * H, 12 * H, &[("Tripod", 1)])];
        let mut r = request(Some("Van-A"), 10 * H, 13 * H);
        r.equipment.insert("Tripod".into(), 1);
        assert!(admit(&existing, &catalog(), &fleet(), &r, None).is_err());
        assert!(admit(&existing, &catalog(), &fleet(), &r, Some(existing[0].id)).is_ok());
    }

    #[test]
    fn equipment_shortfall_lists_every_item() {
        let existing = vec![booked("Van-B", 9 * H, 12 * H, &[("Drone", 1)])];
        let mut r = request(Some("Van-A"), 10 * H, 11 * H);
        r.equipment.insert("Tripod".into(), 2);
        r.equipment.insert("Drone".into(), 2);
        r.equipment.insert("Ghost".into(), 1);
        let err = admit(&existing, &catalog(), &fleet(), &r, None).unwrap_err();
        let Rejection::EquipmentUnavailable(mut shortfalls) = err else {
            panic!("expected shortfall");
        };
        shortfalls.sort_by(|a, b| a.item.cmp(&b.item));
        assert_eq!(
            shortfalls,
            vec![
                Shortfall { item: "Drone".into(), available: 1, requested: 2 },
                Shortfall { item: "Ghost".into(), available: 0, requested: 1 },
                Shortfall { item: "Tripod".into(), available: 1, requested: 2 },
            ]
        );
    }

    #[test]
    fn zero_quantities_are_not_requested() {
        let mut r = request(Some("Van-A"), 9 * H, 10 * H);
        r.equipment.insert("Ghost".into(), 0);
        assert!(admit(&[], &catalog(), &fleet(), &r, None).is_ok());
    }

    #[test]
    fn validation_order_first_failure_wins() {
        let existing = vec![booked("Van-A", 9 * H, 12 * H, &[])];
        let mut r = request(Some("Nope"), 12 * H, 9 * H);
        r.requester.clear();
        r.equipment.insert("Tripod".into(), 5);
        let check = |r: &ReservationRequest| admit(&existing, &catalog(), &fleet(), r, None).unwrap_err();

        assert_eq!(check(&r), Rejection::InvalidInterval);
        r.start = 9 * H;
        r.end = 12 * H;
        assert_eq!(check(&r), Rejection::MissingField("requester"));
        r.requester = "Nok".into();
        r.headcount = 11;
        assert_eq!(check(&r), Rejection::HeadcountOutOfRange(11));
        r.headcount = 2;
        assert!(matches!(check(&r), Rejection::EquipmentUnavailable(_)));
        r.equipment.clear();
        assert_eq!(check(&r), Rejection::UnknownVehicle("Nope".into()));
        r.vehicle = Some("Van-A".into());
        assert!(matches!(check(&r), Rejection::VehicleConflict { .. }));
    }

    #[test]
    fn span_is_cut_to_whole_seconds() {
        let within_a_second = request(Some("Van-A"), 9 * H + 100, 9 * H + 900);
        assert_eq!(
            admit(&[], &catalog(), &fleet(), &within_a_second, None).unwrap_err(),
            Rejection::InvalidInterval
        );
        let ragged = request(Some("Van-A"), 9 * H + 100, 10 * H + 900);
        let admitted = admit(&[], &catalog(), &fleet(), &ragged, None).unwrap();
        assert_eq!(admitted.span, Span::new(9 * H, 10 * H));
    }

    #[test]
    fn unstorable_instants_are_invalid() {
        // 10000-01-01 00:00:00
        let year_10000: Ms = 253_402_300_800_000;
        for (start, end) in [(i64::MIN, 9 * H), (9 * H, i64::MAX), (year_10000, year_10000 + H)] {
            let r = request(Some("Van-A"), start, end);
            assert_eq!(
                admit(&[], &catalog(), &fleet(), &r, None).unwrap_err(),
                Rejection::InvalidInterval
            );
        }
    }

    #[test]
    fn explicit_vehicle_must_fit() {
        let mut r = request(Some("Hatchback"), 9 * H, 10 * H);
        r.headcount = 6;
        assert_eq!(
            admit(&[], &catalog(), &fleet(), &r, None).unwrap_err(),
            Rejection::NoFeasibleVehicle { headcount: 6, cargo_load: 0 }
        );
    }

    #[test]
    fn auto_pick_takes_first_free_fleet_vehicle() {
        let existing = vec![booked("Van-A", 9 * H, 12 * H, &[])];
        let admitted = admit(&existing, &catalog(), &fleet(), &request(None, 10 * H, 11 * H), None).unwrap();
        assert_eq!(admitted.vehicle, "Van-B");
    }

    #[test]
    fn auto_pick_reports_first_conflict_when_all_busy() {
        let existing = vec![
            booked("Van-A", 9 * H, 12 * H, &[]),
            booked("Van-B", 9 * H, 12 * H, &[]),
        ];
        let mut r = request(None, 10 * H, 11 * H);
        r.headcount = 6;
        match admit(&existing, &catalog(), &fleet(), &r, None).unwrap_err() {
            Rejection::VehicleConflict { vehicle, reservation, .. } => {
                assert_eq!(vehicle, "Van-A");
                assert_eq!(reservation, existing[0].id);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn auto_pick_without_fit_is_no_feasible_vehicle() {
        let mut r = request(None, 10 * H, 11 * H);
        r.headcount = 8;
        assert!(matches!(
            admit(&[], &catalog(), &fleet(), &r, None),
            Err(Rejection::NoFeasibleVehicle { headcount: 8, .. })
        ));
    }

    #[test]
    fn suggestion_reports_busy_and_recommended() {
        let existing = vec![booked("Van-A", 9 * H, 12 * H, &[("Drone", 1)])];
        let mut r = request(None, 10 * H, 11 * H);
        r.equipment.insert("Drone".into(), 1);
        let s = suggest(&existing, &catalog(), &fleet(), &r, None).unwrap();
        assert_eq!(s.cargo_load, 120);
        assert_eq!(s.feasible, vec!["Van-A", "Van-B", "Hatchback", "Personal vehicle"]);
        assert_eq!(s.busy, vec!["Van-A"]);
        assert_eq!(s.default_vehicle.as_deref(), Some("Van-A"));
        assert_eq!(s.recommended.as_deref(), Some("Van-B"));
        assert_eq!(s.equipment["Drone"].available, 1);
    }

    #[test]
    fn default_vehicle_may_be_unscheduled() {
        let mut r = request(None, 10 * H, 11 * H);
        r.headcount = 8;
        let s = suggest(&[], &catalog(), &fleet(), &r, None).unwrap();
        assert_eq!(s.feasible, vec!["Personal vehicle"]);
        assert_eq!(s.default_vehicle.as_deref(), Some("Personal vehicle"));
        assert_eq!(s.recommended, None);
    }
}
