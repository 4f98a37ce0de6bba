use crate::model::*;

/// Total volume of the requested equipment in catalog volume-score units.
/// Items missing from the catalog contribute nothing.
pub fn cargo_load<'a>(
    catalog: &Catalog,
    equipment: impl IntoIterator<Item = (&'a str, u32)>,
) -> u64 {
    equipment
        .into_iter()
        .filter_map(|(name, qty)| {
            catalog
                .get(name)
                .map(|item| u64::from(item.volume_score) * u64::from(qty))
        })
        .sum()
}

/// Cargo capacity left once `headcount` passengers are seated. Passengers eat
/// into shared cargo space; a separate compartment is unaffected.
pub fn cargo_limit(vehicle: &Vehicle, headcount: u32, per_passenger_penalty: u32) -> i64 {
    let score = i64::from(vehicle.cargo_score);
    if !vehicle.is_fleet() || vehicle.cargo == CargoLayout::Separate {
        return score;
    }
    score - i64::from(headcount) * i64::from(per_passenger_penalty)
}

pub fn is_feasible(vehicle: &Vehicle, headcount: u32, load: u64, per_passenger_penalty: u32) -> bool {
    if headcount > vehicle.max_seats {
        return false;
    }
    let limit = cargo_limit(vehicle, headcount, per_passenger_penalty);
    limit >= 0 && load <= limit as u64
}

/// Vehicles that can carry `headcount` people and `load`, in declaration order.
pub fn feasible_vehicles(fleet: &Fleet, headcount: u32, load: u64) -> Vec<&Vehicle> {
    fleet
        .vehicles()
        .iter()
        .filter(|v| is_feasible(v, headcount, load, fleet.per_passenger_penalty))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fleet() -> Fleet {
        Fleet::new(
            vec![
                Vehicle::fleet("Hatchback", 5, 400, CargoLayout::Shared),
                Vehicle::fleet("SUV", 7, 1000, CargoLayout::Shared),
                Vehicle::fleet("Pickup", 5, 2500, CargoLayout::Separate),
                Vehicle::unscheduled("Personal vehicle"),
            ],
            20,
        )
        .unwrap()
    }

    fn names<'a>(vs: &[&'a Vehicle]) -> Vec<&'a str> {
        vs.iter().map(|v| v.name.as_str()).collect()
    }

    #[test]
    fn seats_exclude_small_vehicles() {
        let f = fleet();
        assert_eq!(
            names(&feasible_vehicles(&f, 6, 0)),
            vec!["SUV", "Personal vehicle"]
        );
    }

    #[test]
    fn passengers_reduce_shared_cargo() {
        let f = fleet();
        let suv = f.get("SUV").unwrap();
        assert_eq!(cargo_limit(suv, 4, 20), 920);
        assert!(is_feasible(suv, 4, 920, 20));
        assert!(!is_feasible(suv, 4, 921, 20));
    }

    #[test]
    fn separate_compartment_ignores_passengers() {
        let f = fleet();
        let pickup = f.get("Pickup").unwrap();
        assert_eq!(cargo_limit(pickup, 5, 20), 2500);
        assert_eq!(names(&feasible_vehicles(&f, 5, 1500)), vec!["Pickup", "Personal vehicle"]);
    }

    #[test]
    fn unscheduled_always_fits() {
        let f = fleet();
        assert_eq!(names(&feasible_vehicles(&f, 10, 1_000_000)), vec!["Personal vehicle"]);
    }

    #[test]
    fn exhausted_limit_fits_nothing() {
        let v = Vehicle::fleet("Tiny", 5, 50, CargoLayout::Shared);
        assert_eq!(cargo_limit(&v, 5, 20), -50);
        assert!(!is_feasible(&v, 5, 0, 20));
    }

    #[test]
    fn load_counts_catalog_items_only() {
        let catalog = Catalog::new(vec![
            EquipmentItem { name: "Tripod".into(), total_qty: 5, volume_score: 30, description: String::new() },
            EquipmentItem { name: "Drone".into(), total_qty: 2, volume_score: 120, description: String::new() },
        ]);
        let load = cargo_load(&catalog, [("Tripod", 2), ("Drone", 1), ("Ghost", 9)]);
        assert_eq!(load, 180);
    }
}
