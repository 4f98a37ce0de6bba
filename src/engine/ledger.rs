use std::collections::BTreeMap;

use crate::model::*;

use super::overlap::overlapping;

/// Per-item stock over `query`: `used` sums the quantities held by every
/// overlapping reservation, `available` is clamped at zero.
///
/// Reservations naming items that are no longer in the catalog are ignored.
/// Stale names survive catalog edits without erroring, at the price of
/// under-counting demand if an item is later re-added under the same name.
pub fn usage(
    existing: &[Reservation],
    catalog: &Catalog,
    query: &Span,
    exclude: Option<ReservationId>,
) -> BTreeMap<String, EquipmentUsage> {
    let mut used: BTreeMap<&str, u64> = catalog
        .items()
        .iter()
        .map(|i| (i.name.as_str(), 0))
        .collect();

    for reservation in overlapping(existing, query, exclude) {
        for (name, qty) in &reservation.equipment {
            if let Some(sum) = used.get_mut(name.as_str()) {
                *sum += u64::from(*qty);
            }
        }
    }

    catalog
        .items()
        .iter()
        .map(|item| {
            let used = used
                .get(item.name.as_str())
                .copied()
                .unwrap_or(0)
                .min(u64::from(u32::MAX)) as u32;
            (
                item.name.clone(),
                EquipmentUsage {
                    total: item.total_qty,
                    used,
                    available: item.total_qty.saturating_sub(used),
                },
            )
        })
        .collect()
}

/// What is out right now. For monitoring only; admission always checks the
/// full requested window.
pub fn instantaneous_status(
    existing: &[Reservation],
    catalog: &Catalog,
    instant: Ms,
) -> BTreeMap<String, EquipmentUsage> {
    usage(existing, catalog, &Span::at(instant), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    const H: Ms = 3_600_000;

    fn catalog(items: &[(&str, u32)]) -> Catalog {
        Catalog::new(
            items
                .iter()
                .map(|(n, q)| EquipmentItem {
                    name: n.to_string(),
                    total_qty: *q,
                    volume_score: 10,
                    description: String::new(),
                })
                .collect(),
        )
    }

    fn holding(items: &[(&str, u32)], start: Ms, end: Ms) -> Reservation {
        Reservation {
            id: Ulid::new(),
            requester: "Nok".into(),
            task: "Survey".into(),
            location: String::new(),
            headcount: 1,
            vehicle: "Personal vehicle".into(),
            equipment: items.iter().map(|(n, q)| (n.to_string(), *q)).collect(),
            span: Span::new(start, end),
        }
    }

    #[test]
    fn sums_overlapping_usage() {
        let c = catalog(&[("Tripod", 5)]);
        let existing = vec![
            holding(&[("Tripod", 2)], 9 * H, 12 * H),
            holding(&[("Tripod", 1)], 10 * H, 11 * H),
            holding(&[("Tripod", 4)], 12 * H, 13 * H), // back-to-back, not counted
        ];
        let u = usage(&existing, &c, &Span::new(10 * H, 12 * H), None);
        assert_eq!(
            u["Tripod"],
            EquipmentUsage { total: 5, used: 3, available: 2 }
        );
    }

    #[test]
    fn available_never_negative() {
        // Catalog shrank after the bookings were made.
        let c = catalog(&[("Tripod", 1)]);
        let existing = vec![
            holding(&[("Tripod", 2)], 9 * H, 12 * H),
            holding(&[("Tripod", 2)], 9 * H, 12 * H),
        ];
        let u = usage(&existing, &c, &Span::new(9 * H, 10 * H), None);
        assert_eq!(u["Tripod"].used, 4);
        assert_eq!(u["Tripod"].available, 0);
    }

    #[test]
    fn stale_items_are_ignored() {
        let c = catalog(&[("Tripod", 3)]);
        let existing = vec![holding(&[("Tripod", 1), ("Old Drone", 2)], 9 * H, 12 * H)];
        let u = usage(&existing, &c, &Span::new(9 * H, 12 * H), None);
        assert_eq!(u.len(), 1);
        assert!(!u.contains_key("Old Drone"));
        assert_eq!(u["Tripod"].used, 1);
    }

    #[test]
    fn untouched_items_are_fully_available() {
        let c = catalog(&[("Tripod", 3), ("Drone", 1)]);
        let u = usage(&[], &c, &Span::new(0, H), None);
        assert_eq!(u["Drone"], EquipmentUsage { total: 1, used: 0, available: 1 });
    }

    #[test]
    fn exclude_drops_own_usage() {
        let c = catalog(&[("Tripod", 3)]);
        let existing = vec![holding(&[("Tripod", 3)], 9 * H, 12 * H)];
        let own = existing[0].id;
        let u = usage(&existing, &c, &Span::new(9 * H, 12 * H), Some(own));
        assert_eq!(u["Tripod"].available, 3);
    }

    #[test]
    fn instantaneous_status_counts_only_running() {
        let c = catalog(&[("Tripod", 5)]);
        let existing = vec![
            holding(&[("Tripod", 2)], 9 * H, 12 * H),
            holding(&[("Tripod", 1)], 12 * H, 14 * H),
        ];
        assert_eq!(instantaneous_status(&existing, &c, 10 * H)["Tripod"].used, 2);
        // At the handover instant neither is strictly running.
        assert_eq!(instantaneous_status(&existing, &c, 12 * H)["Tripod"].used, 0);
        assert_eq!(instantaneous_status(&existing, &c, 13 * H)["Tripod"].used, 1);
    }
}
