use crate::model::*;

/// Reservations whose span overlaps `query`, in input order. `exclude` drops
/// one reservation first so an edit never conflicts with its own prior self.
pub fn overlapping<'a>(
    existing: &'a [Reservation],
    query: &Span,
    exclude: Option<ReservationId>,
) -> impl Iterator<Item = &'a Reservation> + 'a {
    let query = *query;
    existing
        .iter()
        .filter(move |r| Some(r.id) != exclude)
        .filter(move |r| r.span.overlaps(&query))
}

/// Overlapping reservations holding `vehicle`.
pub fn vehicle_conflicts<'a>(
    existing: &'a [Reservation],
    vehicle: &'a str,
    query: &Span,
    exclude: Option<ReservationId>,
) -> impl Iterator<Item = &'a Reservation> + 'a {
    overlapping(existing, query, exclude).filter(move |r| r.vehicle == vehicle)
}

/// Fleet vehicles already committed somewhere in `query`, in declaration order.
/// Unscheduled vehicles are never busy.
pub fn busy_vehicles<'a>(
    existing: &[Reservation],
    fleet: &'a Fleet,
    query: &Span,
    exclude: Option<ReservationId>,
) -> Vec<&'a Vehicle> {
    let committed: Vec<&str> = overlapping(existing, query, exclude)
        .map(|r| r.vehicle.as_str())
        .collect();
    fleet
        .vehicles()
        .iter()
        .filter(|v| v.is_fleet() && committed.contains(&v.name.as_str()))
        .collect()
}
