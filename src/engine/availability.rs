use crate::model::*;

use super::overlap::vehicle_conflicts;

/// Sub-windows of `window` in which `vehicle` holds no reservation.
///
/// Bookings are clamped to the window, merged, then punched out of it.
/// Back-to-back bookings leave no gap between them.
pub fn free_windows(
    existing: &[Reservation],
    vehicle: &str,
    window: &Span,
    exclude: Option<ReservationId>,
) -> Vec<Span> {
    let mut taken: Vec<Span> = vehicle_conflicts(existing, vehicle, window, exclude)
        .map(|r| Span::new(r.span.start.max(window.start), r.span.end.min(window.end)))
        .collect();
    if taken.is_empty() {
        return vec![*window];
    }
    taken.sort_by_key(|s| s.start);
    subtract_intervals(&[*window], &merge_overlapping(&taken))
}

/// Merge sorted overlapping or touching spans into disjoint spans.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::with_capacity(sorted.len());
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// `base` minus `to_remove`. Both inputs sorted by start, `to_remove` disjoint.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut first = 0;

    for &b in base {
        let mut cursor = b.start;
        while first < to_remove.len() && to_remove[first].end <= cursor {
            first += 1;
        }
        for r in to_remove[first..].iter().take_while(|r| r.start < b.end) {
            if r.start > cursor {
                result.push(Span::new(cursor, r.start));
            }
            cursor = cursor.max(r.end);
        }
        if cursor < b.end {
            result.push(Span::new(cursor, b.end));
        }
    }

    result
}
