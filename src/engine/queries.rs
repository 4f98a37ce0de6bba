use std::collections::BTreeMap;

use crate::model::*;

use super::admission;
use super::availability::free_windows;
use super::ledger::{instantaneous_status, usage};
use super::overlap::{overlapping, vehicle_conflicts};
use super::{Engine, EngineError, Rejection};

fn check_window(window: &Span) -> Result<(), EngineError> {
    if window.start >= window.end {
        return Err(Rejection::InvalidInterval.into());
    }
    Ok(())
}

impl Engine {
    /// All reservations, latest start first.
    pub async fn list_reservations(&self) -> Result<Vec<Reservation>, EngineError> {
        let mut reservations = self.snapshot().await?.reservations;
        reservations.sort_by(|a, b| b.span.start.cmp(&a.span.start));
        Ok(reservations)
    }

    pub async fn get_reservation(&self, id: ReservationId) -> Result<Reservation, EngineError> {
        self.snapshot()
            .await?
            .reservation(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// Reservations running at `instant`.
    pub async fn reservations_at(&self, instant: Ms) -> Result<Vec<Reservation>, EngineError> {
        let snap = self.snapshot().await?;
        Ok(overlapping(&snap.reservations, &Span::at(instant), None)
            .cloned()
            .collect())
    }

    pub async fn catalog(&self) -> Result<Catalog, EngineError> {
        Ok(self.snapshot().await?.catalog)
    }

    pub async fn users(&self) -> Result<Vec<User>, EngineError> {
        Ok(self.snapshot().await?.users)
    }

    /// Stock of every catalog item over `window`.
    pub async fn equipment_usage(
        &self,
        window: Span,
        exclude: Option<ReservationId>,
    ) -> Result<BTreeMap<String, EquipmentUsage>, EngineError> {
        check_window(&window)?;
        let snap = self.snapshot().await?;
        Ok(usage(&snap.reservations, &snap.catalog, &window, exclude))
    }

    /// What is out at `instant`. Not an admission check.
    pub async fn equipment_status_at(
        &self,
        instant: Ms,
    ) -> Result<BTreeMap<String, EquipmentUsage>, EngineError> {
        let snap = self.snapshot().await?;
        Ok(instantaneous_status(&snap.reservations, &snap.catalog, instant))
    }

    /// Preview for a draft. Nothing here is trusted at commit time.
    pub async fn suggest(
        &self,
        request: &ReservationRequest,
        editing: Option<ReservationId>,
    ) -> Result<Suggestion, EngineError> {
        let snap = self.snapshot().await?;
        Ok(admission::suggest(
            &snap.reservations,
            &snap.catalog,
            &self.fleet,
            request,
            editing,
        )?)
    }

    /// Bookings of one vehicle overlapping `window`, earliest first.
    pub async fn vehicle_schedule(
        &self,
        vehicle: &str,
        window: Span,
    ) -> Result<Vec<Reservation>, EngineError> {
        check_window(&window)?;
        if self.fleet.get(vehicle).is_none() {
            return Err(EngineError::NotFound(format!("vehicle {vehicle}")));
        }
        let snap = self.snapshot().await?;
        let mut schedule: Vec<Reservation> =
            vehicle_conflicts(&snap.reservations, vehicle, &window, None)
                .cloned()
                .collect();
        schedule.sort_by_key(|r| r.span.start);
        Ok(schedule)
    }

    /// Gaps in a vehicle's schedule within `window`. Unscheduled vehicles are always free.
    pub async fn vehicle_free_windows(
        &self,
        vehicle: &str,
        window: Span,
    ) -> Result<Vec<Span>, EngineError> {
        check_window(&window)?;
        let Some(v) = self.fleet.get(vehicle) else {
            return Err(EngineError::NotFound(format!("vehicle {vehicle}")));
        };
        if !v.is_fleet() {
            return Ok(vec![window]);
        }
        let snap = self.snapshot().await?;
        Ok(free_windows(&snap.reservations, vehicle, &window, None))
    }
}
