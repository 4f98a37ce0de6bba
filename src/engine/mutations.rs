use ulid::Ulid;

use crate::codec::NONE_SENTINEL;
use crate::limits::*;
use crate::model::*;

use super::admission::{Admitted, admit};
use super::{Engine, EngineError};

fn check_request_limits(request: &ReservationRequest) -> Result<(), EngineError> {
    if request.requester.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("requester name too long"));
    }
    if request.task.len() > MAX_TEXT_LEN || request.location.len() > MAX_TEXT_LEN {
        return Err(EngineError::LimitExceeded("text field too long"));
    }
    if request.equipment.len() > MAX_EQUIPMENT_LINES {
        return Err(EngineError::LimitExceeded("too many equipment lines"));
    }
    if request.end.saturating_sub(request.start) > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("reservation too long"));
    }
    Ok(())
}

fn build_reservation(id: ReservationId, request: &ReservationRequest, admitted: Admitted) -> Reservation {
    Reservation {
        id,
        requester: request.requester.trim().to_string(),
        task: request.task.trim().to_string(),
        location: request.location.trim().to_string(),
        headcount: request.headcount,
        vehicle: admitted.vehicle,
        equipment: request
            .requested_equipment()
            .map(|(name, qty)| (name.to_string(), qty))
            .collect(),
        span: admitted.span,
    }
}

/// Names end up inside the comma-separated equipment column.
fn check_item(item: &EquipmentItem) -> Result<(), EngineError> {
    let name = item.name.as_str();
    if name.is_empty() || name != name.trim() {
        return Err(EngineError::InvalidCatalog(
            "item name must be non-empty without surrounding whitespace".into(),
        ));
    }
    if name.contains(',') || name == NONE_SENTINEL {
        return Err(EngineError::InvalidCatalog(format!(
            "item name {name:?} cannot be stored"
        )));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("item name too long"));
    }
    if item.description.len() > MAX_TEXT_LEN {
        return Err(EngineError::LimitExceeded("description too long"));
    }
    Ok(())
}

impl Engine {
    /// Validate `request` against a fresh read and commit it.
    pub async fn reserve(&self, request: ReservationRequest) -> Result<Reservation, EngineError> {
        check_request_limits(&request)?;
        self.transact("reserve", |snap| {
            if snap.reservations.len() >= MAX_RESERVATIONS {
                return Err(EngineError::LimitExceeded("too many reservations"));
            }
            let admitted = admit(&snap.reservations, &snap.catalog, &self.fleet, &request, None)?;
            let reservation = build_reservation(Ulid::new(), &request, admitted);
            snap.reservations.push(reservation.clone());
            Ok((
                reservation.clone(),
                Event::ReservationCreated { reservation },
            ))
        })
        .await
    }

    /// Replace a reservation's details, re-validated with its own prior usage excluded.
    pub async fn edit_reservation(
        &self,
        id: ReservationId,
        request: ReservationRequest,
    ) -> Result<Reservation, EngineError> {
        check_request_limits(&request)?;
        self.transact("edit", |snap| {
            let pos = snap
                .reservations
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
            let admitted = admit(&snap.reservations, &snap.catalog, &self.fleet, &request, Some(id))?;
            let updated = build_reservation(id, &request, admitted);
            let previous = std::mem::replace(&mut snap.reservations[pos], updated.clone());
            Ok((
                updated.clone(),
                Event::ReservationUpdated {
                    previous,
                    reservation: updated,
                },
            ))
        })
        .await
    }

    pub async fn cancel_reservation(&self, id: ReservationId) -> Result<Reservation, EngineError> {
        self.transact("cancel", |snap| {
            let pos = snap
                .reservations
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
            let reservation = snap.reservations.remove(pos);
            Ok((
                reservation.clone(),
                Event::ReservationCancelled { reservation },
            ))
        })
        .await
    }

    /// Add an item or replace the one with the same name. Existing
    /// reservations are never re-checked against the new stock.
    pub async fn upsert_equipment(
        &self,
        item: EquipmentItem,
    ) -> Result<Option<EquipmentItem>, EngineError> {
        check_item(&item)?;
        self.transact("upsert_equipment", |snap| {
            let previous = snap.catalog.upsert(item.clone());
            Ok((previous, Event::EquipmentUpserted { item: item.clone() }))
        })
        .await
    }

    /// Remove an item from the catalog. Reservations naming it are kept.
    pub async fn remove_equipment(&self, name: &str) -> Result<EquipmentItem, EngineError> {
        self.transact("remove_equipment", |snap| {
            let removed = snap
                .catalog
                .remove(name)
                .ok_or_else(|| EngineError::NotFound(name.to_string()))?;
            Ok((
                removed,
                Event::EquipmentRemoved {
                    name: name.to_string(),
                },
            ))
        })
        .await
    }

    /// Add a user, or update the department of an existing one.
    pub async fn register_user(&self, user: User) -> Result<User, EngineError> {
        let user = User {
            name: user.name.trim().to_string(),
            department: user.department.trim().to_string(),
        };
        if user.name.is_empty() {
            return Err(EngineError::Rejected(super::Rejection::MissingField("name")));
        }
        if user.name.len() > MAX_NAME_LEN || user.department.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("user name too long"));
        }
        self.transact("register_user", |snap| {
            match snap.users.iter_mut().find(|u| u.name == user.name) {
                Some(existing) => existing.department = user.department.clone(),
                None => snap.users.push(user.clone()),
            }
            Ok((user.clone(), Event::UserRegistered { user: user.clone() }))
        })
        .await
    }
}
