use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::limits::{MAX_HEADCOUNT, MIN_HEADCOUNT};
use crate::model::{ReservationId, Span};
use crate::records::format_timestamp;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub item: String,
    pub available: u32,
    pub requested: u32,
}

impl std::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (requested {}, {} left)",
            self.item, self.requested, self.available
        )
    }
}

/// Why a draft reservation was refused. Every variant is recoverable by
/// resubmitting with corrected input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("end time must be after start time")]
    InvalidInterval,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("headcount {0} outside {min}..={max}", min = MIN_HEADCOUNT, max = MAX_HEADCOUNT)]
    HeadcountOutOfRange(u32),
    #[error("equipment unavailable: {}", join_shortfalls(.0))]
    EquipmentUnavailable(Vec<Shortfall>),
    #[error("unknown vehicle: {0}")]
    UnknownVehicle(String),
    #[error("no vehicle fits {headcount} people with cargo load {cargo_load}")]
    NoFeasibleVehicle { headcount: u32, cargo_load: u64 },
    #[error(
        "{vehicle} is already booked by {requester} from {} to {}",
        format_timestamp(.span.start),
        format_timestamp(.span.end)
    )]
    VehicleConflict {
        vehicle: String,
        reservation: ReservationId,
        requester: String,
        span: Span,
    },
}

impl Rejection {
    /// Short label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::InvalidInterval => "invalid_interval",
            Rejection::MissingField(_) => "missing_field",
            Rejection::HeadcountOutOfRange(_) => "headcount_out_of_range",
            Rejection::EquipmentUnavailable(_) => "equipment_unavailable",
            Rejection::UnknownVehicle(_) => "unknown_vehicle",
            Rejection::NoFeasibleVehicle { .. } => "no_feasible_vehicle",
            Rejection::VehicleConflict { .. } => "vehicle_conflict",
        }
    }
}

fn join_shortfalls(items: &[Shortfall]) -> String {
    items
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("store did not answer within {0:?}, please retry")]
    StoreTimeout(Duration),
    #[error("table kept changing during {0} commit attempts, please retry")]
    Contended(u32),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("invalid catalog entry: {0}")]
    InvalidCatalog(String),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Whether resubmitting the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::StoreUnavailable(_)
                | EngineError::StoreTimeout(_)
                | EngineError::Contended(_)
        )
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            EngineError::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::VersionMismatch { .. } => EngineError::Contended(1),
            other => EngineError::StoreUnavailable(other.to_string()),
        }
    }
}
