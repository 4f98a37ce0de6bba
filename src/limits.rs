use crate::model::Ms;

pub const MIN_HEADCOUNT: u32 = 1;
pub const MAX_HEADCOUNT: u32 = 10;

/// Volume deducted per passenger from a vehicle whose cargo shares the cabin.
pub const DEFAULT_PER_PASSENGER_PENALTY: u32 = 20;

pub const MAX_NAME_LEN: usize = 128;
pub const MAX_TEXT_LEN: usize = 1024;
pub const MAX_RESERVATIONS: usize = 100_000;
pub const MAX_EQUIPMENT_LINES: usize = 64;

/// Reservations may not span more than a year.
pub const MAX_SPAN_DURATION_MS: Ms = 366 * 24 * 3_600_000;

pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 3;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 30;
