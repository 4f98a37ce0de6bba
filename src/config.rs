//! Runtime configuration from `MOTORPOOL_*` environment variables, plus an
//! optional TOML file describing the fleet.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::engine::EngineOptions;
use crate::limits::*;
use crate::model::{CargoLayout, Fleet, Vehicle, VehicleClass};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name}: cannot parse {value:?}")]
    InvalidVar { name: &'static str, value: String },
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("fleet file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("fleet: {0}")]
    Fleet(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub fleet_file: Option<PathBuf>,
    pub store_timeout: Duration,
    pub max_commit_attempts: u32,
    pub notify_url: Option<String>,
    pub notify_chat_id: String,
    pub notify_timeout: Duration,
    pub metrics_port: Option<u16>,
    /// Zero disables the monitor.
    pub monitor_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            fleet_file: None,
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
            notify_url: None,
            notify_chat_id: String::new(),
            notify_timeout: Duration::from_millis(DEFAULT_NOTIFY_TIMEOUT_MS),
            metrics_port: None,
            monitor_interval: Duration::from_secs(DEFAULT_MONITOR_INTERVAL_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unset or blank variables keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(dir) = var("MOTORPOOL_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        config.fleet_file = var("MOTORPOOL_FLEET_FILE").map(PathBuf::from);
        if let Some(ms) = parsed(var("MOTORPOOL_STORE_TIMEOUT_MS"), "MOTORPOOL_STORE_TIMEOUT_MS")? {
            config.store_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = parsed(
            var("MOTORPOOL_MAX_COMMIT_ATTEMPTS"),
            "MOTORPOOL_MAX_COMMIT_ATTEMPTS",
        )? {
            config.max_commit_attempts = n;
        }
        config.notify_url = var("MOTORPOOL_NOTIFY_URL");
        if let Some(chat) = var("MOTORPOOL_NOTIFY_CHAT_ID") {
            config.notify_chat_id = chat;
        }
        if let Some(ms) = parsed(var("MOTORPOOL_NOTIFY_TIMEOUT_MS"), "MOTORPOOL_NOTIFY_TIMEOUT_MS")? {
            config.notify_timeout = Duration::from_millis(ms);
        }
        config.metrics_port = parsed(var("MOTORPOOL_METRICS_PORT"), "MOTORPOOL_METRICS_PORT")?;
        if let Some(secs) = parsed(
            var("MOTORPOOL_MONITOR_INTERVAL_SECS"),
            "MOTORPOOL_MONITOR_INTERVAL_SECS",
        )? {
            config.monitor_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            store_timeout: self.store_timeout,
            max_commit_attempts: self.max_commit_attempts.max(1),
        }
    }

    /// The configured fleet, or the built-in one when no file is set.
    pub fn load_fleet(&self) -> Result<Fleet, ConfigError> {
        match &self.fleet_file {
            Some(path) => load_fleet_file(path),
            None => Ok(Fleet::default()),
        }
    }
}

fn parsed<T: FromStr>(value: Option<String>, name: &'static str) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidVar { name, value: v })
        })
        .transpose()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FleetFile {
    #[serde(default = "default_penalty")]
    per_passenger_penalty: u32,
    #[serde(default, rename = "vehicle")]
    vehicles: Vec<VehicleEntry>,
}

fn default_penalty() -> u32 {
    DEFAULT_PER_PASSENGER_PENALTY
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VehicleEntry {
    name: String,
    #[serde(default = "default_class")]
    class: VehicleClass,
    max_seats: Option<u32>,
    cargo_score: Option<u32>,
    #[serde(default)]
    cargo: CargoLayout,
}

fn default_class() -> VehicleClass {
    VehicleClass::Fleet
}

pub fn load_fleet_file(path: &Path) -> Result<Fleet, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_fleet(&text)
}

/// Parse a fleet description:
///
/// ```toml
/// per_passenger_penalty = 20
///
/// [[vehicle]]
/// name = "Isuzu D-max 4 Doors"
/// max_seats = 5
/// cargo_score = 2500
/// cargo = "separate"
///
/// [[vehicle]]
/// name = "Personal vehicle"
/// class = "unscheduled"
/// ```
pub fn parse_fleet(text: &str) -> Result<Fleet, ConfigError> {
    let file: FleetFile = toml::from_str(text)?;
    let mut vehicles = Vec::with_capacity(file.vehicles.len());
    for entry in file.vehicles {
        let vehicle = match entry.class {
            VehicleClass::Unscheduled => Vehicle::unscheduled(&entry.name),
            VehicleClass::Fleet => {
                let (Some(seats), Some(cargo_score)) = (entry.max_seats, entry.cargo_score) else {
                    return Err(ConfigError::Fleet(format!(
                        "vehicle {} needs max_seats and cargo_score",
                        entry.name
                    )));
                };
                Vehicle::fleet(&entry.name, seats, cargo_score, entry.cargo)
            }
        };
        vehicles.push(vehicle);
    }
    Fleet::new(vehicles, file.per_passenger_penalty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.engine_options().max_commit_attempts, 3);
    }

    #[test]
    fn reads_every_variable() {
        let config = Config::from_lookup(lookup(&[
            ("MOTORPOOL_DATA_DIR", "/srv/motorpool"),
            ("MOTORPOOL_FLEET_FILE", "/etc/motorpool/fleet.toml"),
            ("MOTORPOOL_STORE_TIMEOUT_MS", "2500"),
            ("MOTORPOOL_MAX_COMMIT_ATTEMPTS", "5"),
            ("MOTORPOOL_NOTIFY_URL", "https://example.invalid/hook"),
            ("MOTORPOOL_NOTIFY_CHAT_ID", "-100123"),
            ("MOTORPOOL_NOTIFY_TIMEOUT_MS", "750"),
            ("MOTORPOOL_METRICS_PORT", "9100"),
            ("MOTORPOOL_MONITOR_INTERVAL_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/motorpool"));
        assert_eq!(config.store_timeout, Duration::from_millis(2500));
        assert_eq!(config.max_commit_attempts, 5);
        assert_eq!(config.notify_url.as_deref(), Some("https://example.invalid/hook"));
        assert_eq!(config.notify_chat_id, "-100123");
        assert_eq!(config.notify_timeout, Duration::from_millis(750));
        assert_eq!(config.metrics_port, Some(9100));
        assert!(config.monitor_interval.is_zero());
    }

    #[test]
    fn bad_number_is_an_error() {
        let err = Config::from_lookup(lookup(&[("MOTORPOOL_METRICS_PORT", "ninety")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { name: "MOTORPOOL_METRICS_PORT", .. }));
    }

    #[test]
    fn blank_variable_keeps_default() {
        let config = Config::from_lookup(lookup(&[("MOTORPOOL_STORE_TIMEOUT_MS", "  ")])).unwrap();
        assert_eq!(config.store_timeout, Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS));
    }

    #[test]
    fn parses_fleet_file() {
        let fleet = parse_fleet(
            r#"
            per_passenger_penalty = 25

            [[vehicle]]
            name = "Van-A"
            max_seats = 7
            cargo_score = 1000

            [[vehicle]]
            name = "Pickup"
            max_seats = 5
            cargo_score = 2500
            cargo = "separate"

            [[vehicle]]
            name = "Personal vehicle"
            class = "unscheduled"
            "#,
        )
        .unwrap();
        assert_eq!(fleet.per_passenger_penalty, 25);
        assert_eq!(fleet.vehicles().len(), 3);
        assert_eq!(fleet.get("Van-A").unwrap().cargo, CargoLayout::Shared);
        assert_eq!(fleet.get("Pickup").unwrap().cargo, CargoLayout::Separate);
        assert!(!fleet.get("Personal vehicle").unwrap().is_fleet());
    }

    #[test]
    fn fleet_vehicle_needs_capacities() {
        let err = parse_fleet("[[vehicle]]\nname = \"Van-A\"\nmax_seats = 7\n").unwrap_err();
        assert!(matches!(err, ConfigError::Fleet(_)));
    }

    #[test]
    fn empty_fleet_is_rejected() {
        assert!(matches!(parse_fleet(""), Err(ConfigError::Fleet(_))));
        assert!(matches!(parse_fleet("colour = \"red\""), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn missing_fleet_file_reports_path() {
        let path = std::env::temp_dir().join("motorpool_test_config/no_such_fleet.toml");
        let err = load_fleet_file(&path).unwrap_err();
        assert!(err.to_string().contains("no_such_fleet.toml"));
    }
}
