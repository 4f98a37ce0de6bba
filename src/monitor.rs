use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::engine::{Engine, EngineError, instantaneous_status, overlapping};
use crate::model::*;
use crate::observability::{EQUIPMENT_IN_USE, RESERVATIONS_ACTIVE, VEHICLES_OUT};

/// What was out at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorReport {
    pub active_reservations: usize,
    pub vehicles_out: Vec<String>,
    pub equipment_in_use: Vec<(String, u32)>,
}

/// Wall-clock now in the same naive time base as stored timestamps.
pub fn now_ms() -> Ms {
    chrono::Local::now().naive_local().and_utc().timestamp_millis()
}

/// Take one instantaneous reading and publish it as gauges.
pub async fn publish_status(engine: &Engine, now: Ms) -> Result<MonitorReport, EngineError> {
    let snap = engine.snapshot().await?;
    let running: Vec<&Reservation> =
        overlapping(&snap.reservations, &Span::at(now), None).collect();

    let vehicles_out: Vec<String> = engine
        .fleet()
        .vehicles()
        .iter()
        .filter(|v| v.is_fleet() && running.iter().any(|r| r.vehicle == v.name))
        .map(|v| v.name.clone())
        .collect();
    let status = instantaneous_status(&snap.reservations, &snap.catalog, now);

    metrics::gauge!(RESERVATIONS_ACTIVE).set(running.len() as f64);
    metrics::gauge!(VEHICLES_OUT).set(vehicles_out.len() as f64);
    for (item, usage) in &status {
        metrics::gauge!(EQUIPMENT_IN_USE, "item" => item.clone()).set(usage.used as f64);
    }

    Ok(MonitorReport {
        active_reservations: running.len(),
        vehicles_out,
        equipment_in_use: status
            .into_iter()
            .filter(|(_, u)| u.used > 0)
            .map(|(item, u)| (item, u.used))
            .collect(),
    })
}

/// Background task that periodically publishes what is out right now.
pub async fn run_monitor(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        match publish_status(&engine, now_ms()).await {
            Ok(report) => debug!(
                "monitor: {} running, vehicles out {:?}",
                report.active_reservations, report.vehicles_out
            ),
            // Retried on the next tick.
            Err(e) => warn!("monitor skipped: {e}"),
        }
    }
}
