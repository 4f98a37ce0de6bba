use std::net::SocketAddr;

use metrics_exporter_prometheus::BuildError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: mutations attempted. Labels: op, outcome.
pub const ADMISSIONS_TOTAL: &str = "motorpool_admissions_total";

/// Histogram: end-to-end mutation latency in seconds, lock wait included. Labels: op.
pub const ADMISSION_DURATION_SECONDS: &str = "motorpool_admission_duration_seconds";

/// Histogram: table store round trip in seconds. Labels: op.
pub const STORE_DURATION_SECONDS: &str = "motorpool_store_duration_seconds";

/// Counter: writes refused because the table changed underneath us.
pub const COMMIT_CONFLICTS_TOTAL: &str = "motorpool_commit_conflicts_total";

/// Counter: outbound notifications that failed or timed out.
pub const NOTIFY_FAILURES_TOTAL: &str = "motorpool_notify_failures_total";

/// Counter: stored rows left out of the view. Labels: table.
pub const MALFORMED_ROWS_TOTAL: &str = "motorpool_malformed_rows_total";

// ── USE metrics (published by the monitor) ──────────────────────

/// Gauge: units of an item out right now. Labels: item.
pub const EQUIPMENT_IN_USE: &str = "motorpool_equipment_in_use";

/// Gauge: reservations running right now.
pub const RESERVATIONS_ACTIVE: &str = "motorpool_reservations_active";

/// Gauge: fleet vehicles out right now.
pub const VEHICLES_OUT: &str = "motorpool_vehicles_out";

/// Install the fmt subscriber. A second call is a no-op.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt().try_init();
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init_metrics(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
