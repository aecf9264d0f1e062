use std::net::SocketAddr;

// ── Request metrics ─────────────────────────────────────────────

/// Counter: slot queries. Labels: status.
pub const SLOT_QUERIES_TOTAL: &str = "slotbook_slot_queries_total";

/// Counter: slots created by on-demand materialization.
pub const SLOTS_MATERIALIZED_TOTAL: &str = "slotbook_slots_materialized_total";

/// Counter: slot creates that failed during materialization.
pub const SLOT_CREATE_FAILURES_TOTAL: &str = "slotbook_slot_create_failures_total";

/// Counter: booking attempts. Labels: status.
pub const BOOKINGS_TOTAL: &str = "slotbook_bookings_total";

/// Histogram: time spent waiting for a resource booking lock, in seconds.
pub const BOOKING_LOCK_WAIT_SECONDS: &str = "slotbook_booking_lock_wait_seconds";

// ── Storage ─────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotbook_wal_flush_batch_size";

/// Counter: completed WAL compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "slotbook_wal_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if `port` is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
