use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total tool calls executed. Labels: tool, status.
pub const TOOL_CALLS_TOTAL: &str = "stayd_tool_calls_total";

/// Histogram: tool-call latency in seconds. Labels: tool.
pub const TOOL_CALL_DURATION_SECONDS: &str = "stayd_tool_call_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "stayd_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "stayd_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "stayd_connections_rejected_total";

/// Counter: holds placed.
pub const HOLDS_PLACED_TOTAL: &str = "stayd_holds_placed_total";

/// Counter: holds expired by the reaper (or lazily).
pub const HOLDS_EXPIRED_TOTAL: &str = "stayd_holds_expired_total";

/// Counter: confirmations issued (hold-based and direct).
pub const BOOKINGS_CONFIRMED_TOTAL: &str = "stayd_bookings_confirmed_total";

/// Counter: journal appends that failed or were dropped.
pub const JOURNAL_ERRORS_TOTAL: &str = "stayd_journal_errors_total";

/// Histogram: journal group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "stayd_journal_flush_duration_seconds";

/// Histogram: journal group-commit batch size (events per flush).
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "stayd_journal_flush_batch_size";

/// Install the Prometheus metrics exporter on the given port. No-op if port
/// is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
