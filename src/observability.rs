use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: availability queries answered. Labels: query, kind.
pub const QUERIES_TOTAL: &str = "fleetavail_queries_total";

/// Histogram: availability query latency in seconds. Labels: query.
pub const QUERY_DURATION_SECONDS: &str = "fleetavail_query_duration_seconds";

/// Counter: booking admissions. Labels: op, outcome (admitted, rejected, error).
pub const ADMISSIONS_TOTAL: &str = "fleetavail_admissions_total";

/// Counter: role conflicts found while admitting. Labels: kind.
pub const CONFLICTS_TOTAL: &str = "fleetavail_conflicts_total";

// ── Cache ───────────────────────────────────────────────────────

/// Counter: availability cache hits. Labels: kind.
pub const CACHE_HITS_TOTAL: &str = "fleetavail_cache_hits_total";

/// Counter: availability cache misses. Labels: kind.
pub const CACHE_MISSES_TOTAL: &str = "fleetavail_cache_misses_total";

/// Counter: cache entries dropped by the sweeper.
pub const CACHE_EVICTIONS_TOTAL: &str = "fleetavail_cache_evictions_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: bookings held by the store.
pub const BOOKINGS_STORED: &str = "fleetavail_bookings_stored";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
