use std::sync::Arc;

use tracing::info;

use fleetavail::config::Config;
use fleetavail::engine::EngineError;
use fleetavail::model::{ResourceKind, Snapshot};
use fleetavail::service::FleetService;
use fleetavail::store::InMemoryStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    fleetavail::observability::init(config.metrics_port)?;

    let raw = std::fs::read_to_string(&config.snapshot_path)?;
    let snapshot: Snapshot =
        serde_json::from_str(&raw).map_err(|e| EngineError::InvalidSnapshot(e.to_string()))?;
    let store = Arc::new(InMemoryStore::from_snapshot(snapshot)?);

    info!("fleetavail report");
    info!("  snapshot: {}", config.snapshot_path.display());
    info!("  resources: {}", store.resource_count());
    info!("  bookings: {}", store.booking_count());
    info!("  window: {}ms from now", config.default_window_ms);

    let service = FleetService::new(store, &config);
    for kind in [ResourceKind::Driver, ResourceKind::Vehicle] {
        let free = service.available_now(kind);
        info!("available {}s: {}", kind.label(), free.len());
        for resource in &free {
            let upcoming = service.upcoming(kind, resource.id);
            info!(
                "  {} {} (next trips: {})",
                resource.id,
                resource.name.as_deref().unwrap_or("-"),
                upcoming.len()
            );
        }
    }

    Ok(())
}
