use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::AvailabilityCache;
use crate::observability::CACHE_EVICTIONS_TOTAL;

const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(100);

/// Background task that periodically drops expired availability cache entries.
/// Returns immediately when caching is disabled.
pub async fn run_cache_sweeper(cache: Arc<AvailabilityCache>) {
    if cache.ttl().is_zero() {
        return;
    }
    let mut interval = tokio::time::interval(cache.ttl().max(MIN_SWEEP_PERIOD));
    loop {
        interval.tick().await;
        let evicted = cache.purge_expired();
        if evicted > 0 {
            metrics::counter!(CACHE_EVICTIONS_TOTAL).increment(evicted as u64);
            debug!("swept {evicted} expired availability entries");
        }
    }
}
