use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, info};
use ulid::Ulid;

use crate::cache::{AvailabilityCache, CacheKey};
use crate::config::Config;
use crate::engine::{
    AvailabilityEngine, ConflictReason, ConflictValidator, EngineError, ValidationResult,
};
use crate::model::*;
use crate::observability::*;
use crate::store::InMemoryStore;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

/// Boundary between request handlers and the availability engine.
///
/// Reads run lock-free against the store. Every write holds the admission
/// lock; the ones that can create an occupancy (`propose`, `reschedule`,
/// `set_status` into a blocking status) hold it across validate + commit,
/// so two concurrent proposals for the same driver or vehicle cannot both
/// be admitted. Every successful write invalidates the availability cache.
pub struct FleetService {
    store: Arc<InMemoryStore>,
    cache: Arc<AvailabilityCache>,
    admission: Mutex<()>,
    default_window_ms: Ms,
    upcoming_limit: usize,
}

impl FleetService {
    pub fn new(store: Arc<InMemoryStore>, config: &Config) -> Self {
        Self {
            store,
            cache: Arc::new(AvailabilityCache::new(config.cache_ttl)),
            admission: Mutex::new(()),
            default_window_ms: config.default_window_ms,
            upcoming_limit: config.upcoming_limit,
        }
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<AvailabilityCache> {
        &self.cache
    }

    /// Spawn the background ttl sweeper for this service's cache.
    pub fn spawn_cache_sweeper(&self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(crate::sweeper::run_cache_sweeper(self.cache.clone()))
    }

    fn engine(&self) -> AvailabilityEngine<'_, InMemoryStore, InMemoryStore> {
        AvailabilityEngine::new(&*self.store, &*self.store)
    }

    fn validator(&self) -> ConflictValidator<'_, InMemoryStore, InMemoryStore> {
        ConflictValidator::new(&*self.store, &*self.store)
    }

    /// `[now, now + default window)`.
    pub fn default_window(&self, now: Ms) -> Window {
        Window::starting_at(now, self.default_window_ms)
    }

    // ── Queries ──────────────────────────────────────────────

    /// Resources free from now over the default window. Served from cache
    /// for up to the cache ttl unless a write invalidates it first.
    pub fn available_now(&self, kind: ResourceKind) -> Vec<Resource> {
        let window = self.default_window(now_ms());
        self.timed("available_now", kind, || {
            self.cache.get_or_compute(CacheKey::Current(kind), || {
                self.engine().available_resources(kind, &window)
            })
        })
    }

    pub fn available_in(&self, kind: ResourceKind, window: Window) -> Vec<Resource> {
        if !window.is_well_formed() {
            debug!(start = window.start, end = window.end, "availability query with malformed window");
        }
        self.timed("available_in", kind, || {
            self.cache.get_or_compute(CacheKey::Window(kind, window), || {
                self.engine().available_resources(kind, &window)
            })
        })
    }

    pub fn is_available(&self, kind: ResourceKind, resource_id: Ulid, window: Window) -> bool {
        self.timed("is_available", kind, || {
            self.engine().is_available(kind, resource_id, &window)
        })
    }

    pub fn upcoming(&self, kind: ResourceKind, resource_id: Ulid) -> Vec<Booking> {
        self.engine()
            .upcoming_bookings(kind, resource_id, now_ms(), self.upcoming_limit)
    }

    /// Dry-run of the admission rule; commits nothing.
    pub fn validate(
        &self,
        driver_id: Ulid,
        vehicle_id: Ulid,
        window: Window,
        exclude: Option<Ulid>,
    ) -> ValidationResult {
        self.validator().validate(driver_id, vehicle_id, &window, exclude)
    }

    fn timed<T>(&self, query: &'static str, kind: ResourceKind, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        metrics::counter!(QUERIES_TOTAL, "query" => query, "kind" => kind.label()).increment(1);
        metrics::histogram!(QUERY_DURATION_SECONDS, "query" => query)
            .record(start.elapsed().as_secs_f64());
        out
    }

    // ── Admission ────────────────────────────────────────────

    /// Admit a new trip. Non-blocking trips (completed, cancelled) occupy
    /// nothing and are stored without a conflict check.
    pub async fn propose(&self, booking: Booking) -> Result<(), EngineError> {
        let _admission = self.admission.lock().await;
        if self.store.get_booking(&booking.id).is_some() {
            return Err(self.failed("propose", EngineError::AlreadyExists(booking.id)));
        }
        if booking.is_blocking() {
            self.admit("propose", &booking, None)?;
        }
        let id = booking.id;
        self.store
            .insert_booking(booking)
            .map_err(|e| self.failed("propose", e))?;
        self.committed("propose", id);
        Ok(())
    }

    /// Move a trip to another window and/or driver and vehicle.
    /// The trip's own current slot never conflicts with its new one.
    pub async fn reschedule(
        &self,
        id: Ulid,
        driver_id: Ulid,
        vehicle_id: Ulid,
        window: Window,
    ) -> Result<Booking, EngineError> {
        let _admission = self.admission.lock().await;
        let mut booking = self
            .store
            .get_booking(&id)
            .ok_or_else(|| self.failed("reschedule", EngineError::NotFound(id)))?;
        booking.driver_id = driver_id;
        booking.vehicle_id = vehicle_id;
        booking.window = window;
        if booking.is_blocking() {
            self.admit("reschedule", &booking, Some(id))?;
        }
        self.store
            .replace_booking(booking.clone())
            .map_err(|e| self.failed("reschedule", e))?;
        self.committed("reschedule", id);
        Ok(booking)
    }

    /// Change a trip's lifecycle status. Reviving a completed or cancelled
    /// trip re-runs the conflict check because it starts occupying again.
    pub async fn set_status(&self, id: Ulid, status: BookingStatus) -> Result<Booking, EngineError> {
        let _admission = self.admission.lock().await;
        let mut booking = self
            .store
            .get_booking(&id)
            .ok_or_else(|| self.failed("set_status", EngineError::NotFound(id)))?;
        let reviving = status.is_blocking() && !booking.is_blocking();
        booking.status = status;
        if reviving {
            self.admit("set_status", &booking, Some(id))?;
        }
        self.store
            .set_status(id, status)
            .map_err(|e| self.failed("set_status", e))?;
        self.committed("set_status", id);
        Ok(booking)
    }

    pub async fn remove_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let _admission = self.admission.lock().await;
        let removed = self.store.remove_booking(id)?;
        self.committed("remove", id);
        Ok(removed)
    }

    pub async fn set_resource_active(&self, id: Ulid, active: bool) -> Result<(), EngineError> {
        let _admission = self.admission.lock().await;
        let kind = self.store.get_resource(&id).map(|r| r.kind);
        self.store.set_active(id, active)?;
        match kind {
            Some(kind) => self.cache.invalidate_kind(kind),
            None => self.cache.invalidate(),
        }
        info!(%id, active, "resource activity changed");
        Ok(())
    }

    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    fn admit(&self, op: &'static str, booking: &Booking, exclude: Option<Ulid>) -> Result<(), EngineError> {
        if !booking.window.is_well_formed() {
            debug!(id = %booking.id, start = booking.window.start, end = booking.window.end,
                "admitting trip with malformed window");
        }
        let result = self.validator().validate_booking(booking, exclude);
        if result.is_ok() {
            return Ok(());
        }
        for reason in result.conflicts() {
            let kind = match reason {
                ConflictReason::Driver(_) => ResourceKind::Driver,
                ConflictReason::Vehicle(_) => ResourceKind::Vehicle,
            };
            metrics::counter!(CONFLICTS_TOTAL, "kind" => kind.label()).increment(1);
        }
        metrics::counter!(ADMISSIONS_TOTAL, "op" => op, "outcome" => "rejected").increment(1);
        info!(id = %booking.id, op, reasons = ?result.messages(), "trip rejected");
        Err(EngineError::Rejected(result))
    }

    fn committed(&self, op: &'static str, id: Ulid) {
        self.cache.invalidate();
        metrics::counter!(ADMISSIONS_TOTAL, "op" => op, "outcome" => "admitted").increment(1);
        metrics::gauge!(BOOKINGS_STORED).set(self.store.booking_count() as f64);
        info!(%id, op, "trip committed");
    }

    fn failed(&self, op: &'static str, err: EngineError) -> EngineError {
        metrics::counter!(ADMISSIONS_TOTAL, "op" => op, "outcome" => "error").increment(1);
        debug!(op, "admission failed: {err}");
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const H: Ms = 3_600_000;

    fn service() -> FleetService {
        let config = Config {
            cache_ttl: Duration::from_secs(60),
            ..Config::default()
        };
        FleetService::new(Arc::new(InMemoryStore::new()), &config)
    }

    fn resource(svc: &FleetService, kind: ResourceKind) -> Ulid {
        let r = Resource {
            id: Ulid::new(),
            company_id: Ulid::nil(),
            kind,
            name: None,
            active: true,
        };
        let id = r.id;
        svc.store().insert_resource(r).unwrap();
        id
    }

    fn trip(driver_id: Ulid, vehicle_id: Ulid, start: Ms, end: Ms) -> Booking {
        Booking {
            id: Ulid::new(),
            company_id: Ulid::nil(),
            driver_id,
            vehicle_id,
            window: Window::new(start, end),
            status: BookingStatus::Scheduled,
            origin: Some("Depot".into()),
            destination: Some("Harbour".into()),
        }
    }

    #[test]
    fn default_window_is_one_day() {
        let svc = service();
        assert_eq!(svc.default_window(1_000), Window::new(1_000, 1_000 + DAY_MS));
    }

    #[tokio::test]
    async fn propose_then_conflict() {
        let svc = service();
        let d = resource(&svc, ResourceKind::Driver);
        let v = resource(&svc, ResourceKind::Vehicle);
        svc.propose(trip(d, v, 10 * H, 12 * H)).await.unwrap();

        let err = svc.propose(trip(d, v, 11 * H, 13 * H)).await.unwrap_err();
        match err {
            EngineError::Rejected(result) => assert_eq!(result.conflicts().len(), 2),
            other => panic!("unexpected {other}"),
        }
        assert_eq!(svc.store().booking_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_id_rejected() {
        let svc = service();
        let b = trip(Ulid::new(), Ulid::new(), 0, H);
        svc.propose(b.clone()).await.unwrap();
        assert!(matches!(svc.propose(b).await, Err(EngineError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn completed_trip_admitted_over_existing() {
        let svc = service();
        let (d, v) = (Ulid::new(), Ulid::new());
        svc.propose(trip(d, v, 10 * H, 12 * H)).await.unwrap();
        let mut done = trip(d, v, 10 * H, 12 * H);
        done.status = BookingStatus::Completed;
        svc.propose(done).await.unwrap();
    }

    #[tokio::test]
    async fn reschedule_ignores_own_slot() {
        let svc = service();
        let (d, v) = (Ulid::new(), Ulid::new());
        let b = trip(d, v, 10 * H, 12 * H);
        svc.propose(b.clone()).await.unwrap();

        let moved = svc
            .reschedule(b.id, d, v, Window::new(11 * H, 13 * H))
            .await
            .unwrap();
        assert_eq!(moved.window, Window::new(11 * H, 13 * H));
        assert!(svc.is_available(ResourceKind::Driver, d, Window::new(9 * H, 10 * H + H / 2)));
    }

    #[tokio::test]
    async fn reschedule_missing_trip() {
        let svc = service();
        let res = svc
            .reschedule(Ulid::new(), Ulid::new(), Ulid::new(), Window::new(0, H))
            .await;
        assert!(matches!(res, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn reviving_cancelled_trip_is_checked() {
        let svc = service();
        let (d, v) = (Ulid::new(), Ulid::new());
        let first = trip(d, v, 10 * H, 12 * H);
        svc.propose(first.clone()).await.unwrap();
        svc.set_status(first.id, BookingStatus::Cancelled).await.unwrap();

        let second = trip(d, Ulid::new(), 11 * H, 13 * H);
        svc.propose(second).await.unwrap();

        let err = svc.set_status(first.id, BookingStatus::Scheduled).await.unwrap_err();
        match err {
            EngineError::Rejected(result) => {
                assert_eq!(result.conflicts(), &[ConflictReason::Driver(d)]);
            }
            other => panic!("unexpected {other}"),
        }
        assert_eq!(
            svc.store().get_booking(&first.id).unwrap().status,
            BookingStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn progressing_a_trip_needs_no_check() {
        let svc = service();
        let (d, v) = (Ulid::new(), Ulid::new());
        let b = trip(d, v, 10 * H, 12 * H);
        svc.propose(b.clone()).await.unwrap();
        let updated = svc.set_status(b.id, BookingStatus::InProgress).await.unwrap();
        assert_eq!(updated.status, BookingStatus::InProgress);
    }

    #[tokio::test]
    async fn writes_invalidate_cached_views() {
        let svc = service();
        let d = resource(&svc, ResourceKind::Driver);
        let v = resource(&svc, ResourceKind::Vehicle);
        let w = Window::new(10 * H, 12 * H);

        assert_eq!(svc.available_in(ResourceKind::Driver, w).len(), 1);
        assert!(!svc.cache().is_empty());

        svc.propose(trip(d, v, 10 * H, 11 * H)).await.unwrap();
        assert!(svc.cache().is_empty());
        assert!(svc.available_in(ResourceKind::Driver, w).is_empty());

        svc.set_resource_active(v, false).await.unwrap();
        assert!(svc.available_in(ResourceKind::Vehicle, Window::new(0, H)).is_empty());
    }

    #[test]
    fn available_now_lists_idle_resources() {
        let svc = service();
        let d = resource(&svc, ResourceKind::Driver);
        let free = svc.available_now(ResourceKind::Driver);
        assert_eq!(free.iter().map(|r| r.id).collect::<Vec<_>>(), vec![d]);
    }

    #[tokio::test]
    async fn upcoming_uses_configured_limit() {
        let svc = service();
        let (d, v) = (Ulid::new(), Ulid::new());
        let now = now_ms();
        for i in 0..7 {
            let start = now + (i + 1) * 2 * H;
            svc.propose(trip(d, v, start, start + H)).await.unwrap();
        }
        let upcoming = svc.upcoming(ResourceKind::Driver, d);
        assert_eq!(upcoming.len(), 5);
        assert!(upcoming.windows(2).all(|p| p[0].window.start <= p[1].window.start));
    }

    #[tokio::test]
    async fn remove_booking_frees_resource() {
        let svc = service();
        let (d, v) = (Ulid::new(), Ulid::new());
        let b = trip(d, v, 10 * H, 12 * H);
        svc.store().insert_booking(b.clone()).unwrap();
        assert!(!svc.is_available(ResourceKind::Vehicle, v, Window::new(10 * H, 11 * H)));
        svc.remove_booking(b.id).await.unwrap();
        assert!(svc.is_available(ResourceKind::Vehicle, v, Window::new(10 * H, 11 * H)));
    }

    #[test]
    fn commit_during_compute_is_not_cached() {
        let svc = service();
        let d = resource(&svc, ResourceKind::Driver);
        let w = Window::new(10 * H, 12 * H);
        let key = CacheKey::Window(ResourceKind::Driver, w);

        // a writer commits (and invalidates) while the reader is mid-compute
        let stale = svc.cache().get_or_compute(key, || {
            let free = svc.engine().available_resources(ResourceKind::Driver, &w);
            svc.store().insert_booking(trip(d, Ulid::new(), 10 * H, 11 * H)).unwrap();
            svc.invalidate_cache();
            free
        });
        assert_eq!(stale.len(), 1);
        assert!(svc.available_in(ResourceKind::Driver, w).is_empty());
    }
}
