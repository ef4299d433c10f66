use dashmap::DashMap;
use ulid::Ulid;

use crate::engine::{BookingLedger, EngineError, ResourceDirectory};
use crate::model::*;

const ROLES: [ResourceKind; 2] = [ResourceKind::Driver, ResourceKind::Vehicle];

/// Concurrent in-memory directory + ledger.
///
/// Bookings are the source of truth; each one is also indexed on the
/// timeline of its driver and of its vehicle so range queries only touch
/// slots near the window. Writes never validate windows or conflicts:
/// admission control belongs to the caller.
pub struct InMemoryStore {
    resources: DashMap<Ulid, Resource>,
    bookings: DashMap<Ulid, Booking>,
    timelines: DashMap<(ResourceKind, Ulid), Timeline>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
            bookings: DashMap::new(),
            timelines: DashMap::new(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, EngineError> {
        let store = Self::new();
        for resource in snapshot.resources {
            let id = resource.id;
            store
                .insert_resource(resource)
                .map_err(|_| EngineError::InvalidSnapshot(format!("duplicate resource {id}")))?;
        }
        for booking in snapshot.bookings {
            let id = booking.id;
            store
                .insert_booking(booking)
                .map_err(|_| EngineError::InvalidSnapshot(format!("duplicate booking {id}")))?;
        }
        Ok(store)
    }

    // ── Resources ────────────────────────────────────────────

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn get_resource(&self, id: &Ulid) -> Option<Resource> {
        self.resources.get(id).map(|e| e.value().clone())
    }

    pub fn insert_resource(&self, resource: Resource) -> Result<(), EngineError> {
        use dashmap::mapref::entry::Entry;
        match self.resources.entry(resource.id) {
            Entry::Occupied(_) => Err(EngineError::AlreadyExists(resource.id)),
            Entry::Vacant(slot) => {
                slot.insert(resource);
                Ok(())
            }
        }
    }

    pub fn set_active(&self, id: Ulid, active: bool) -> Result<(), EngineError> {
        let mut entry = self.resources.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        entry.active = active;
        Ok(())
    }

    // ── Bookings ─────────────────────────────────────────────

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    pub fn get_booking(&self, id: &Ulid) -> Option<Booking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    pub fn insert_booking(&self, booking: Booking) -> Result<(), EngineError> {
        use dashmap::mapref::entry::Entry;
        match self.bookings.entry(booking.id) {
            Entry::Occupied(_) => Err(EngineError::AlreadyExists(booking.id)),
            Entry::Vacant(slot) => {
                let stored = slot.insert(booking);
                self.index(&stored);
                Ok(())
            }
        }
    }

    /// Replace a stored booking wholesale (new window, resources or status).
    /// Returns the previous record.
    pub fn replace_booking(&self, booking: Booking) -> Result<Booking, EngineError> {
        self.update(booking.id, |stored| *stored = booking)
    }

    pub fn set_status(&self, id: Ulid, status: BookingStatus) -> Result<Booking, EngineError> {
        self.update(id, |stored| stored.status = status)
    }

    pub fn remove_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        use dashmap::mapref::entry::Entry;
        match self.bookings.entry(id) {
            Entry::Vacant(_) => Err(EngineError::NotFound(id)),
            Entry::Occupied(row) => {
                self.unindex(row.get());
                Ok(row.remove())
            }
        }
    }

    /// Edits a row in place. The row's shard stays locked until its
    /// timelines are updated, so a concurrent remove either sees the old
    /// booking or the new one, never a half-indexed state.
    fn update(&self, id: Ulid, edit: impl FnOnce(&mut Booking)) -> Result<Booking, EngineError> {
        let mut row = self.bookings.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        let previous = row.clone();
        edit(&mut row);
        self.reindex(&previous, &row);
        Ok(previous)
    }

    // ── Timeline index ───────────────────────────────────────

    fn index(&self, booking: &Booking) {
        let slot = Slot {
            booking_id: booking.id,
            window: booking.window,
            status: booking.status,
        };
        for kind in ROLES {
            self.timelines
                .entry((kind, booking.resource_id(kind)))
                .or_default()
                .insert(slot);
        }
    }

    fn unindex(&self, booking: &Booking) {
        for kind in ROLES {
            let key = (kind, booking.resource_id(kind));
            if let Some(mut timeline) = self.timelines.get_mut(&key) {
                timeline.remove(booking.id);
            }
            self.timelines.remove_if(&key, |_, tl| tl.is_empty());
        }
    }

    /// Moves a booking's slots. The new slot lands before the old one is
    /// dropped, so readers never see the resource transiently free.
    fn reindex(&self, previous: &Booking, next: &Booking) {
        let slot = Slot {
            booking_id: next.id,
            window: next.window,
            status: next.status,
        };
        for kind in ROLES {
            let old_key = (kind, previous.resource_id(kind));
            let new_key = (kind, next.resource_id(kind));
            if old_key == new_key {
                let mut timeline = self.timelines.entry(new_key).or_default();
                timeline.remove(previous.id);
                timeline.insert(slot);
                continue;
            }
            self.timelines.entry(new_key).or_default().insert(slot);
            if let Some(mut timeline) = self.timelines.get_mut(&old_key) {
                timeline.remove(previous.id);
            }
            self.timelines.remove_if(&old_key, |_, tl| tl.is_empty());
        }
    }

    fn resolve(&self, slots: impl Iterator<Item = Ulid>) -> Vec<Booking> {
        slots
            .filter_map(|id| self.bookings.get(&id).map(|e| e.value().clone()))
            .filter(Booking::is_blocking)
            .collect()
    }
}

impl ResourceDirectory for InMemoryStore {
    fn list_active(&self, kind: ResourceKind) -> Vec<Resource> {
        self.resources
            .iter()
            .filter(|e| e.kind == kind && e.active)
            .map(|e| e.value().clone())
            .collect()
    }
}

impl BookingLedger for InMemoryStore {
    fn blocking_bookings_for(&self, kind: ResourceKind, resource_id: Ulid) -> Vec<Booking> {
        let ids: Vec<Ulid> = match self.timelines.get(&(kind, resource_id)) {
            Some(tl) => tl
                .slots
                .iter()
                .filter(|s| s.status.is_blocking())
                .map(|s| s.booking_id)
                .collect(),
            None => return Vec::new(),
        };
        self.resolve(ids.into_iter())
    }

    fn blocking_overlapping(
        &self,
        kind: ResourceKind,
        resource_id: Ulid,
        window: &Window,
    ) -> Vec<Booking> {
        let ids: Vec<Ulid> = match self.timelines.get(&(kind, resource_id)) {
            Some(tl) => tl
                .overlapping(window)
                .filter(|s| s.status.is_blocking())
                .map(|s| s.booking_id)
                .collect(),
            None => return Vec::new(),
        };
        self.resolve(ids.into_iter())
    }

    fn blocking_in_window(&self, kind: ResourceKind, window: &Window) -> Vec<Booking> {
        let ids: Vec<Ulid> = self
            .timelines
            .iter()
            .filter(|e| e.key().0 == kind)
            .flat_map(|e| {
                e.value()
                    .overlapping(window)
                    .filter(|s| s.status.is_blocking())
                    .map(|s| s.booking_id)
                    .collect::<Vec<_>>()
            })
            .collect();
        self.resolve(ids.into_iter())
    }
}
