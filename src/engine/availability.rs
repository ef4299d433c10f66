use std::collections::HashSet;

use ulid::Ulid;

use crate::model::*;

use super::{BookingLedger, ResourceDirectory};

// ── Availability Algorithm ────────────────────────────────────────

/// Answers "who is free" over one snapshot of a directory and a ledger.
///
/// Holds only shared borrows and never reads the clock, so every call is a
/// pure function of the snapshot and the window passed in.
pub struct AvailabilityEngine<'a, D: ?Sized, L: ?Sized> {
    directory: &'a D,
    ledger: &'a L,
}

impl<'a, D, L> AvailabilityEngine<'a, D, L>
where
    D: ResourceDirectory + ?Sized,
    L: BookingLedger + ?Sized,
{
    pub fn new(directory: &'a D, ledger: &'a L) -> Self {
        Self { directory, ledger }
    }

    /// Ids holding a blocking booking that overlaps `window`, from one ledger scan.
    pub fn busy_resource_ids(&self, kind: ResourceKind, window: &Window) -> HashSet<Ulid> {
        self.ledger
            .blocking_in_window(kind, window)
            .iter()
            .filter(|b| b.is_blocking() && b.window.overlaps(window))
            .map(|b| b.resource_id(kind))
            .collect()
    }

    /// Active resources of `kind` with no blocking overlap, sorted by id.
    pub fn available_resources(&self, kind: ResourceKind, window: &Window) -> Vec<Resource> {
        let busy = self.busy_resource_ids(kind, window);
        let mut free: Vec<Resource> = self
            .directory
            .list_active(kind)
            .into_iter()
            .filter(|r| r.active && !busy.contains(&r.id))
            .collect();
        free.sort_by_key(|r| r.id);
        free
    }

    /// Ids unknown to the ledger (or the directory) are available.
    pub fn is_available(&self, kind: ResourceKind, resource_id: Ulid, window: &Window) -> bool {
        self.is_available_excluding(kind, resource_id, window, None)
    }

    pub fn is_available_excluding(
        &self,
        kind: ResourceKind,
        resource_id: Ulid,
        window: &Window,
        exclude: Option<Ulid>,
    ) -> bool {
        !self
            .ledger
            .exists_blocking_overlap(kind, resource_id, window, exclude)
    }

    /// Blocking bookings for a resource starting at or after `now`, soonest first.
    pub fn upcoming_bookings(
        &self,
        kind: ResourceKind,
        resource_id: Ulid,
        now: Ms,
        limit: usize,
    ) -> Vec<Booking> {
        let mut upcoming: Vec<Booking> = self
            .ledger
            .blocking_bookings_for(kind, resource_id)
            .into_iter()
            .filter(|b| b.is_blocking() && b.window.start >= now)
            .collect();
        upcoming.sort_by_key(|b| b.window.start);
        upcoming.truncate(limit);
        upcoming
    }
}
