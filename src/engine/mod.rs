mod availability;
mod conflict;
mod error;

pub use availability::AvailabilityEngine;
pub use conflict::{ConflictReason, ConflictValidator, ValidationResult};
pub use error::EngineError;

use ulid::Ulid;

use crate::model::*;

/// Read-only view of the schedulable resources.
pub trait ResourceDirectory {
    /// Active resources of `kind`. An empty directory yields an empty vec.
    fn list_active(&self, kind: ResourceKind) -> Vec<Resource>;
}

/// Read-only view of the trip bookings, queried by resource role.
///
/// Implementations must bound the range queries by the window (index on
/// start/end), not scan every booking.
pub trait BookingLedger {
    /// All blocking bookings held by `resource_id` in the `kind` role, by start.
    fn blocking_bookings_for(&self, kind: ResourceKind, resource_id: Ulid) -> Vec<Booking>;

    /// Blocking bookings held by `resource_id` that overlap `window`.
    fn blocking_overlapping(
        &self,
        kind: ResourceKind,
        resource_id: Ulid,
        window: &Window,
    ) -> Vec<Booking>;

    /// Blocking bookings of every resource in the `kind` role that overlap `window`.
    fn blocking_in_window(&self, kind: ResourceKind, window: &Window) -> Vec<Booking>;

    /// True iff a blocking booking other than `exclude` overlaps `window`.
    fn exists_blocking_overlap(
        &self,
        kind: ResourceKind,
        resource_id: Ulid,
        window: &Window,
        exclude: Option<Ulid>,
    ) -> bool {
        self.blocking_overlapping(kind, resource_id, window)
            .iter()
            .any(|b| {
                Some(b.id) != exclude && b.is_blocking() && b.window.overlaps(window)
            })
    }
}
