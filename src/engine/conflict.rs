use ulid::Ulid;

use crate::model::*;

use super::{AvailabilityEngine, BookingLedger, ResourceDirectory};

/// One failed role check when admitting a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    Driver(Ulid),
    Vehicle(Ulid),
}

impl ConflictReason {
    pub fn message(&self) -> &'static str {
        match self {
            ConflictReason::Driver(_) => {
                "The driver is already assigned to another trip during this time period."
            }
            ConflictReason::Vehicle(_) => {
                "The vehicle is already assigned to another trip during this time period."
            }
        }
    }
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of a conflict check. Empty means the trip may be admitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    conflicts: Vec<ConflictReason>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn conflicts(&self) -> &[ConflictReason] {
        &self.conflicts
    }

    pub fn messages(&self) -> Vec<&'static str> {
        self.conflicts.iter().map(ConflictReason::message).collect()
    }
}

/// Admission rule run before a trip is created or edited.
pub struct ConflictValidator<'a, D: ?Sized, L: ?Sized> {
    engine: AvailabilityEngine<'a, D, L>,
}

impl<'a, D, L> ConflictValidator<'a, D, L>
where
    D: ResourceDirectory + ?Sized,
    L: BookingLedger + ?Sized,
{
    pub fn new(directory: &'a D, ledger: &'a L) -> Self {
        Self {
            engine: AvailabilityEngine::new(directory, ledger),
        }
    }

    /// Checks driver and vehicle independently and reports both failures.
    /// `exclude` lets an edited trip be checked without clashing with itself.
    pub fn validate(
        &self,
        driver_id: Ulid,
        vehicle_id: Ulid,
        window: &Window,
        exclude: Option<Ulid>,
    ) -> ValidationResult {
        let mut conflicts = Vec::new();
        if !self
            .engine
            .is_available_excluding(ResourceKind::Driver, driver_id, window, exclude)
        {
            conflicts.push(ConflictReason::Driver(driver_id));
        }
        if !self
            .engine
            .is_available_excluding(ResourceKind::Vehicle, vehicle_id, window, exclude)
        {
            conflicts.push(ConflictReason::Vehicle(vehicle_id));
        }
        ValidationResult { conflicts }
    }

    pub fn validate_booking(&self, booking: &Booking, exclude: Option<Ulid>) -> ValidationResult {
        self.validate(booking.driver_id, booking.vehicle_id, &booking.window, exclude)
    }
}
