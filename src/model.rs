use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

pub const DAY_MS: Ms = 86_400_000;

/// Time window `[start, end]` with inclusive-boundary overlap.
///
/// No ordering invariant is enforced: a window whose `end` precedes its
/// `start` is representable and every operation still runs on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: Ms,
    pub end: Ms,
}

impl Window {
    pub fn new(start: Ms, end: Ms) -> Self {
        Self { start, end }
    }

    pub fn starting_at(start: Ms, len: Ms) -> Self {
        Self { start, end: start.saturating_add(len) }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end.saturating_sub(self.start)
    }

    pub fn is_well_formed(&self) -> bool {
        self.start < self.end
    }

    /// Touching windows overlap: `[10:00, 12:00]` and `[12:00, 14:00]` conflict.
    pub fn overlaps(&self, other: &Window) -> bool {
        self.start <= other.end && self.end >= other.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Driver,
    Vehicle,
}

impl ResourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Driver => "driver",
            ResourceKind::Vehicle => "vehicle",
        }
    }
}

/// A schedulable driver or vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Ulid,
    pub company_id: Ulid,
    pub kind: ResourceKind,
    #[serde(default)]
    pub name: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Only scheduled and in-progress trips occupy their driver and vehicle.
    pub fn is_blocking(&self) -> bool {
        matches!(self, BookingStatus::Scheduled | BookingStatus::InProgress)
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "Scheduled",
            BookingStatus::InProgress => "In Progress",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }
}

/// A trip. Occupies its driver and its vehicle for the same window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub company_id: Ulid,
    pub driver_id: Ulid,
    pub vehicle_id: Ulid,
    pub window: Window,
    pub status: BookingStatus,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
}

impl Booking {
    pub fn resource_id(&self, kind: ResourceKind) -> Ulid {
        match kind {
            ResourceKind::Driver => self.driver_id,
            ResourceKind::Vehicle => self.vehicle_id,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.status.is_blocking()
    }
}

/// One booking's footprint on a single resource's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub booking_id: Ulid,
    pub window: Window,
    pub status: BookingStatus,
}

/// Slots held by one resource in one role, sorted by `window.start`.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub slots: Vec<Slot>,
}

impl Timeline {
    /// Insert slot maintaining sort order by window.start.
    pub fn insert(&mut self, slot: Slot) {
        let pos = self
            .slots
            .binary_search_by_key(&slot.window.start, |s| s.window.start)
            .unwrap_or_else(|e| e);
        self.slots.insert(pos, slot);
    }

    pub fn remove(&mut self, booking_id: Ulid) -> Option<Slot> {
        let pos = self.slots.iter().position(|s| s.booking_id == booking_id)?;
        Some(self.slots.remove(pos))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots that overlap `query` under the inclusive predicate.
    /// Binary search skips everything starting after `query.end`.
    pub fn overlapping(&self, query: &Window) -> impl Iterator<Item = &Slot> {
        let right_bound = self.slots.partition_point(|s| s.window.start <= query.end);
        self.slots[..right_bound]
            .iter()
            .filter(move |s| s.window.overlaps(query))
    }
}

/// Serialized fleet state loaded by the report binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
}
