use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// What an availability hands out. Only `Appointment` produces bookable slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    Appointment,
    Open,
    Closed,
}

/// An actor that can be scheduled, as registered by the resource directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulableResource {
    pub id: Ulid,
    pub facility_id: Ulid,
    pub resource_type: String,
    /// The underlying identity (e.g. the clinician's user id).
    pub identity_id: Ulid,
}

/// Validity window `[valid_from, valid_to]` (both inclusive) bound to one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
}

impl Schedule {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && date <= self.valid_to
    }
}

/// One weekly recurrence entry. `day_of_week` counts from Monday = 0 to Sunday = 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceWindow {
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl RecurrenceWindow {
    pub fn falls_on(&self, date: NaiveDate) -> bool {
        u32::from(self.day_of_week) == date.weekday().num_days_from_monday()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub id: Ulid,
    pub schedule_id: Ulid,
    pub slot_type: SlotType,
    pub slot_size_in_minutes: u32,
    /// Capacity of every slot generated from this availability.
    pub tokens_per_slot: u32,
    pub windows: Vec<RecurrenceWindow>,
}

/// Time-of-day range. Slots are reconciled against candidates by this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }
}

/// A concrete, date-bound bookable interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub availability_id: Ulid,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    /// Capacity units consumed so far. Only ever incremented, by the booking path.
    pub allocated: u32,
}

impl Slot {
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.start.time(), self.end.time())
    }

    /// Local calendar day the slot starts on.
    pub fn day(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn key(&self) -> SlotKey {
        SlotKey {
            resource_id: self.resource_id,
            availability_id: self.availability_id,
            start: self.start,
            end: self.end,
        }
    }
}

/// Uniqueness constraint on persisted slots: at most one slot per
/// `(resource, start, end, source availability)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub resource_id: Ulid,
    pub availability_id: Ulid,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Booked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub slot_id: Ulid,
    pub patient_id: Ulid,
    pub booked_by: Ulid,
    pub reason_for_visit: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// The event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ScheduleCreated(Schedule),
    AvailabilityCreated(Availability),
    SlotCreated(Slot),
    /// A booking and the slot's new allocation count, committed as one record.
    BookingCreated { booking: Booking, slot_allocated: u32 },
}

// ── Request / result types ───────────────────────────────────────

fn default_resource_type() -> String {
    "user".into()
}

/// Slots-for-day query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotQuery {
    pub facility_id: Ulid,
    /// Identity of the resource (e.g. the clinician's user id).
    pub resource_id: Ulid,
    #[serde(default = "default_resource_type")]
    pub resource_type: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub slot_id: Ulid,
    pub patient_id: Ulid,
    pub booked_by: Ulid,
    pub reason_for_visit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub availability_id: Ulid,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub allocated: u32,
    pub tokens_per_slot: u32,
}
