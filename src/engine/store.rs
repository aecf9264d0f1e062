use chrono::NaiveDate;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use ulid::Ulid;

use crate::model::*;

/// In-memory state rebuilt from the WAL. Only `apply_event` mutates it,
/// apart from slot-key reservations made while a slot create is in flight.
#[derive(Default)]
pub struct Store {
    schedules: DashMap<Ulid, Schedule>,
    availabilities: DashMap<Ulid, Availability>,
    slots: DashMap<Ulid, Slot>,
    /// Uniqueness index over `(resource, start, end, availability)`.
    slot_keys: DashMap<SlotKey, Ulid>,
    /// (resource, local day) → slot ids.
    days: DashMap<(Ulid, NaiveDate), Vec<Ulid>>,
    bookings: DashMap<Ulid, Booking>,
    bookings_by_slot: DashMap<Ulid, Vec<Ulid>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Schedules & availabilities ───────────────────────────

    pub fn contains_schedule(&self, id: &Ulid) -> bool {
        self.schedules.contains_key(id)
    }

    pub fn contains_availability(&self, id: &Ulid) -> bool {
        self.availabilities.contains_key(id)
    }

    pub fn schedule(&self, id: &Ulid) -> Option<Schedule> {
        self.schedules.get(id).map(|e| e.value().clone())
    }

    pub fn availability(&self, id: &Ulid) -> Option<Availability> {
        self.availabilities.get(id).map(|e| e.value().clone())
    }

    /// Appointment availabilities whose schedule belongs to `resource_id` and
    /// covers `date`, ordered by availability id.
    pub fn appointment_availabilities(&self, resource_id: Ulid, date: NaiveDate) -> Vec<Availability> {
        let mut found: Vec<Availability> = self
            .availabilities
            .iter()
            .filter(|e| e.value().slot_type == SlotType::Appointment)
            .filter(|e| {
                self.schedules
                    .get(&e.value().schedule_id)
                    .is_some_and(|s| s.resource_id == resource_id && s.covers(date))
            })
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|a| a.id);
        found
    }

    // ── Slots ────────────────────────────────────────────────

    pub fn slot(&self, id: &Ulid) -> Option<Slot> {
        self.slots.get(id).map(|e| e.value().clone())
    }

    /// Slots of a resource on a local day, ordered by start, end, then availability.
    pub fn slots_for_day(&self, resource_id: Ulid, date: NaiveDate) -> Vec<Slot> {
        let ids = match self.days.get(&(resource_id, date)) {
            Some(ids) => ids.value().clone(),
            None => return Vec::new(),
        };
        let mut slots: Vec<Slot> = ids.iter().filter_map(|id| self.slot(id)).collect();
        slots.sort_by_key(|s| (s.start, s.end, s.availability_id));
        slots
    }

    pub fn tokens_per_slot(&self, slot: &Slot) -> Option<u32> {
        self.availabilities
            .get(&slot.availability_id)
            .map(|a| a.tokens_per_slot)
    }

    /// Claim `key` for slot `id`. Returns false if an equivalent slot exists
    /// or another create already holds the claim.
    pub fn reserve_slot_key(&self, key: SlotKey, id: Ulid) -> bool {
        match self.slot_keys.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                v.insert(id);
                true
            }
        }
    }

    /// Drop a claim whose create failed. Claims held by other slots are untouched.
    pub fn release_slot_key(&self, key: &SlotKey, id: Ulid) {
        self.slot_keys.remove_if(key, |_, owner| *owner == id);
    }

    // ── Bookings ─────────────────────────────────────────────

    pub fn booking(&self, id: &Ulid) -> Option<Booking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    pub fn bookings_for_slot(&self, slot_id: &Ulid) -> Vec<Booking> {
        let ids = self
            .bookings_by_slot
            .get(slot_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let mut bookings: Vec<Booking> = ids.iter().filter_map(|id| self.booking(id)).collect();
        bookings.sort_by_key(|b| b.id);
        bookings
    }

    // ── Event application ────────────────────────────────────

    /// Apply one committed event. Replaying the same event twice is harmless.
    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::ScheduleCreated(schedule) => {
                self.schedules.insert(schedule.id, schedule.clone());
            }
            Event::AvailabilityCreated(availability) => {
                self.availabilities.insert(availability.id, availability.clone());
            }
            Event::SlotCreated(slot) => {
                self.slots.insert(slot.id, slot.clone());
                self.slot_keys.insert(slot.key(), slot.id);
                let mut day = self.days.entry((slot.resource_id, slot.day())).or_default();
                if !day.contains(&slot.id) {
                    day.push(slot.id);
                }
            }
            Event::BookingCreated { booking, slot_allocated } => {
                if let Some(mut slot) = self.slots.get_mut(&booking.slot_id) {
                    slot.allocated = *slot_allocated;
                }
                self.bookings.insert(booking.id, booking.clone());
                let mut on_slot = self.bookings_by_slot.entry(booking.slot_id).or_default();
                if !on_slot.contains(&booking.id) {
                    on_slot.push(booking.id);
                }
            }
        }
    }

    /// Minimal event list that recreates the current state.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut schedules: Vec<Schedule> = self.schedules.iter().map(|e| e.value().clone()).collect();
        schedules.sort_by_key(|s| s.id);
        let mut availabilities: Vec<Availability> =
            self.availabilities.iter().map(|e| e.value().clone()).collect();
        availabilities.sort_by_key(|a| a.id);
        let mut slots: Vec<Slot> = self.slots.iter().map(|e| e.value().clone()).collect();
        slots.sort_by_key(|s| s.id);
        let mut bookings: Vec<Booking> = self.bookings.iter().map(|e| e.value().clone()).collect();
        bookings.sort_by_key(|b| b.id);

        let mut events = Vec::with_capacity(
            schedules.len() + availabilities.len() + slots.len() + bookings.len(),
        );
        events.extend(schedules.into_iter().map(Event::ScheduleCreated));
        events.extend(availabilities.into_iter().map(Event::AvailabilityCreated));
        events.extend(slots.into_iter().map(Event::SlotCreated));
        for booking in bookings {
            let slot_allocated = self.slots.get(&booking.slot_id).map_or(0, |s| s.allocated);
            events.push(Event::BookingCreated { booking, slot_allocated });
        }
        events
    }
}
