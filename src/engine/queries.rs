use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    pub fn get_slot(&self, id: &Ulid) -> Result<SlotInfo, EngineError> {
        self.store
            .slot(id)
            .map(|slot| self.slot_info(slot))
            .ok_or(EngineError::not_found("slot", *id))
    }

    /// Bookings against a slot, oldest first.
    pub fn list_bookings(&self, slot_id: &Ulid) -> Result<Vec<Booking>, EngineError> {
        if self.store.slot(slot_id).is_none() {
            return Err(EngineError::not_found("slot", *slot_id));
        }
        Ok(self.store.bookings_for_slot(slot_id))
    }

    pub fn get_booking(&self, id: &Ulid) -> Result<Booking, EngineError> {
        self.store
            .booking(id)
            .ok_or(EngineError::not_found("booking", *id))
    }

    pub fn get_schedule(&self, id: &Ulid) -> Option<Schedule> {
        self.store.schedule(id)
    }

    pub fn get_availability(&self, id: &Ulid) -> Option<Availability> {
        self.store.availability(id)
    }
}
