use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::MAX_REASON_LEN;
use crate::lock::booking_lock_name;
use crate::model::*;
use crate::observability;

use super::{Engine, EngineError};

impl Engine {
    /// Take one capacity unit of a slot for a patient.
    ///
    /// Allocation runs under the slot's resource lock: every slot of a resource
    /// books through the same lock. The allocation count and the booking are
    /// committed as a single WAL record, so a failure leaves both unchanged.
    pub async fn create_booking(&self, request: BookingRequest) -> Result<Booking, EngineError> {
        let result = self.create_booking_inner(&request).await;
        let status = match &result {
            Ok(_) => "booked",
            Err(e) => e.code(),
        };
        metrics::counter!(observability::BOOKINGS_TOTAL, "status" => status).increment(1);
        result
    }

    async fn create_booking_inner(&self, request: &BookingRequest) -> Result<Booking, EngineError> {
        if request.reason_for_visit.len() > MAX_REASON_LEN {
            return Err(EngineError::LimitExceeded("reason for visit too long"));
        }
        if !self.patients.patient_exists(request.patient_id).await {
            return Err(EngineError::not_found("patient", request.patient_id));
        }
        let resource_id = self
            .store
            .slot(&request.slot_id)
            .map(|s| s.resource_id)
            .ok_or(EngineError::not_found("slot", request.slot_id))?;

        let waited = Instant::now();
        let _guard = self
            .locks
            .acquire(&booking_lock_name(resource_id), self.config.lock_timeout)
            .await?;
        metrics::histogram!(observability::BOOKING_LOCK_WAIT_SECONDS)
            .record(waited.elapsed().as_secs_f64());

        self.allocate_locked(request).await
    }

    /// Caller holds the resource's booking lock.
    async fn allocate_locked(&self, request: &BookingRequest) -> Result<Booking, EngineError> {
        let slot = self
            .store
            .slot(&request.slot_id)
            .ok_or(EngineError::not_found("slot", request.slot_id))?;
        let tokens_per_slot = self
            .store
            .tokens_per_slot(&slot)
            .ok_or(EngineError::not_found("availability", slot.availability_id))?;

        if slot.allocated >= tokens_per_slot {
            debug!(slot_id = %slot.id, allocated = slot.allocated, "slot full, booking rejected");
            return Err(EngineError::CapacityExceeded {
                slot_id: slot.id,
                tokens_per_slot,
            });
        }

        let booking = Booking {
            id: Ulid::new(),
            slot_id: slot.id,
            patient_id: request.patient_id,
            booked_by: request.booked_by,
            reason_for_visit: request.reason_for_visit.clone(),
            status: BookingStatus::Booked,
            created_at: Utc::now(),
        };
        let event = Event::BookingCreated {
            booking: booking.clone(),
            slot_allocated: slot.allocated + 1,
        };
        self.persist_and_apply(&event).await?;
        info!(
            booking_id = %booking.id,
            slot_id = %slot.id,
            allocated = slot.allocated + 1,
            tokens_per_slot,
            "booking created"
        );
        Ok(booking)
    }
}
