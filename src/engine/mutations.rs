use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError};

fn validate_availability(availability: &Availability) -> Result<(), EngineError> {
    if availability.slot_size_in_minutes == 0 {
        return Err(EngineError::Validation("slot_size_in_minutes must be positive".into()));
    }
    if availability.slot_size_in_minutes > MAX_SLOT_SIZE_MINUTES {
        return Err(EngineError::Validation("slot_size_in_minutes exceeds one day".into()));
    }
    if availability.tokens_per_slot == 0 {
        return Err(EngineError::Validation("tokens_per_slot must be positive".into()));
    }
    if availability.tokens_per_slot > MAX_TOKENS_PER_SLOT {
        return Err(EngineError::LimitExceeded("tokens_per_slot too large"));
    }
    if availability.windows.len() > MAX_WINDOWS_PER_AVAILABILITY {
        return Err(EngineError::LimitExceeded("too many recurrence windows"));
    }
    for w in &availability.windows {
        if w.day_of_week > 6 {
            return Err(EngineError::Validation(format!(
                "day_of_week {} out of range 0..=6",
                w.day_of_week
            )));
        }
        if w.start_time >= w.end_time {
            return Err(EngineError::Validation(format!(
                "window start {} is not before end {}",
                w.start_time, w.end_time
            )));
        }
    }
    Ok(())
}

impl Engine {
    pub async fn create_schedule(
        &self,
        id: Ulid,
        resource_id: Ulid,
        valid_from: NaiveDate,
        valid_to: NaiveDate,
    ) -> Result<Schedule, EngineError> {
        if valid_from > valid_to {
            return Err(EngineError::Validation(format!(
                "schedule valid_from {valid_from} is after valid_to {valid_to}"
            )));
        }
        if (valid_to - valid_from).num_days() > MAX_SCHEDULE_SPAN_DAYS {
            return Err(EngineError::LimitExceeded("schedule validity window too long"));
        }
        if self.store.contains_schedule(&id) {
            return Err(EngineError::Validation(format!("schedule {id} already exists")));
        }
        let schedule = Schedule {
            id,
            resource_id,
            valid_from,
            valid_to,
        };
        self.persist_and_apply(&Event::ScheduleCreated(schedule.clone()))
            .await?;
        Ok(schedule)
    }

    pub async fn create_availability(
        &self,
        availability: Availability,
    ) -> Result<Availability, EngineError> {
        validate_availability(&availability)?;
        if !self.store.contains_schedule(&availability.schedule_id) {
            return Err(EngineError::not_found("schedule", availability.schedule_id));
        }
        if self.store.contains_availability(&availability.id) {
            return Err(EngineError::Validation(format!(
                "availability {} already exists",
                availability.id
            )));
        }
        self.persist_and_apply(&Event::AvailabilityCreated(availability.clone()))
            .await?;
        Ok(availability)
    }
}
