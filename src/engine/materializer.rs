use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use futures::future::join_all;
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::MAX_SLOTS_PER_DAY;
use crate::lock::materialize_lock_name;
use crate::model::*;
use crate::observability;

use super::expander::{expand, CandidateSet};
use super::reconciler::reconcile;
use super::{Engine, EngineError};

/// `date` at `time` in `tz`. Ambiguous local times take the earlier instant;
/// times inside a DST gap are pushed forward an hour.
pub(crate) fn combine_local(
    tz: &Tz,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<DateTime<FixedOffset>, EngineError> {
    let naive = date.and_time(time);
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + TimeDelta::hours(1))).earliest())
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| EngineError::Validation(format!("{naive} does not exist in {tz}")))
}

impl Engine {
    /// All slots of the resource for the day, creating whichever the resource's
    /// availabilities call for but are not persisted yet.
    pub async fn query_slots(&self, query: &SlotQuery) -> Result<Vec<SlotInfo>, EngineError> {
        let result = self.query_slots_inner(query).await;
        let status = match &result {
            Ok(_) => "ok",
            Err(e) => e.code(),
        };
        metrics::counter!(observability::SLOT_QUERIES_TOTAL, "status" => status).increment(1);
        result
    }

    async fn query_slots_inner(&self, query: &SlotQuery) -> Result<Vec<SlotInfo>, EngineError> {
        let resource = self.resolve_resource(query).await?;
        let matches = self.resolve_windows(resource.id, query.date);
        let candidates = expand(&matches, self.config.max_slots_per_window)?;

        // Every candidate already committed: nothing to create, no lock needed.
        let existing = self.store.slots_for_day(resource.id, query.date);
        if reconcile(candidates.clone(), &existing).is_empty() {
            return Ok(self.slot_infos_for_day(resource.id, query.date));
        }

        // Creates for one resource and day are serialized, so a query that
        // overlaps another's creates waits for them and then sees them.
        let _guard = self
            .locks
            .acquire(&materialize_lock_name(resource.id, query.date), self.config.lock_timeout)
            .await?;
        let existing = self.store.slots_for_day(resource.id, query.date);
        let creation = reconcile(candidates, &existing);
        if !creation.is_empty() {
            if existing.len() + creation.len() > MAX_SLOTS_PER_DAY {
                return Err(EngineError::LimitExceeded("too many slots for one day"));
            }
            self.materialize(resource.id, query.date, &creation).await?;
        }
        Ok(self.slot_infos_for_day(resource.id, query.date))
    }

    /// Create one slot per candidate. Creates are independent: a failure is
    /// reported after the rest have been attempted, and earlier successes stay.
    async fn materialize(
        &self,
        resource_id: Ulid,
        date: NaiveDate,
        creation: &CandidateSet,
    ) -> Result<usize, EngineError> {
        let tz = &self.config.timezone;
        let mut slots = Vec::with_capacity(creation.len());
        for candidate in creation.iter() {
            slots.push(Slot {
                id: Ulid::new(),
                resource_id,
                availability_id: candidate.availability_id,
                start: combine_local(tz, date, candidate.range.start)?,
                end: combine_local(tz, date, candidate.range.end)?,
                allocated: 0,
            });
        }

        let results = join_all(slots.into_iter().map(|slot| self.create_slot(slot))).await;

        let mut created = 0usize;
        let mut failed = 0usize;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(true) => created += 1,
                Ok(false) => {}
                Err(e) => {
                    failed += 1;
                    warn!(%resource_id, %date, "slot create failed: {e}");
                    if first_error.is_none() {
                        first_error = Some(e.to_string());
                    }
                }
            }
        }

        metrics::counter!(observability::SLOTS_MATERIALIZED_TOTAL).increment(created as u64);
        if created > 0 {
            info!(%resource_id, %date, created, "materialized slots");
        }
        match first_error {
            Some(reason) => {
                metrics::counter!(observability::SLOT_CREATE_FAILURES_TOTAL).increment(failed as u64);
                Err(EngineError::Materialization { failed, reason })
            }
            None => Ok(created),
        }
    }

    /// Persist `slot` unless an equivalent one exists. Returns whether it was created.
    async fn create_slot(&self, slot: Slot) -> Result<bool, EngineError> {
        let key = slot.key();
        let id = slot.id;
        if !self.store.reserve_slot_key(key.clone(), id) {
            return Ok(false);
        }
        if let Err(e) = self.persist_and_apply(&Event::SlotCreated(slot)).await {
            self.store.release_slot_key(&key, id);
            return Err(e);
        }
        Ok(true)
    }

    pub(super) fn slot_info(&self, slot: Slot) -> SlotInfo {
        let tokens_per_slot = self.store.tokens_per_slot(&slot).unwrap_or(0);
        SlotInfo {
            id: slot.id,
            resource_id: slot.resource_id,
            availability_id: slot.availability_id,
            start: slot.start,
            end: slot.end,
            allocated: slot.allocated,
            tokens_per_slot,
        }
    }

    fn slot_infos_for_day(&self, resource_id: Ulid, date: NaiveDate) -> Vec<SlotInfo> {
        self.store
            .slots_for_day(resource_id, date)
            .into_iter()
            .map(|slot| self.slot_info(slot))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_uses_zone_offset() {
        let dt = combine_local(
            &chrono_tz::Asia::Kolkata,
            NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        )
        .unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-10-14T09:00:00+05:30");
        assert_eq!(dt.time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn combine_skips_forward_over_dst_gap() {
        // 2026-03-08 02:30 does not exist in New York
        let dt = combine_local(
            &chrono_tz::America::New_York,
            NaiveDate::from_ymd_opt(2026, 3, 8).unwrap(),
            NaiveTime::from_hms_opt(2, 30, 0).unwrap(),
        )
        .unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-03-08T03:30:00-04:00");
    }

    #[test]
    fn combine_takes_earlier_of_ambiguous() {
        // 2026-11-01 01:30 happens twice in New York
        let dt = combine_local(
            &chrono_tz::America::New_York,
            NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            NaiveTime::from_hms_opt(1, 30, 0).unwrap(),
        )
        .unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-11-01T01:30:00-04:00");
    }
}
