use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::MAX_RESOURCE_TYPE_LEN;
use crate::model::*;

use super::{Engine, EngineError};

/// A recurrence window that applies on the queried date, with the settings of
/// the availability it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMatch {
    pub window: RecurrenceWindow,
    pub slot_size_in_minutes: u32,
    pub availability_id: Ulid,
}

/// Windows of `availabilities` that recur on `date`'s weekday, in input order.
pub fn matching_windows(availabilities: &[Availability], date: NaiveDate) -> Vec<WindowMatch> {
    availabilities
        .iter()
        .flat_map(|a| {
            a.windows
                .iter()
                .filter(move |w| w.falls_on(date))
                .map(move |w| WindowMatch {
                    window: *w,
                    slot_size_in_minutes: a.slot_size_in_minutes,
                    availability_id: a.id,
                })
        })
        .collect()
}

impl Engine {
    /// Resolve the identity in `query` to its schedulable resource.
    pub(super) async fn resolve_resource(
        &self,
        query: &SlotQuery,
    ) -> Result<SchedulableResource, EngineError> {
        if query.resource_type.len() > MAX_RESOURCE_TYPE_LEN {
            return Err(EngineError::LimitExceeded("resource type too long"));
        }
        if !self.resources.identity_exists(query.resource_id).await {
            return Err(EngineError::not_found("resource", query.resource_id));
        }
        self.resources
            .find_schedulable(query.facility_id, query.resource_id, &query.resource_type)
            .await
            .ok_or(EngineError::NotSchedulable(query.resource_id))
    }

    /// Appointment windows of `resource_id` that apply on `date`.
    pub(super) fn resolve_windows(&self, resource_id: Ulid, date: NaiveDate) -> Vec<WindowMatch> {
        let availabilities = self.store.appointment_availabilities(resource_id, date);
        matching_windows(&availabilities, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn availability(windows: Vec<RecurrenceWindow>) -> Availability {
        Availability {
            id: Ulid::new(),
            schedule_id: Ulid::new(),
            slot_type: SlotType::Appointment,
            slot_size_in_minutes: 20,
            tokens_per_slot: 1,
            windows,
        }
    }

    #[test]
    fn only_windows_on_the_weekday_match() {
        let wednesday = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        let a = availability(vec![
            RecurrenceWindow { day_of_week: 2, start_time: t(9, 0), end_time: t(10, 0) },
            RecurrenceWindow { day_of_week: 3, start_time: t(9, 0), end_time: t(10, 0) },
            RecurrenceWindow { day_of_week: 2, start_time: t(14, 0), end_time: t(15, 0) },
        ]);
        let matches = matching_windows(std::slice::from_ref(&a), wednesday);
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.availability_id == a.id));
        assert_eq!(matches[0].window.start_time, t(9, 0));
        assert_eq!(matches[1].window.start_time, t(14, 0));
        assert_eq!(matches[0].slot_size_in_minutes, 20);
    }

    #[test]
    fn no_match_on_other_days() {
        let monday = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        let a = availability(vec![RecurrenceWindow {
            day_of_week: 2,
            start_time: t(9, 0),
            end_time: t(10, 0),
        }]);
        assert!(matching_windows(&[a], monday).is_empty());
    }
}
