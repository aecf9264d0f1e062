use crate::model::Slot;

use super::expander::CandidateSet;

/// Drop every candidate already satisfied by a persisted slot with the same
/// time-of-day range and source availability. What remains must be created.
///
/// A persisted slot whose range matches but whose source differs satisfies
/// nothing and is left as is.
pub fn reconcile(mut candidates: CandidateSet, existing: &[Slot]) -> CandidateSet {
    for slot in existing {
        candidates.remove_if_from(&slot.time_range(), slot.availability_id);
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeRange;
    use chrono::{FixedOffset, NaiveTime, TimeZone};
    use ulid::Ulid;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn slot(availability_id: Ulid, start: (u32, u32), end: (u32, u32)) -> Slot {
        let tz = FixedOffset::east_opt(0).unwrap();
        Slot {
            id: Ulid::new(),
            resource_id: Ulid::new(),
            availability_id,
            start: tz.with_ymd_and_hms(2026, 10, 14, start.0, start.1, 0).unwrap(),
            end: tz.with_ymd_and_hms(2026, 10, 14, end.0, end.1, 0).unwrap(),
            allocated: 0,
        }
    }

    fn three_candidates(a: Ulid) -> CandidateSet {
        let mut set = CandidateSet::new();
        set.insert(TimeRange::new(t(9, 0), t(9, 20)), a);
        set.insert(TimeRange::new(t(9, 20), t(9, 40)), a);
        set.insert(TimeRange::new(t(9, 40), t(10, 0)), a);
        set
    }

    #[test]
    fn nothing_persisted_creates_everything() {
        let a = Ulid::new();
        let creation = reconcile(three_candidates(a), &[]);
        assert_eq!(creation, three_candidates(a));
    }

    #[test]
    fn persisted_matches_are_removed() {
        let a = Ulid::new();
        let existing = vec![slot(a, (9, 0), (9, 20)), slot(a, (9, 40), (10, 0))];
        let creation = reconcile(three_candidates(a), &existing);
        assert_eq!(creation.len(), 1);
        assert_eq!(creation.get(&TimeRange::new(t(9, 20), t(9, 40))), Some(a));
    }

    #[test]
    fn fully_persisted_day_creates_nothing() {
        let a = Ulid::new();
        let existing = vec![
            slot(a, (9, 0), (9, 20)),
            slot(a, (9, 20), (9, 40)),
            slot(a, (9, 40), (10, 0)),
        ];
        assert!(reconcile(three_candidates(a), &existing).is_empty());
    }

    #[test]
    fn different_source_does_not_satisfy() {
        let a = Ulid::new();
        let other = Ulid::new();
        let existing = vec![slot(other, (9, 0), (9, 20))];
        let creation = reconcile(three_candidates(a), &existing);
        assert_eq!(creation.len(), 3);
        assert_eq!(creation.get(&TimeRange::new(t(9, 0), t(9, 20))), Some(a));
    }

    #[test]
    fn unrelated_persisted_slots_are_ignored() {
        let a = Ulid::new();
        let existing = vec![slot(a, (15, 0), (15, 20))];
        assert_eq!(reconcile(three_candidates(a), &existing).len(), 3);
    }
}
