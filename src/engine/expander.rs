use std::collections::BTreeMap;
use std::collections::btree_map;

use chrono::TimeDelta;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::model::*;

use super::resolver::WindowMatch;
use super::EngineError;

/// A slot to be: a time-of-day range and the availability it comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub range: TimeRange,
    pub availability_id: Ulid,
}

/// Slot candidates for one day, at most one per time-of-day range, iterated in
/// range order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    entries: BTreeMap<TimeRange, Ulid>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing any candidate already holding `range`. Returns the replaced source.
    pub fn insert(&mut self, range: TimeRange, availability_id: Ulid) -> Option<Ulid> {
        self.entries.insert(range, availability_id)
    }

    pub fn get(&self, range: &TimeRange) -> Option<Ulid> {
        self.entries.get(range).copied()
    }

    /// Remove the candidate at `range` only if it comes from `availability_id`.
    pub fn remove_if_from(&mut self, range: &TimeRange, availability_id: Ulid) -> bool {
        match self.entries.entry(*range) {
            btree_map::Entry::Occupied(e) if *e.get() == availability_id => {
                e.remove();
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Candidate> + '_ {
        self.entries.iter().map(|(range, id)| Candidate {
            range: *range,
            availability_id: *id,
        })
    }
}

impl FromIterator<Candidate> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = Candidate>>(iter: I) -> Self {
        let mut set = Self::new();
        for c in iter {
            set.insert(c.range, c.availability_id);
        }
        set
    }
}

/// Consecutive `slot_size`-minute ranges starting at the window's start while the
/// start is still before the window's end. The last range may run past the end.
///
/// Stops after `max_slots` ranges, or before a range that would cross midnight.
pub fn expand_window(
    window: &RecurrenceWindow,
    slot_size_in_minutes: u32,
    max_slots: usize,
) -> Result<Vec<TimeRange>, EngineError> {
    if slot_size_in_minutes == 0 {
        return Err(EngineError::Validation("slot size must be positive".into()));
    }
    let step = TimeDelta::minutes(i64::from(slot_size_in_minutes));
    let mut ranges = Vec::new();
    let mut current = window.start_time;

    while current < window.end_time && ranges.len() < max_slots {
        let (end, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 {
            break;
        }
        ranges.push(TimeRange::new(current, end));
        current = end;
    }

    if ranges.len() == max_slots && current < window.end_time {
        debug!(
            start = %window.start_time,
            end = %window.end_time,
            max_slots,
            "recurrence window truncated at slot cap"
        );
    }
    Ok(ranges)
}

/// Expand every matched window into one candidate set.
///
/// Windows are processed in availability-id order; when two availabilities yield
/// the same range, the one with the higher id is kept.
pub fn expand(matches: &[WindowMatch], max_slots_per_window: usize) -> Result<CandidateSet, EngineError> {
    let mut ordered: Vec<&WindowMatch> = matches.iter().collect();
    ordered.sort_by_key(|m| m.availability_id);

    let mut candidates = CandidateSet::new();
    for m in ordered {
        for range in expand_window(&m.window, m.slot_size_in_minutes, max_slots_per_window)? {
            if let Some(previous) = candidates.insert(range, m.availability_id)
                && previous != m.availability_id
            {
                warn!(
                    start = %range.start,
                    end = %range.end,
                    dropped = %previous,
                    kept = %m.availability_id,
                    "overlapping availabilities produce the same slot"
                );
            }
        }
    }
    Ok(candidates)
}
