/// Longest accepted reason-for-visit text, in bytes.
pub const MAX_REASON_LEN: usize = 1024;

pub const MAX_RESOURCE_TYPE_LEN: usize = 64;

pub const MAX_WINDOWS_PER_AVAILABILITY: usize = 64;

/// A slot may not be longer than a day.
pub const MAX_SLOT_SIZE_MINUTES: u32 = 24 * 60;

pub const MAX_TOKENS_PER_SLOT: u32 = 10_000;

/// Upper bound on slots materialized for one (resource, day).
pub const MAX_SLOTS_PER_DAY: usize = 2048;

/// Upper bound on a schedule's validity window, in days.
pub const MAX_SCHEDULE_SPAN_DAYS: i64 = 3660;
