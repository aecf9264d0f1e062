use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    /// A resource identity, patient, slot, schedule or availability is absent.
    NotFound { kind: &'static str, id: Ulid },
    /// The identity exists but no schedulable resource is registered for it.
    NotSchedulable(Ulid),
    /// Malformed recurrence or time configuration.
    Validation(String),
    CapacityExceeded { slot_id: Ulid, tokens_per_slot: u32 },
    /// The named booking lock could not be acquired in time.
    LockTimeout(String),
    LimitExceeded(&'static str),
    /// Some slot creates failed; the ones that succeeded stay committed.
    Materialization { failed: usize, reason: String },
    WalError(String),
}

impl EngineError {
    pub(crate) fn not_found(kind: &'static str, id: Ulid) -> Self {
        EngineError::NotFound { kind, id }
    }

    /// Stable machine-readable code surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound { .. } => "not_found",
            EngineError::NotSchedulable(_) => "not_schedulable",
            EngineError::Validation(_) => "validation",
            EngineError::CapacityExceeded { .. } => "capacity_exceeded",
            EngineError::LockTimeout(_) => "lock_timeout",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::Materialization { .. } => "materialization_failed",
            EngineError::WalError(_) => "storage",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            EngineError::NotSchedulable(id) => write!(f, "resource {id} is not schedulable"),
            EngineError::Validation(msg) => write!(f, "invalid configuration: {msg}"),
            EngineError::CapacityExceeded { slot_id, tokens_per_slot } => {
                write!(f, "slot {slot_id} is already full ({tokens_per_slot} tokens)")
            }
            EngineError::LockTimeout(name) => write!(f, "timed out waiting for lock {name}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Materialization { failed, reason } => {
                write!(f, "{failed} slot(s) could not be created: {reason}")
            }
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
