use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

/// Candidates generated per recurrence window before expansion stops.
pub const DEFAULT_MAX_SLOTS_PER_WINDOW: usize = 30;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(32);

pub const DEFAULT_COMPACT_THRESHOLD: u64 = 1000;

/// Knobs the engine itself reads.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Safety cap on slots expanded from a single recurrence window.
    pub max_slots_per_window: usize,
    /// Zone used to combine a calendar date with a time of day.
    pub timezone: Tz,
    /// Bounded wait for the per-resource booking lock.
    pub lock_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_slots_per_window: DEFAULT_MAX_SLOTS_PER_WINDOW,
            timezone: Tz::UTC,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// Process-level configuration for the `slotbook` binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub engine: EngineConfig,
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    /// Optional JSON seed for the in-memory identity directory.
    pub directory_seed: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownTimezone(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownTimezone(name) => write!(f, "unknown timezone: {name}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable numbers fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let max_slots_per_window = lookup("SLOTBOOK_MAX_SLOTS_PER_WINDOW")
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_MAX_SLOTS_PER_WINDOW);
        let timezone = match lookup("SLOTBOOK_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ConfigError::UnknownTimezone(name))?,
            None => Tz::UTC,
        };
        let lock_timeout = lookup("SLOTBOOK_LOCK_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LOCK_TIMEOUT);
        let compact_threshold = lookup("SLOTBOOK_COMPACT_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_COMPACT_THRESHOLD);
        let data_dir = lookup("SLOTBOOK_DATA_DIR").unwrap_or_else(|| "./data".into());
        let metrics_port = lookup("SLOTBOOK_METRICS_PORT").and_then(|s| s.parse().ok());
        let directory_seed = lookup("SLOTBOOK_DIRECTORY").map(PathBuf::from);

        Ok(Self {
            engine: EngineConfig {
                max_slots_per_window,
                timezone,
                lock_timeout,
            },
            data_dir: PathBuf::from(data_dir),
            metrics_port,
            compact_threshold,
            directory_seed,
        })
    }
}
