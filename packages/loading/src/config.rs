use std::env;

use crate::error::ConfigError;

/// Default capacity of the event stream. Overflow drops the oldest event.
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Default capacity of the ordered state stream.
pub const DEFAULT_STATE_CAPACITY: usize = 1024;

/// Largest capacity accepted for either stream.
pub const MAX_CAPACITY: usize = dataflow_loop::MAX_CAPACITY;

/// Buffer sizes for a loading instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadingConfig {
    pub event_capacity: usize,
    pub state_capacity: usize,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            state_capacity: DEFAULT_STATE_CAPACITY,
        }
    }
}

impl LoadingConfig {
    /// Load configuration from environment variables
    ///
    /// Reads `LOADING_EVENT_CAPACITY` and `LOADING_STATE_CAPACITY`, falling
    /// back to the defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        Ok(Self {
            event_capacity: capacity_var("LOADING_EVENT_CAPACITY", DEFAULT_EVENT_CAPACITY)?,
            state_capacity: capacity_var("LOADING_STATE_CAPACITY", DEFAULT_STATE_CAPACITY)?,
        })
    }
}

fn capacity_var(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env::var(name) {
        Ok(value) => parse_capacity(name, &value),
        Err(_) => Ok(default),
    }
}

fn parse_capacity(name: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if (1..=MAX_CAPACITY).contains(&n) => Ok(n),
        _ => Err(ConfigError::InvalidCapacity {
            name,
            value: value.to_string(),
            max: MAX_CAPACITY,
        }),
    }
}
