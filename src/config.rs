use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

use thiserror::Error;

/// Parallelism assumed when the platform cannot report how many threads can run at once.
///
/// This only sizes the read indicator. Too small a value makes unrelated readers share counters,
/// too large a value makes the writer's drain scan longer; neither affects correctness.
pub const DEFAULT_PARALLELISM: usize = 32;

/// Default threshold above which a writer's drain phase is logged.
pub const DEFAULT_SLOW_DRAIN: Duration = Duration::from_millis(1);

/// Construction-time settings of a [`LeftRightSet`](crate::LeftRightSet).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Hardware parallelism hint. `None` detects it with `std::thread::available_parallelism`,
    /// falling back to [`DEFAULT_PARALLELISM`].
    pub parallelism: Option<NonZeroUsize>,
    /// Read-indicator slots per unit of parallelism.
    pub slots_per_core: usize,
    /// Once spinning and yielding are exhausted, the draining writer sleeps this long between
    /// polls. `None` keeps yielding.
    pub drain_sleep: Option<Duration>,
    /// A drain phase taking longer than this is logged at debug level. `None` never logs.
    pub slow_drain: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parallelism: None,
            slots_per_core: 1,
            drain_sleep: None,
            slow_drain: Some(DEFAULT_SLOW_DRAIN),
        }
    }
}

/// Reasons a [`Config`] cannot be used.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `slots_per_core` was zero.
    #[error("slots_per_core must be at least 1")]
    NoSlots,
    /// The slot count does not fit in a `usize`.
    #[error("{parallelism} x {slots_per_core} read-indicator slots overflows usize")]
    TooManySlots {
        /// Resolved parallelism.
        parallelism: usize,
        /// Configured slots per core.
        slots_per_core: usize,
    },
}

impl Config {
    /// The parallelism this config resolves to.
    pub fn resolved_parallelism(&self) -> usize {
        match self.parallelism {
            Some(hint) => hint.get(),
            None => thread::available_parallelism().map_or(DEFAULT_PARALLELISM, NonZeroUsize::get),
        }
    }

    /// Number of read-indicator slots per version.
    pub fn slot_count(&self) -> Result<usize, ConfigError> {
        if self.slots_per_core == 0 {
            return Err(ConfigError::NoSlots);
        }
        let parallelism = self.resolved_parallelism();
        parallelism
            .checked_mul(self.slots_per_core)
            .ok_or(ConfigError::TooManySlots {
                parallelism,
                slots_per_core: self.slots_per_core,
            })
    }

    /// Check the config without building anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.slot_count().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_detects_parallelism() {
        let config = Config::default();
        assert!(config.resolved_parallelism() >= 1);
        assert_eq!(config.slot_count(), Ok(config.resolved_parallelism()));
    }

    #[test]
    fn explicit_hint_wins() {
        let config = Config {
            parallelism: NonZeroUsize::new(6),
            slots_per_core: 3,
            ..Config::default()
        };
        assert_eq!(config.slot_count(), Ok(18));
    }

    #[test]
    fn rejects_zero_slots() {
        let config = Config {
            slots_per_core: 0,
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoSlots));
    }

    #[test]
    fn rejects_overflow() {
        let config = Config {
            parallelism: NonZeroUsize::new(usize::MAX),
            slots_per_core: 2,
            ..Config::default()
        };
        assert!(matches!(
            config.slot_count(),
            Err(ConfigError::TooManySlots { slots_per_core: 2, .. })
        ));
    }
}
