use std::thread;
use std::time::Duration;

use crossbeam_utils::Backoff;

use crate::config::Config;

/// How a draining writer passes the time between two polls of the read indicator.
///
/// A strategy is owned by the writer gate, so it is only ever driven by one writer at a time.
pub trait WaitStrategy: Send {
    /// Called once before each drain phase.
    fn reset(&mut self);

    /// Called after every poll that still found readers.
    fn wait(&mut self);

    /// Pick up the drain settings of `config` when the set is built. Ignored by default.
    fn configure(&mut self, config: &Config) {
        let _ = config;
    }
}

/// Spin with exponential backoff, then yield to the scheduler, then optionally sleep.
#[derive(Debug, Default)]
pub struct SpinYieldSleep {
    backoff: Backoff,
    sleep: Option<Duration>,
}

impl SpinYieldSleep {
    /// Never sleeps; keeps yielding once spinning is exhausted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `period` between polls once spinning and yielding are exhausted.
    pub fn with_sleep(period: Duration) -> Self {
        Self {
            backoff: Backoff::new(),
            sleep: Some(period),
        }
    }

    /// How long this strategy sleeps between polls once backoff is exhausted.
    pub fn sleep(&self) -> Option<Duration> {
        self.sleep
    }
}

impl WaitStrategy for SpinYieldSleep {
    fn reset(&mut self) {
        self.backoff.reset();
    }
    fn wait(&mut self) {
        match self.sleep {
            Some(period) if self.backoff.is_completed() => thread::sleep(period),
            _ => self.backoff.snooze(),
        }
    }
    fn configure(&mut self, config: &Config) {
        if config.drain_sleep.is_some() {
            self.sleep = config.drain_sleep;
        }
    }
}

/// Yield to the scheduler on every poll, with no spinning phase.
#[derive(Clone, Copy, Debug, Default)]
pub struct YieldNow;

impl WaitStrategy for YieldNow {
    fn reset(&mut self) {}
    fn wait(&mut self) {
        thread::yield_now();
    }
}
