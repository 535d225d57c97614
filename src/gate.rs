use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;
use tracing::{debug, trace};

use crate::config::DEFAULT_SLOW_DRAIN;
use crate::indicator::{ReadIndicator, Version};
use crate::wait::WaitStrategy;

/// Which of the two copies new readers consult.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// Reads go to the left copy.
    Left,
    /// Reads go to the right copy.
    Right,
}

impl Side {
    /// The side that is not `self`.
    pub fn other(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    fn from_index(index: usize) -> Self {
        if index == 0 {
            Side::Left
        } else {
            Side::Right
        }
    }
}

/// Owns the active-copy selector and the read indicator, and runs the writer-side
/// toggle-and-wait protocol between them.
///
/// The reading side (`visible`, and `arrive`/`depart` on the indicator) may be used from any
/// number of threads. `publish` and `toggle_and_wait` must only be driven by one writer at a time;
/// [`LeftRightSet`](crate::LeftRightSet) guarantees this with its writer mutex.
#[derive(Debug)]
pub struct VersionGate {
    selector: CachePadded<AtomicUsize>,
    indicator: ReadIndicator,
    slow_drain: Option<Duration>,
}

impl VersionGate {
    /// Create a gate with readers on [`Side::Left`] and an indicator of `slots` slots per version.
    pub fn new(slots: usize) -> Self {
        Self {
            selector: CachePadded::new(AtomicUsize::new(Side::Left.index())),
            indicator: ReadIndicator::new(slots),
            slow_drain: Some(DEFAULT_SLOW_DRAIN),
        }
    }

    /// Log drain phases longer than `threshold`, or none at all for `None`.
    pub fn with_slow_drain(mut self, threshold: Option<Duration>) -> Self {
        self.slow_drain = threshold;
        self
    }

    /// The threshold above which a drain phase is logged.
    pub fn slow_drain(&self) -> Option<Duration> {
        self.slow_drain
    }

    /// The read indicator readers announce themselves on.
    pub fn indicator(&self) -> &ReadIndicator {
        &self.indicator
    }

    /// The copy new readers should consult.
    #[inline]
    pub fn visible(&self) -> Side {
        Side::from_index(self.selector.load(Ordering::SeqCst))
    }

    /// Point new readers at `side`. Everything written to that copy beforehand is visible to them.
    pub fn publish(&self, side: Side) {
        self.selector.store(side.index(), Ordering::SeqCst);
    }

    /// Toggle the reader version and wait until no reader can still be looking at the copy that
    /// was visible before the last [`publish`](Self::publish).
    ///
    /// First drains stragglers from the version about to become current, then switches new
    /// readers over to it, then drains the version they used to arrive under. Blocks for as long
    /// as the longest overlapping read.
    pub fn toggle_and_wait<W: WaitStrategy>(&self, wait: &mut W) {
        let previous = self.indicator.current();
        let next = previous.other();

        trace!(?previous, ?next, "toggling read version");

        self.drain(next, wait);
        self.indicator.set_current(next);
        self.drain(previous, wait);
    }

    fn drain<W: WaitStrategy>(&self, version: Version, wait: &mut W) {
        wait.reset();

        let start = Instant::now();
        let mut polls: u64 = 0;

        while !self.indicator.is_empty(version) {
            wait.wait();
            polls += 1;
        }

        let elapsed = start.elapsed();
        if self.slow_drain.is_some_and(|threshold| elapsed > threshold) {
            debug!(
                ?version,
                elapsed_us = elapsed.as_micros() as u64,
                polls,
                "slow drain: readers held the version past the threshold"
            );
        }
    }
}
