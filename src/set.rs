use std::cell::UnsafeCell;
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::{Config, ConfigError};
use crate::gate::{Side, VersionGate};
use crate::indicator::{ReadIndicator, SlotAssigner, ThreadIdHash, Version};
use crate::wait::{SpinYieldSleep, WaitStrategy};
use crate::OrderedSet;

/// A concurrent set built from two copies of a single-threaded [`OrderedSet`].
///
/// Reads ([`contains`](Self::contains), [`len`](Self::len), [`read`](Self::read)) are wait-free
/// and never observe a half-applied write. Writes ([`add`](Self::add), [`remove`](Self::remove))
/// are serialized on a mutex and block until the readers of the copy they are about to update
/// have left.
///
/// `A` decides which read-indicator slot a thread uses, `W` how a writer waits for readers to
/// drain.
pub struct LeftRightSet<K, S = BTreeSet<K>, A = ThreadIdHash, W = SpinYieldSleep> {
    copies: [UnsafeCell<S>; 2],
    gate: VersionGate,
    writer: Mutex<W>,
    assigner: A,
    _key: PhantomData<fn(K)>,
}

// SAFETY: readers only get `&S` to the copy selected by the gate, and a copy is only handed out
// as `&mut S` by a writer holding `writer` after the gate has drained every reader of it.
unsafe impl<K, S, A, W> Sync for LeftRightSet<K, S, A, W>
where
    S: Send + Sync,
    A: Sync,
    W: Send,
{
}

/// Departs the read indicator when dropped, so that a panicking read does not wedge writers.
struct Arrival<'a> {
    indicator: &'a ReadIndicator,
    slot: usize,
    version: Version,
}

impl Drop for Arrival<'_> {
    fn drop(&mut self) {
        self.indicator.depart(self.slot, self.version);
    }
}

impl<K, S: OrderedSet<K>> LeftRightSet<K, S, ThreadIdHash, SpinYieldSleep> {
    /// Create an empty set with the default [`Config`].
    pub fn new() -> Self {
        let config = Config::default();
        // One slot per core.
        let slots = config.resolved_parallelism();
        Self::build(&config, slots, ThreadIdHash, SpinYieldSleep::new())
    }

    /// Create an empty set from `config`.
    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        Self::with_parts(config, ThreadIdHash, SpinYieldSleep::new())
    }
}

impl<K, S: OrderedSet<K>> Default for LeftRightSet<K, S, ThreadIdHash, SpinYieldSleep> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S, A, W> LeftRightSet<K, S, A, W>
where
    S: OrderedSet<K>,
    A: SlotAssigner,
    W: WaitStrategy,
{
    /// Create an empty set from `config`, with a custom slot assigner and drain strategy.
    ///
    /// `wait` is handed `config` through [`WaitStrategy::configure`] before use.
    pub fn with_parts(config: Config, assigner: A, mut wait: W) -> Result<Self, ConfigError> {
        let slots = config.slot_count()?;
        wait.configure(&config);
        Ok(Self::build(&config, slots, assigner, wait))
    }

    fn build(config: &Config, slots: usize, assigner: A, wait: W) -> Self {
        debug!(
            slots,
            slots_per_core = config.slots_per_core,
            "creating left-right set"
        );

        Self {
            copies: [UnsafeCell::new(S::default()), UnsafeCell::new(S::default())],
            gate: VersionGate::new(slots).with_slow_drain(config.slow_drain),
            writer: Mutex::new(wait),
            assigner,
            _key: PhantomData,
        }
    }

    /// Insert `key`. Returns `false` without touching either copy if it was already present.
    pub fn add(&self, key: K) -> bool
    where
        K: Clone,
    {
        self.write(|copy| copy.add(key.clone()))
    }

    /// Remove `key`. Returns `false` without touching either copy if it was absent.
    pub fn remove(&self, key: &K) -> bool {
        self.write(|copy| copy.remove(key))
    }

    /// Whether `key` is present. Never waits on a writer.
    pub fn contains(&self, key: &K) -> bool {
        self.read(|copy| copy.contains(key))
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.read(|copy| copy.len())
    }

    /// Whether the set holds no keys.
    pub fn is_empty(&self) -> bool {
        self.read(|copy| copy.is_empty())
    }

    /// Run `f` against the copy currently visible to readers.
    ///
    /// The copy is consistent for the whole call, but writers that finish in the meantime are
    /// not reflected, and a writer waiting to update this copy stays blocked until `f` returns.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let indicator = self.gate.indicator();
        let slot = self.assigner.slot(indicator.slots());
        let arrival = Arrival {
            indicator,
            slot,
            version: indicator.arrive(slot),
        };

        // SAFETY: we are counted on the indicator, so no writer will take `&mut` to the copy the
        // gate points us at until `arrival` is dropped.
        let copy = unsafe { &*self.copies[self.gate.visible().index()].get() };
        let result = f(copy);

        drop(arrival);
        result
    }

    /// Apply `mutate` to the hidden copy, make it visible, drain readers of the other copy and
    /// replay `mutate` there. A mutation that reports `false` stops before anything is published.
    fn write(&self, mut mutate: impl FnMut(&mut S) -> bool) -> bool {
        let mut wait = self.writer.lock();

        let visible = self.gate.visible();
        let hidden = visible.other();

        // SAFETY: we hold the writer lock, and the previous writer drained every reader of the
        // hidden copy before releasing it. Readers arriving since then are sent to `visible`.
        if !mutate(unsafe { self.copy_mut(hidden) }) {
            return false;
        }

        self.gate.publish(hidden);
        self.gate.toggle_and_wait(&mut *wait);

        // SAFETY: `toggle_and_wait` returned, so no reader can still be looking at `visible`,
        // and new readers go to `hidden`.
        let replayed = mutate(unsafe { self.copy_mut(visible) });
        debug_assert!(replayed, "left and right copies diverged");

        true
    }

    /// # Safety
    ///
    /// The caller must hold the writer lock, and no reader may be able to reach `side`.
    #[allow(clippy::mut_from_ref)]
    unsafe fn copy_mut(&self, side: Side) -> &mut S {
        &mut *self.copies[side.index()].get()
    }

    /// The side readers are currently sent to.
    pub fn visible(&self) -> Side {
        self.gate.visible()
    }

    /// Consume the set and return both copies, left first.
    pub fn into_copies(self) -> (S, S) {
        let [left, right] = self.copies;
        (left.into_inner(), right.into_inner())
    }

    /// Consume the set and return the copy readers were using.
    pub fn into_inner(self) -> S {
        let visible = self.gate.visible();
        let (left, right) = self.into_copies();
        match visible {
            Side::Left => left,
            Side::Right => right,
        }
    }
}

impl<K, S, A, W> fmt::Debug for LeftRightSet<K, S, A, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The copies are behind `UnsafeCell`s and may be mid-write.
        f.debug_struct("LeftRightSet")
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::time::Duration;

    use super::*;
    use crate::backing::SortedVec;
    use crate::indicator::SequentialSlots;
    use crate::wait::YieldNow;

    fn small<S: OrderedSet<u32>>() -> LeftRightSet<u32, S> {
        LeftRightSet::with_config(Config {
            parallelism: NonZeroUsize::new(2),
            ..Config::default()
        })
        .unwrap()
    }

    #[test]
    fn add_remove_contains() {
        let set: LeftRightSet<u32> = small();

        assert!(set.add(5));
        assert!(!set.add(5));
        assert!(set.contains(&5));
        assert!(set.remove(&5));
        assert!(!set.contains(&5));
        assert!(!set.remove(&5));
        assert!(set.is_empty());
    }

    #[test]
    fn writes_flip_visible_side() {
        let set: LeftRightSet<u32, SortedVec<u32>> = small();
        assert_eq!(set.visible(), Side::Left);

        set.add(1);
        assert_eq!(set.visible(), Side::Right);
        set.add(2);
        assert_eq!(set.visible(), Side::Left);
    }

    #[test]
    fn no_op_writes_do_not_toggle() {
        let set: LeftRightSet<u32> = small();
        set.add(1);
        let side = set.visible();
        let version = set.gate.indicator().current();

        assert!(!set.add(1));
        assert!(!set.remove(&2));

        assert_eq!(set.visible(), side);
        assert_eq!(set.gate.indicator().current(), version);
    }

    #[test]
    fn copies_converge() {
        let set: LeftRightSet<u32, SortedVec<u32>> = small();
        for key in [4, 8, 15, 16, 23, 42] {
            set.add(key);
        }
        set.remove(&15);
        set.remove(&99);

        let (left, right) = set.into_copies();
        assert_eq!(left, right);
        assert_eq!(left.as_slice(), &[4, 8, 16, 23, 42]);
    }

    #[test]
    fn read_departs_on_panic() {
        let set: LeftRightSet<u32> = small();
        set.add(1);

        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            set.read(|_| panic!("reader blew up"));
        }));
        assert!(caught.is_err());

        // The writer would hang here if the panicking reader were still counted.
        assert!(set.add(2));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn custom_parts() {
        let set: LeftRightSet<u32, BTreeSet<u32>, SequentialSlots, YieldNow> =
            LeftRightSet::with_parts(Config::default(), SequentialSlots, YieldNow).unwrap();
        assert!(set.add(3));
        assert!(set.contains(&3));
        assert_eq!(set.into_inner().into_iter().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn custom_parts_honor_config() {
        let config = Config {
            drain_sleep: Some(Duration::from_micros(250)),
            slow_drain: None,
            ..Config::default()
        };
        let set: LeftRightSet<u32, BTreeSet<u32>, ThreadIdHash, SpinYieldSleep> =
            LeftRightSet::with_parts(config, ThreadIdHash, SpinYieldSleep::new()).unwrap();

        assert_eq!(set.writer.lock().sleep(), Some(Duration::from_micros(250)));
        assert_eq!(set.gate.slow_drain(), None);
        assert!(set.add(9));
    }

    #[test]
    fn rejects_bad_config() {
        let result = LeftRightSet::<u32>::with_config(Config {
            slots_per_core: 0,
            ..Config::default()
        });
        assert_eq!(result.err(), Some(ConfigError::NoSlots));
    }
}
