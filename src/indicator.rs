//! The read indicator: how readers announce that they are looking at a copy.
//!
//! Counters are sharded by thread slot and duplicated for the two versions, so that a writer can
//! drain the readers that arrived before a version toggle separately from those that arrived
//! after it. Every counter sits on its own cache line.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crossbeam_utils::CachePadded;
use rustc_hash::FxHasher;

/// One of the two read-indicator versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Version {
    /// Version 0.
    Zero,
    /// Version 1.
    One,
}

impl Version {
    /// The version that is not `self`.
    pub fn other(self) -> Self {
        match self {
            Version::Zero => Version::One,
            Version::One => Version::Zero,
        }
    }

    fn index(self) -> usize {
        match self {
            Version::Zero => 0,
            Version::One => 1,
        }
    }

    fn from_index(index: usize) -> Self {
        if index == 0 {
            Version::Zero
        } else {
            Version::One
        }
    }
}

type Counters = Box<[CachePadded<AtomicUsize>]>;

/// Per-slot reader counters for both versions, plus the index of the version new readers
/// arrive under.
pub struct ReadIndicator {
    current: CachePadded<AtomicUsize>,
    counters: [Counters; 2],
}

impl ReadIndicator {
    /// Create an indicator with `slots` counters per version, all at zero. New readers start on
    /// [`Version::Zero`].
    ///
    /// # Panics
    ///
    /// If `slots` is zero.
    pub fn new(slots: usize) -> Self {
        assert!(slots > 0, "a read indicator needs at least one slot");

        let counters = || -> Counters {
            (0..slots)
                .map(|_| CachePadded::new(AtomicUsize::new(0)))
                .collect()
        };

        Self {
            current: CachePadded::new(AtomicUsize::new(0)),
            counters: [counters(), counters()],
        }
    }

    /// Number of slots per version.
    pub fn slots(&self) -> usize {
        self.counters[0].len()
    }

    /// The version new readers currently arrive under.
    pub fn current(&self) -> Version {
        Version::from_index(self.current.load(Ordering::SeqCst))
    }

    pub(crate) fn set_current(&self, version: Version) {
        self.current.store(version.index(), Ordering::SeqCst);
    }

    /// Announce a reader on `slot` under the current version, returning that version.
    ///
    /// The returned version must be handed back to [`depart`](Self::depart) unchanged.
    ///
    /// # Panics
    ///
    /// If `slot` is out of range.
    #[inline]
    pub fn arrive(&self, slot: usize) -> Version {
        let version = self.current();
        // SeqCst so that the increment is ordered before the reader's load of the selector,
        // against the writer's selector store followed by its drain scan.
        self.counters[version.index()][slot].fetch_add(1, Ordering::SeqCst);
        version
    }

    /// Retract a reader announced by [`arrive`](Self::arrive) on the same slot and version.
    #[inline]
    pub fn depart(&self, slot: usize, version: Version) {
        let previous = self.counters[version.index()][slot].fetch_sub(1, Ordering::Release);
        debug_assert!(
            previous > 0,
            "read indicator underflow on slot {} of {:?}",
            slot,
            version
        );
    }

    /// Whether every counter of `version` is zero. Scans all slots.
    pub fn is_empty(&self, version: Version) -> bool {
        self.counters[version.index()]
            .iter()
            .all(|counter| counter.load(Ordering::SeqCst) == 0)
    }

    /// Sum of the counters of `version`. Only a snapshot when readers are active.
    pub fn readers(&self, version: Version) -> usize {
        self.counters[version.index()]
            .iter()
            .map(|counter| counter.load(Ordering::Acquire))
            .sum()
    }
}

impl std::fmt::Debug for ReadIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadIndicator")
            .field("current", &self.current())
            .field("slots", &self.slots())
            .field("readers", &[self.readers(Version::Zero), self.readers(Version::One)])
            .finish()
    }
}

/// Maps the calling thread to a read-indicator slot.
///
/// The slot for a given thread and slot count must not change while that thread lives. Threads
/// may share a slot; that only costs contention.
pub trait SlotAssigner: Send + Sync {
    /// The calling thread's slot, in `0..slots`.
    fn slot(&self, slots: usize) -> usize;
}

thread_local! {
    static THREAD_HASH: u64 = hash_current_thread();
    static THREAD_TICKET: usize = SequentialSlots::next_ticket();
}

fn hash_current_thread() -> u64 {
    let mut hasher = FxHasher::default();
    thread::current().id().hash(&mut hasher);
    let mut hash = hasher.finish();
    hash ^= hash << 21;
    hash ^= hash >> 35;
    hash ^= hash << 4;
    hash
}

/// Hashes the current `ThreadId` and folds it into the slot range. The default assigner.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadIdHash;

impl SlotAssigner for ThreadIdHash {
    #[inline]
    fn slot(&self, slots: usize) -> usize {
        THREAD_HASH.with(|hash| (*hash % slots as u64) as usize)
    }
}

/// Hands every thread the next ticket the first time it reads, so that up to `slots` threads
/// never share a slot.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialSlots;

static NEXT_TICKET: AtomicUsize = AtomicUsize::new(0);

impl SequentialSlots {
    fn next_ticket() -> usize {
        NEXT_TICKET.fetch_add(1, Ordering::Relaxed)
    }
}

impl SlotAssigner for SequentialSlots {
    #[inline]
    fn slot(&self, slots: usize) -> usize {
        THREAD_TICKET.with(|ticket| ticket % slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrive_and_depart_pair_up() {
        let indicator = ReadIndicator::new(4);
        assert!(indicator.is_empty(Version::Zero));

        let version = indicator.arrive(2);
        assert_eq!(version, Version::Zero);
        assert!(!indicator.is_empty(Version::Zero));
        assert!(indicator.is_empty(Version::One));

        indicator.set_current(Version::One);
        let later = indicator.arrive(2);
        assert_eq!(later, Version::One);

        indicator.depart(2, version);
        assert!(indicator.is_empty(Version::Zero));
        assert!(!indicator.is_empty(Version::One));

        indicator.depart(2, later);
        assert!(indicator.is_empty(Version::One));
    }

    #[test]
    fn readers_sums_slots() {
        let indicator = ReadIndicator::new(3);
        let versions: Vec<_> = (0..3).map(|slot| (slot, indicator.arrive(slot))).collect();
        indicator.arrive(0);
        assert_eq!(indicator.readers(Version::Zero), 4);

        for (slot, version) in versions {
            indicator.depart(slot, version);
        }
        indicator.depart(0, Version::Zero);
        assert_eq!(indicator.readers(Version::Zero), 0);
    }

    #[test]
    #[should_panic]
    fn rejects_slot_out_of_range() {
        ReadIndicator::new(2).arrive(2);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "underflow")]
    fn unmatched_depart_is_caught() {
        ReadIndicator::new(1).depart(0, Version::Zero);
    }

    #[test]
    fn slots_are_stable_and_in_range() {
        for slots in [1, 2, 7, 64] {
            assert!(ThreadIdHash.slot(slots) < slots);
            assert_eq!(ThreadIdHash.slot(slots), ThreadIdHash.slot(slots));
            assert!(SequentialSlots.slot(slots) < slots);
            assert_eq!(SequentialSlots.slot(slots), SequentialSlots.slot(slots));
        }
    }

    #[test]
    fn sequential_slots_spread_threads() {
        let slots = 1024;
        let mut seen: Vec<usize> = (0..8)
            .map(|_| thread::spawn(move || SequentialSlots.slot(slots)).join().unwrap())
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn versions_alternate() {
        assert_eq!(Version::Zero.other(), Version::One);
        assert_eq!(Version::One.other().other(), Version::One);
    }
}
