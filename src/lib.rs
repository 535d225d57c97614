#![deny(missing_docs)]

//! A Left-Right concurrent ordered set.
//!
//! Two copies of a single-threaded set are kept side by side. Readers announce themselves on a
//! sharded read indicator, look at whichever copy is currently visible, and leave; they never
//! take a lock, never retry and never wait on a writer. Writers serialize on a mutex, mutate the
//! hidden copy, make it visible, wait for the readers of the old copy to drain, and then replay
//! the same mutation on the old copy so that both copies agree again.
//!
//! | operation  | progress                           |
//! |------------|------------------------------------|
//! | `contains` | wait-free, population-oblivious    |
//! | `add`      | blocking (writers are serialized)  |
//! | `remove`   | blocking (writers are serialized)  |
//!
//! The backing structure is anything implementing [`OrderedSet`]. `BTreeSet` and [`SortedVec`]
//! are provided.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! let set = Arc::new(lrset::new::<u32>());
//!
//! assert!(set.add(5));
//! assert!(!set.add(5));
//!
//! let reader = {
//!     let set = Arc::clone(&set);
//!     thread::spawn(move || set.contains(&5))
//! };
//! assert!(reader.join().unwrap());
//!
//! assert!(set.remove(&5));
//! assert!(!set.contains(&5));
//! assert!(!set.remove(&5));
//! ```
//!
//! Using a different backing structure and an explicit configuration:
//!
//! ```
//! use std::num::NonZeroUsize;
//! use lrset::{Config, LeftRightSet, SortedVec};
//!
//! let config = Config {
//!     parallelism: NonZeroUsize::new(4),
//!     ..Config::default()
//! };
//! let set: LeftRightSet<i64, SortedVec<i64>> = LeftRightSet::with_config(config).unwrap();
//!
//! for key in [3, 1, 2] {
//!     set.add(key);
//! }
//! assert_eq!(set.read(|copy| copy.as_slice().to_vec()), vec![1, 2, 3]);
//! ```

use std::collections::BTreeSet;

mod backing;
pub use backing::SortedVec;

mod config;
pub use config::{Config, ConfigError, DEFAULT_PARALLELISM, DEFAULT_SLOW_DRAIN};

mod gate;
pub use gate::{Side, VersionGate};

mod indicator;
pub use indicator::{ReadIndicator, SequentialSlots, SlotAssigner, ThreadIdHash, Version};

mod set;
pub use set::LeftRightSet;

mod wait;
pub use wait::{SpinYieldSleep, WaitStrategy, YieldNow};

/// The single-threaded set kept twice inside a [`LeftRightSet`].
///
/// Mutations are only ever issued from one thread at a time, and never while a reader can observe
/// the same instance. `contains` and `len` may run concurrently with each other from many threads.
///
/// Two instances fed the same sequence of mutations must end up with the same content; the
/// Left-Right protocol relies on this to keep its copies identical.
pub trait OrderedSet<K>: Default {
    /// Insert `key`. Returns `false`, leaving the set untouched, if it was already present.
    fn add(&mut self, key: K) -> bool;

    /// Remove `key`. Returns `false`, leaving the set untouched, if it was absent.
    fn remove(&mut self, key: &K) -> bool;

    /// Whether `key` is present.
    fn contains(&self, key: &K) -> bool;

    /// Number of keys in the set.
    fn len(&self) -> usize;

    /// Whether the set holds no keys.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Create an empty set backed by two `BTreeSet`s, sized from the detected hardware parallelism.
pub fn new<K: Ord>() -> LeftRightSet<K, BTreeSet<K>> {
    LeftRightSet::new()
}
