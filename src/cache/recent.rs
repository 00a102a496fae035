use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

/// Default number of entries each cache keeps. A single swap quote touches
/// around 64 pools, so this holds about two quotes' worth.
pub const DEFAULT_CAPACITY: usize = 128;

/// Bounded cache ordered by insertion, newest first.
///
/// Lookups scan from the newest entry, which is where repeated requests land.
/// When a miss finds the cache full, the oldest half is dropped in one go
/// before the new entry is inserted, so the size never exceeds `capacity`.
/// Hits do not reorder entries.
///
/// The whole lookup / compute / insert sequence runs under one lock, so
/// concurrent callers never insert the same key twice.
#[derive(Debug)]
pub struct RecentCache<K, V> {
    capacity: usize,
    entries: Mutex<VecDeque<(K, V)>>,
}

impl<K: PartialEq, V: Clone> RecentCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lock()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn get_or_insert_with<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        match self.get_or_try_insert_with(key, || Ok::<V, Infallible>(compute())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Return the cached value for `key`, or compute and insert it.
    ///
    /// A failed computation inserts nothing.
    pub fn get_or_try_insert_with<F, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let mut entries = self.lock();
        if let Some((_, value)) = entries.iter().find(|(k, _)| *k == key) {
            return Ok(value.clone());
        }

        let value = compute()?;
        if entries.len() >= self.capacity {
            let keep = self.capacity / 2;
            debug!(
                "Evicting {} of {} cache entries",
                entries.len() - keep,
                entries.len()
            );
            entries.truncate(keep);
        }
        entries.push_front((key, value.clone()));
        Ok(value)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<(K, V)>> {
        // Entries are only mutated by whole pushes and truncations, so a
        // panic elsewhere cannot leave them half-written.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K: PartialEq, V: Clone> Default for RecentCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
