use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{CallState, CallStateSource};

/// One contract call: target plus ABI-encoded calldata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallKey {
    pub target: Address,
    pub calldata: Bytes,
}

#[derive(Debug, Clone)]
struct CallEntry {
    /// Raw return data, `None` if the call failed.
    data: Option<Bytes>,
    stale: bool,
}

#[derive(Debug, Default)]
struct StoreInner {
    results: FxHashMap<CallKey, CallEntry>,
    requested: FxHashSet<CallKey>,
    /// Calls read since the last sweep.
    touched: FxHashSet<CallKey>,
}

/// In-memory call results shared between readers and a fetcher.
///
/// Reading a call that has never been seen registers it and reports it as
/// loading; a fetcher later drains [`CallStore::pending_calls`] and records
/// the outcome. Invalidation keeps old results visible while they refresh,
/// so a settled call never flips back to loading. Results no reader asked
/// for since the previous [`CallStore::sweep`] are dropped by the next one.
#[derive(Debug, Default)]
pub struct CallStore {
    inner: Mutex<StoreInner>,
}

impl CallStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls that need a (re)fetch: never fetched, or invalidated since.
    pub fn pending_calls(&self) -> Vec<CallKey> {
        let inner = self.lock();
        let stale = inner
            .results
            .iter()
            .filter(|(_, entry)| entry.stale)
            .map(|(key, _)| key);
        inner.requested.iter().chain(stale).cloned().collect()
    }

    /// Record the outcome of a call. `None` means the call failed.
    pub fn record(&self, key: CallKey, data: Option<Bytes>) {
        let mut inner = self.lock();
        inner.requested.remove(&key);
        inner.results.insert(key, CallEntry { data, stale: false });
    }

    /// Mark every settled call for refetch, e.g. when a new block arrives.
    pub fn invalidate(&self) {
        let mut inner = self.lock();
        for entry in inner.results.values_mut() {
            entry.stale = true;
        }
        debug!("Invalidated {} call results", inner.results.len());
    }

    /// Drop every call not read since the previous sweep. Returns how many
    /// were dropped.
    pub fn sweep(&self) -> usize {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let before = inner.results.len() + inner.requested.len();

        let touched = std::mem::take(&mut inner.touched);
        inner.results.retain(|key, _| touched.contains(key));
        inner.requested.retain(|key| touched.contains(key));

        let dropped = before - inner.results.len() - inner.requested.len();
        if dropped > 0 {
            debug!("Dropped {} unused call results", dropped);
        }
        dropped
    }

    pub fn len(&self) -> usize {
        let inner = self.lock();
        inner.results.len() + inner.requested.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CallStateSource for CallStore {
    fn read_field<C: SolCall>(
        &self,
        addresses: &[Option<Address>],
        call: &C,
    ) -> Vec<CallState<C::Return>> {
        let calldata = Bytes::from(call.abi_encode());
        let mut guard = self.lock();
        let inner = &mut *guard;

        addresses
            .iter()
            .map(|address| {
                let Some(target) = address else {
                    return CallState::invalid();
                };
                let key = CallKey {
                    target: *target,
                    calldata: calldata.clone(),
                };
                inner.touched.insert(key.clone());

                match inner.results.get(&key) {
                    Some(entry) => {
                        let result = entry
                            .data
                            .as_ref()
                            .and_then(|data| C::abi_decode_returns(data).ok());
                        let mut state = CallState::settled(result);
                        state.syncing = entry.stale;
                        state
                    },
                    None => {
                        inner.requested.insert(key);
                        CallState::loading()
                    },
                }
            })
            .collect()
    }
}
