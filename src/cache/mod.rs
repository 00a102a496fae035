//! Bounded caches for derived pool addresses and pool snapshots.

mod pool_cache;
mod recent;

pub use pool_cache::{AddressCache, PoolCache};
pub use recent::{RecentCache, DEFAULT_CAPACITY};
