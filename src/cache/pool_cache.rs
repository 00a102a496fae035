use std::sync::Arc;

use alloy::primitives::{aliases::U160, Address};

use crate::{
    cache::RecentCache,
    models::{CanonicalPair, FeeAmount, PoolDeployer, PoolError, PoolSnapshot, Token},
    utils::compute_pool_address,
};

/// Memoizes derived pool addresses.
///
/// Keyed by `family:factory:init_code_hash:token0:token1:fee` so that two
/// deployment schemes sharing a factory address never share entries.
#[derive(Debug, Default)]
pub struct AddressCache {
    entries: RecentCache<String, Address>,
}

impl AddressCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RecentCache::new(capacity),
        }
    }

    pub fn pool_address(&self, deployer: &PoolDeployer, pair: &CanonicalPair) -> Address {
        let key = format!(
            "{}:{}:{}:{}:{}:{}",
            deployer.family.as_str(),
            deployer.factory,
            deployer.init_code_hash,
            pair.token0.address,
            pair.token1.address,
            pair.fee
        );
        self.entries.get_or_insert_with(key, || {
            compute_pool_address(deployer, pair.token0.address, pair.token1.address, pair.fee)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }
}

#[derive(Debug, PartialEq)]
struct SnapshotKey {
    token0: Token,
    token1: Token,
    fee: FeeAmount,
    sqrt_price_x96: U160,
    liquidity: u128,
    tick: i32,
}

/// Reuses snapshot instances for unchanged on-chain state.
///
/// Observing the same pool state twice yields the same `Arc`, so consumers
/// can compare snapshots with `Arc::ptr_eq`.
#[derive(Debug, Default)]
pub struct PoolCache {
    entries: RecentCache<SnapshotKey, Arc<PoolSnapshot>>,
}

impl PoolCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RecentCache::new(capacity),
        }
    }

    pub fn get_pool(
        &self,
        pair: &CanonicalPair,
        sqrt_price_x96: U160,
        liquidity: u128,
        tick: i32,
    ) -> Result<Arc<PoolSnapshot>, PoolError> {
        let key = SnapshotKey {
            token0: pair.token0.clone(),
            token1: pair.token1.clone(),
            fee: pair.fee,
            sqrt_price_x96,
            liquidity,
            tick,
        };
        self.entries.get_or_try_insert_with(key, || {
            PoolSnapshot::new(
                pair.token0.clone(),
                pair.token1.clone(),
                pair.fee,
                sqrt_price_x96,
                liquidity,
                tick,
            )
            .map(Arc::new)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }
}
