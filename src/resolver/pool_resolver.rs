use std::sync::Arc;

use alloy::primitives::Address;
use log::{debug, error};

use crate::{
    abis::IUniswapV3PoolState::{self, slot0Return},
    cache::{AddressCache, PoolCache, DEFAULT_CAPACITY},
    models::{CanonicalPair, ChainRegistry, Currency, FeeAmount, PoolKey, PoolSnapshot, PoolState},
    multicall::{CallState, CallStateSource},
};

/// State of one requested pool, with its snapshot when it exists.
pub type PoolResult = (PoolState, Option<Arc<PoolSnapshot>>);

/// Turns pool keys into pool states.
///
/// Resolution is a pure function of the active chain, the requested keys and
/// whatever the read layer currently reports; callers re-run it whenever any
/// of those change. The resolver owns the address and snapshot caches, which
/// are shared by every call and safe to use from several threads.
#[derive(Debug)]
pub struct PoolResolver {
    registry: Arc<ChainRegistry>,
    addresses: AddressCache,
    pools: PoolCache,
}

impl PoolResolver {
    pub fn new(registry: Arc<ChainRegistry>) -> Self {
        Self::with_capacity(registry, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(registry: Arc<ChainRegistry>, capacity: usize) -> Self {
        Self {
            registry,
            addresses: AddressCache::new(capacity),
            pools: PoolCache::new(capacity),
        }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn address_cache(&self) -> &AddressCache {
        &self.addresses
    }

    pub fn pool_cache(&self) -> &PoolCache {
        &self.pools
    }

    /// Canonical pairs and derived pool addresses for `keys`, slot by slot.
    ///
    /// Without an active chain every slot is empty. Self-pairs have no pair,
    /// and chains without a registered factory have no addresses.
    pub fn pool_addresses(
        &self,
        chain_id: Option<u64>,
        keys: &[PoolKey],
    ) -> (Vec<Option<CanonicalPair>>, Vec<Option<Address>>) {
        let Some(chain_id) = chain_id else {
            return (vec![None; keys.len()], vec![None; keys.len()]);
        };

        let pairs: Vec<Option<CanonicalPair>> = keys.iter().map(PoolKey::canonical).collect();
        let deployer = self.registry.deployer(chain_id);
        if deployer.is_none() {
            debug!("No pool factory registered for chain {}", chain_id);
        }

        let addresses = pairs
            .iter()
            .map(|pair| {
                let (pair, deployer) = (pair.as_ref()?, deployer?);
                Some(self.addresses.pool_address(deployer, pair))
            })
            .collect();

        (pairs, addresses)
    }

    /// Resolve many pools at once. The output has one entry per key, in
    /// key order. Never fails: every problem maps onto a [`PoolState`].
    pub fn resolve_pools<R: CallStateSource>(
        &self,
        chain_id: Option<u64>,
        keys: &[PoolKey],
        reader: &R,
    ) -> Vec<PoolResult> {
        if chain_id.is_none() {
            return vec![(PoolState::Invalid, None); keys.len()];
        }

        let (pairs, addresses) = self.pool_addresses(chain_id, keys);
        let slot0s = reader.read_field(&addresses, &IUniswapV3PoolState::slot0Call {});
        let liquidities = reader.read_field(&addresses, &IUniswapV3PoolState::liquidityCall {});

        pairs
            .iter()
            .enumerate()
            .map(|(index, pair)| {
                self.fold_state(pair.as_ref(), slot0s.get(index), liquidities.get(index))
            })
            .collect()
    }

    /// Resolve a single pool.
    pub fn resolve_pool<R: CallStateSource>(
        &self,
        chain_id: Option<u64>,
        currency_a: Option<Currency>,
        currency_b: Option<Currency>,
        fee: Option<FeeAmount>,
        reader: &R,
    ) -> PoolResult {
        let key = PoolKey {
            currency_a,
            currency_b,
            fee,
        };
        self.resolve_pools(chain_id, std::slice::from_ref(&key), reader)
            .pop()
            .unwrap_or((PoolState::Invalid, None))
    }

    fn fold_state(
        &self,
        pair: Option<&CanonicalPair>,
        slot0: Option<&CallState<slot0Return>>,
        liquidity: Option<&CallState<u128>>,
    ) -> PoolResult {
        let (Some(pair), Some(slot0), Some(liquidity)) = (pair, slot0, liquidity) else {
            return (PoolState::Invalid, None);
        };

        if !slot0.valid || !liquidity.valid {
            return (PoolState::Invalid, None);
        }
        if slot0.loading || liquidity.loading {
            return (PoolState::Loading, None);
        }
        let (Some(slot0), Some(liquidity)) = (&slot0.result, liquidity.result) else {
            return (PoolState::NotExists, None);
        };
        if slot0.sqrtPriceX96.is_zero() {
            return (PoolState::NotExists, None);
        }

        match self
            .pools
            .get_pool(pair, slot0.sqrtPriceX96, liquidity, slot0.tick.as_i32())
        {
            Ok(pool) => (PoolState::Exists, Some(pool)),
            Err(e) => {
                error!(
                    "Error constructing pool {}/{} ({}): {}",
                    pair.token0.address, pair.token1.address, pair.fee, e
                );
                (PoolState::NotExists, None)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NativeCurrency, Token};
    use crate::multicall::{CallKey, CallStore};
    use alloy::primitives::{address, aliases::U160, Bytes, U256};
    use alloy::sol_types::{SolCall, SolValue};
    use std::cell::RefCell;

    const ZKSYNC_ERA: u64 = 324;

    fn usdc() -> Token {
        Token::new(1, address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"), 6, "USDC", "USD Coin")
    }

    fn weth() -> Token {
        Token::new(1, address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"), 18, "WETH", "Wrapped Ether")
    }

    fn on_chain(token: Token, chain_id: u64) -> Token {
        Token { chain_id, ..token }
    }

    fn key(a: Token, b: Token, fee: FeeAmount) -> PoolKey {
        PoolKey::new(a.into(), b.into(), fee)
    }

    fn registry() -> Arc<ChainRegistry> {
        Arc::new(ChainRegistry::with_defaults())
    }

    fn q96() -> U256 {
        U256::from(1u8) << 96
    }

    fn slot0_data(sqrt_price_x96: U256, tick: i32) -> Bytes {
        (sqrt_price_x96, tick, 0u16, 1u16, 1u16, U256::ZERO, true)
            .abi_encode()
            .into()
    }

    fn liquidity_data(liquidity: u128) -> Bytes {
        liquidity.abi_encode().into()
    }

    /// Scripted outcome for one slot of one field.
    #[derive(Clone)]
    enum Outcome {
        Loading,
        Invalid,
        Settled(Option<Bytes>),
        InvalidAndLoading,
    }

    /// Read layer returning scripted outcomes per field, ignoring addresses
    /// except to record them.
    struct ScriptedReader {
        slot0: Vec<Outcome>,
        liquidity: Vec<Outcome>,
        requests: RefCell<Vec<Vec<Option<Address>>>>,
    }

    impl ScriptedReader {
        fn new(slot0: Vec<Outcome>, liquidity: Vec<Outcome>) -> Self {
            Self {
                slot0,
                liquidity,
                requests: RefCell::new(Vec::new()),
            }
        }

        fn settled(slot0: Bytes, liquidity: Bytes) -> Self {
            Self::new(
                vec![Outcome::Settled(Some(slot0))],
                vec![Outcome::Settled(Some(liquidity))],
            )
        }
    }

    impl CallStateSource for ScriptedReader {
        fn read_field<C: SolCall>(
            &self,
            addresses: &[Option<Address>],
            _call: &C,
        ) -> Vec<CallState<C::Return>> {
            self.requests.borrow_mut().push(addresses.to_vec());
            let script = if C::SELECTOR == IUniswapV3PoolState::slot0Call::SELECTOR {
                &self.slot0
            } else {
                &self.liquidity
            };

            script
                .iter()
                .map(|outcome| match outcome {
                    Outcome::Loading => CallState::loading(),
                    Outcome::Invalid => CallState::invalid(),
                    Outcome::InvalidAndLoading => CallState {
                        valid: false,
                        loading: true,
                        syncing: false,
                        result: None,
                        error: false,
                    },
                    Outcome::Settled(data) => CallState::settled(
                        data.as_ref().and_then(|d| C::abi_decode_returns(d).ok()),
                    ),
                })
                .collect()
        }
    }

    fn state(resolver: &PoolResolver, reader: &ScriptedReader) -> PoolState {
        resolver.resolve_pools(Some(1), &[key(usdc(), weth(), FeeAmount::Low)], reader)[0].0
    }

    #[test]
    fn test_no_chain_is_invalid_without_reads() {
        let resolver = PoolResolver::new(registry());
        let reader = ScriptedReader::settled(slot0_data(q96(), 0), liquidity_data(1));
        let results = resolver.resolve_pools(
            None,
            &[key(usdc(), weth(), FeeAmount::Low), key(weth(), usdc(), FeeAmount::High)],
            &reader,
        );
        assert_eq!(results, vec![(PoolState::Invalid, None), (PoolState::Invalid, None)]);
        assert!(reader.requests.borrow().is_empty());
        assert!(resolver.address_cache().is_empty());
    }

    #[test]
    fn test_unregistered_chain_is_invalid() {
        let resolver = PoolResolver::new(registry());
        let (a, b) = (on_chain(usdc(), 999), on_chain(weth(), 999));
        let keys = vec![
            key(a.clone(), b.clone(), FeeAmount::Low),
            key(b, a, FeeAmount::Medium),
        ];

        // The read layer answers absent addresses with invalid states.
        let reader = ScriptedReader::new(
            vec![Outcome::Invalid, Outcome::Invalid],
            vec![Outcome::Invalid, Outcome::Invalid],
        );
        let results = resolver.resolve_pools(Some(999), &keys, &reader);
        assert_eq!(results, vec![(PoolState::Invalid, None); 2]);
        assert_eq!(reader.requests.borrow()[0], vec![None, None]);
        assert!(resolver.address_cache().is_empty());
    }

    #[test]
    fn test_self_pair_skips_derivation() {
        let resolver = PoolResolver::new(registry());
        let eth = Currency::Native(NativeCurrency {
            chain_id: 1,
            symbol: "ETH".to_string(),
            decimals: 18,
            wrapped: weth(),
        });
        let reader = ScriptedReader::new(vec![Outcome::Invalid], vec![Outcome::Invalid]);

        let result = resolver.resolve_pool(
            Some(1),
            Some(eth),
            Some(weth().into()),
            Some(FeeAmount::Medium),
            &reader,
        );
        assert_eq!(result, (PoolState::Invalid, None));
        assert!(resolver.address_cache().is_empty());
        assert_eq!(reader.requests.borrow()[0], vec![None]);
    }

    #[test]
    fn test_missing_key_component_is_invalid() {
        let resolver = PoolResolver::new(registry());
        let reader = ScriptedReader::new(vec![Outcome::Invalid], vec![Outcome::Invalid]);
        let result = resolver.resolve_pool(Some(1), Some(usdc().into()), None, Some(FeeAmount::Low), &reader);
        assert_eq!(result, (PoolState::Invalid, None));
    }

    #[test]
    fn test_state_precedence() {
        let resolver = PoolResolver::new(registry());
        let ok_slot0 = || Outcome::Settled(Some(slot0_data(q96(), 0)));
        let ok_liquidity = || Outcome::Settled(Some(liquidity_data(5)));

        // Missing read slot.
        let reader = ScriptedReader::new(vec![], vec![ok_liquidity()]);
        assert_eq!(state(&resolver, &reader), PoolState::Invalid);

        // Invalid beats loading, even on the same slot.
        let reader = ScriptedReader::new(vec![Outcome::InvalidAndLoading], vec![ok_liquidity()]);
        assert_eq!(state(&resolver, &reader), PoolState::Invalid);
        let reader = ScriptedReader::new(vec![Outcome::Loading], vec![Outcome::Invalid]);
        assert_eq!(state(&resolver, &reader), PoolState::Invalid);

        // Loading beats missing results.
        let reader = ScriptedReader::new(vec![Outcome::Settled(None)], vec![Outcome::Loading]);
        assert_eq!(state(&resolver, &reader), PoolState::Loading);
        let reader = ScriptedReader::new(vec![Outcome::Loading], vec![ok_liquidity()]);
        assert_eq!(state(&resolver, &reader), PoolState::Loading);

        // Missing results.
        let reader = ScriptedReader::new(vec![Outcome::Settled(None)], vec![ok_liquidity()]);
        assert_eq!(state(&resolver, &reader), PoolState::NotExists);
        let reader = ScriptedReader::new(vec![ok_slot0()], vec![Outcome::Settled(None)]);
        assert_eq!(state(&resolver, &reader), PoolState::NotExists);
        let reader = ScriptedReader::new(
            vec![Outcome::Settled(Some(Bytes::new()))],
            vec![ok_liquidity()],
        );
        assert_eq!(state(&resolver, &reader), PoolState::NotExists);

        let reader = ScriptedReader::new(vec![ok_slot0()], vec![ok_liquidity()]);
        assert_eq!(state(&resolver, &reader), PoolState::Exists);
    }

    #[test]
    fn test_zero_price_does_not_exist() {
        let resolver = PoolResolver::new(registry());
        let reader = ScriptedReader::settled(slot0_data(U256::ZERO, 0), liquidity_data(1_000));
        let result = resolver.resolve_pool(
            Some(1),
            Some(usdc().into()),
            Some(weth().into()),
            Some(FeeAmount::Low),
            &reader,
        );
        assert_eq!(result, (PoolState::NotExists, None));
        assert!(resolver.pool_cache().is_empty());
    }

    #[test]
    fn test_existing_pool_snapshot() {
        let resolver = PoolResolver::new(registry());
        let sqrt_price = get_sqrt_ratio(-201_000) + U256::from(17u8);
        let reader = ScriptedReader::settled(slot0_data(sqrt_price, -201_000), liquidity_data(0));

        // Requested in reverse order; the snapshot is canonical.
        let results = resolver.resolve_pools(Some(1), &[key(weth(), usdc(), FeeAmount::Low)], &reader);
        let (state, pool) = &results[0];
        assert_eq!(*state, PoolState::Exists);

        let pool = pool.as_ref().unwrap();
        assert_eq!(pool.token0(), &usdc());
        assert_eq!(pool.token1(), &weth());
        assert_eq!(pool.fee(), FeeAmount::Low);
        assert_eq!(U256::from(pool.sqrt_price_x96()), sqrt_price);
        assert_eq!(pool.liquidity(), 0);
        assert_eq!(pool.tick_current(), -201_000);

        assert_eq!(
            reader.requests.borrow()[0],
            vec![Some(address!("88e6A0c2dDD26FEEb64F039a2c41296FcB3f5640"))]
        );
    }

    #[test]
    fn test_price_on_upper_tick_boundary_exists() {
        let resolver = PoolResolver::new(registry());
        let boundary = get_sqrt_ratio(-200_999);
        let reader = ScriptedReader::settled(slot0_data(boundary, -201_000), liquidity_data(1_000));

        let (state, pool) = resolver.resolve_pool(
            Some(1),
            Some(usdc().into()),
            Some(weth().into()),
            Some(FeeAmount::Low),
            &reader,
        );
        assert_eq!(state, PoolState::Exists);
        let pool = pool.unwrap();
        assert_eq!(U256::from(pool.sqrt_price_x96()), boundary);
        assert_eq!(pool.tick_current(), -201_000);
        assert_eq!(pool.liquidity(), 1_000);
    }

    #[test]
    fn test_repeated_resolution_reuses_snapshot() {
        let resolver = PoolResolver::new(registry());
        let reader = ScriptedReader::settled(slot0_data(q96(), 0), liquidity_data(99));
        let keys = [key(usdc(), weth(), FeeAmount::Medium)];

        let first = resolver.resolve_pools(Some(1), &keys, &reader);
        let second = resolver.resolve_pools(Some(1), &keys, &reader);
        let (first, second) = (first[0].1.clone().unwrap(), second[0].1.clone().unwrap());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.pool_cache().len(), 1);
        assert_eq!(resolver.address_cache().len(), 1);
    }

    #[test]
    fn test_bad_tick_degrades_to_not_exists() {
        let resolver = PoolResolver::new(registry());
        let reader = ScriptedReader::settled(slot0_data(q96(), 5_000), liquidity_data(1));
        assert_eq!(state(&resolver, &reader), PoolState::NotExists);
        assert!(resolver.pool_cache().is_empty());
    }

    #[test]
    fn test_order_of_arguments_does_not_matter() {
        let resolver = PoolResolver::new(registry());
        let (forward_pairs, forward) =
            resolver.pool_addresses(Some(1), &[key(usdc(), weth(), FeeAmount::High)]);
        let (backward_pairs, backward) =
            resolver.pool_addresses(Some(1), &[key(weth(), usdc(), FeeAmount::High)]);
        assert_eq!(forward, backward);
        assert_eq!(forward_pairs, backward_pairs);
        assert_eq!(resolver.address_cache().len(), 1);

        let reader = ScriptedReader::settled(slot0_data(q96(), 0), liquidity_data(3));
        let a = resolver.resolve_pool(Some(1), Some(usdc().into()), Some(weth().into()), Some(FeeAmount::High), &reader);
        let b = resolver.resolve_pool(Some(1), Some(weth().into()), Some(usdc().into()), Some(FeeAmount::High), &reader);
        assert_eq!(a.0, PoolState::Exists);
        assert!(Arc::ptr_eq(a.1.as_ref().unwrap(), b.1.as_ref().unwrap()));
    }

    #[test]
    fn test_families_derive_different_addresses() {
        let resolver = PoolResolver::new(registry());
        let evm_key = key(usdc(), weth(), FeeAmount::Low);
        let zk_key = key(
            on_chain(usdc(), ZKSYNC_ERA),
            on_chain(weth(), ZKSYNC_ERA),
            FeeAmount::Low,
        );

        let (_, evm) = resolver.pool_addresses(Some(1), std::slice::from_ref(&evm_key));
        let (_, zk) = resolver.pool_addresses(Some(ZKSYNC_ERA), std::slice::from_ref(&zk_key));
        let (_, zk_again) = resolver.pool_addresses(Some(ZKSYNC_ERA), &[zk_key]);
        assert_ne!(evm[0], zk[0]);
        assert_eq!(zk, zk_again);
        assert!(zk[0].is_some());

        // USDC.e / WETH 0.05% as deployed on zkSync Era.
        let usdc_e = address!("3355df6d4c9c3035724fd0e3914de96a5a83aaf4");
        let weth_era = address!("5aea5775959fbc2557cc8789bc1bf90a239d9a91");
        let era_key = key(
            Token::new(ZKSYNC_ERA, weth_era, 18, "WETH", ""),
            Token::new(ZKSYNC_ERA, usdc_e, 6, "USDC.e", ""),
            FeeAmount::Low,
        );
        let (_, era) = resolver.pool_addresses(Some(ZKSYNC_ERA), &[era_key]);
        assert_eq!(
            era[0],
            Some(address!("3e3dd517fec2e70eddba2a626422a4ba286e8c38"))
        );
    }

    #[test]
    fn test_outputs_follow_input_order() {
        let resolver = PoolResolver::new(registry());
        let reader = ScriptedReader::new(
            vec![
                Outcome::Loading,
                Outcome::Settled(Some(slot0_data(q96(), 0))),
                Outcome::Invalid,
            ],
            vec![
                Outcome::Settled(Some(liquidity_data(1))),
                Outcome::Settled(Some(liquidity_data(1))),
                Outcome::Invalid,
            ],
        );
        let keys = [
            key(usdc(), weth(), FeeAmount::Low),
            key(usdc(), weth(), FeeAmount::Medium),
            key(usdc(), usdc(), FeeAmount::High),
        ];
        let states: Vec<PoolState> = resolver
            .resolve_pools(Some(1), &keys, &reader)
            .into_iter()
            .map(|(state, _)| state)
            .collect();
        assert_eq!(states, vec![PoolState::Loading, PoolState::Exists, PoolState::Invalid]);
    }

    #[test]
    fn test_call_store_round_trip() {
        let resolver = PoolResolver::new(registry());
        let store = CallStore::new();
        let keys = [key(usdc(), weth(), FeeAmount::Low)];

        assert_eq!(resolver.resolve_pools(Some(1), &keys, &store)[0].0, PoolState::Loading);
        let pending = store.pending_calls();
        assert_eq!(pending.len(), 2);

        let (_, addresses) = resolver.pool_addresses(Some(1), &keys);
        let pool = addresses[0].unwrap();
        store.record(
            CallKey {
                target: pool,
                calldata: IUniswapV3PoolState::slot0Call {}.abi_encode().into(),
            },
            Some(slot0_data(q96(), 0)),
        );
        // Still waiting for liquidity.
        assert_eq!(resolver.resolve_pools(Some(1), &keys, &store)[0].0, PoolState::Loading);

        store.record(
            CallKey {
                target: pool,
                calldata: IUniswapV3PoolState::liquidityCall {}.abi_encode().into(),
            },
            Some(liquidity_data(10)),
        );
        let (state, snapshot) = resolver.resolve_pools(Some(1), &keys, &store).remove(0);
        assert_eq!(state, PoolState::Exists);
        assert_eq!(snapshot.unwrap().sqrt_price_x96(), U160::from(1u8) << 96);

        // A refresh keeps the pool visible instead of flickering to loading.
        store.invalidate();
        assert_eq!(resolver.resolve_pools(Some(1), &keys, &store)[0].0, PoolState::Exists);
    }

    #[test]
    fn test_shared_across_threads() {
        let resolver = Arc::new(PoolResolver::with_capacity(registry(), 8));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let resolver = resolver.clone();
                std::thread::spawn(move || {
                    for fee in FeeAmount::ALL {
                        let (_, addresses) =
                            resolver.pool_addresses(Some(1), &[key(usdc(), weth(), fee)]);
                        assert!(addresses[0].is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(resolver.address_cache().len(), FeeAmount::ALL.len());
    }

    fn get_sqrt_ratio(tick: i32) -> U256 {
        crate::utils::get_sqrt_ratio_at_tick(tick).unwrap()
    }
}
