use alloy::primitives::{address, Address, B256};
use alloy::providers::MULTICALL3_ADDRESS;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{
    models::Token,
    utils::{POOL_INIT_CODE_HASH, ZKSYNC_POOL_BYTECODE_HASH},
};

/// Chain ids whose contract addresses follow zkSync's `create2` rules
/// (Era mainnet, Era Sepolia, local in-memory node, local docker node).
pub const ZKSYNC_CHAIN_IDS: [u64; 4] = [324, 300, 260, 270];

/// Canonical Uniswap V3 factory, deployed at the same address on most EVM chains.
pub const V3_CORE_FACTORY: Address = address!("1F98431c8aD98523631AE4a59f267346ea31F984");

/// Uniswap V3 factory on zkSync Era.
pub const ZKSYNC_ERA_V3_FACTORY: Address = address!("8FdA5a7a8dCA67BBcDd10F02Fa0649A937215422");

/// Multicall3 on zkSync Era, which cannot use the canonical deployment.
pub const ZKSYNC_ERA_MULTICALL: Address = address!("F9cda624FBC7e059355ce98a31693d299FACd963");

/// Address-derivation family of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Evm,
    ZkSync,
}

impl ChainFamily {
    pub fn from_chain_id(chain_id: u64) -> Self {
        if ZKSYNC_CHAIN_IDS.contains(&chain_id) {
            ChainFamily::ZkSync
        } else {
            ChainFamily::Evm
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainFamily::Evm => "evm",
            ChainFamily::ZkSync => "zksync",
        }
    }
}

/// Everything needed to derive a pool address off-chain on one chain.
///
/// For [`ChainFamily::Evm`] `init_code_hash` is the keccak of the pool creation
/// code; for [`ChainFamily::ZkSync`] it is the versioned bytecode hash the
/// zkSync deployer uses instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolDeployer {
    pub family: ChainFamily,
    pub factory: Address,
    pub init_code_hash: B256,
}

impl PoolDeployer {
    pub fn evm(factory: Address) -> Self {
        Self {
            family: ChainFamily::Evm,
            factory,
            init_code_hash: POOL_INIT_CODE_HASH,
        }
    }

    /// zkSync deployer using the published pool bytecode hash.
    pub fn zksync_default(factory: Address) -> Self {
        Self::zksync(factory, ZKSYNC_POOL_BYTECODE_HASH)
    }

    pub fn zksync(factory: Address, bytecode_hash: B256) -> Self {
        Self {
            family: ChainFamily::ZkSync,
            factory,
            init_code_hash: bytecode_hash,
        }
    }
}

/// One registered chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub deployer: PoolDeployer,
    pub rpc_url: Option<String>,
    pub multicall_address: Address,
    pub wrapped_native: Option<Token>,
}

impl ChainConfig {
    pub fn new(chain_id: u64, name: impl Into<String>, deployer: PoolDeployer) -> Self {
        Self {
            chain_id,
            name: name.into(),
            deployer,
            rpc_url: None,
            multicall_address: MULTICALL3_ADDRESS,
            wrapped_native: None,
        }
    }
}

/// Static per-chain lookup of pool factories and their derivation scheme.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: FxHashMap<u64, ChainConfig>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-filled with the public Uniswap V3 deployments.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (chain_id, name) in [
            (1, "Ethereum"),
            (10, "Optimism"),
            (137, "Polygon"),
            (42161, "Arbitrum One"),
        ] {
            registry.insert(ChainConfig::new(
                chain_id,
                name,
                PoolDeployer::evm(V3_CORE_FACTORY),
            ));
        }
        registry.insert(ChainConfig::new(
            8453,
            "Base",
            PoolDeployer::evm(address!("33128a8fC17869897dcE68Ed026d694621f6FDfD")),
        ));
        registry.insert(ChainConfig::new(
            11155111,
            "Sepolia",
            PoolDeployer::evm(address!("0227628f3F023bb0B980b67D528571c95c6DaC1c")),
        ));

        let mut zksync_era = ChainConfig::new(
            324,
            "zkSync Era",
            PoolDeployer::zksync_default(ZKSYNC_ERA_V3_FACTORY),
        );
        zksync_era.multicall_address = ZKSYNC_ERA_MULTICALL;
        registry.insert(zksync_era);
        registry
    }

    /// Register or replace a chain.
    pub fn insert(&mut self, chain: ChainConfig) {
        self.chains.insert(chain.chain_id, chain);
    }

    pub fn get(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.get(&chain_id)
    }

    pub fn deployer(&self, chain_id: u64) -> Option<&PoolDeployer> {
        self.chains.get(&chain_id).map(|chain| &chain.deployer)
    }

    pub fn chains(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.values()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Whether the client-side auto router can quote on this chain.
    /// It cannot route through zkSync deployments.
    pub fn auto_router_supported(&self, chain_id: u64) -> bool {
        match self.chains.get(&chain_id) {
            Some(chain) => chain.deployer.family != ChainFamily::ZkSync,
            None => false,
        }
    }
}
