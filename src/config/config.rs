use alloy::primitives::{Address, B256};
use alloy::providers::MULTICALL3_ADDRESS;
use anyhow::{ensure, Result};
use rustc_hash::FxHashSet;
use config::{Config, ConfigError, File};
use log::warn;
use serde::Deserialize;

use crate::{
    cache::DEFAULT_CAPACITY,
    models::{
        ChainConfig, ChainFamily, ChainRegistry, Currency, FeeAmount, NativeCurrency,
        PoolDeployer, PoolKey, Token,
    },
};

/// Capacity of the address and snapshot caches.
#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

/// Multicall3 batching and retry configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct MulticallSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_batch_size() -> usize {
    20
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for MulticallSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// A chain entry. Overrides the built-in deployment of the same id.
///
/// `family` defaults to the classification of `chain_id`. Without
/// `init_code_hash`, zkSync chains use the published pool bytecode hash and
/// EVM chains the canonical pool init code hash.
#[derive(Debug, Deserialize, Clone)]
pub struct ChainSettings {
    pub chain_id: u64,
    pub name: String,
    #[serde(default)]
    pub family: Option<ChainFamily>,
    pub factory: Address,
    #[serde(default)]
    pub init_code_hash: Option<B256>,
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub multicall_address: Option<Address>,
    #[serde(default)]
    pub wrapped_native: Option<TokenSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenSettings {
    pub address: Address,
    pub decimals: u8,
    #[serde(default)]
    pub symbol: String,
}

/// Either `"native"` or a token.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum CurrencySettings {
    Native(String),
    Token(TokenSettings),
}

/// A pool the binary watches on the active chain.
#[derive(Debug, Deserialize, Clone)]
pub struct PoolSettings {
    pub currency_a: CurrencySettings,
    pub currency_b: CurrencySettings,
    pub fee: FeeAmount,
}

/// Root application configuration.
///
/// Loaded from `config.{toml,yaml,json}` at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub multicall: MulticallSettings,
    #[serde(default)]
    pub chains: Vec<ChainSettings>,
    #[serde(default)]
    pub active_chain: Option<u64>,
    #[serde(default)]
    pub pools: Vec<PoolSettings>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_milliseconds: u64,
    #[serde(default = "default_max_fetch_rounds")]
    pub max_fetch_rounds: u32,
}

fn default_poll_interval() -> u64 {
    12_000
}

fn default_max_fetch_rounds() -> u32 {
    5
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file("config")
    }

    pub fn from_file(name: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(name))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }

    /// Built-in deployments overlaid with the configured chains.
    pub fn registry(&self) -> Result<ChainRegistry> {
        let mut registry = ChainRegistry::with_defaults();
        let mut seen = FxHashSet::default();

        for chain in &self.chains {
            ensure!(
                seen.insert(chain.chain_id),
                "Chain {} is configured more than once",
                chain.chain_id
            );
            let family = chain
                .family
                .unwrap_or_else(|| ChainFamily::from_chain_id(chain.chain_id));
            let deployer = match (family, chain.init_code_hash) {
                (ChainFamily::Evm, None) => PoolDeployer::evm(chain.factory),
                (ChainFamily::Evm, Some(hash)) => PoolDeployer {
                    family,
                    factory: chain.factory,
                    init_code_hash: hash,
                },
                (ChainFamily::ZkSync, Some(hash)) => PoolDeployer::zksync(chain.factory, hash),
                (ChainFamily::ZkSync, None) => PoolDeployer::zksync_default(chain.factory),
            };

            let mut config = ChainConfig::new(chain.chain_id, chain.name.clone(), deployer);
            config.rpc_url = chain.rpc_url.clone();
            // Overrides of a built-in chain keep what they leave unset.
            let builtin = registry.get(chain.chain_id);
            config.multicall_address = chain
                .multicall_address
                .or_else(|| builtin.map(|b| b.multicall_address))
                .unwrap_or(MULTICALL3_ADDRESS);
            config.wrapped_native = match &chain.wrapped_native {
                Some(t) => Some(Token::new(
                    chain.chain_id,
                    t.address,
                    t.decimals,
                    t.symbol.clone(),
                    "",
                )),
                None => builtin.and_then(|b| b.wrapped_native.clone()),
            };
            registry.insert(config);
        }

        Ok(registry)
    }

    /// Pool keys for the configured pools on `chain_id`.
    ///
    /// A currency that cannot be built (native without a wrapped token
    /// configured, or an unknown keyword) becomes `None`, which resolves
    /// as an invalid pool.
    pub fn pool_keys(&self, registry: &ChainRegistry, chain_id: u64) -> Vec<PoolKey> {
        let wrapped_native = registry
            .get(chain_id)
            .and_then(|chain| chain.wrapped_native.clone());

        let currency = |settings: &CurrencySettings| -> Option<Currency> {
            match settings {
                CurrencySettings::Token(t) => Some(Currency::Token(Token::new(
                    chain_id,
                    t.address,
                    t.decimals,
                    t.symbol.clone(),
                    "",
                ))),
                CurrencySettings::Native(keyword) if keyword.eq_ignore_ascii_case("native") => {
                    match &wrapped_native {
                        Some(wrapped) => Some(Currency::Native(NativeCurrency {
                            chain_id,
                            symbol: wrapped.symbol.trim_start_matches('W').to_string(),
                            decimals: wrapped.decimals,
                            wrapped: wrapped.clone(),
                        })),
                        None => {
                            warn!("Chain {} has no wrapped native token configured", chain_id);
                            None
                        },
                    }
                },
                CurrencySettings::Native(keyword) => {
                    warn!("Unknown currency keyword {:?}", keyword);
                    None
                },
            }
        };

        self.pools
            .iter()
            .map(|pool| PoolKey {
                currency_a: currency(&pool.currency_a),
                currency_b: currency(&pool.currency_b),
                fee: Some(pool.fee),
            })
            .collect()
    }
}
