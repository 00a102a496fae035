mod config;

pub use self::config::{
    CacheSettings, ChainSettings, CurrencySettings, MulticallSettings, PoolSettings, Settings,
    TokenSettings,
};
