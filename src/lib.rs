pub mod abis;
pub mod cache;
pub mod config;
pub mod models;
pub mod multicall;
pub mod resolver;
pub mod utils;

pub use config::Settings;
pub use models::{ChainRegistry, Currency, FeeAmount, PoolKey, PoolSnapshot, PoolState, Token};
pub use multicall::{CallState, CallStateSource, CallStore, MulticallFetcher};
pub use resolver::{PoolResolver, PoolResult};
