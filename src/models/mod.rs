pub mod chain;
pub mod fee;
pub mod pool;
pub mod token;

pub use chain::{
    ChainConfig, ChainFamily, ChainRegistry, PoolDeployer, V3_CORE_FACTORY, ZKSYNC_ERA_V3_FACTORY,
};
pub use fee::{FeeAmount, FeeError};
pub use pool::{CanonicalPair, PoolError, PoolKey, PoolSnapshot, PoolState};
pub use token::{Currency, NativeCurrency, Token};
