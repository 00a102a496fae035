pub mod multicall;
pub mod v3;

pub use multicall::IMulticall3::{self, Call3, CallResult};
pub use v3::IUniswapV3PoolState;
