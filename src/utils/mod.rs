//! Utility functions for pool resolution.
//!
//! This module is organized into focused submodules:
//!
//! - [`pool_address`] - Deterministic pool address derivation (EVM and zkSync)
//! - [`tick_math`] - Exact tick to sqrt price conversion
//! - [`price`] - sqrtPriceX96 to human price conversion
//! - [`conversion`] - U256 / BigDecimal helpers

mod conversion;
mod pool_address;
mod price;
mod tick_math;

// ============================================
// Re-exports
// ============================================

// Pool address derivation
pub use pool_address::{
    compute_pool_address, compute_pool_salt, POOL_INIT_CODE_HASH, ZKSYNC_POOL_BYTECODE_HASH,
};

// Price conversion utilities
pub use price::sqrt_price_x96_to_adjusted_price;

// Tick math utilities
pub use tick_math::{get_sqrt_ratio_at_tick, MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK};
