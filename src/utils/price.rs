//! Price conversion utilities for concentrated liquidity pools.

use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use num_bigint::Sign;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;

use super::conversion::{big_pow10, u256_to_big_decimal};

/// 2^96 (Q64.96 fixed point scaling factor)
static Q96: Lazy<BigDecimal> = Lazy::new(|| u256_to_big_decimal(U256::from(1u8) << 96));

/// Convert sqrtPriceX96 to the decimal-adjusted price of token0 in token1.
///
/// ```text
/// price = (sqrtPriceX96 / 2^96)^2 * 10^(decimals0 - decimals1)
/// ```
///
/// Returns `None` for a zero price, decimals beyond 24, or a result that
/// does not fit a finite `f64`.
pub fn sqrt_price_x96_to_adjusted_price(
    sqrt_price_x96: U256,
    token0_decimals: u8,
    token1_decimals: u8,
) -> Option<f64> {
    if token0_decimals > 24 || token1_decimals > 24 {
        return None;
    }

    let sqrt_price = u256_to_big_decimal(sqrt_price_x96);
    if sqrt_price.sign() == Sign::NoSign {
        return None;
    }

    let normalized = &sqrt_price / &*Q96;
    let raw_price = &normalized * &normalized;

    let decimal_diff = token0_decimals as i32 - token1_decimals as i32;
    let adjusted = if decimal_diff >= 0 {
        raw_price * big_pow10(decimal_diff as u8)
    } else {
        raw_price / big_pow10((-decimal_diff) as u8)
    };

    let price = adjusted.to_f64()?;
    if price.is_finite() && price > 0.0 {
        Some(price)
    } else {
        None
    }
}
