//! Exact tick math for concentrated liquidity pools.
//!
//! Mirrors `TickMath.getSqrtRatioAtTick` bit for bit so that a pool's
//! reported `sqrtPriceX96` can be checked against its reported tick.

use alloy::primitives::U256;

use crate::models::PoolError;

// ============================================
// Bounds
// ============================================

/// Lowest tick a pool can be initialized at.
pub const MIN_TICK: i32 = -887272;

/// Highest tick a pool can be initialized at.
pub const MAX_TICK: i32 = -MIN_TICK;

/// `get_sqrt_ratio_at_tick(MIN_TICK)`
pub const MIN_SQRT_RATIO: U256 = U256::from_limbs([4295128739, 0, 0, 0]);

/// `get_sqrt_ratio_at_tick(MAX_TICK)`
pub const MAX_SQRT_RATIO: U256 = U256::from_limbs([
    6743328256752651558,
    17280870778742802505,
    4294805859,
    0,
]);

// Q128 multipliers 1/sqrt(1.0001)^(2^i) for bits 1..=19 of |tick|.
// Bit 0 seeds the ratio instead of multiplying it.
const TICK_MULTIPLIERS: [u128; 19] = [
    0xfff97272373d413259a46990580e213a,
    0xfff2e50f5f656932ef12357cf3c7fdcc,
    0xffe5caca7e10e4e61c3624eaa0941cd0,
    0xffcb9843d60f6159c9db58835c926644,
    0xff973b41fa98c081472e6896dfb254c0,
    0xff2ea16466c96a3843ec78b326b52861,
    0xfe5dee046a99a2a811c461f1969c3053,
    0xfcbe86c7900a88aedcffc83b479aa3a4,
    0xf987a7253ac413176f2b074cf7815e54,
    0xf3392b0822b70005940c7a398e4b70f3,
    0xe7159475a2c29b7443b29c7fa6e889d9,
    0xd097f3bdfd2022b8845ad8f792aa5825,
    0xa9f746462d870fdf8a65dc1f90e061e5,
    0x70d869a156d2a1b890bb3df62baf32f7,
    0x31be135f97d08fd981231505542fcfa6,
    0x9aa508b5b7a84e1c677de54f3e99bc9,
    0x5d6af8dedb81196699c329225ee604,
    0x2216e584f5fa1ea926041bedfe98,
    0x48a170391f7dc42444e8fa2,
];

// ============================================
// Tick to Price Conversion
// ============================================

/// Convert a tick to its sqrt price ratio in Q64.96 format.
///
/// Formula: sqrt(1.0001^tick) * 2^96, rounded up.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> Result<U256, PoolError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(PoolError::TickOutOfRange(tick));
    }
    let abs_tick = tick.unsigned_abs();

    let mut ratio = if abs_tick & 0x1 != 0 {
        U256::from(0xfffcb933bd6fad37aa2d162d1a594001_u128)
    } else {
        U256::from(1u8) << 128
    };

    for (i, multiplier) in TICK_MULTIPLIERS.iter().enumerate() {
        if abs_tick & (0x2 << i) != 0 {
            ratio = (ratio * U256::from(*multiplier)) >> 128;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 -> Q64.96, rounding up so the result is never below the true ratio.
    let round_up = if ratio % (U256::from(1u8) << 32) == U256::ZERO { 0u8 } else { 1u8 };
    Ok((ratio >> 32) + U256::from(round_up))
}
