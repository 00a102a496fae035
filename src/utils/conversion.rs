//! Type conversion helpers shared by the price utilities.

use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use once_cell::sync::Lazy;

// ============================================
// U256 Conversions
// ============================================

/// Convert U256 to BigDecimal without going through strings.
pub(crate) fn u256_to_big_decimal(value: U256) -> BigDecimal {
    let bytes: [u8; 32] = value.to_le_bytes();
    BigDecimal::from(BigInt::from_bytes_le(num_bigint::Sign::Plus, &bytes))
}

// ============================================
// Internal Helpers
// ============================================

static POW10_CACHE: Lazy<[BigDecimal; 25]> =
    Lazy::new(|| std::array::from_fn(|i| BigDecimal::from(BigInt::from(10u32).pow(i as u32))));

/// Compute 10^exp as BigDecimal.
pub(crate) fn big_pow10(exp: u8) -> BigDecimal {
    if (exp as usize) < POW10_CACHE.len() {
        POW10_CACHE[exp as usize].clone()
    } else {
        BigDecimal::from(BigInt::from(10u32).pow(exp as u32))
    }
}
