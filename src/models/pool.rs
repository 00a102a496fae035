use alloy::primitives::{aliases::U160, U256};

use crate::{
    models::{Currency, FeeAmount, Token},
    utils::{get_sqrt_ratio_at_tick, sqrt_price_x96_to_adjusted_price},
};

/// Resolvability of one requested pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolState {
    Loading,
    NotExists,
    Exists,
    Invalid,
}

impl std::fmt::Display for PoolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PoolState::Loading => "LOADING",
            PoolState::NotExists => "NOT_EXISTS",
            PoolState::Exists => "EXISTS",
            PoolState::Invalid => "INVALID",
        };
        f.write_str(s)
    }
}

/// Reasons a snapshot cannot be built from on-chain values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("pool tokens are identical ({0})")]
    IdenticalTokens(String),
    #[error("pool tokens are on different chains ({0} and {1})")]
    ChainMismatch(u64, u64),
    #[error("tick {0} is outside [-887272, 887272]")]
    TickOutOfRange(i32),
    #[error("sqrt price {sqrt_price_x96} is outside the bounds of tick {tick}")]
    PriceBounds { sqrt_price_x96: U256, tick: i32 },
}

/// A pool as requested by a caller: either side may be missing and the
/// order of the two currencies carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolKey {
    pub currency_a: Option<Currency>,
    pub currency_b: Option<Currency>,
    pub fee: Option<FeeAmount>,
}

impl PoolKey {
    pub fn new(currency_a: Currency, currency_b: Currency, fee: FeeAmount) -> Self {
        Self {
            currency_a: Some(currency_a),
            currency_b: Some(currency_b),
            fee: Some(fee),
        }
    }

    /// Unwrap both sides and order them as the factory would.
    ///
    /// `None` when a component is missing or both sides wrap to the same token.
    pub fn canonical(&self) -> Option<CanonicalPair> {
        let (Some(a), Some(b), Some(fee)) = (&self.currency_a, &self.currency_b, self.fee) else {
            return None;
        };
        let token_a = a.wrapped();
        let token_b = b.wrapped();
        if token_a == token_b {
            return None;
        }

        let (token0, token1) = if token_a.sorts_before(token_b) {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };
        Some(CanonicalPair {
            token0: token0.clone(),
            token1: token1.clone(),
            fee,
        })
    }
}

/// A token pair in factory order (`token0 < token1`) plus its fee tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalPair {
    pub token0: Token,
    pub token1: Token,
    pub fee: FeeAmount,
}

/// Price, liquidity and tick of a pool at one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    token0: Token,
    token1: Token,
    fee: FeeAmount,
    sqrt_price_x96: U160,
    liquidity: u128,
    tick_current: i32,
}

impl PoolSnapshot {
    /// Build a snapshot, checking that the values describe a real pool.
    ///
    /// Tokens may be passed in either order. The price must lie inside the
    /// current tick: `ratio(tick) <= sqrt_price_x96 <= ratio(tick + 1)`. The
    /// upper bound is reached when a swap towards token0 stops exactly on an
    /// initialized tick.
    pub fn new(
        token_a: Token,
        token_b: Token,
        fee: FeeAmount,
        sqrt_price_x96: U160,
        liquidity: u128,
        tick_current: i32,
    ) -> Result<Self, PoolError> {
        if token_a.chain_id != token_b.chain_id {
            return Err(PoolError::ChainMismatch(token_a.chain_id, token_b.chain_id));
        }
        if token_a == token_b {
            return Err(PoolError::IdenticalTokens(token_a.address.to_string()));
        }

        let sqrt_price = U256::from(sqrt_price_x96);
        let lower = get_sqrt_ratio_at_tick(tick_current)?;
        let upper = get_sqrt_ratio_at_tick(tick_current.saturating_add(1))?;
        if sqrt_price < lower || sqrt_price > upper {
            return Err(PoolError::PriceBounds {
                sqrt_price_x96: sqrt_price,
                tick: tick_current,
            });
        }

        let (token0, token1) = if token_a.sorts_before(&token_b) {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };

        Ok(Self {
            token0,
            token1,
            fee,
            sqrt_price_x96,
            liquidity,
            tick_current,
        })
    }

    pub fn token0(&self) -> &Token {
        &self.token0
    }

    pub fn token1(&self) -> &Token {
        &self.token1
    }

    pub fn fee(&self) -> FeeAmount {
        self.fee
    }

    pub fn sqrt_price_x96(&self) -> U160 {
        self.sqrt_price_x96
    }

    pub fn liquidity(&self) -> u128 {
        self.liquidity
    }

    pub fn tick_current(&self) -> i32 {
        self.tick_current
    }

    pub fn tick_spacing(&self) -> i32 {
        self.fee.tick_spacing()
    }

    pub fn chain_id(&self) -> u64 {
        self.token0.chain_id
    }

    pub fn involves_token(&self, token: &Token) -> bool {
        &self.token0 == token || &self.token1 == token
    }

    /// How much token1 one whole token0 buys, decimal adjusted.
    pub fn token0_price(&self) -> Option<f64> {
        sqrt_price_x96_to_adjusted_price(
            U256::from(self.sqrt_price_x96),
            self.token0.decimals,
            self.token1.decimals,
        )
    }

    /// How much token0 one whole token1 buys, decimal adjusted.
    pub fn token1_price(&self) -> Option<f64> {
        let price = self.token0_price()?;
        if price > 0.0 {
            Some(1.0 / price)
        } else {
            None
        }
    }
}
