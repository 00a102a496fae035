use alloy::primitives::Address;
use log::error;
use serde::Deserialize;

/// ERC-20 token identity as seen by the pool layer.
///
/// Two tokens are the same token iff they live on the same chain at the same
/// address; symbol, name and decimals are metadata and do not take part in
/// equality.
#[derive(Debug, Clone, Eq, Deserialize)]
pub struct Token {
    pub chain_id: u64,
    pub address: Address,
    pub decimals: u8,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
}

impl Token {
    pub fn new(
        chain_id: u64,
        address: Address,
        decimals: u8,
        symbol: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            chain_id,
            address,
            decimals,
            symbol: symbol.into(),
            name: name.into(),
        }
    }

    /// Whether this token is token0 of a pool it forms with `other`.
    ///
    /// Ordering is by address, matching the ordering pool factories enforce.
    /// Tokens on different chains or at the same address have no order; that is
    /// a caller bug and reports `false`.
    pub fn sorts_before(&self, other: &Token) -> bool {
        if self.chain_id != other.chain_id {
            error!(
                "Cannot order tokens on different chains ({} vs {})",
                self.chain_id, other.chain_id
            );
            return false;
        }
        if self.address == other.address {
            error!("Cannot order a token against itself ({})", self.address);
            return false;
        }
        self.address < other.address
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id && self.address == other.address
    }
}

impl std::hash::Hash for Token {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.chain_id.hash(state);
        self.address.hash(state);
    }
}

/// The chain's gas currency. It never sits in a pool directly; pools hold its
/// wrapped ERC-20 instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeCurrency {
    pub chain_id: u64,
    pub symbol: String,
    pub decimals: u8,
    pub wrapped: Token,
}

/// Anything a user can pick as one side of a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Currency {
    Native(NativeCurrency),
    Token(Token),
}

impl Currency {
    /// The ERC-20 this currency is represented by on-chain.
    pub fn wrapped(&self) -> &Token {
        match self {
            Currency::Native(native) => &native.wrapped,
            Currency::Token(token) => token,
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Currency::Native(native) => native.chain_id,
            Currency::Token(token) => token.chain_id,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Currency::Native(_))
    }
}

impl From<Token> for Currency {
    fn from(token: Token) -> Self {
        Currency::Token(token)
    }
}
