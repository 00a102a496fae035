//! Batched contract reads.
//!
//! The resolver only sees [`CallState`]s through [`CallStateSource`]: a read
//! is either still loading or settled, and settled reads carry an optional
//! decoded result. [`CallStore`] is the in-memory source and
//! [`MulticallFetcher`] settles it over RPC through Multicall3.

mod fetcher;
mod store;

use alloy::primitives::Address;
use alloy::sol_types::SolCall;

pub use fetcher::MulticallFetcher;
pub use store::{CallKey, CallStore};

/// Observed state of one contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallState<T> {
    /// The call could be issued at all (it has a target).
    pub valid: bool,
    /// No result has been observed yet.
    pub loading: bool,
    /// A result is present but a newer one has been requested.
    pub syncing: bool,
    /// Decoded return value, absent when the call reverted or returned
    /// data that does not decode.
    pub result: Option<T>,
    pub error: bool,
}

impl<T> CallState<T> {
    /// State of a call without a target. It never starts loading.
    pub const fn invalid() -> Self {
        Self {
            valid: false,
            loading: false,
            syncing: false,
            result: None,
            error: false,
        }
    }

    pub const fn loading() -> Self {
        Self {
            valid: true,
            loading: true,
            syncing: false,
            result: None,
            error: false,
        }
    }

    pub fn settled(result: Option<T>) -> Self {
        Self {
            valid: true,
            loading: false,
            syncing: false,
            error: result.is_none(),
            result,
        }
    }
}

/// Batched read layer: the same call against many addresses.
///
/// Implementations return exactly one state per input address, in input
/// order, and [`CallState::invalid`] for absent addresses.
pub trait CallStateSource {
    fn read_field<C: SolCall>(
        &self,
        addresses: &[Option<Address>],
        call: &C,
    ) -> Vec<CallState<C::Return>>;
}
