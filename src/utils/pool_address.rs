//! Off-chain pool address derivation.
//!
//! A pool factory deploys every pool with a salt derived from its token pair
//! and fee, so the pool address can be computed without asking the chain.
//! Two deployment families are supported: plain EVM `CREATE2` and the zkSync
//! variant, which hashes a different preimage.

use alloy::primitives::{b256, keccak256, Address, B256};
use alloy::sol_types::SolValue;
use once_cell::sync::Lazy;

use crate::models::{ChainFamily, FeeAmount, PoolDeployer};

/// keccak256 of the Uniswap V3 pool creation code.
pub const POOL_INIT_CODE_HASH: B256 =
    b256!("e34f199b19b2b4f47f68442619d555527d244f78a3297ea89325f843f87b8b54");

/// Versioned bytecode hash of the Uniswap V3 pool as compiled for zkSync Era.
pub const ZKSYNC_POOL_BYTECODE_HASH: B256 =
    b256!("010013f177ea1fcbc4520f9a3ca7cd2d1d77959e05aa66484027cb38e712aeed");

/// Domain separator zkSync prepends to every `create2` preimage.
static ZKSYNC_CREATE2_PREFIX: Lazy<B256> = Lazy::new(|| keccak256(b"zksyncCreate2"));

/// Pools are deployed without constructor arguments.
static EMPTY_INPUT_HASH: Lazy<B256> = Lazy::new(|| keccak256(b""));

/// Compute the deployment salt of a pool.
///
/// ```text
/// keccak256(abi.encode(token0, token1, fee))
/// ```
///
/// `token0` must sort before `token1`.
pub fn compute_pool_salt(token0: Address, token1: Address, fee: FeeAmount) -> B256 {
    keccak256((token0, token1, fee.as_u32()).abi_encode())
}

/// Compute the address a deployer's factory gives the pool for
/// `(token0, token1, fee)`.
///
/// The tokens must already be in canonical order and must differ; resolving
/// a self-pair is rejected before reaching this point.
pub fn compute_pool_address(
    deployer: &PoolDeployer,
    token0: Address,
    token1: Address,
    fee: FeeAmount,
) -> Address {
    debug_assert!(token0 != token1, "pool tokens must differ");

    let salt = compute_pool_salt(token0, token1, fee);
    match deployer.family {
        ChainFamily::Evm => deployer.factory.create2(salt, deployer.init_code_hash),
        ChainFamily::ZkSync => zksync_create2(deployer.factory, salt, deployer.init_code_hash),
    }
}

/// zkSync `create2`:
///
/// ```text
/// keccak256(
///     keccak256("zksyncCreate2")
///     ++ bytes32(sender)
///     ++ salt
///     ++ bytecodeHash
///     ++ keccak256(constructorInput)
/// )[12..]
/// ```
fn zksync_create2(sender: Address, salt: B256, bytecode_hash: B256) -> Address {
    let mut preimage = [0u8; 160];
    preimage[..32].copy_from_slice(ZKSYNC_CREATE2_PREFIX.as_slice());
    preimage[44..64].copy_from_slice(sender.as_slice());
    preimage[64..96].copy_from_slice(salt.as_slice());
    preimage[96..128].copy_from_slice(bytecode_hash.as_slice());
    preimage[128..].copy_from_slice(EMPTY_INPUT_HASH.as_slice());

    Address::from_word(keccak256(preimage))
}
