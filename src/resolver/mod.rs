mod pool_resolver;

pub use pool_resolver::{PoolResolver, PoolResult};
