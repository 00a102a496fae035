use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use jemallocator::Jemalloc;
use log::{error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use poolscope::{
    CallStore, Currency, MulticallFetcher, PoolKey, PoolResolver, PoolResult, PoolState, Settings,
};

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap();

    let settings = Arc::new(
        Settings::new()
            .context("Failed to load config.yaml. Please ensure it exists and is valid")?,
    );

    let registry = Arc::new(settings.registry().context("Invalid chain configuration")?);
    let chain_id = settings
        .active_chain
        .context("No active_chain configured")?;
    let chain = registry
        .get(chain_id)
        .with_context(|| format!("Chain {chain_id} has no registered pool factory"))?;
    let rpc_url = chain
        .rpc_url
        .as_deref()
        .with_context(|| format!("Chain {chain_id} has no rpc_url"))?;

    let fetcher = MulticallFetcher::new(rpc_url, chain.multicall_address, &settings.multicall)
        .context("Failed to create multicall client")?;
    let keys = settings.pool_keys(&registry, chain_id);
    let resolver = PoolResolver::with_capacity(registry.clone(), settings.cache.capacity);

    info!(
        "Watching {} pools on {} ({}), family {}",
        keys.len(),
        chain.name,
        chain_id,
        chain.deployer.family.as_str()
    );
    if !registry.auto_router_supported(chain_id) {
        warn!("Auto router is not supported on chain {}", chain_id);
    }

    let cancellation_token = CancellationToken::new();
    let poller_token = cancellation_token.child_token();
    let poller_handle = tokio::spawn(async move {
        run_poller(
            settings,
            resolver,
            fetcher,
            chain_id,
            keys,
            poller_token,
        )
        .await;
    });

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    info!("Pool status running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = sigterm_stream.recv() => {
                info!("Received SIGTERM, exiting gracefully...");
            },
        };
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
        };
    }

    cancellation_token.cancel();
    if let Err(e) = poller_handle.await {
        error!("Poller task failed: {}", e);
    }

    info!("Pool status stopped");
    Ok(())
}

async fn run_poller(
    settings: Arc<Settings>,
    resolver: PoolResolver,
    fetcher: MulticallFetcher,
    chain_id: u64,
    keys: Vec<PoolKey>,
    cancellation_token: CancellationToken,
) {
    let store = CallStore::new();
    let interval = Duration::from_millis(settings.poll_interval_milliseconds);

    loop {
        let results = tokio::select! {
            _ = cancellation_token.cancelled() => break,
            results = refresh(&resolver, &fetcher, &store, chain_id, &keys, settings.max_fetch_rounds) => results,
        };
        report(&keys, &results);

        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {},
        }

        store.sweep();
        // New block window: refetch everything, keeping old values visible.
        store.invalidate();
    }
}

/// Resolve, fetching whatever the resolver asked for, until nothing is
/// pending or the round limit is hit.
async fn refresh(
    resolver: &PoolResolver,
    fetcher: &MulticallFetcher,
    store: &CallStore,
    chain_id: u64,
    keys: &[PoolKey],
    max_rounds: u32,
) -> Vec<PoolResult> {
    match fetcher.block_number().await {
        Ok(block) => info!("Refreshing {} pools at block {}", keys.len(), block),
        Err(e) => warn!("Failed to fetch block number: {:#}", e),
    }

    let mut results = resolver.resolve_pools(Some(chain_id), keys, store);

    for _ in 0..max_rounds {
        if store.pending_calls().is_empty() {
            break;
        }
        if fetcher.fetch_pending(store).await == 0 {
            warn!("No pending calls could be settled this round");
        }
        results = resolver.resolve_pools(Some(chain_id), keys, store);
    }

    results
}

fn report(keys: &[PoolKey], results: &[PoolResult]) {
    for (key, (state, pool)) in keys.iter().zip(results) {
        let name = format!(
            "{}/{} ({})",
            symbol(key.currency_a.as_ref()),
            symbol(key.currency_b.as_ref()),
            key.fee.map(|fee| fee.to_string()).unwrap_or_else(|| "?".to_string())
        );

        match (state, pool) {
            (PoolState::Exists, Some(pool)) => info!(
                "{} EXISTS tick={} liquidity={} price={}",
                name,
                pool.tick_current(),
                pool.liquidity(),
                pool.token0_price()
                    .map(|price| format!("{price:.6} {}/{}", pool.token1().symbol, pool.token0().symbol))
                    .unwrap_or_else(|| "n/a".to_string())
            ),
            (state, _) => info!("{} {}", name, state),
        }
    }
}

fn symbol(currency: Option<&Currency>) -> &str {
    match currency {
        Some(Currency::Native(native)) => &native.symbol,
        Some(Currency::Token(token)) => &token.symbol,
        None => "?",
    }
}
