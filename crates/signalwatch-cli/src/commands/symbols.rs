use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use signalwatch_core::{
    CacheMode, CatalogCache, CatalogConfig, ReqwestHttpClient, SystemClock, Warehouse,
};

use crate::cli::SymbolsArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct SymbolsResponseData {
    cache_key: String,
    count: usize,
    symbols: Vec<String>,
}

pub async fn run(
    args: &SymbolsArgs,
    timeout: Duration,
    warehouse: Arc<Warehouse>,
) -> Result<Value, CliError> {
    let config = CatalogConfig {
        timeout,
        ..CatalogConfig::from_env()
    };
    let cache = CatalogCache::new(
        config,
        Arc::new(ReqwestHttpClient::new()),
        warehouse,
        Arc::new(SystemClock),
    );

    let mode = if args.refresh {
        CacheMode::Refresh
    } else {
        CacheMode::Use
    };
    render(&cache, cache.get_symbols_with(mode).await)
}

fn render(cache: &CatalogCache, symbols: Vec<String>) -> Result<Value, CliError> {
    Ok(serde_json::to_value(SymbolsResponseData {
        cache_key: cache.config().cache_key.clone(),
        count: symbols.len(),
        symbols,
    })?)
}
