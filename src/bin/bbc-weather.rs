use anyhow::Context;
use bbc_weather::{
    ForecastConfig, ForecastService, FetcherConfig, HttpFetcher, InMemoryCache, UnitSystem,
};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

/// Print the BBC Weather three-day forecast as JSON
///
/// Flags take precedence over BBC_WEATHER_* environment variables; anything
/// left unset falls back to the built-in defaults.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Feed host
    #[arg(long)]
    host: Option<String>,

    /// Feed path, e.g. /weather/feeds/en/2643743/3dayforecast.rss
    #[arg(long)]
    path: Option<String>,

    /// Temperature units: metric or imperial
    #[arg(short, long)]
    units: Option<UnitSystem>,

    /// Namespace prefixed to cache keys
    #[arg(long)]
    cache_namespace: Option<String>,

    /// Cache lifetime in seconds
    #[arg(long)]
    cache_ttl: Option<u64>,

    /// HTTP timeout in milliseconds
    #[arg(long, default_value = "10000")]
    timeout_ms: u64,

    /// Number of lookups to run; repeats are served from the cache
    #[arg(long, default_value = "1")]
    repeat: u32,
}

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let mut config = ForecastConfig {
        host: args.host,
        path: args.path,
        units: args.units,
        cache_namespace: args.cache_namespace,
        cache_ttl_seconds: args.cache_ttl,
    };
    config.merge(ForecastConfig::from_env()?);
    let request = config.resolve();

    let fetcher = HttpFetcher::new(FetcherConfig {
        timeout_ms: args.timeout_ms,
        ..FetcherConfig::default()
    })?;
    let service = ForecastService::with_cache(Arc::new(fetcher), Arc::new(InMemoryCache::new()));

    info!("Looking up forecast at {} ({})", request.url(), request.units);

    for _ in 0..args.repeat.max(1) {
        let record = service
            .get_weather(&request)
            .await
            .with_context(|| format!("Failed to get forecast from {}", request.url()))?;
        println!("{}", serde_json::to_string_pretty(&record)?);
    }

    Ok(())
}
