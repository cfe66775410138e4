use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use letterboxd_explorer::{
    api::{create_router, AppState},
    config::Config,
    db::{create_redis_client, Cache, MemorySnapshotStore, RedisSnapshotStore, SnapshotStore},
    services::{scrape::HttpFetcher, ListLoader, TmdbProvider},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let fetcher = Arc::new(HttpFetcher::new(config.request_timeout())?);

    // Redis is optional: without it TMDB responses are not cached and the
    // snapshot lives in memory
    let (cache, cache_writer) = match &config.redis_url {
        Some(redis_url) => {
            let client = create_redis_client(redis_url)?;
            let (cache, handle) = Cache::new(client).await;
            tracing::info!("Redis cache enabled");
            (Some(cache), Some(handle))
        }
        None => {
            tracing::info!("REDIS_URL not set, keeping snapshots in memory");
            (None, None)
        }
    };

    let snapshots: Arc<dyn SnapshotStore> = match &cache {
        Some(cache) => Arc::new(RedisSnapshotStore::new(
            cache.clone(),
            config.snapshot_ttl_secs,
        )),
        None => Arc::new(MemorySnapshotStore::new()),
    };

    let provider = Arc::new(TmdbProvider::new(
        fetcher.clone(),
        cache,
        config.tmdb_api_key.clone(),
        config.tmdb_api_url.clone(),
    ));
    let loader = ListLoader::new(fetcher, provider, config.scrape_settings());

    let app = create_router(AppState::new(loader, snapshots));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
