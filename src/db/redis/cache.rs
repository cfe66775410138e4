use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// TMDB movie details by TMDB id
    Movie(u64),
    /// Versioned collection snapshot
    Collection,
    /// List URL of the stored collection
    LastListUrl,
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Movie(id) => write!(f, "tmdb:movie:{}", id),
            CacheKey::Collection => write!(f, "movies"),
            CacheKey::LastListUrl => write!(f, "lastLetterboxdUrl"),
        }
    }
}

pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// A serialized value waiting for the background writer
struct PendingWrite {
    key: String,
    json: String,
    ttl: u64,
}

impl PendingWrite {
    async fn apply(self, client: &Client) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(self.key, self.json, self.ttl).await?;
        Ok(())
    }
}

/// Redis access for TMDB responses and the collection snapshot
///
/// Reads and snapshot writes go straight to Redis. Cache fills for TMDB
/// responses are queued and applied by a writer task so they never delay a
/// response.
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    queue: mpsc::UnboundedSender<PendingWrite>,
}

/// Stops the writer task once everything queued has been applied
pub struct CacheWriterHandle {
    stop: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    pub async fn shutdown(self) {
        if self.stop.send(()).await.is_err() {
            tracing::warn!("Cache writer already stopped");
            return;
        }
        tracing::info!("Cache writer asked to stop");
    }
}

impl Cache {
    /// Creates the cache and spawns its writer task
    pub async fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (queue, pending) = mpsc::unbounded_channel();
        let (stop, stopped) = mpsc::channel(1);

        tokio::spawn(Self::run_writer(redis_client.clone(), pending, stopped));

        (Self { redis_client, queue }, CacheWriterHandle { stop })
    }

    async fn run_writer(
        client: Client,
        mut pending: mpsc::UnboundedReceiver<PendingWrite>,
        mut stopped: mpsc::Receiver<()>,
    ) {
        tracing::debug!("Cache writer started");

        loop {
            tokio::select! {
                Some(write) = pending.recv() => Self::apply_logged(&client, write).await,
                _ = stopped.recv() => {
                    pending.close();
                    let flushed = Self::drain(&client, &mut pending).await;
                    tracing::info!(flushed = flushed, "Cache writer stopped");
                    break;
                }
            }
        }
    }

    /// Applies whatever is still queued; returns how many writes succeeded
    async fn drain(client: &Client, pending: &mut mpsc::UnboundedReceiver<PendingWrite>) -> usize {
        let mut flushed = 0;
        while let Some(write) = pending.recv().await {
            let key = write.key.clone();
            match write.apply(client).await {
                Ok(()) => flushed += 1,
                Err(e) => tracing::error!(key = %key, error = %e, "Cache flush failed"),
            }
        }
        flushed
    }

    async fn apply_logged(client: &Client, write: PendingWrite) {
        let key = write.key.clone();
        if let Err(e) = write.apply(client).await {
            tracing::error!(key = %key, error = %e, "Cache write failed");
        }
    }

    /// Raw string stored under `key`
    pub async fn get_raw(&self, key: &CacheKey) -> AppResult<Option<String>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;
        Ok(cached)
    }

    /// Cached JSON value, decoded
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        self.get_raw(key)
            .await?
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| AppError::Internal(format!("Cache deserialization error: {}", e)))
    }

    /// Stores a raw string and waits for Redis to acknowledge it
    pub async fn set_raw(&self, key: &CacheKey, value: String, ttl: u64) -> AppResult<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(key.to_string(), value, ttl).await?;
        Ok(())
    }

    pub async fn delete(&self, keys: &[CacheKey]) -> AppResult<()> {
        let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(keys).await?;
        Ok(())
    }

    /// Queues a cache fill; serialization or queueing failures are only logged
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Cache serialization failed");
                return;
            }
        };

        let write = PendingWrite {
            key: key.to_string(),
            json,
            ttl,
        };
        if self.queue.send(write).is_err() {
            tracing::warn!(key = %key, "Cache writer stopped, dropping write");
        }
    }
}
