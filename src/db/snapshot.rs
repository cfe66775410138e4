//! Persisted state of the last loaded collection
//!
//! Two fixed keys: the versioned collection envelope and the list URL it was
//! loaded from. A snapshot written by an older layout is discarded on read
//! instead of being migrated.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::Collection,
};

/// Layout version of the stored envelope
pub const SNAPSHOT_VERSION: u32 = 1;

/// A decoded snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub list_url: Option<String>,
    pub saved_at: DateTime<Utc>,
    pub movies: Collection,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    version: u32,
    saved_at: DateTime<Utc>,
    movies: Collection,
}

/// Snapshot as it sits in the backend
#[derive(Debug, Clone, Default)]
pub struct StoredSnapshot {
    /// JSON envelope under the `movies` key
    pub envelope: Option<String>,
    /// Value of the `lastLetterboxdUrl` key
    pub list_url: Option<String>,
}

enum Decoded {
    Current(Envelope),
    Stale(String),
}

fn decode(raw: &str) -> Decoded {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => return Decoded::Stale(format!("undecodable snapshot: {}", e)),
    };

    match value.get("version").and_then(serde_json::Value::as_u64) {
        Some(version) if version == u64::from(SNAPSHOT_VERSION) => {}
        found => {
            return Decoded::Stale(format!(
                "snapshot version {:?} does not match {}",
                found, SNAPSHOT_VERSION
            ))
        }
    }

    match serde_json::from_value(value) {
        Ok(envelope) => Decoded::Current(envelope),
        Err(e) => Decoded::Stale(format!("undecodable snapshot: {}", e)),
    }
}

fn encode(movies: &Collection, saved_at: DateTime<Utc>) -> AppResult<String> {
    let envelope = Envelope {
        version: SNAPSHOT_VERSION,
        saved_at,
        movies: movies.clone(),
    };
    serde_json::to_string(&envelope)
        .map_err(|e| AppError::Internal(format!("Snapshot serialization error: {}", e)))
}

/// Storage for the collection snapshot
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Raw contents of both keys
    async fn read(&self) -> AppResult<StoredSnapshot>;

    /// Replaces both keys
    async fn write(&self, stored: StoredSnapshot) -> AppResult<()>;

    /// Removes both keys
    async fn clear(&self) -> AppResult<()>;

    /// Current snapshot; stale or corrupt data is cleared and reported as absent
    async fn load(&self) -> AppResult<Option<Snapshot>> {
        let stored = self.read().await?;
        let Some(raw) = stored.envelope else {
            return Ok(None);
        };

        match decode(&raw) {
            Decoded::Current(envelope) => Ok(Some(Snapshot {
                list_url: stored.list_url,
                saved_at: envelope.saved_at,
                movies: envelope.movies,
            })),
            Decoded::Stale(reason) => {
                tracing::warn!(reason = %reason, "Discarding stored snapshot");
                self.clear().await?;
                Ok(None)
            }
        }
    }

    async fn save(&self, list_url: &str, movies: &Collection) -> AppResult<()> {
        let envelope = encode(movies, Utc::now())?;
        self.write(StoredSnapshot {
            envelope: Some(envelope),
            list_url: Some(list_url.to_string()),
        })
        .await?;

        tracing::info!(list_url = %list_url, movies = movies.len(), "Snapshot saved");
        Ok(())
    }
}

/// Snapshot kept in Redis under fixed keys
pub struct RedisSnapshotStore {
    cache: Cache,
    ttl: u64,
}

impl RedisSnapshotStore {
    pub fn new(cache: Cache, ttl: u64) -> Self {
        Self { cache, ttl }
    }
}

#[async_trait::async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn read(&self) -> AppResult<StoredSnapshot> {
        Ok(StoredSnapshot {
            envelope: self.cache.get_raw(&CacheKey::Collection).await?,
            list_url: self.cache.get_raw(&CacheKey::LastListUrl).await?,
        })
    }

    // Written synchronously so a read right after a load sees the new snapshot
    async fn write(&self, stored: StoredSnapshot) -> AppResult<()> {
        if let Some(envelope) = stored.envelope {
            self.cache
                .set_raw(&CacheKey::Collection, envelope, self.ttl)
                .await?;
        }
        if let Some(list_url) = stored.list_url {
            self.cache
                .set_raw(&CacheKey::LastListUrl, list_url, self.ttl)
                .await?;
        }
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        self.cache
            .delete(&[CacheKey::Collection, CacheKey::LastListUrl])
            .await
    }
}

/// In-process snapshot used when no Redis is configured
#[derive(Default)]
pub struct MemorySnapshotStore {
    stored: RwLock<StoredSnapshot>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn read(&self) -> AppResult<StoredSnapshot> {
        Ok(self.stored.read().await.clone())
    }

    async fn write(&self, stored: StoredSnapshot) -> AppResult<()> {
        *self.stored.write().await = stored;
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        *self.stored.write().await = StoredSnapshot::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EnrichedItem, Enrichment, ItemHandle};

    fn item(id: u32, slug: &str) -> EnrichedItem {
        EnrichedItem::assemble(
            id,
            &ItemHandle::new(slug).unwrap(),
            slug,
            None,
            Enrichment::unavailable(None),
            vec![],
        )
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = MemorySnapshotStore::new();
        let movies = vec![item(1, "heat"), item(2, "thief")];

        store
            .save("https://letterboxd.com/u/list/mann/", &movies)
            .await
            .unwrap();

        let snapshot = store.load().await.unwrap().unwrap();
        assert_eq!(snapshot.movies, movies);
        assert_eq!(
            snapshot.list_url.as_deref(),
            Some("https://letterboxd.com/u/list/mann/")
        );
    }

    #[tokio::test]
    async fn test_load_empty() {
        let store = MemorySnapshotStore::new();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_version_mismatch_is_discarded() {
        let store = MemorySnapshotStore::new();
        store
            .write(StoredSnapshot {
                envelope: Some(
                    r#"{"version": 0, "savedAt": "2024-01-01T00:00:00Z", "movies": []}"#
                        .to_string(),
                ),
                list_url: Some("https://letterboxd.com/u/list/old/".to_string()),
            })
            .await
            .unwrap();

        assert!(store.load().await.unwrap().is_none());

        let remaining = store.read().await.unwrap();
        assert!(remaining.envelope.is_none());
        assert!(remaining.list_url.is_none());
    }

    #[tokio::test]
    async fn test_legacy_unversioned_array_is_discarded() {
        let store = MemorySnapshotStore::new();
        store
            .write(StoredSnapshot {
                envelope: Some(r#"[{"id": 1, "title": "Heat"}]"#.to_string()),
                list_url: None,
            })
            .await
            .unwrap();

        assert!(store.load().await.unwrap().is_none());
        assert!(store.read().await.unwrap().envelope.is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = MemorySnapshotStore::new();
        store.save("https://x/", &vec![item(1, "heat")]).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[test]
    fn test_envelope_layout() {
        let saved_at = DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let json: serde_json::Value =
            serde_json::from_str(&encode(&vec![item(1, "heat")], saved_at).unwrap()).unwrap();

        assert_eq!(json["version"], SNAPSHOT_VERSION);
        assert_eq!(json["savedAt"], "2024-06-01T12:00:00Z");
        assert_eq!(json["movies"][0]["movieSlug"], "heat");
    }
}
