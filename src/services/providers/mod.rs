/// Film metadata provider abstraction
///
/// The pipeline only needs one lookup (metadata by provider id), so providers are
/// swappable behind [`EnrichmentProvider`]. Lookup failures never fail an item:
/// [`enrich`] turns them into sentinel values.
use crate::{
    error::AppResult,
    models::{Enrichment, TmdbMovie},
};

pub mod tmdb;

pub use tmdb::TmdbProvider;

/// Trait for film metadata providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Fetch a movie with its credits by provider id
    async fn fetch_movie(&self, tmdb_id: u64) -> AppResult<TmdbMovie>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Enrichment for one film, falling back to sentinels on any failure
pub async fn enrich(
    provider: &dyn EnrichmentProvider,
    tmdb_id: Option<u64>,
    fallback_description: Option<&str>,
) -> Enrichment {
    let Some(tmdb_id) = tmdb_id else {
        return Enrichment::unavailable(fallback_description);
    };

    match provider.fetch_movie(tmdb_id).await {
        Ok(movie) => tmdb::normalize(movie, fallback_description),
        Err(e) => {
            tracing::warn!(
                tmdb_id = tmdb_id,
                provider = provider.name(),
                error = %e,
                "Enrichment failed, using defaults"
            );
            Enrichment::unavailable(fallback_description)
        }
    }
}
