/// TMDB provider
///
/// API Flow:
/// 1. Film page scrape yields the TMDB movie id
/// 2. Details: /movie/{id}?append_to_response=credits → genres, images, cast and crew
///
/// Responses are cached in Redis when a cache is configured.
use std::sync::Arc;

use url::Url;

use crate::{
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{
        film::{NO_DESCRIPTION, PLACEHOLDER_POSTER_URL, UNKNOWN_DIRECTOR},
        CastMember, Enrichment, TmdbMovie,
    },
    services::{
        providers::EnrichmentProvider,
        scrape::{Fetcher, RequestKind},
    },
};

const MOVIE_CACHE_TTL: u64 = 86400; // 1 day
const PROFILE_BASE: &str = "https://image.tmdb.org/t/p/w185";
const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";
const BACKDROP_BASE: &str = "https://image.tmdb.org/t/p/original";

#[derive(Clone)]
pub struct TmdbProvider {
    fetcher: Arc<dyn Fetcher>,
    cache: Option<Cache>,
    api_key: String,
    api_url: String,
}

impl TmdbProvider {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        cache: Option<Cache>,
        api_key: String,
        api_url: String,
    ) -> Self {
        Self {
            fetcher,
            cache,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn movie_url(&self, tmdb_id: u64) -> AppResult<String> {
        let url = Url::parse_with_params(
            &format!("{}/movie/{}", self.api_url, tmdb_id),
            &[
                ("api_key", self.api_key.as_str()),
                ("append_to_response", "credits"),
            ],
        )
        .map_err(|e| AppError::Internal(format!("Invalid TMDB URL: {}", e)))?;

        Ok(url.to_string())
    }

    async fn request_movie(&self, tmdb_id: u64) -> AppResult<TmdbMovie> {
        let url = self.movie_url(tmdb_id)?;
        let response = self.fetcher.get(&url, RequestKind::Json).await?;

        if !response.is_success() {
            return Err(AppError::ExternalApi(format!(
                "TMDB API returned status {}: {}",
                response.status, response.body
            )));
        }

        let movie: TmdbMovie = serde_json::from_str(&response.body).map_err(|e| {
            tracing::error!(tmdb_id = tmdb_id, error = %e, "Failed to deserialize TMDB response");
            AppError::Parse(format!("Failed to parse TMDB response: {}", e))
        })?;

        tracing::info!(
            tmdb_id = tmdb_id,
            title = ?movie.title,
            has_credits = movie.credits.is_some(),
            provider = "tmdb",
            "Movie details fetched"
        );

        Ok(movie)
    }
}

#[async_trait::async_trait]
impl EnrichmentProvider for TmdbProvider {
    async fn fetch_movie(&self, tmdb_id: u64) -> AppResult<TmdbMovie> {
        let key = CacheKey::Movie(tmdb_id);

        if let Some(cache) = &self.cache {
            match cache.get_from_cache::<TmdbMovie>(&key).await {
                Ok(Some(movie)) => {
                    tracing::debug!(tmdb_id = tmdb_id, "Cache hit");
                    return Ok(movie);
                }
                Ok(None) => tracing::debug!(tmdb_id = tmdb_id, "Cache miss"),
                Err(e) => tracing::warn!(error = %e, "Cache read failed"),
            }
        }

        let movie = self.request_movie(tmdb_id).await?;

        if let Some(cache) = &self.cache {
            cache.set_in_background(&key, &movie, MOVIE_CACHE_TTL);
        }

        Ok(movie)
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}

fn image_url(base: &str, path: Option<&str>) -> Option<String> {
    path.filter(|p| !p.is_empty())
        .map(|p| format!("{}{}", base, p))
}

/// Maps a TMDB movie onto the enrichment fields
pub fn normalize(movie: TmdbMovie, fallback_description: Option<&str>) -> Enrichment {
    let credits = movie.credits.unwrap_or_default();

    let director = credits.crew.iter().find(|person| person.job == "Director");
    let director_profile_path =
        director.and_then(|d| image_url(PROFILE_BASE, d.profile_path.as_deref()));
    let director = director
        .map(|d| d.name.clone())
        .unwrap_or_else(|| UNKNOWN_DIRECTOR.to_string());

    let mut cast: Vec<CastMember> = credits
        .cast
        .into_iter()
        .map(|actor| CastMember {
            profile_path: image_url(PROFILE_BASE, actor.profile_path.as_deref()),
            name: actor.name,
            character: actor.character.unwrap_or_default(),
            order: actor.order,
        })
        .collect();
    cast.sort_by_key(|member| member.order);

    let description = movie
        .overview
        .filter(|overview| !overview.trim().is_empty())
        .or_else(|| {
            fallback_description
                .filter(|d| !d.trim().is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| NO_DESCRIPTION.to_string());

    let release_date = movie.release_date.filter(|date| !date.is_empty());
    let year = release_date
        .as_deref()
        .and_then(|date| date.split('-').next())
        .and_then(|year| year.parse().ok());

    Enrichment {
        year,
        director,
        director_profile_path,
        poster_url: image_url(POSTER_BASE, movie.poster_path.as_deref())
            .unwrap_or_else(|| PLACEHOLDER_POSTER_URL.to_string()),
        backdrop_url: image_url(BACKDROP_BASE, movie.backdrop_path.as_deref()),
        description,
        rating: movie
            .vote_average
            .filter(|average| *average > 0.0)
            .map(|average| (average * 10.0).round() / 10.0),
        genres: movie.genres.into_iter().map(|genre| genre.name).collect(),
        cast,
        runtime: movie.runtime,
        release_date,
    }
}
