use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    db::Snapshot,
    error::{AppError, AppResult},
    models::{Collection, EnrichedItem},
    services::{
        browse::{browse, facets, random_pick, BrowseQuery},
        related::{related_items, MAX_RELATED},
    },
};

use super::AppState;

const MISSING_URL_MESSAGE: &str = "Please provide a Letterboxd list URL";
const NO_COLLECTION_MESSAGE: &str = "No collection loaded. Load a Letterboxd list first.";

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct LoadQuery {
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResponse {
    pub list_url: Option<String>,
    pub saved_at: DateTime<Utc>,
    pub movies: Vec<EnrichedItem>,
    /// Directors left selectable under the other active filters
    pub directors: Vec<String>,
    pub genres: Vec<String>,
    pub all_directors: Vec<String>,
    pub all_genres: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieDetailResponse {
    #[serde(flatten)]
    pub movie: EnrichedItem,
    pub related_movies: Vec<EnrichedItem>,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Scrapes and enriches a list, then stores it as the current collection
pub async fn load_movies(
    State(state): State<AppState>,
    Query(params): Query<LoadQuery>,
) -> AppResult<Json<Collection>> {
    let url = params
        .url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .ok_or_else(|| AppError::InvalidInput(MISSING_URL_MESSAGE.to_string()))?;

    let movies = state.loader.load(&url).await?;

    if let Err(e) = state.snapshots.save(&url, &movies).await {
        tracing::warn!(list_url = %url, error = %e, "Failed to save snapshot");
    }

    Ok(Json(movies))
}

async fn current_snapshot(state: &AppState) -> AppResult<Snapshot> {
    state
        .snapshots
        .load()
        .await?
        .ok_or_else(|| AppError::NotFound(NO_COLLECTION_MESSAGE.to_string()))
}

/// Filtered and sorted view of the stored collection
pub async fn get_collection(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> AppResult<Json<CollectionResponse>> {
    let snapshot = current_snapshot(&state).await?;

    let movies = browse(&snapshot.movies, &query)?
        .into_iter()
        .cloned()
        .collect();
    let facets = facets(&snapshot.movies, &query);

    Ok(Json(CollectionResponse {
        list_url: snapshot.list_url,
        saved_at: snapshot.saved_at,
        movies,
        directors: facets.directors,
        genres: facets.genres,
        all_directors: facets.all_directors,
        all_genres: facets.all_genres,
    }))
}

pub async fn clear_collection(State(state): State<AppState>) -> AppResult<StatusCode> {
    state.snapshots.clear().await?;
    tracing::info!("Collection cleared");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn random_movie(State(state): State<AppState>) -> AppResult<Json<EnrichedItem>> {
    let snapshot = current_snapshot(&state).await?;

    random_pick(&snapshot.movies)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("The collection is empty".to_string()))
}

/// One film with the films related to it
pub async fn get_movie(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<MovieDetailResponse>> {
    let snapshot = current_snapshot(&state).await?;

    let movie = snapshot
        .movies
        .iter()
        .find(|movie| movie.movie_slug == slug)
        .ok_or_else(|| AppError::NotFound(format!("Movie not found: {}", slug)))?;

    let related_movies = related_items(movie, &snapshot.movies, MAX_RELATED)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(MovieDetailResponse {
        movie: movie.clone(),
        related_movies,
    }))
}
