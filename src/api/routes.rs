use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;
use crate::middleware::{make_span_with_request_id, request_id_middleware};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(
            // Request id first so the trace span can read it
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
}

/// Routes under /api
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/movies", get(handlers::load_movies))
        // Stored collection
        .route(
            "/collection",
            get(handlers::get_collection).delete(handlers::clear_collection),
        )
        .route("/collection/random", get(handlers::random_movie))
        .route("/collection/:slug", get(handlers::get_movie))
}
