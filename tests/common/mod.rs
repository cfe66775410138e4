use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum_test::TestServer;
use serde_json::json;

use letterboxd_explorer::{
    api::{create_router, AppState},
    config::ScrapeSettings,
    db::MemorySnapshotStore,
    error::AppResult,
    services::{
        scrape::{FetchResponse, Fetcher, RequestKind},
        ListLoader, TmdbProvider,
    },
};

pub const BASE_URL: &str = "https://letterboxd.com";
pub const TMDB_URL: &str = "https://api.tmdb.test/3";
pub const LIST_URL: &str = "https://letterboxd.com/someone/list/favourites/";

/// Canned responses keyed by URL; anything else is a 404
#[derive(Default)]
pub struct FakeFetcher {
    responses: Mutex<HashMap<String, FetchResponse>>,
    requests: Mutex<Vec<(String, RequestKind)>>,
}

impl FakeFetcher {
    pub fn serve(&self, url: impl Into<String>, body: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.into(), FetchResponse::ok(body));
    }

    pub fn fail(&self, url: impl Into<String>, status: u16) {
        self.responses.lock().unwrap().insert(
            url.into(),
            FetchResponse {
                status,
                body: String::new(),
            },
        );
    }

    pub fn requests(&self) -> Vec<(String, RequestKind)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested(&self, url: &str) -> bool {
        self.requests().iter().any(|(requested, _)| requested == url)
    }
}

#[async_trait::async_trait]
impl Fetcher for FakeFetcher {
    async fn get(&self, url: &str, kind: RequestKind) -> AppResult<FetchResponse> {
        self.requests.lock().unwrap().push((url.to_string(), kind));

        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(FetchResponse {
                status: 404,
                body: String::new(),
            }))
    }
}

pub fn settings() -> ScrapeSettings {
    ScrapeSettings {
        base_url: BASE_URL.to_string(),
        max_page_retries: 2,
        page_retry_delay: Duration::ZERO,
        page_delay: Duration::ZERO,
        max_concurrent_items: 4,
    }
}

pub fn create_test_server(fetcher: Arc<FakeFetcher>) -> TestServer {
    let provider = Arc::new(TmdbProvider::new(
        fetcher.clone(),
        None,
        "test_key".to_string(),
        TMDB_URL.to_string(),
    ));
    let loader = ListLoader::new(fetcher, provider, settings());
    let state = AppState::new(loader, Arc::new(MemorySnapshotStore::new()));

    TestServer::new(create_router(state)).unwrap()
}

// ============================================================================
// Markup builders
// ============================================================================

pub fn list_page(slugs: &[String], last_page: Option<u32>) -> String {
    let items: String = slugs
        .iter()
        .map(|slug| {
            format!(
                r#"<li class="poster-container"><div class="film-poster" data-target-link="/film/{slug}/"></div></li>"#
            )
        })
        .collect();

    let pagination = last_page
        .map(|last| {
            let links: String = (1..=last)
                .map(|n| format!(r#"<li class="paginate-page"><a href="page/{n}/">{n}</a></li>"#))
                .collect();
            format!(r#"<div class="paginate-pages"><ul>{links}</ul></div>"#)
        })
        .unwrap_or_default();

    format!("<html><body><ul class=\"poster-list\">{items}</ul>{pagination}</body></html>")
}

pub fn film_page(title: &str, tmdb_id: Option<u64>, reviews_path: Option<&str>) -> String {
    let tmdb_link = tmdb_id
        .map(|id| format!(r#"<a href="https://www.themoviedb.org/movie/{id}/" data-track-action="TMDb">TMDB</a>"#))
        .unwrap_or_default();
    let reviews = reviews_path
        .map(|path| format!(r#"<section id="popular-reviews" data-src="{path}"></section>"#))
        .unwrap_or_default();

    format!(
        r#"<html><body>
            <section class="film-header"><h1 class="headline-1 filmtitle">{title}</h1></section>
            <p class="text-link text-footer">{tmdb_link}</p>
            {reviews}
        </body></html>"#
    )
}

pub fn film_url(slug: &str) -> String {
    format!("{BASE_URL}/film/{slug}/")
}

pub fn tmdb_movie_url(tmdb_id: u64) -> String {
    format!("{TMDB_URL}/movie/{tmdb_id}?api_key=test_key&append_to_response=credits")
}

pub fn tmdb_movie(director: &str, cast: &[&str], year: u32, genres: &[&str]) -> String {
    let cast: Vec<_> = cast
        .iter()
        .enumerate()
        .map(|(order, name)| {
            json!({ "name": name, "character": "", "profile_path": null, "order": order })
        })
        .collect();
    let genres: Vec<_> = genres.iter().map(|name| json!({ "id": 1, "name": name })).collect();

    json!({
        "overview": format!("Directed by {director}."),
        "release_date": format!("{year}-01-01"),
        "runtime": 100,
        "vote_average": 7.25,
        "poster_path": "/poster.jpg",
        "backdrop_path": null,
        "genres": genres,
        "credits": {
            "cast": cast,
            "crew": [{ "name": director, "job": "Director", "profile_path": null }]
        }
    })
    .to_string()
}

/// Serves a film page plus its TMDB record
pub fn serve_film(
    fetcher: &FakeFetcher,
    slug: &str,
    title: &str,
    tmdb_id: u64,
    director: &str,
    cast: &[&str],
    year: u32,
) {
    fetcher.serve(film_url(slug), film_page(title, Some(tmdb_id), None));
    fetcher.serve(
        tmdb_movie_url(tmdb_id),
        tmdb_movie(director, cast, year, &["Drama"]),
    );
}
