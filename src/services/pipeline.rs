//! List loading pipeline
//!
//! Pages are walked one at a time; once every handle is known, films are
//! processed concurrently under a semaphore. Each film lands in its own slot in
//! discovery order, so a failed or panicked film only empties its slot.
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::{
    config::ScrapeSettings,
    error::{AppError, AppResult},
    models::{Collection, EnrichedItem, ItemHandle},
    services::{
        aggregator::aggregate,
        providers::{enrich, EnrichmentProvider},
        scrape::{DetailFetcher, Fetcher, PageFetcher, ReviewFetcher},
    },
};

pub const EMPTY_LIST_MESSAGE: &str =
    "No movies found in the list. Please make sure the list is public and accessible.";

#[derive(Clone)]
pub struct ListLoader {
    pages: Arc<PageFetcher>,
    details: Arc<DetailFetcher>,
    reviews: Arc<ReviewFetcher>,
    provider: Arc<dyn EnrichmentProvider>,
    max_concurrent_items: usize,
}

impl ListLoader {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        provider: Arc<dyn EnrichmentProvider>,
        settings: ScrapeSettings,
    ) -> Self {
        Self {
            details: Arc::new(DetailFetcher::new(fetcher.clone(), settings.base_url.clone())),
            reviews: Arc::new(ReviewFetcher::new(fetcher.clone(), settings.base_url.clone())),
            max_concurrent_items: settings.max_concurrent_items.max(1),
            pages: Arc::new(PageFetcher::new(fetcher, settings)),
            provider,
        }
    }

    /// Scrapes, enriches and deduplicates every film of a list
    ///
    /// Fails with [`AppError::InvalidInput`] for a URL outside the site and
    /// with [`AppError::NotFound`] when no film handle could be extracted.
    pub async fn load(&self, list_url: &str) -> AppResult<Collection> {
        let list_url = self.pages.resolve(list_url)?;
        let handles = self.pages.collect_handles(&list_url).await;
        if handles.is_empty() {
            tracing::warn!(list_url = %list_url, "No films found in list");
            return Err(AppError::NotFound(EMPTY_LIST_MESSAGE.to_string()));
        }

        tracing::info!(
            list_url = %list_url,
            films = handles.len(),
            concurrency = self.max_concurrent_items,
            "Processing films"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_items));
        let tasks: Vec<_> = handles
            .into_iter()
            .enumerate()
            .map(|(index, handle)| {
                let loader = self.clone();
                let semaphore = semaphore.clone();
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok()?;
                    loader.load_item(index as u32 + 1, handle).await
                })
            })
            .collect();

        let mut slots = Vec::with_capacity(tasks.len());
        for task in tasks {
            let slot = task.await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "Film task aborted");
                None
            });
            slots.push(slot);
        }

        Ok(aggregate(slots))
    }

    /// One film: page first, then reviews and enrichment side by side
    async fn load_item(&self, id: u32, handle: ItemHandle) -> Option<EnrichedItem> {
        let page = self.details.fetch(&handle).await?;

        let (reviews, enrichment) = tokio::join!(
            self.reviews.fetch_reviews(&page.markup),
            enrich(
                self.provider.as_ref(),
                page.tmdb_id,
                page.fallback_description.as_deref()
            ),
        );

        Some(EnrichedItem::assemble(
            id,
            &handle,
            &page.title,
            page.tmdb_id,
            enrichment,
            reviews,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::models::{film::UNKNOWN_DIRECTOR, TmdbMovie};
    use crate::services::{
        providers::MockEnrichmentProvider,
        scrape::{FetchResponse, MockFetcher, RequestKind},
    };

    const LIST_URL: &str = "https://letterboxd.com/someone/list/favourites/";

    fn settings() -> ScrapeSettings {
        ScrapeSettings {
            base_url: "https://letterboxd.com".to_string(),
            max_page_retries: 0,
            page_retry_delay: Duration::ZERO,
            page_delay: Duration::ZERO,
            max_concurrent_items: 2,
        }
    }

    fn listing(slugs: &[&str]) -> String {
        let items: String = slugs
            .iter()
            .map(|slug| {
                format!(r#"<li class="poster-container"><div data-target-link="/film/{slug}/"></div></li>"#)
            })
            .collect();
        format!("<ul>{items}</ul>")
    }

    fn film_page(title: &str, tmdb_id: u64) -> String {
        format!(
            r#"<h1 class="headline-1">{title}</h1>
               <a href="https://www.themoviedb.org/movie/{tmdb_id}/">TMDB</a>"#
        )
    }

    /// Serves a one-page list with the given films; `missing` film pages 404
    fn fetcher(films: &'static [(&'static str, &'static str, u64)], missing: &'static str) -> MockFetcher {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_get().returning(move |url, _| {
            if url == LIST_URL {
                let slugs: Vec<&str> = films.iter().map(|(slug, _, _)| *slug).collect();
                return Ok(FetchResponse::ok(listing(&slugs)));
            }

            let page = films.iter().find(|(slug, _, _)| {
                *slug != missing && url == format!("https://letterboxd.com/film/{slug}/")
            });
            Ok(match page {
                Some((_, title, tmdb_id)) => FetchResponse::ok(film_page(title, *tmdb_id)),
                None => FetchResponse {
                    status: 404,
                    body: String::new(),
                },
            })
        });
        fetcher
    }

    fn provider() -> MockEnrichmentProvider {
        let mut provider = MockEnrichmentProvider::new();
        provider.expect_fetch_movie().returning(|id| {
            Ok(TmdbMovie {
                overview: Some(format!("Overview {id}")),
                ..Default::default()
            })
        });
        provider.expect_name().return_const("tmdb");
        provider
    }

    #[tokio::test]
    async fn test_load_assigns_discovery_ids() {
        static FILMS: &[(&str, &str, u64)] = &[
            ("heat", "Heat", 949),
            ("thief", "Thief", 11240),
            ("collateral", "Collateral", 1538),
        ];
        let loader = ListLoader::new(Arc::new(fetcher(FILMS, "thief")), Arc::new(provider()), settings());

        let collection = loader.load(LIST_URL).await.unwrap();
        let ids: Vec<u32> = collection.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(collection[1].title, "Collateral");
        assert_eq!(collection[1].tmdb_id, Some(1538));
        assert_eq!(collection[1].description, "Overview 1538");
        assert!(collection[1].reviews.is_empty());
    }

    #[tokio::test]
    async fn test_load_deduplicates_titles() {
        static FILMS: &[(&str, &str, u64)] = &[
            ("the-thing", "The Thing", 1091),
            ("the-thing-2011", "The Thing", 60935),
        ];
        let loader = ListLoader::new(Arc::new(fetcher(FILMS, "")), Arc::new(provider()), settings());

        let collection = loader.load(LIST_URL).await.unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection[0].movie_slug, "the-thing");
        assert_eq!(collection[0].tmdb_id, Some(1091));
    }

    #[tokio::test]
    async fn test_enrichment_failure_keeps_item() {
        static FILMS: &[(&str, &str, u64)] = &[("heat", "Heat", 949)];
        let mut provider = MockEnrichmentProvider::new();
        provider
            .expect_fetch_movie()
            .returning(|_| Err(AppError::ExternalApi("status 500".to_string())));
        provider.expect_name().return_const("tmdb");

        let loader = ListLoader::new(Arc::new(fetcher(FILMS, "")), Arc::new(provider), settings());

        let collection = loader.load(LIST_URL).await.unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection[0].director, UNKNOWN_DIRECTOR);
        assert_eq!(collection[0].tmdb_id, Some(949));
    }

    #[tokio::test]
    async fn test_empty_list_is_not_found() {
        static FILMS: &[(&str, &str, u64)] = &[];
        let loader = ListLoader::new(
            Arc::new(fetcher(FILMS, "")),
            Arc::new(MockEnrichmentProvider::new()),
            settings(),
        );

        match loader.load(LIST_URL).await {
            Err(AppError::NotFound(message)) => assert_eq!(message, EMPTY_LIST_MESSAGE),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejects_list_outside_site() {
        let loader = ListLoader::new(
            Arc::new(MockFetcher::new()),
            Arc::new(MockEnrichmentProvider::new()),
            settings(),
        );

        let result = loader.load("http://127.0.0.1:6379/someone/list/x/").await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    /// Serves `count` films and records how many film pages are fetched at once
    #[derive(Default)]
    struct SlowFetcher {
        count: usize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Fetcher for SlowFetcher {
        async fn get(&self, url: &str, _kind: RequestKind) -> AppResult<FetchResponse> {
            if url == LIST_URL {
                let slugs: Vec<String> = (1..=self.count).map(|n| format!("film-{n}")).collect();
                let slugs: Vec<&str> = slugs.iter().map(String::as_str).collect();
                return Ok(FetchResponse::ok(listing(&slugs)));
            }

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let n = url
                .trim_end_matches('/')
                .rsplit('-')
                .next()
                .and_then(|n| n.parse::<u64>().ok())
                .unwrap_or_default();
            Ok(FetchResponse::ok(film_page(&format!("Film {n}"), n)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_never_exceed_concurrency_limit() {
        let fetcher = Arc::new(SlowFetcher {
            count: 7,
            ..Default::default()
        });
        let loader = ListLoader::new(fetcher.clone(), Arc::new(provider()), settings());

        let collection = loader.load(LIST_URL).await.unwrap();
        assert_eq!(collection.len(), 7);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 2);
    }

    /// Panics when asked for one specific film
    struct PanickingProvider {
        poisoned_id: u64,
    }

    #[async_trait::async_trait]
    impl EnrichmentProvider for PanickingProvider {
        async fn fetch_movie(&self, tmdb_id: u64) -> AppResult<TmdbMovie> {
            if tmdb_id == self.poisoned_id {
                panic!("provider crashed on {tmdb_id}");
            }
            Ok(TmdbMovie::default())
        }

        fn name(&self) -> &'static str {
            "panicking"
        }
    }

    #[tokio::test]
    async fn test_panicking_item_leaves_siblings() {
        static FILMS: &[(&str, &str, u64)] = &[
            ("heat", "Heat", 949),
            ("thief", "Thief", 11240),
            ("collateral", "Collateral", 1538),
        ];
        let provider = PanickingProvider { poisoned_id: 11240 };
        let loader = ListLoader::new(Arc::new(fetcher(FILMS, "")), Arc::new(provider), settings());

        let collection = loader.load(LIST_URL).await.unwrap();
        let slugs: Vec<&str> = collection.iter().map(|i| i.movie_slug.as_str()).collect();
        assert_eq!(slugs, vec!["heat", "collateral"]);
        assert_eq!(collection[1].id, 3);
    }
}
