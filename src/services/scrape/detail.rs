use std::sync::{Arc, OnceLock};

use regex::Regex;
use scraper::Html;

use super::{fetch_text, selectors::SelectorChain, Fetcher, RequestKind};
use crate::models::ItemHandle;

const TITLE: &[&str] = &["h1.headline-1", "h1.filmtitle", ".film-title-wrapper h1"];
const TMDB_LINK: &[&str] = &[r#"a[href*="themoviedb.org"]"#];
const DESCRIPTION: &[&str] = &[
    ".text-sluglist + p",
    ".text-sluglist + div p",
    "div.truncate p",
];

fn tmdb_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"movie/(\d+)").expect("valid TMDB id pattern"))
}

/// What the film page contributes to an item
#[derive(Debug, Clone, PartialEq)]
pub struct FilmPage {
    pub handle: ItemHandle,
    pub title: String,
    pub tmdb_id: Option<u64>,
    /// Synopsis scraped from the page, used when TMDB has no overview
    pub fallback_description: Option<String>,
    /// Raw markup, kept for review endpoint discovery
    pub markup: String,
}

pub fn parse_detail(handle: &ItemHandle, html: &str) -> FilmPage {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let title = SelectorChain::new(TITLE)
        .first_text(root)
        .unwrap_or_else(|| handle.dehyphenated());

    let tmdb_id = SelectorChain::new(TMDB_LINK)
        .first_attr(root, "href")
        .and_then(|href| parse_tmdb_id(&href));

    let fallback_description = SelectorChain::new(DESCRIPTION).first_text(root);

    FilmPage {
        handle: handle.clone(),
        title,
        tmdb_id,
        fallback_description,
        markup: html.to_string(),
    }
}

/// "https://www.themoviedb.org/movie/1091/" -> 1091
pub fn parse_tmdb_id(href: &str) -> Option<u64> {
    tmdb_id_pattern()
        .captures(href)
        .and_then(|caps| caps.get(1))
        .and_then(|id| id.as_str().parse().ok())
}

pub struct DetailFetcher {
    fetcher: Arc<dyn Fetcher>,
    base_url: String,
}

impl DetailFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher>, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    pub fn film_url(&self, handle: &ItemHandle) -> String {
        format!("{}/film/{}/", self.base_url, handle)
    }

    /// Fetches and parses a film page; `None` when the page cannot be fetched
    pub async fn fetch(&self, handle: &ItemHandle) -> Option<FilmPage> {
        let url = self.film_url(handle);

        match fetch_text(self.fetcher.as_ref(), &url, RequestKind::Html).await {
            Ok(html) => {
                let page = parse_detail(handle, &html);
                tracing::debug!(
                    slug = %handle,
                    title = %page.title,
                    tmdb_id = ?page.tmdb_id,
                    "Parsed film page"
                );
                Some(page)
            }
            Err(e) => {
                tracing::warn!(slug = %handle, url = %url, error = %e, "Film page fetch failed");
                None
            }
        }
    }
}
