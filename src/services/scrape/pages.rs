use std::sync::Arc;

use tokio_retry::{strategy::FixedInterval, Retry};
use url::Url;

use super::{fetch_text, listing::parse_listing, Fetcher, RequestKind};
use crate::{
    config::ScrapeSettings,
    error::{AppError, AppResult},
    models::ItemHandle,
};

/// Validated root URL of a list on the site at `base_url`
///
/// A missing scheme is read as `https://`. The host must be the site's host,
/// optionally behind `www.`, so arbitrary hosts are never fetched.
pub fn resolve_list_url(list_url: &str, base_url: &str) -> AppResult<String> {
    let invalid = || AppError::InvalidInput(format!("Not a Letterboxd list URL: {}", list_url));

    let trimmed = list_url.trim();
    let url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{}", trimmed)).map_err(|_| invalid())?
        }
        Err(_) => return Err(invalid()),
    };
    let base = Url::parse(base_url)
        .map_err(|e| AppError::Internal(format!("Invalid base URL {}: {}", base_url, e)))?;

    let bare = |host: &str| host.strip_prefix("www.").unwrap_or(host).to_string();
    let same_host = match (url.host_str(), base.host_str()) {
        (Some(host), Some(site)) => bare(host) == bare(site),
        _ => false,
    };
    if !matches!(url.scheme(), "http" | "https") || !same_host || url.port() != base.port() {
        return Err(invalid());
    }

    Ok(list_root(url.as_str()))
}

/// Root URL of a list: no query or fragment, trailing slash, and any trailing
/// `page/N/` segment removed so pasted paginated URLs start from the first page.
/// Filtered and detail views (`.../by/rating/`, `.../detail/`) keep their path.
pub fn list_root(list_url: &str) -> String {
    let trimmed = list_url.trim();

    let Ok(mut url) = Url::parse(trimmed) else {
        return with_trailing_slash(strip_page_suffix_raw(trimmed));
    };
    url.set_query(None);
    url.set_fragment(None);

    let mut segments: Vec<String> = url
        .path()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();
    let len = segments.len();
    if len >= 2 && segments[len - 2] == "page" && segments[len - 1].parse::<u32>().is_ok() {
        segments.truncate(len - 2);
    }

    let path = if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", segments.join("/"))
    };
    url.set_path(&path);
    url.to_string()
}

fn strip_page_suffix_raw(url: &str) -> &str {
    let base = url.trim_end_matches('/');
    match base.rsplit_once("/page/") {
        Some((root, number)) if number.parse::<u32>().is_ok() => root,
        _ => url,
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

/// URL of page `page` (1-based) of a list
pub fn page_url(list_url: &str, page: u32) -> String {
    let root = list_root(list_url);
    if page <= 1 {
        root
    } else {
        format!("{}page/{}/", root, page)
    }
}

/// Walks a list's pages one at a time
pub struct PageFetcher {
    fetcher: Arc<dyn Fetcher>,
    settings: ScrapeSettings,
}

impl PageFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher>, settings: ScrapeSettings) -> Self {
        Self { fetcher, settings }
    }

    /// See [`resolve_list_url`]
    pub fn resolve(&self, list_url: &str) -> AppResult<String> {
        resolve_list_url(list_url, &self.settings.base_url)
    }

    async fn attempt(&self, url: &str, page: u32) -> AppResult<String> {
        fetch_text(self.fetcher.as_ref(), url, RequestKind::Html)
            .await
            .map_err(|e| {
                tracing::warn!(url = %url, page = page, error = %e, "List page fetch failed");
                e
            })
    }

    /// Raw HTML of one page, or `None` once retries are exhausted
    pub async fn fetch_page(&self, list_url: &str, page: u32) -> Option<String> {
        let url = page_url(list_url, page);
        let url = url.as_str();
        let strategy =
            FixedInterval::new(self.settings.page_retry_delay).take(self.settings.max_page_retries);

        match Retry::start(strategy, move || self.attempt(url, page)).await {
            Ok(html) => Some(html),
            Err(e) => {
                tracing::error!(
                    url = %url,
                    page = page,
                    retries = self.settings.max_page_retries,
                    error = %e,
                    "Giving up on list page"
                );
                None
            }
        }
    }

    /// Handles of every film in the list, in list order
    ///
    /// Stops at the first absent page, the first page without films, or the
    /// page the pagination markup reports as last.
    pub async fn collect_handles(&self, list_url: &str) -> Vec<ItemHandle> {
        tracing::info!(list_url = %list_url, "Collecting list pages");

        let mut handles = Vec::new();
        let mut page = 1;

        loop {
            if page > 1 {
                tokio::time::sleep(self.settings.page_delay).await;
            }

            let Some(html) = self.fetch_page(list_url, page).await else {
                break;
            };
            let listing = parse_listing(&html, page);

            tracing::info!(page = page, films = listing.handles.len(), "Parsed list page");

            if listing.handles.is_empty() {
                break;
            }

            let has_next_page = listing.has_next_page;
            handles.extend(listing.handles);

            if !has_next_page {
                break;
            }
            page += 1;
        }

        tracing::info!(
            list_url = %list_url,
            pages = page,
            films = handles.len(),
            "Finished collecting list pages"
        );

        handles
    }
}
