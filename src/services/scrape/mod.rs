//! Letterboxd scraping
//!
//! All outbound requests go through the [`Fetcher`] trait so the pipeline can run
//! against canned responses. Parsing is synchronous and never holds a parsed
//! document across an await point.

use std::time::Duration;

use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Client as HttpClient,
};

use url::Url;

use crate::error::{AppError, AppResult};

pub mod detail;
pub mod listing;
pub mod pages;
pub mod reviews;
pub mod selectors;

pub use detail::{DetailFetcher, FilmPage};
pub use pages::PageFetcher;
pub use reviews::ReviewFetcher;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// What a request expects back; selects the headers sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Full HTML page
    Html,
    /// JSON API call
    Json,
    /// HTML fragment behind an AJAX endpoint
    Ajax,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport for every outbound GET
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Issues a GET; non-success statuses are returned, only transport failures error
    async fn get(&self, url: &str, kind: RequestKind) -> AppResult<FetchResponse>;
}

/// `url` without its query string, which may carry an API key
pub fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.to_string()
        }
        Err(_) => url.split('?').next().unwrap_or(url).to_string(),
    }
}

/// GET that treats non-success statuses as errors
pub async fn fetch_text(fetcher: &dyn Fetcher, url: &str, kind: RequestKind) -> AppResult<String> {
    let response = fetcher.get(url, kind).await?;

    if !response.is_success() {
        return Err(AppError::ExternalApi(format!(
            "{} returned status {}",
            redact_url(url),
            response.status
        )));
    }

    Ok(response.body)
}

/// reqwest-backed fetcher sending desktop browser headers
#[derive(Clone)]
pub struct HttpFetcher {
    http_client: HttpClient,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
        headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        let http_client = HttpClient::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { http_client })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str, kind: RequestKind) -> AppResult<FetchResponse> {
        let mut request = self.http_client.get(url);
        request = match kind {
            RequestKind::Html => request,
            RequestKind::Json => request.header(header::ACCEPT, "application/json"),
            RequestKind::Ajax => request
                .header(header::ACCEPT, "text/html, */*; q=0.01")
                .header("X-Requested-With", "XMLHttpRequest"),
        };

        // reqwest errors print their URL, query included
        let response = request.send().await.map_err(reqwest::Error::without_url)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(reqwest::Error::without_url)?;

        tracing::debug!(url = %redact_url(url), status = status, bytes = body.len(), "Fetched");

        Ok(FetchResponse { status, body })
    }
}
