use std::sync::Arc;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use scraper::{ElementRef, Html};
use sha2::{Digest, Sha256};
use url::Url;

use super::{
    fetch_text,
    selectors::{element_text, SelectorChain},
    Fetcher, RequestKind,
};
use crate::models::{
    film::{ANONYMOUS_REVIEWER, MAX_REVIEWS},
    Review,
};

/// Markers on the film page pointing at the reviews fragment, with the
/// attribute carrying the endpoint
const ENDPOINT_MARKERS: &[(&str, &str)] = &[
    ("section#popular-reviews[data-src]", "data-src"),
    ("[data-reviews-url]", "data-reviews-url"),
    (".film-recent-reviews[data-src]", "data-src"),
];
const REVIEW_CONTAINERS: &[&str] = &[".film-detail", ".listitem .viewing"];
const REVIEWER: &[&str] = &[".name", ".displayname"];
const CONTENT: &[&str] = &[".body-text"];
const RATING: &[&str] = &[".rating"];
const DATE: &[&str] = &["time[datetime]"];
const AVATAR: &[&str] = &["img.avatar", ".avatar img"];
const PARAGRAPHS: &[&str] = &["p"];

const STAR: char = '★';

/// Absolute URL of the reviews fragment referenced by a film page
pub fn find_reviews_endpoint(html: &str, base_url: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let reference = ENDPOINT_MARKERS
        .iter()
        .find_map(|(selector, attr)| SelectorChain::new(&[*selector]).first_attr(root, attr))?;

    Url::parse(base_url)
        .and_then(|base| base.join(&reference))
        .map(|url| url.to_string())
        .ok()
}

/// Reviews with content, newest first, at most [`MAX_REVIEWS`]
pub fn parse_reviews(html: &str, fetched_at: DateTime<Utc>) -> Vec<Review> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let reviewer_name = SelectorChain::new(REVIEWER);
    let content = SelectorChain::new(CONTENT);
    let rating = SelectorChain::new(RATING);
    let date = SelectorChain::new(DATE);
    let avatar = SelectorChain::new(AVATAR);

    let mut reviews: Vec<Review> = SelectorChain::new(REVIEW_CONTAINERS)
        .select_all(root)
        .into_iter()
        .filter_map(|container| {
            let body = content.select_first(container).map(review_body)?;
            if body.is_empty() {
                return None;
            }

            let reviewer = reviewer_name
                .first_text(container)
                .unwrap_or_else(|| ANONYMOUS_REVIEWER.to_string());
            let raw_date = date.first_attr(container, "datetime");
            let id = container
                .value()
                .attr("id")
                .or_else(|| container.value().attr("data-review-id"))
                .map(str::to_string)
                .unwrap_or_else(|| {
                    content_id(&reviewer, raw_date.as_deref().unwrap_or_default(), &body)
                });

            Some(Review {
                id,
                rating: rating.first_text(container).map_or(0, |text| parse_rating(&text)),
                date: raw_date
                    .unwrap_or_else(|| fetched_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
                profile_path: avatar.first_attr(container, "src"),
                reviewer,
                content: body,
            })
        })
        .collect();

    reviews.sort_by(|a, b| date_key(&b.date).cmp(&date_key(&a.date)));
    reviews.truncate(MAX_REVIEWS);
    reviews
}

/// Paragraphs separated by blank lines, or the plain text without paragraphs
fn review_body(element: ElementRef<'_>) -> String {
    let paragraphs: Vec<String> = SelectorChain::new(PARAGRAPHS)
        .select_all(element)
        .into_iter()
        .map(element_text)
        .filter(|p| !p.is_empty())
        .collect();

    if paragraphs.is_empty() {
        element_text(element)
    } else {
        paragraphs.join("\n\n")
    }
}

/// Star glyphs count one each; otherwise a numeric label; otherwise 0
pub fn parse_rating(text: &str) -> u32 {
    let stars = text.chars().filter(|c| *c == STAR).count();
    if stars > 0 {
        return stars as u32;
    }

    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .map_or(0, |value| value.round() as u32)
}

/// Stable id for reviews whose markup carries none
pub fn content_id(reviewer: &str, date: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(reviewer.as_bytes());
    hasher.update([0x1f]);
    hasher.update(date.as_bytes());
    hasher.update([0x1f]);
    hasher.update(content.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..12].to_string()
}

fn date_key(date: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(date)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
        })
}

pub struct ReviewFetcher {
    fetcher: Arc<dyn Fetcher>,
    base_url: String,
}

impl ReviewFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher>, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    /// Reviews for the film whose page markup is given
    ///
    /// Every failure (no marker, failed request) degrades to an empty list.
    pub async fn fetch_reviews(&self, film_markup: &str) -> Vec<Review> {
        let Some(endpoint) = find_reviews_endpoint(film_markup, &self.base_url) else {
            tracing::debug!("No reviews endpoint on film page");
            return Vec::new();
        };

        match fetch_text(self.fetcher.as_ref(), &endpoint, RequestKind::Ajax).await {
            Ok(html) => {
                let reviews = parse_reviews(&html, Utc::now());
                tracing::debug!(endpoint = %endpoint, reviews = reviews.len(), "Parsed reviews");
                reviews
            }
            Err(e) => {
                tracing::warn!(endpoint = %endpoint, error = %e, "Reviews fetch failed");
                Vec::new()
            }
        }
    }
}
