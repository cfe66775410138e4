use serde::{Deserialize, Serialize};

use super::ItemHandle;

pub const UNKNOWN_DIRECTOR: &str = "Unknown Director";
pub const NO_DESCRIPTION: &str = "No description available";
pub const ANONYMOUS_REVIEWER: &str = "Anonymous";
pub const PLACEHOLDER_POSTER_URL: &str =
    "https://s.ltrbxd.com/static/img/empty-poster-1000-D9cprv0m.png";

/// Maximum number of reviews kept per film
pub const MAX_REVIEWS: usize = 6;

/// Deduplicated films of one list, in list order
pub type Collection = Vec<EnrichedItem>;

/// A film of the loaded collection, as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedItem {
    /// Position of the film in list order, starting at 1
    pub id: u32,
    pub title: String,
    pub year: Option<i32>,
    pub director: String,
    pub director_profile_path: Option<String>,
    pub poster_url: String,
    pub backdrop_url: Option<String>,
    pub description: String,
    /// TMDB vote average on a 0-10 scale, one decimal
    pub rating: Option<f64>,
    pub genres: Vec<String>,
    pub cast: Vec<CastMember>,
    pub runtime: Option<u32>,
    pub release_date: Option<String>,
    pub tmdb_id: Option<u64>,
    pub movie_slug: String,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CastMember {
    pub name: String,
    pub character: String,
    pub profile_path: Option<String>,
    /// Billing order from the provider
    pub order: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub reviewer: String,
    pub rating: u32,
    pub date: String,
    pub content: String,
    pub profile_path: Option<String>,
}

/// Provider-derived part of an [`EnrichedItem`]
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub year: Option<i32>,
    pub director: String,
    pub director_profile_path: Option<String>,
    pub poster_url: String,
    pub backdrop_url: Option<String>,
    pub description: String,
    pub rating: Option<f64>,
    pub genres: Vec<String>,
    pub cast: Vec<CastMember>,
    pub runtime: Option<u32>,
    pub release_date: Option<String>,
}

impl Enrichment {
    /// Sentinel values used when the provider has nothing for a film
    pub fn unavailable(fallback_description: Option<&str>) -> Self {
        Self {
            year: None,
            director: UNKNOWN_DIRECTOR.to_string(),
            director_profile_path: None,
            poster_url: PLACEHOLDER_POSTER_URL.to_string(),
            backdrop_url: None,
            description: fallback_description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or(NO_DESCRIPTION)
                .to_string(),
            rating: None,
            genres: Vec::new(),
            cast: Vec::new(),
            runtime: None,
            release_date: None,
        }
    }
}

impl EnrichedItem {
    pub fn assemble(
        id: u32,
        handle: &ItemHandle,
        title: &str,
        tmdb_id: Option<u64>,
        enrichment: Enrichment,
        reviews: Vec<Review>,
    ) -> Self {
        Self {
            id,
            title: normalize_title(title),
            year: enrichment.year,
            director: enrichment.director,
            director_profile_path: enrichment.director_profile_path,
            poster_url: enrichment.poster_url,
            backdrop_url: enrichment.backdrop_url,
            description: enrichment.description,
            rating: enrichment.rating,
            genres: enrichment.genres,
            cast: enrichment.cast,
            runtime: enrichment.runtime,
            release_date: enrichment.release_date,
            tmdb_id,
            movie_slug: handle.as_str().to_string(),
            reviews,
        }
    }

    /// Names of the first three billed cast members
    pub fn top_billed(&self) -> impl Iterator<Item = &str> {
        self.cast.iter().take(3).map(|c| c.name.as_str())
    }
}

/// Trims and upper-cases the first character
pub fn normalize_title(title: &str) -> String {
    let title = title.trim();
    let mut chars = title.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("the thing"), "The thing");
        assert_eq!(normalize_title("  Alien "), "Alien");
        assert_eq!(normalize_title("évasion"), "Évasion");
        assert_eq!(normalize_title(""), "");
    }

    #[test]
    fn test_unavailable_uses_sentinels() {
        let enrichment = Enrichment::unavailable(None);
        assert_eq!(enrichment.director, UNKNOWN_DIRECTOR);
        assert_eq!(enrichment.poster_url, PLACEHOLDER_POSTER_URL);
        assert_eq!(enrichment.description, NO_DESCRIPTION);
        assert!(enrichment.genres.is_empty());
        assert!(enrichment.cast.is_empty());
    }

    #[test]
    fn test_unavailable_keeps_page_description() {
        let enrichment = Enrichment::unavailable(Some("A research team in Antarctica."));
        assert_eq!(enrichment.description, "A research team in Antarctica.");

        let blank = Enrichment::unavailable(Some("  "));
        assert_eq!(blank.description, NO_DESCRIPTION);
    }

    #[test]
    fn test_serializes_camel_case() {
        let handle = ItemHandle::new("alien").unwrap();
        let item = EnrichedItem::assemble(
            1,
            &handle,
            "alien",
            Some(348),
            Enrichment::unavailable(None),
            vec![],
        );
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["title"], "Alien");
        assert_eq!(json["movieSlug"], "alien");
        assert_eq!(json["tmdbId"], 348);
        assert_eq!(json["posterUrl"], PLACEHOLDER_POSTER_URL);
        assert!(json["backdropUrl"].is_null());
    }
}
