//! Filtering, sorting and random picks over a loaded collection
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

use rand::seq::IndexedRandom;
use serde::Deserialize;

use crate::{
    error::AppError,
    models::EnrichedItem,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Year,
    Rating,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl FromStr for SortKey {
    type Err = AppError;

    /// Parses `<year|rating|title>-<asc|desc>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::InvalidInput(format!("Unknown sort key: {}", s));

        let (field, order) = s.split_once('-').ok_or_else(invalid)?;
        let field = match field {
            "year" => SortField::Year,
            "rating" => SortField::Rating,
            "title" => SortField::Title,
            _ => return Err(invalid()),
        };
        let descending = match order {
            "asc" => false,
            "desc" => true,
            _ => return Err(invalid()),
        };

        Ok(Self { field, descending })
    }
}

impl SortKey {
    fn compare(&self, a: &EnrichedItem, b: &EnrichedItem) -> Ordering {
        let ordering = match self.field {
            SortField::Year => a.year.cmp(&b.year),
            SortField::Rating => a
                .rating
                .unwrap_or(f64::NEG_INFINITY)
                .total_cmp(&b.rating.unwrap_or(f64::NEG_INFINITY)),
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        };

        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// Query string of the collection endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowseQuery {
    pub search: Option<String>,
    pub director: Option<String>,
    pub genre: Option<String>,
    pub sort: Option<String>,
}

impl BrowseQuery {
    fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }

    fn sort_key(&self) -> Result<Option<SortKey>, AppError> {
        self.sort
            .as_deref()
            .filter(|sort| !sort.is_empty())
            .map(SortKey::from_str)
            .transpose()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// The filter part of a [`BrowseQuery`], checked one criterion at a time
struct Filters<'q> {
    term: Option<String>,
    director: Option<&'q str>,
    genre: Option<&'q str>,
}

impl<'q> Filters<'q> {
    fn new(query: &'q BrowseQuery) -> Self {
        Self {
            term: query.search_term(),
            director: non_empty(&query.director),
            genre: non_empty(&query.genre),
        }
    }

    fn search(&self, item: &EnrichedItem) -> bool {
        let Some(term) = self.term.as_deref() else {
            return true;
        };
        item.title.to_lowercase().contains(term)
            || item.director.to_lowercase().contains(term)
            || item
                .genres
                .iter()
                .any(|genre| genre.to_lowercase().contains(term))
    }

    fn director(&self, item: &EnrichedItem) -> bool {
        self.director.map_or(true, |d| item.director == d)
    }

    fn genre(&self, item: &EnrichedItem) -> bool {
        self.genre.map_or(true, |g| item.genres.iter().any(|ig| ig == g))
    }

    fn matches(&self, item: &EnrichedItem) -> bool {
        self.search(item) && self.director(item) && self.genre(item)
    }
}

/// Items matching every filter of `query`, sorted when a sort key is given
///
/// Items without a year or rating sort as the lowest values.
pub fn browse<'a>(
    collection: &'a [EnrichedItem],
    query: &BrowseQuery,
) -> Result<Vec<&'a EnrichedItem>, AppError> {
    let sort = query.sort_key()?;
    let filters = Filters::new(query);

    let mut items: Vec<&EnrichedItem> = collection
        .iter()
        .filter(|item| filters.matches(item))
        .collect();

    if let Some(sort) = sort {
        items.sort_by(|a, b| sort.compare(a, b));
    }

    Ok(items)
}

/// Director and genre options for a filter bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facets {
    /// Directors still reachable under the active search and genre
    pub directors: Vec<String>,
    /// Genres still reachable under the active search and director
    pub genres: Vec<String>,
    pub all_directors: Vec<String>,
    pub all_genres: Vec<String>,
}

fn directors_of<'a>(items: impl Iterator<Item = &'a EnrichedItem>) -> Vec<String> {
    let unique: BTreeSet<&str> = items.map(|i| i.director.as_str()).collect();
    unique.into_iter().map(str::to_string).collect()
}

fn genres_of<'a>(items: impl Iterator<Item = &'a EnrichedItem>) -> Vec<String> {
    let unique: BTreeSet<&str> = items
        .flat_map(|i| i.genres.iter().map(String::as_str))
        .collect();
    unique.into_iter().map(str::to_string).collect()
}

/// Sorted distinct directors and genres
///
/// A facet never narrows itself: the director options ignore the selected
/// director, and the genre options ignore the selected genre.
pub fn facets(collection: &[EnrichedItem], query: &BrowseQuery) -> Facets {
    let filters = Filters::new(query);

    Facets {
        directors: directors_of(
            collection
                .iter()
                .filter(|i| filters.search(i) && filters.genre(i)),
        ),
        genres: genres_of(
            collection
                .iter()
                .filter(|i| filters.search(i) && filters.director(i)),
        ),
        all_directors: directors_of(collection.iter()),
        all_genres: genres_of(collection.iter()),
    }
}

pub fn random_pick(collection: &[EnrichedItem]) -> Option<&EnrichedItem> {
    collection.choose(&mut rand::rng())
}
