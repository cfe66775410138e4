//! Ordered CSS selector strategies
//!
//! The scraped markup differs between list types and changes over time, so every
//! lookup is expressed as a list of selectors tried in order. The first selector
//! producing a usable result wins.

use scraper::{ElementRef, Selector};

pub struct SelectorChain {
    selectors: Vec<Selector>,
}

impl SelectorChain {
    /// Builds a chain; patterns that fail to parse are skipped with a warning
    pub fn new(patterns: &[&str]) -> Self {
        let selectors = patterns
            .iter()
            .filter_map(|pattern| match Selector::parse(pattern) {
                Ok(selector) => Some(selector),
                Err(e) => {
                    tracing::warn!(selector = %pattern, error = %e, "Skipping invalid selector");
                    None
                }
            })
            .collect();

        Self { selectors }
    }

    /// All matches of the first selector that matches anything
    pub fn select_all<'a>(&self, root: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        self.selectors
            .iter()
            .map(|selector| root.select(selector).collect::<Vec<_>>())
            .find(|matches| !matches.is_empty())
            .unwrap_or_default()
    }

    pub fn select_first<'a>(&self, root: ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.selectors
            .iter()
            .find_map(|selector| root.select(selector).next())
    }

    /// First non-empty, whitespace-collapsed text
    pub fn first_text(&self, root: ElementRef<'_>) -> Option<String> {
        self.selectors
            .iter()
            .flat_map(|selector| root.select(selector))
            .map(element_text)
            .find(|text| !text.is_empty())
    }

    /// First non-empty value of `attr` on a matching element
    pub fn first_attr(&self, root: ElementRef<'_>, attr: &str) -> Option<String> {
        self.selectors
            .iter()
            .flat_map(|selector| root.select(selector))
            .filter_map(|element| element.value().attr(attr))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }
}

/// Element text with runs of whitespace collapsed to single spaces
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
