use scraper::{ElementRef, Html};

use super::selectors::{element_text, SelectorChain};
use crate::models::{ItemHandle, ListingPage};

const ITEM_CONTAINERS: &[&str] = &["li.poster-container", "li.griditem", "div.film-poster"];
const TARGET_LINK_ATTR: &str = "data-target-link";
const FILM_SLUG_ATTR: &str = "data-film-slug";

/// Extracts film handles and pagination state from a list page
pub fn parse_listing(html: &str, page: u32) -> ListingPage {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let containers = SelectorChain::new(ITEM_CONTAINERS).select_all(root);
    let mut handles = Vec::with_capacity(containers.len());

    for container in containers {
        match handle_for(container) {
            Some(handle) => handles.push(handle),
            None => tracing::debug!(
                page = page,
                markup = %container.html(),
                "No film slug found for list item"
            ),
        }
    }

    ListingPage {
        page,
        handles,
        has_next_page: has_next_page(root, page),
    }
}

fn handle_for(container: ElementRef<'_>) -> Option<ItemHandle> {
    let target_links = SelectorChain::new(&["[data-target-link]"]);
    let slugs = SelectorChain::new(&["[data-film-slug]"]);

    container
        .value()
        .attr(TARGET_LINK_ATTR)
        .map(str::to_string)
        .or_else(|| target_links.first_attr(container, TARGET_LINK_ATTR))
        .and_then(|link| slug_from_target_link(&link))
        .or_else(|| {
            container
                .value()
                .attr(FILM_SLUG_ATTR)
                .map(str::to_string)
                .or_else(|| slugs.first_attr(container, FILM_SLUG_ATTR))
                .and_then(ItemHandle::new)
        })
}

/// "/film/the-thing/" -> "the-thing"
pub fn slug_from_target_link(link: &str) -> Option<ItemHandle> {
    link.split('/').nth(2).and_then(ItemHandle::new)
}

/// The pagination control's last link names the final page; when it is absent a
/// "next" link is the only signal.
fn has_next_page(root: ElementRef<'_>, page: u32) -> bool {
    let pagination = SelectorChain::new(&[".paginate-pages"]);

    match pagination.select_first(root) {
        Some(pages) => {
            let last_page = SelectorChain::new(&["li:last-child a"])
                .select_first(pages)
                .and_then(|link| element_text(link).parse::<u32>().ok())
                .unwrap_or(1);
            page < last_page
        }
        None => SelectorChain::new(&[".paginate-next"])
            .select_first(root)
            .is_some(),
    }
}
