use std::cmp::Reverse;
use std::collections::HashSet;

use crate::models::{film::UNKNOWN_DIRECTOR, EnrichedItem};

/// Related films shown on a detail page
pub const MAX_RELATED: usize = 6;

/// Films sharing the reference's director or one of its three top-billed actors
///
/// Same director ranks first, then more shared top-billed actors, then newer
/// films. The placeholder director never counts as a match.
pub fn related_items<'a>(
    reference: &EnrichedItem,
    collection: &'a [EnrichedItem],
    limit: usize,
) -> Vec<&'a EnrichedItem> {
    let top_billed: HashSet<&str> = reference.top_billed().collect();
    let director = Some(reference.director.as_str()).filter(|d| *d != UNKNOWN_DIRECTOR);

    let mut ranked: Vec<(bool, usize, &EnrichedItem)> = collection
        .iter()
        .filter(|candidate| candidate.movie_slug != reference.movie_slug)
        .filter_map(|candidate| {
            let same_director = director == Some(candidate.director.as_str());
            let shared_cast = candidate
                .cast
                .iter()
                .map(|member| member.name.as_str())
                .collect::<HashSet<_>>()
                .intersection(&top_billed)
                .count();

            (same_director || shared_cast > 0).then_some((same_director, shared_cast, candidate))
        })
        .collect();

    ranked.sort_by_key(|(same_director, shared_cast, candidate)| {
        (
            Reverse(*same_director),
            Reverse(*shared_cast),
            Reverse(candidate.year),
        )
    });

    ranked
        .into_iter()
        .take(limit)
        .map(|(_, _, candidate)| candidate)
        .collect()
}
