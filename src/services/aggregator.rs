use std::collections::HashSet;

use crate::models::{Collection, EnrichedItem};

/// Final collection from per-film slots in discovery order
///
/// Failed slots are skipped and films repeating an earlier title are dropped.
/// Ids are left as assigned at discovery, so gaps are expected.
pub fn aggregate(slots: Vec<Option<EnrichedItem>>) -> Collection {
    let total = slots.len();
    let mut seen = HashSet::new();

    let collection: Collection = slots
        .into_iter()
        .flatten()
        .filter(|item| seen.insert(item.title.clone()))
        .collect();

    tracing::info!(
        discovered = total,
        kept = collection.len(),
        "Aggregated collection"
    );

    collection
}
