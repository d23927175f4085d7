//! Visible-subset derivation: free-text search composed with the tab predicate.
//!
//! Structured filters (`naics`, `set_aside`, `agency`) are deliberately absent
//! here. They travel to the backend as request parameters and the snapshot
//! already reflects them.

use crate::{Opportunity, SavedIds, Tab};

/// Minimum score for the `matched` tab.
pub const MATCHED_THRESHOLD: f64 = 0.7;

/// Case-insensitive substring match over title, agency and description.
/// An empty search matches everything.
pub fn matches_search(opportunity: &Opportunity, search: &str) -> bool {
    if search.is_empty() {
        return true;
    }
    let needle = search.to_lowercase();
    contains_needle(opportunity, &needle)
}

fn contains_needle(opportunity: &Opportunity, needle: &str) -> bool {
    [
        opportunity.title.as_deref(),
        opportunity.agency.as_deref(),
        opportunity.description.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(needle))
}

pub fn passes_tab<S: SavedIds + ?Sized>(opportunity: &Opportunity, saved: &S, tab: Tab) -> bool {
    match tab {
        Tab::All => true,
        Tab::Matched => opportunity.score() >= MATCHED_THRESHOLD,
        Tab::Saved => saved.contains_id(&opportunity.id),
    }
}

/// Opportunities passing both the search and the tab predicate, in input order.
pub fn visible<'a, S: SavedIds + ?Sized>(
    opportunities: &'a [Opportunity],
    search: &str,
    saved: &S,
    tab: Tab,
) -> Vec<&'a Opportunity> {
    let needle = search.to_lowercase();
    opportunities
        .iter()
        .filter(|opp| passes_tab(opp, saved, tab))
        .filter(|opp| needle.is_empty() || contains_needle(opp, &needle))
        .collect()
}
