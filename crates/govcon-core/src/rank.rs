//! Tab-specific ordering of the visible subset.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::{Opportunity, Tab};

/// Stable ordering for a tab.
///
/// `matched` ranks by descending score (unscored as zero). `all` and `saved`
/// rank by ascending days until due, so undated items fall to the end. The two
/// orderings are intentionally different.
pub fn sort_for_tab<'a>(
    mut items: Vec<&'a Opportunity>,
    tab: Tab,
    now: DateTime<Utc>,
) -> Vec<&'a Opportunity> {
    match tab {
        Tab::Matched => items.sort_by(|a, b| by_score_desc(a, b)),
        Tab::All | Tab::Saved => items.sort_by_cached_key(|o| o.days_until_due(now)),
    }
    items
}

fn by_score_desc(a: &Opportunity, b: &Opportunity) -> Ordering {
    b.score().total_cmp(&a.score())
}
