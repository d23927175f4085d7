//! Dashboard summary counts over the full, unfiltered snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Opportunity, SavedIds};

pub const HIGH_MATCH_THRESHOLD: f64 = 0.8;
pub const DUE_SOON_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_opportunities: usize,
    pub high_matches: usize,
    pub due_soon: usize,
    pub saved_count: usize,
}

impl DashboardStats {
    /// Counts never depend on search, filters or tab; pass the whole store.
    pub fn compute<S: SavedIds + ?Sized>(
        opportunities: &[Opportunity],
        saved: &S,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            total_opportunities: opportunities.len(),
            high_matches: opportunities
                .iter()
                .filter(|o| o.score() >= HIGH_MATCH_THRESHOLD)
                .count(),
            due_soon: opportunities
                .iter()
                .filter(|o| o.days_until_due(now) <= DUE_SOON_DAYS)
                .count(),
            saved_count: saved.count(),
        }
    }
}
