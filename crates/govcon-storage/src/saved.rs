use std::collections::BTreeSet;

use govcon_core::{Opportunity, SavedIds};
use tracing::{debug, warn};

use crate::{KeyValueStore, StorageError};

/// Storage key holding the JSON array of saved opportunity ids.
pub const SAVED_OPPORTUNITIES_KEY: &str = "savedOpportunities";

/// Saved opportunity ids, written through to a [`KeyValueStore`] on every
/// toggle.
///
/// The set is loaded once and never reconciled against the current feed, so
/// ids may outlive their opportunities.
pub struct SavedSelections {
    ids: BTreeSet<String>,
    store: Box<dyn KeyValueStore>,
}

impl std::fmt::Debug for SavedSelections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SavedSelections").field("ids", &self.ids).finish_non_exhaustive()
    }
}

impl SavedSelections {
    /// Missing, unreadable or corrupt storage yields an empty selection.
    pub fn load_on_startup(store: Box<dyn KeyValueStore>) -> Self {
        let ids = match store.get(SAVED_OPPORTUNITIES_KEY) {
            Ok(Some(raw)) if raw.trim().is_empty() => BTreeSet::new(),
            Ok(Some(raw)) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(list) => list.into_iter().collect(),
                Err(err) => {
                    debug!(error = %err, "saved selections unreadable; starting empty");
                    BTreeSet::new()
                }
            },
            Ok(None) => BTreeSet::new(),
            Err(err) => {
                debug!(error = %err, "saved selections unavailable; starting empty");
                BTreeSet::new()
            }
        };
        Self { ids, store }
    }

    pub fn is_saved(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Flip membership of `id` and persist. Returns whether `id` is now saved.
    ///
    /// A failed write is logged; the in-memory selection still reflects the
    /// toggle.
    pub fn toggle(&mut self, id: &str) -> bool {
        let mut next = self.ids.clone();
        let now_saved = if next.remove(id) {
            false
        } else {
            next.insert(id.to_string());
            true
        };

        if let Err(err) = self.persist(&next) {
            warn!(error = %err, id, "failed to persist saved selections");
        }
        self.ids = next;
        now_saved
    }

    fn persist(&mut self, ids: &BTreeSet<String>) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(ids).map_err(|source| StorageError::Encode {
            key: SAVED_OPPORTUNITIES_KEY.to_string(),
            source,
        })?;
        self.store.set(SAVED_OPPORTUNITIES_KEY, &encoded)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Saved ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Saved ids with no record in `opportunities`. Reported only; nothing is
    /// pruned.
    pub fn stale_ids<'a>(&'a self, opportunities: &[Opportunity]) -> Vec<&'a str> {
        self.ids
            .iter()
            .filter(|id| !opportunities.iter().any(|o| &o.id == *id))
            .map(String::as_str)
            .collect()
    }
}

impl SavedIds for SavedSelections {
    fn contains_id(&self, id: &str) -> bool {
        self.is_saved(id)
    }

    fn count(&self) -> usize {
        self.len()
    }
}
