use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use govcon_core::Opportunity;
use tracing::debug;

/// Handle for one issued fetch; only the newest ticket may apply its result.
///
/// The ticket holds a loading slot until it is settled by
/// [`OpportunityStore::complete_fetch`] or dropped, so a cancelled fetch
/// never leaves the store loading.
#[derive(Debug)]
pub struct FetchTicket {
    generation: u64,
    in_flight: Arc<AtomicUsize>,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for FetchTicket {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { count: usize },
    Failed,
    /// A newer fetch was issued; the result was discarded.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Last fetched snapshot plus fetch status.
///
/// A successful fetch swaps the whole list and clears any error. A failed
/// fetch keeps the previous list and records the error.
#[derive(Debug, Default)]
pub struct OpportunityStore {
    opportunities: Vec<Opportunity>,
    error: Option<FetchFailure>,
    issued: u64,
    in_flight: Arc<AtomicUsize>,
    last_success_at: Option<DateTime<Utc>>,
}

impl OpportunityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.issued += 1;
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        FetchTicket {
            generation: self.issued,
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Settle a fetch, consuming its ticket.
    pub fn complete_fetch<E: Display>(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Opportunity>, E>,
    ) -> FetchOutcome {
        if ticket.generation != self.issued {
            debug!(
                generation = ticket.generation,
                latest = self.issued,
                "discarding superseded fetch result"
            );
            return FetchOutcome::Stale;
        }

        match result {
            Ok(opportunities) => {
                let count = opportunities.len();
                self.opportunities = opportunities;
                self.error = None;
                self.last_success_at = Some(Utc::now());
                FetchOutcome::Applied { count }
            }
            Err(err) => {
                self.error = Some(FetchFailure {
                    message: err.to_string(),
                    at: Utc::now(),
                });
                FetchOutcome::Failed
            }
        }
    }

    pub fn opportunities(&self) -> &[Opportunity] {
        &self.opportunities
    }

    pub fn error(&self) -> Option<&FetchFailure> {
        self.error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.last_success_at
    }

    pub fn find(&self, id: &str) -> Option<&Opportunity> {
        self.opportunities.iter().find(|o| o.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(ids: &[&str]) -> Result<Vec<Opportunity>, String> {
        Ok(ids.iter().map(|id| Opportunity::new(*id)).collect())
    }

    fn ids(store: &OpportunityStore) -> Vec<&str> {
        store.opportunities().iter().map(|o| o.id.as_str()).collect()
    }

    #[test]
    fn success_swaps_the_whole_snapshot() {
        let mut store = OpportunityStore::new();
        let t = store.begin_fetch();
        assert!(store.is_loading());
        assert_eq!(store.complete_fetch(t, snapshot(&["a", "b"])), FetchOutcome::Applied { count: 2 });
        let t = store.begin_fetch();
        store.complete_fetch(t, snapshot(&["c"]));
        assert_eq!(ids(&store), vec!["c"]);
        assert!(!store.is_loading());
        assert!(store.last_success_at().is_some());
    }

    #[test]
    fn failure_keeps_previous_list_until_next_success() {
        let mut store = OpportunityStore::new();
        let t = store.begin_fetch();
        store.complete_fetch(t, snapshot(&["a"]));

        let t = store.begin_fetch();
        let outcome = store.complete_fetch(t, Err::<Vec<Opportunity>, _>("connection refused"));
        assert_eq!(outcome, FetchOutcome::Failed);
        assert_eq!(ids(&store), vec!["a"]);
        assert_eq!(store.error().map(|e| e.message.as_str()), Some("connection refused"));

        let t = store.begin_fetch();
        store.complete_fetch(t, snapshot(&["b"]));
        assert!(store.error().is_none());
        assert_eq!(ids(&store), vec!["b"]);
    }

    #[test]
    fn only_the_latest_ticket_applies() {
        let mut store = OpportunityStore::new();
        let first = store.begin_fetch();
        let second = store.begin_fetch();

        assert_eq!(store.complete_fetch(second, snapshot(&["new"])), FetchOutcome::Applied { count: 1 });
        assert!(store.is_loading());
        assert_eq!(store.complete_fetch(first, snapshot(&["old"])), FetchOutcome::Stale);
        assert!(!store.is_loading());
        assert_eq!(ids(&store), vec!["new"]);
    }

    #[test]
    fn stale_failures_do_not_set_the_error() {
        let mut store = OpportunityStore::new();
        let first = store.begin_fetch();
        let second = store.begin_fetch();
        assert_eq!(
            store.complete_fetch(first, Err::<Vec<Opportunity>, _>("timeout")),
            FetchOutcome::Stale
        );
        assert!(store.error().is_none());
        assert!(store.is_loading());
        store.complete_fetch(second, snapshot(&[]));
        assert!(!store.is_loading());
    }

    #[test]
    fn dropped_ticket_releases_loading_without_touching_snapshot() {
        let mut store = OpportunityStore::new();
        let t = store.begin_fetch();
        store.complete_fetch(t, snapshot(&["a"]));

        let abandoned = store.begin_fetch();
        let live = store.begin_fetch();
        drop(abandoned);
        assert!(store.is_loading());
        assert_eq!(ids(&store), vec!["a"]);

        assert_eq!(store.complete_fetch(live, snapshot(&["b"])), FetchOutcome::Applied { count: 1 });
        assert!(!store.is_loading());
    }
}
