use std::sync::Arc;

use chrono::{DateTime, Utc};
use govcon_adapters::{FetchQuery, OpportunitySource};
use govcon_core::{sort_for_tab, visible, DashboardStats, DueUrgency, FilterState, Opportunity, Tab};
use govcon_storage::SavedSelections;
use tokio::sync::Mutex;
use tracing::{info, info_span, warn, Instrument};

use crate::store::{FetchFailure, FetchOutcome, OpportunityStore};

/// All mutable session state: the fetched snapshot, saved selections and the
/// user's view choices.
#[derive(Debug)]
pub struct AppState {
    pub store: OpportunityStore,
    pub saved: SavedSelections,
    pub search: String,
    pub filters: FilterState,
    pub tab: Tab,
    pub expanded: Option<String>,
}

impl AppState {
    pub fn new(saved: SavedSelections) -> Self {
        Self {
            store: OpportunityStore::new(),
            saved,
            search: String::new(),
            filters: FilterState::default(),
            tab: Tab::default(),
            expanded: None,
        }
    }

    pub fn stats(&self, now: DateTime<Utc>) -> DashboardStats {
        DashboardStats::compute(self.store.opportunities(), &self.saved, now)
    }

    /// Collapse `id` if it is the expanded card, otherwise expand it.
    pub fn toggle_expanded(&mut self, id: &str) -> Option<&str> {
        if self.expanded.as_deref() == Some(id) {
            self.expanded = None;
        } else {
            self.expanded = Some(id.to_string());
        }
        self.expanded.as_deref()
    }

    /// Derived view over the current snapshot.
    pub fn view(&self, now: DateTime<Utc>) -> DashboardView {
        let shown = visible(self.store.opportunities(), &self.search, &self.saved, self.tab);
        let cards = sort_for_tab(shown, self.tab, now)
            .into_iter()
            .map(|opp| OpportunityCard {
                saved: self.saved.is_saved(&opp.id),
                expanded: self.expanded.as_deref() == Some(opp.id.as_str()),
                days_until_due: opp.days_until_due(now),
                urgency: opp.due_urgency(now),
                opportunity: opp.clone(),
            })
            .collect();

        DashboardView {
            tab: self.tab,
            search: self.search.clone(),
            loading: self.store.is_loading(),
            error: self.store.error().cloned(),
            stats: self.stats(now),
            cards,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpportunityCard {
    pub opportunity: Opportunity,
    pub saved: bool,
    pub expanded: bool,
    pub days_until_due: i64,
    pub urgency: DueUrgency,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub tab: Tab,
    pub search: String,
    pub loading: bool,
    /// When set, the error screen replaces the list.
    pub error: Option<FetchFailure>,
    pub stats: DashboardStats,
    pub cards: Vec<OpportunityCard>,
}

/// Owns the session state and drives fetches against an [`OpportunitySource`].
///
/// The state lock is never held across the network call, so overlapping
/// refreshes are possible; the store's generation check keeps the newest.
pub struct Controller {
    source: Arc<dyn OpportunitySource>,
    days_back: u32,
    limit: u32,
    state: Mutex<AppState>,
}

impl Controller {
    pub fn new(source: Arc<dyn OpportunitySource>, saved: SavedSelections) -> Self {
        let defaults = FetchQuery::new(FilterState::default());
        Self {
            source,
            days_back: defaults.days_back,
            limit: defaults.limit,
            state: Mutex::new(AppState::new(saved)),
        }
    }

    pub fn with_query_window(mut self, days_back: u32, limit: u32) -> Self {
        self.days_back = days_back;
        self.limit = limit;
        self
    }

    fn query_for(&self, filters: &FilterState) -> FetchQuery {
        FetchQuery {
            days_back: self.days_back,
            limit: self.limit,
            filters: filters.clone(),
        }
    }

    /// Fetch a fresh snapshot with the current filters.
    pub async fn refresh(&self) -> FetchOutcome {
        let (ticket, query) = {
            let mut state = self.state.lock().await;
            (state.store.begin_fetch(), self.query_for(&state.filters))
        };

        let span = info_span!(
            "opportunity_fetch",
            generation = ticket.generation(),
            source = self.source.source_id()
        );
        let result = self.source.fetch(&query).instrument(span.clone()).await;

        let outcome = self.state.lock().await.store.complete_fetch(ticket, result);
        span.in_scope(|| match outcome {
            FetchOutcome::Applied { count } => info!(count, "opportunities loaded"),
            FetchOutcome::Failed => warn!("opportunity fetch failed"),
            FetchOutcome::Stale => {}
        });
        outcome
    }

    /// User-initiated retry after a failure; same path as [`Controller::refresh`].
    pub async fn retry(&self) -> FetchOutcome {
        self.refresh().await
    }

    /// Replace the filters, refetching when the server-side query changed.
    pub async fn set_filters(&self, filters: FilterState) -> Option<FetchOutcome> {
        let needs_refetch = {
            let mut state = self.state.lock().await;
            let changed = state.filters.requires_refetch(&filters);
            state.filters = filters;
            changed
        };
        if needs_refetch {
            Some(self.refresh().await)
        } else {
            None
        }
    }

    /// Client-side only; never refetches.
    pub async fn set_search(&self, search: impl Into<String>) {
        self.state.lock().await.search = search.into();
    }

    pub async fn set_tab(&self, tab: Tab) {
        self.state.lock().await.tab = tab;
    }

    pub async fn toggle_saved(&self, id: &str) -> bool {
        self.state.lock().await.saved.toggle(id)
    }

    pub async fn toggle_expanded(&self, id: &str) -> Option<String> {
        self.state.lock().await.toggle_expanded(id).map(str::to_string)
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.store.is_loading()
    }

    pub async fn stats(&self, now: DateTime<Utc>) -> DashboardStats {
        self.state.lock().await.stats(now)
    }

    pub async fn view(&self, now: DateTime<Utc>) -> DashboardView {
        self.state.lock().await.view(now)
    }

    /// Saved ids with no record in the current snapshot.
    pub async fn stale_saved_ids(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .saved
            .stale_ids(state.store.opportunities())
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Saved ids, ascending.
    /// Record from the current snapshot, if present.
    pub async fn opportunity(&self, id: &str) -> Option<Opportunity> {
        self.state.lock().await.store.find(id).cloned()
    }

    pub async fn saved_ids(&self) -> Vec<String> {
        self.state.lock().await.saved.ids().map(str::to_string).collect()
    }
}
