use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use govcon_adapters::{FetchQuery, OpportunitySource, SourceError};
use govcon_app::{open_saved_selections, Controller, FetchOutcome};
use govcon_core::{FilterState, Opportunity, Tab};
use govcon_storage::{FetchError, MemoryStore, SavedSelections};
use tokio::sync::{mpsc, oneshot};

type Reply = Result<Vec<Opportunity>, SourceError>;

/// Answers fetches from a queue of channels so tests decide completion order.
struct GatedSource {
    gates: Mutex<VecDeque<oneshot::Receiver<Reply>>>,
    started: mpsc::UnboundedSender<FetchQuery>,
}

#[async_trait]
impl OpportunitySource for GatedSource {
    fn source_id(&self) -> &'static str {
        "gated"
    }

    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<Opportunity>, SourceError> {
        let gate = self.gates.lock().unwrap().pop_front().expect("unexpected fetch");
        let _ = self.started.send(query.clone());
        gate.await.expect("gate dropped")
    }
}

/// Never answers; signals once the fetch has been issued.
struct StalledSource {
    started: mpsc::UnboundedSender<()>,
}

#[async_trait]
impl OpportunitySource for StalledSource {
    fn source_id(&self) -> &'static str {
        "stalled"
    }

    async fn fetch(&self, _query: &FetchQuery) -> Result<Vec<Opportunity>, SourceError> {
        let _ = self.started.send(());
        std::future::pending().await
    }
}

/// Answers fetches immediately from a queue and records every query.
#[derive(Default)]
struct ScriptedSource {
    replies: Mutex<VecDeque<Reply>>,
    queries: Mutex<Vec<FetchQuery>>,
}

impl ScriptedSource {
    fn with(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            queries: Mutex::new(Vec::new()),
        })
    }

    fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl OpportunitySource for ScriptedSource {
    fn source_id(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<Opportunity>, SourceError> {
        self.queries.lock().unwrap().push(query.clone());
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).single().unwrap()
}

fn opp(id: &str, title: &str, score: Option<f64>, due_in_days: Option<i64>) -> Opportunity {
    let mut o = Opportunity::new(id);
    o.title = Some(title.to_string());
    o.match_score = score;
    o.due_date = due_in_days.map(|d| (now() + Duration::days(d)).to_rfc3339());
    o
}

fn server_error() -> SourceError {
    SourceError::Fetch(FetchError::HttpStatus {
        status: 503,
        url: "http://backend.test/opportunities".into(),
    })
}

fn memory_saved() -> SavedSelections {
    SavedSelections::load_on_startup(Box::new(MemoryStore::new()))
}

async fn visible_ids(controller: &Controller) -> Vec<String> {
    controller
        .view(now())
        .await
        .cards
        .into_iter()
        .map(|c| c.opportunity.id)
        .collect()
}

#[tokio::test]
async fn matched_tab_scenario() {
    let source = ScriptedSource::with(vec![Ok(vec![
        opp("1", "Cloud", Some(0.9), Some(5)),
        opp("2", "Roofing", Some(0.5), Some(2)),
    ])]);
    let controller = Controller::new(source, memory_saved());
    controller.refresh().await;

    let view = controller.view(now()).await;
    assert_eq!(view.tab, Tab::Matched);
    assert_eq!(view.cards.len(), 1);
    assert_eq!(view.cards[0].opportunity.id, "1");
    assert_eq!(view.stats.high_matches, 1);
    assert_eq!(view.stats.due_soon, 2);

    let hidden = controller.opportunity("2").await.expect("record outside the tab");
    assert_eq!(hidden.title.as_deref(), Some("Roofing"));
    assert!(controller.opportunity("missing").await.is_none());
}

#[tokio::test]
async fn failed_refetch_keeps_snapshot_for_stats_and_sets_error() {
    let source = ScriptedSource::with(vec![
        Ok(vec![opp("1", "Cloud", Some(0.95), Some(3))]),
        Err(server_error()),
        Ok(vec![opp("2", "Data", None, None)]),
    ]);
    let controller = Controller::new(source, memory_saved());

    assert_eq!(controller.refresh().await, FetchOutcome::Applied { count: 1 });
    assert_eq!(controller.refresh().await, FetchOutcome::Failed);

    let view = controller.view(now()).await;
    let error = view.error.expect("error flag");
    assert!(error.message.contains("503"));
    assert_eq!(view.stats.total_opportunities, 1);
    assert_eq!(view.stats.high_matches, 1);

    assert_eq!(controller.retry().await, FetchOutcome::Applied { count: 1 });
    let view = controller.view(now()).await;
    assert!(view.error.is_none());
    assert_eq!(view.stats.total_opportunities, 1);
    assert_eq!(view.stats.high_matches, 0);
}

#[tokio::test]
async fn newest_fetch_wins_regardless_of_completion_order() {
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let (first_tx, first_rx) = oneshot::channel();
    let (second_tx, second_rx) = oneshot::channel();
    let source = Arc::new(GatedSource {
        gates: Mutex::new(VecDeque::from([first_rx, second_rx])),
        started: started_tx,
    });
    let controller = Arc::new(Controller::new(source, memory_saved()));
    controller.set_tab(Tab::All).await;

    let c = Arc::clone(&controller);
    let first = tokio::spawn(async move { c.refresh().await });
    started_rx.recv().await.unwrap();
    let c = Arc::clone(&controller);
    let second = tokio::spawn(async move { c.refresh().await });
    started_rx.recv().await.unwrap();
    assert!(controller.is_loading().await);

    second_tx.send(Ok(vec![opp("new", "Newer", None, None)])).unwrap();
    assert_eq!(second.await.unwrap(), FetchOutcome::Applied { count: 1 });
    assert!(controller.is_loading().await);

    first_tx.send(Ok(vec![opp("old", "Older", None, None)])).unwrap();
    assert_eq!(first.await.unwrap(), FetchOutcome::Stale);
    assert!(!controller.is_loading().await);

    assert_eq!(visible_ids(&controller).await, vec!["new"]);
}

#[tokio::test]
async fn stale_failure_does_not_mask_newer_success() {
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let (first_tx, first_rx) = oneshot::channel();
    let (second_tx, second_rx) = oneshot::channel();
    let source = Arc::new(GatedSource {
        gates: Mutex::new(VecDeque::from([first_rx, second_rx])),
        started: started_tx,
    });
    let controller = Arc::new(Controller::new(source, memory_saved()));

    let c = Arc::clone(&controller);
    let first = tokio::spawn(async move { c.refresh().await });
    started_rx.recv().await.unwrap();
    let c = Arc::clone(&controller);
    let second = tokio::spawn(async move { c.refresh().await });
    started_rx.recv().await.unwrap();

    first_tx.send(Err(server_error())).unwrap();
    assert_eq!(first.await.unwrap(), FetchOutcome::Stale);
    second_tx.send(Ok(vec![opp("ok", "Fine", Some(0.9), None)])).unwrap();
    assert_eq!(second.await.unwrap(), FetchOutcome::Applied { count: 1 });

    let view = controller.view(now()).await;
    assert!(view.error.is_none());
    assert_eq!(view.cards.len(), 1);
}

#[tokio::test]
async fn cancelled_refresh_clears_loading() {
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let source = Arc::new(StalledSource { started: started_tx });
    let controller = Arc::new(Controller::new(source, memory_saved()));

    let c = Arc::clone(&controller);
    let handle = tokio::spawn(async move { c.refresh().await });
    started_rx.recv().await.unwrap();
    assert!(controller.is_loading().await);

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
    assert!(!controller.is_loading().await);

    let c = Arc::clone(&controller);
    let timed_out = tokio::time::timeout(std::time::Duration::from_millis(20), c.refresh()).await;
    assert!(timed_out.is_err());
    assert!(!controller.is_loading().await);
    assert!(controller.view(now()).await.error.is_none());
}

#[tokio::test]
async fn only_server_side_filter_changes_refetch() {
    let source = ScriptedSource::with(vec![]);
    let controller = Controller::new(source.clone(), memory_saved()).with_query_window(30, 25);
    controller.refresh().await;
    assert_eq!(source.query_count(), 1);

    controller.set_search("cloud").await;
    let outcome = controller
        .set_filters(FilterState {
            value_range: "1m-5m".into(),
            ..FilterState::default()
        })
        .await;
    assert_eq!(outcome, None);
    assert_eq!(source.query_count(), 1);

    let outcome = controller
        .set_filters(FilterState {
            naics: "541512".into(),
            value_range: "1m-5m".into(),
            ..FilterState::default()
        })
        .await;
    assert_eq!(outcome, Some(FetchOutcome::Applied { count: 0 }));

    let queries = source.queries.lock().unwrap();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[1].days_back, 30);
    assert_eq!(queries[1].limit, 25);
    assert_eq!(
        queries[1].params(),
        vec![
            ("days_back", "30".to_string()),
            ("limit", "25".to_string()),
            ("naics", "541512".to_string()),
        ]
    );
}

#[tokio::test]
async fn stats_ignore_search_filters_and_tab() {
    let source = ScriptedSource::with(vec![Ok(vec![
        opp("1", "Cloud", Some(0.85), Some(1)),
        opp("2", "Roofing", Some(0.2), Some(40)),
        opp("3", "Cyber", None, None),
    ])]);
    let controller = Controller::new(source, memory_saved());
    controller.refresh().await;
    let baseline = controller.stats(now()).await;

    controller.set_search("no such words").await;
    controller.set_tab(Tab::Saved).await;
    controller
        .set_filters(FilterState {
            value_range: "over-10m".into(),
            ..FilterState::default()
        })
        .await;

    let view = controller.view(now()).await;
    assert!(view.cards.is_empty());
    assert_eq!(view.stats, baseline);
    assert_eq!(baseline.total_opportunities, 3);
    assert_eq!(baseline.high_matches, 1);
    assert_eq!(baseline.due_soon, 1);
}

#[tokio::test]
async fn saved_selection_survives_restart_and_drives_saved_tab() {
    let dir = tempfile::tempdir().expect("tempdir");
    let snapshot = vec![
        opp("x", "Later", None, Some(20)),
        opp("y", "Sooner", None, Some(2)),
        opp("z", "Unsaved", None, Some(1)),
    ];

    {
        let source = ScriptedSource::with(vec![]);
        let controller = Controller::new(source, open_saved_selections(dir.path()));
        assert!(controller.toggle_saved("x").await);
        assert!(controller.toggle_saved("y").await);
        assert!(controller.toggle_saved("gone").await);
    }

    let source = ScriptedSource::with(vec![Ok(snapshot)]);
    let controller = Controller::new(source, open_saved_selections(dir.path()));
    controller.refresh().await;
    controller.set_tab(Tab::Saved).await;

    assert_eq!(visible_ids(&controller).await, vec!["y", "x"]);
    let view = controller.view(now()).await;
    assert!(view.cards.iter().all(|c| c.saved));
    assert_eq!(view.stats.saved_count, 3);
    assert_eq!(controller.stale_saved_ids().await, vec!["gone"]);
    assert_eq!(controller.saved_ids().await, vec!["gone", "x", "y"]);
}

#[tokio::test]
async fn expanded_pointer_holds_at_most_one_card() {
    let source = ScriptedSource::with(vec![Ok(vec![
        opp("a", "A", None, Some(1)),
        opp("b", "B", None, Some(2)),
    ])]);
    let controller = Controller::new(source, memory_saved());
    controller.refresh().await;
    controller.set_tab(Tab::All).await;

    assert_eq!(controller.toggle_expanded("a").await.as_deref(), Some("a"));
    assert_eq!(controller.toggle_expanded("b").await.as_deref(), Some("b"));
    let view = controller.view(now()).await;
    let expanded: Vec<_> = view.cards.iter().filter(|c| c.expanded).map(|c| c.opportunity.id.as_str()).collect();
    assert_eq!(expanded, vec!["b"]);

    assert_eq!(controller.toggle_expanded("b").await, None);
    assert!(controller.view(now()).await.cards.iter().all(|c| !c.expanded));
}
