//! Session orchestration for GovCon: configuration, the opportunity store,
//! and the controller that turns fetches and user input into views.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use govcon_adapters::{ApiOpportunitySource, ApiSummarizer, FixtureOpportunitySource, OpportunitySource};
use govcon_storage::{HttpFetcher, JsonFileStore, SavedSelections};

pub mod config;
pub mod controller;
pub mod render;
pub mod store;

pub use config::AppConfig;
pub use controller::{AppState, Controller, DashboardView, OpportunityCard};
pub use render::{render_dashboard, render_summary};
pub use store::{FetchFailure, FetchOutcome, FetchTicket, OpportunityStore};

/// Saved selections backed by the data directory; never fails.
pub fn open_saved_selections(data_dir: &Path) -> SavedSelections {
    SavedSelections::load_on_startup(Box::new(JsonFileStore::new(data_dir)))
}

/// Controller wired to the configured backend, or to a fixture file when one
/// is given.
pub fn controller_from_config(config: &AppConfig, fixture: Option<PathBuf>) -> anyhow::Result<Controller> {
    let source: Arc<dyn OpportunitySource> = match fixture {
        Some(path) => Arc::new(FixtureOpportunitySource::new(path)),
        None => {
            let http = HttpFetcher::new(config.http_client_config()).context("building http client")?;
            Arc::new(ApiOpportunitySource::new(http, &config.api_base_url))
        }
    };
    let saved = open_saved_selections(&config.data_dir);
    Ok(Controller::new(source, saved).with_query_window(config.days_back, config.fetch_limit))
}

pub fn summarizer_from_config(config: &AppConfig) -> anyhow::Result<ApiSummarizer> {
    let http = HttpFetcher::new(config.http_client_config()).context("building http client")?;
    Ok(ApiSummarizer::new(http, &config.api_base_url))
}
