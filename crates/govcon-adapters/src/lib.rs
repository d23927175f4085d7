//! External collaborators: the opportunity backend and the RFP summarizer.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use govcon_core::{FilterState, Opportunity};
use govcon_storage::{FetchError, HttpFetcher};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::warn;

mod summarize;

pub use summarize::{summary_from_value, ApiSummarizer, RfpSummarizer, SummarizeError};

pub const DEFAULT_DAYS_BACK: u32 = 14;
pub const DEFAULT_LIMIT: u32 = 50;

/// Parameters for one backend fetch. `days_back` and `limit` are fixed per
/// session; the structured filters ride along when constrained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
    pub days_back: u32,
    pub limit: u32,
    pub filters: FilterState,
}

impl FetchQuery {
    pub fn new(filters: FilterState) -> Self {
        Self {
            days_back: DEFAULT_DAYS_BACK,
            limit: DEFAULT_LIMIT,
            filters,
        }
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("days_back", self.days_back.to_string()),
            ("limit", self.limit.to_string()),
        ];
        params.extend(self.filters.request_params());
        params
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected response shape from {origin}: expected a JSON object")]
    UnexpectedShape { origin: String },
}

#[async_trait]
pub trait OpportunitySource: Send + Sync {
    fn source_id(&self) -> &'static str;

    /// One complete snapshot for `query`.
    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<Opportunity>, SourceError>;
}

/// `GET {base}/opportunities` on the GovCon backend.
#[derive(Debug, Clone)]
pub struct ApiOpportunitySource {
    http: HttpFetcher,
    endpoint: String,
}

impl ApiOpportunitySource {
    pub fn new(http: HttpFetcher, base_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/opportunities", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl OpportunitySource for ApiOpportunitySource {
    fn source_id(&self) -> &'static str {
        "api"
    }

    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<Opportunity>, SourceError> {
        let body: JsonValue = self.http.get_json(&self.endpoint, &query.params()).await?;
        parse_opportunities_response(body, &self.endpoint)
    }
}

/// Backend-shaped JSON read from disk, for offline use and tests. The query
/// is ignored: the file is the snapshot.
#[derive(Debug, Clone)]
pub struct FixtureOpportunitySource {
    path: PathBuf,
}

impl FixtureOpportunitySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OpportunitySource for FixtureOpportunitySource {
    fn source_id(&self) -> &'static str {
        "fixture"
    }

    async fn fetch(&self, _query: &FetchQuery) -> Result<Vec<Opportunity>, SourceError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Read {
            path: self.path.clone(),
            source,
        })?;
        let origin = self.path.display().to_string();
        let body: JsonValue =
            serde_json::from_str(&text).map_err(|source| SourceError::Parse {
                origin: origin.clone(),
                source,
            })?;
        parse_opportunities_response(body, &origin)
    }
}

/// Extract the `opportunities` array from a backend response.
///
/// A missing or null array is an empty snapshot. Records that cannot be
/// decoded at all (no usable `id`) are skipped with a warning; other fields
/// degrade individually.
pub fn parse_opportunities_response(
    body: JsonValue,
    origin: &str,
) -> Result<Vec<Opportunity>, SourceError> {
    let JsonValue::Object(mut map) = body else {
        return Err(SourceError::UnexpectedShape {
            origin: origin.to_string(),
        });
    };

    let records = match map.remove("opportunities") {
        None | Some(JsonValue::Null) => return Ok(Vec::new()),
        Some(JsonValue::Array(records)) => records,
        Some(other) => {
            warn!(origin, kind = json_kind(&other), "`opportunities` is not an array; treating as empty");
            return Ok(Vec::new());
        }
    };

    let mut out = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<Opportunity>(record) {
            Ok(opportunity) => out.push(opportunity),
            Err(err) => warn!(origin, index, error = %err, "skipping undecodable opportunity"),
        }
    }
    Ok(out)
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
