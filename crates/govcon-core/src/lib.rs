//! Core domain model and view derivations for GovCon.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

pub mod due;
pub mod filter;
pub mod rank;
pub mod stats;

pub use due::{days_until_due, parse_due_date, DueUrgency, NO_DUE_DATE_DAYS};
pub use filter::{matches_search, passes_tab, visible, MATCHED_THRESHOLD};
pub use rank::sort_for_tab;
pub use stats::{DashboardStats, DUE_SOON_DAYS, HIGH_MATCH_THRESHOLD};

pub const UNTITLED: &str = "Untitled Opportunity";
pub const UNKNOWN_AGENCY: &str = "Unknown Agency";

/// Point of contact attached to a notice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalInfo {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub classification_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub organization_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// A single contracting notice as delivered by the opportunity backend.
///
/// Records are immutable once fetched; a refetch replaces the whole snapshot.
/// Every field other than `id` is optional, and a field of the wrong JSON type
/// decodes as absent rather than failing the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub agency: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub office: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub solicitation_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub naics: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub naics_description: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub set_aside_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub estimated_value: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub place_of_performance: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub notice_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub posted_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_score", skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<ContactInfo>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<AdditionalInfo>,
}

impl Opportunity {
    /// Bare record carrying only an id; every optional field is absent.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            agency: None,
            office: None,
            solicitation_number: None,
            naics: None,
            naics_description: None,
            set_aside_type: None,
            estimated_value: None,
            place_of_performance: None,
            description: None,
            url: None,
            notice_type: None,
            due_date: None,
            posted_date: None,
            match_score: None,
            contact_info: None,
            additional_info: None,
        }
    }

    /// Match score with "unscored" collapsed to zero.
    pub fn score(&self) -> f64 {
        self.match_score.unwrap_or(0.0)
    }

    pub fn days_until_due(&self, now: DateTime<Utc>) -> i64 {
        days_until_due(self.due_date.as_deref(), now)
    }

    pub fn due_urgency(&self, now: DateTime<Utc>) -> DueUrgency {
        DueUrgency::classify(self.due_date.as_deref(), now)
    }

    pub fn display_title(&self) -> &str {
        non_blank(self.title.as_deref()).unwrap_or(UNTITLED)
    }

    pub fn display_agency(&self) -> &str {
        non_blank(self.agency.as_deref()).unwrap_or(UNKNOWN_AGENCY)
    }

    /// Due date as `Mon D, YYYY`, the raw string when it cannot be parsed,
    /// or `No due date`.
    pub fn display_due_date(&self) -> String {
        match non_blank(self.due_date.as_deref()) {
            Some(raw) => parse_due_date(raw)
                .map(|due| due.format("%b %-d, %Y").to_string())
                .unwrap_or_else(|| raw.to_string()),
            None => "No due date".to_string(),
        }
    }

    pub fn match_label(&self) -> String {
        match self.match_score {
            Some(score) => format!("{}% match", (score * 100.0).round() as i64),
            None => "Unscored".to_string(),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// View mode controlling which tab predicate and ordering apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    All,
    #[default]
    Matched,
    Saved,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::All, Tab::Matched, Tab::Saved];

    pub const fn as_str(self) -> &'static str {
        match self {
            Tab::All => "all",
            Tab::Matched => "matched",
            Tab::Saved => "saved",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTab(pub String);

impl fmt::Display for UnknownTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tab `{}` (expected all, matched or saved)", self.0)
    }
}

impl std::error::Error for UnknownTab {}

impl FromStr for Tab {
    type Err = UnknownTab;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Tab::All),
            "matched" => Ok(Tab::Matched),
            "saved" => Ok(Tab::Saved),
            _ => Err(UnknownTab(s.to_string())),
        }
    }
}

/// Structured filters chosen by the user.
///
/// `naics`, `set_aside` and `agency` are request parameters for the backend;
/// they are never applied as local predicates. `value_range` is kept as UI
/// state only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    #[serde(default)]
    pub set_aside: String,
    #[serde(default)]
    pub naics: String,
    #[serde(default)]
    pub agency: String,
    #[serde(default)]
    pub value_range: String,
}

impl FilterState {
    /// Empty or `all` (any case) means "no constraint".
    pub fn is_constrained(value: &str) -> bool {
        let value = value.trim();
        !value.is_empty() && !value.eq_ignore_ascii_case("all")
    }

    /// Query parameters sent to the backend, in wire order.
    pub fn request_params(&self) -> Vec<(&'static str, String)> {
        [
            ("naics", &self.naics),
            ("set_aside", &self.set_aside),
            ("agency", &self.agency),
        ]
        .into_iter()
        .filter(|(_, value)| Self::is_constrained(value))
        .map(|(name, value)| (name, value.trim().to_string()))
        .collect()
    }

    /// Whether moving from `self` to `next` changes the server-side query.
    pub fn requires_refetch(&self, next: &FilterState) -> bool {
        self.request_params() != next.request_params()
    }
}

/// Membership lookup over the saved selection, implemented by the tracker
/// and by plain id sets.
pub trait SavedIds {
    fn contains_id(&self, id: &str) -> bool;
    fn count(&self) -> usize;
}

impl SavedIds for BTreeSet<String> {
    fn contains_id(&self, id: &str) -> bool {
        self.contains(id)
    }

    fn count(&self) -> usize {
        self.len()
    }
}

impl SavedIds for HashSet<String> {
    fn contains_id(&self, id: &str) -> bool {
        self.contains(id)
    }

    fn count(&self) -> usize {
        self.len()
    }
}

/// Structured RFP summary returned by the summarization collaborator.
/// Absent fields render as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RfpSummary {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub opportunity_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub agency: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "text_list", skip_serializing_if = "Vec::is_empty")]
    pub evaluation_criteria: Vec<String>,
    #[serde(default, deserialize_with = "text_list", skip_serializing_if = "Vec::is_empty")]
    pub key_requirements: Vec<String>,
}

impl RfpSummary {
    pub fn is_empty(&self) -> bool {
        self.opportunity_title.is_none()
            && self.agency.is_none()
            && self.summary.is_none()
            && self.due_date.is_none()
            && self.evaluation_criteria.is_empty()
            && self.key_requirements.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseScalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Other(IgnoredAny),
}

impl LooseScalar {
    fn into_text(self) -> Option<String> {
        match self {
            LooseScalar::Text(s) => Some(s),
            LooseScalar::Int(n) => Some(n.to_string()),
            LooseScalar::Float(n) => Some(n.to_string()),
            LooseScalar::Bool(b) => Some(b.to_string()),
            LooseScalar::Other(_) => None,
        }
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<LooseScalar>::deserialize(deserializer)?.and_then(LooseScalar::into_text))
}

fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let score = match Option::<LooseScalar>::deserialize(deserializer)? {
        Some(LooseScalar::Float(n)) => Some(n),
        Some(LooseScalar::Int(n)) => Some(n as f64),
        Some(LooseScalar::Text(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(score.filter(|s| s.is_finite()))
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose<T> {
        Value(T),
        Other(IgnoredAny),
    }

    Ok(match Option::<Loose<T>>::deserialize(deserializer)? {
        Some(Loose::Value(value)) => Some(value),
        _ => None,
    })
}

fn id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match LooseScalar::deserialize(deserializer)? {
        LooseScalar::Text(s) => Ok(s),
        LooseScalar::Int(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom("opportunity id must be a string or integer")),
    }
}

fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrList {
        List(Vec<LooseScalar>),
        One(LooseScalar),
    }

    let items = match Option::<TextOrList>::deserialize(deserializer)? {
        Some(TextOrList::List(items)) => items.into_iter().filter_map(LooseScalar::into_text).collect(),
        Some(TextOrList::One(item)) => item.into_text().into_iter().collect(),
        None => Vec::new(),
    };
    Ok(items.into_iter().filter(|s| !s.trim().is_empty()).collect())
}
