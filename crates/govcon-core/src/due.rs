//! Due-date arithmetic shared by the ranking engine and the stats aggregator.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Days assigned to an opportunity whose due date is missing or unreadable.
pub const NO_DUE_DATE_DAYS: i64 = 999;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Parse the ISO-8601 shapes the backend emits. Offset-less values are read
/// as UTC; a bare date means midnight UTC.
pub fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Whole days until `due`, rounded up and clamped at zero. Missing or
/// unparseable dates yield [`NO_DUE_DATE_DAYS`].
pub fn days_until_due(due: Option<&str>, now: DateTime<Utc>) -> i64 {
    due.and_then(parse_due_date)
        .map_or(NO_DUE_DATE_DAYS, |due| days_between(due, now))
}

fn days_between(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (due - now).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
    }
}

/// Badge shown next to a due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueUrgency {
    PastDue,
    Urgent,
    Soon,
    Open,
    NoDueDate,
}

impl DueUrgency {
    pub fn classify(due: Option<&str>, now: DateTime<Utc>) -> Self {
        let Some(parsed) = due.and_then(parse_due_date) else {
            return DueUrgency::NoDueDate;
        };
        if parsed <= now {
            return DueUrgency::PastDue;
        }
        match days_between(parsed, now) {
            0..=7 => DueUrgency::Urgent,
            8..=14 => DueUrgency::Soon,
            _ => DueUrgency::Open,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            DueUrgency::PastDue => "past due",
            DueUrgency::Urgent => "urgent",
            DueUrgency::Soon => "due soon",
            DueUrgency::Open => "open",
            DueUrgency::NoDueDate => "no due date",
        }
    }
}
