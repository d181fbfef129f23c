//! # Predicate Library
//!
//! Pure, total match functions. A clause left at its neutral value matches
//! every record, and a missing field value is normalized rather than
//! rejected with an error:
//!
//! | Clause   | Missing value behaves as |
//! |----------|--------------------------|
//! | text     | empty string             |
//! | discrete | no match (unless sentinel) |
//! | numeric  | `0`                      |
//! | date     | no match (unless unbounded) |

use std::ops::RangeBounds;

use chrono::{DateTime, NaiveDate, Utc};

use crate::access::TextAccessor;
use crate::calendar::{CalendarMonth, CalendarZone};

/// Discrete selections that mean "no constraint".
pub const SENTINELS: [&str; 2] = ["all", "none"];

/// `true` for `"all"`, `"none"` and blank selections, in any case.
pub fn is_sentinel(selected: &str) -> bool {
    let s = selected.trim();
    s.is_empty() || SENTINELS.iter().any(|sentinel| s.eq_ignore_ascii_case(sentinel))
}

/// Unicode case-insensitive equality without allocating.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

// =============================================================================
// Text
// =============================================================================

/// A normalized free-text query. Build once per pipeline run, test per record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
    needle: String,
}

impl TextQuery {
    /// `None` for an empty or whitespace-only query (the no-op filter).
    pub fn new(query: &str) -> Option<Self> {
        let trimmed = query.trim();
        (!trimmed.is_empty()).then(|| Self {
            needle: trimmed.to_lowercase(),
        })
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    /// `true` if any accessor's value contains the needle, ignoring case.
    pub fn matches<T>(&self, record: &T, fields: &[TextAccessor<T>]) -> bool {
        fields.iter().any(|field| {
            field(record)
                .map(|value| value.to_lowercase().contains(&self.needle))
                .unwrap_or(false)
        })
    }
}

/// Case-insensitive substring search across `fields`.
pub fn text_matches<T>(record: &T, fields: &[TextAccessor<T>], query: &str) -> bool {
    match TextQuery::new(query) {
        Some(q) => q.matches(record, fields),
        None => true,
    }
}

// =============================================================================
// Discrete
// =============================================================================

/// Equality against a selected enum value; sentinels and `None` always pass.
pub fn discrete_matches(value: Option<&str>, selected: Option<&str>) -> bool {
    match selected {
        None => true,
        Some(s) if is_sentinel(s) => true,
        Some(s) => value.is_some_and(|v| eq_ignore_case(v.trim(), s.trim())),
    }
}

// =============================================================================
// Numeric
// =============================================================================

/// Membership in a numeric range. A missing or NaN value counts as `0`.
pub fn numeric_range_matches<R>(value: Option<f64>, range: &R) -> bool
where
    R: RangeBounds<f64>,
{
    let value = value.filter(|v| !v.is_nan()).unwrap_or(0.0);
    range.contains(&value)
}

// =============================================================================
// Dates
// =============================================================================

/// Same calendar day in `zone`; time of day is ignored.
pub fn date_day_matches(value: Option<DateTime<Utc>>, day: NaiveDate, zone: CalendarZone) -> bool {
    value.is_some_and(|v| zone.date_of(&v) == day)
}

/// Same calendar year and month in `zone`.
pub fn date_month_matches(
    value: Option<DateTime<Utc>>,
    month: CalendarMonth,
    zone: CalendarZone,
) -> bool {
    value.is_some_and(|v| CalendarMonth::containing(zone.date_of(&v)) == month)
}

/// Inclusive on both ends; a missing bound is open. With neither bound every
/// record matches, including ones without a date.
pub fn date_range_matches(
    value: Option<DateTime<Utc>>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> bool {
    if start.is_none() && end.is_none() {
        return true;
    }
    value.is_some_and(|v| start.map_or(true, |s| v >= s) && end.map_or(true, |e| v <= e))
}
