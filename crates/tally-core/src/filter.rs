//! # Filter Specification
//!
//! [`FilterSpec`] is the plain-data description of what an operator picked in
//! a page's filter bar. It is serializable so UI state can round-trip through
//! JSON or TOML, and every field has a neutral value that filters nothing.

use std::collections::BTreeMap;
use std::ops::{Bound, RangeBounds};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{CalendarMonth, CalendarZone};
use crate::predicate::{date_day_matches, date_month_matches, date_range_matches, is_sentinel};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Free-text query over the schema's search fields.
    pub search: Option<String>,
    /// Field name -> selected value. Sentinels (`all`, `none`) are no-ops.
    pub discrete: BTreeMap<String, String>,
    /// Constraint on the schema's numeric range field.
    pub range: Option<RangeFilter>,
    /// Constraint on the schema's date field.
    pub date: DateFilter,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.search = Some(query.into());
        self
    }

    pub fn discrete(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.discrete.insert(field.into(), value.into());
        self
    }

    pub fn bucket(mut self, name: impl Into<String>) -> Self {
        self.range = Some(RangeFilter::Bucket(name.into()));
        self
    }

    pub fn between(mut self, range: NumericRange) -> Self {
        self.range = Some(RangeFilter::Between(range));
        self
    }

    pub fn date(mut self, date: DateFilter) -> Self {
        self.date = date;
        self
    }

    /// `true` when no clause can exclude a record. Named buckets count as
    /// active even if the schema later fails to resolve them.
    pub fn is_neutral(&self) -> bool {
        self.search.as_deref().map_or(true, |s| s.trim().is_empty())
            && self.discrete.values().all(|v| is_sentinel(v))
            && self.range.as_ref().map_or(true, RangeFilter::is_neutral)
            && self.date.resolve().is_none()
    }
}

// =============================================================================
// Numeric ranges
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeFilter {
    /// A named bucket looked up in the schema's [`BucketSet`].
    Bucket(String),
    /// Exact bounds, inclusive on both ends.
    Between(NumericRange),
}

impl RangeFilter {
    pub fn is_neutral(&self) -> bool {
        match self {
            Self::Bucket(name) => is_sentinel(name),
            Self::Between(range) => range.is_unbounded(),
        }
    }
}

/// Inclusive `[min, max]`; an absent or non-finite bound is open.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Build from raw text inputs; anything that does not parse to a finite
    /// number is treated as an absent bound.
    pub fn from_inputs(min: &str, max: &str) -> Self {
        Self {
            min: parse_bound(min),
            max: parse_bound(max),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        finite(self.min).is_none() && finite(self.max).is_none()
    }

    pub fn to_bucket(&self) -> NumericBucket {
        NumericBucket {
            lower: finite(self.min).map_or(Bound::Unbounded, Bound::Included),
            upper: finite(self.max).map_or(Bound::Unbounded, Bound::Included),
        }
    }
}

fn parse_bound(raw: &str) -> Option<f64> {
    finite(raw.trim().parse::<f64>().ok())
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|v| v.is_finite())
}

impl RangeBounds<f64> for NumericRange {
    fn start_bound(&self) -> Bound<&f64> {
        match &self.min {
            Some(min) if min.is_finite() => Bound::Included(min),
            _ => Bound::Unbounded,
        }
    }

    fn end_bound(&self) -> Bound<&f64> {
        match &self.max {
            Some(max) if max.is_finite() => Bound::Included(max),
            _ => Bound::Unbounded,
        }
    }
}

/// A numeric interval with independently open/closed ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericBucket {
    pub lower: Bound<f64>,
    pub upper: Bound<f64>,
}

impl NumericBucket {
    pub const fn new(lower: Bound<f64>, upper: Bound<f64>) -> Self {
        Self { lower, upper }
    }
}

impl RangeBounds<f64> for NumericBucket {
    fn start_bound(&self) -> Bound<&f64> {
        self.lower.as_ref()
    }

    fn end_bound(&self) -> Bound<&f64> {
        self.upper.as_ref()
    }
}

/// Named buckets offered by a page's value dropdown.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSet {
    buckets: Vec<(String, NumericBucket)>,
}

impl BucketSet {
    pub fn empty() -> Self {
        Self {
            buckets: Vec::new(),
        }
    }

    /// Add or replace a bucket.
    pub fn with(mut self, name: impl Into<String>, bucket: NumericBucket) -> Self {
        let name = name.into();
        self.buckets.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.buckets.push((name, bucket));
        self
    }

    pub fn get(&self, name: &str) -> Option<&NumericBucket> {
        let name = name.trim();
        self.buckets
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, b)| b)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|(n, _)| n.as_str())
    }
}

impl Default for BucketSet {
    /// Deal-value buckets: `[0,1000)`, `[1000,5000]`, `(5000,10000]`, `(10000,∞)`.
    fn default() -> Self {
        use Bound::{Excluded, Included, Unbounded};
        Self::empty()
            .with("under_1000", NumericBucket::new(Included(0.0), Excluded(1000.0)))
            .with("1000_5000", NumericBucket::new(Included(1000.0), Included(5000.0)))
            .with("5000_10000", NumericBucket::new(Excluded(5000.0), Included(10_000.0)))
            .with("over_10000", NumericBucket::new(Excluded(10_000.0), Unbounded))
    }
}

// =============================================================================
// Dates
// =============================================================================

/// Date clause as picked in the UI. Partially filled or impossible calendar
/// dates resolve to "no constraint" instead of an empty view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DateFilter {
    #[default]
    None,
    Day {
        year: Option<i32>,
        month: Option<u32>,
        day: Option<u32>,
    },
    Month {
        year: Option<i32>,
        month: Option<u32>,
    },
    Range {
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
}

impl DateFilter {
    pub fn on_day(date: NaiveDate) -> Self {
        use chrono::Datelike;
        Self::Day {
            year: Some(date.year()),
            month: Some(date.month()),
            day: Some(date.day()),
        }
    }

    pub fn in_month(month: CalendarMonth) -> Self {
        Self::Month {
            year: Some(month.year()),
            month: Some(month.month()),
        }
    }

    pub fn between(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self::Range { start, end }
    }

    /// The executable clause, or `None` when this filter cannot exclude anything.
    pub fn resolve(&self) -> Option<DatePredicate> {
        match *self {
            Self::None => None,
            Self::Day {
                year: Some(y),
                month: Some(m),
                day: Some(d),
            } => {
                let date = NaiveDate::from_ymd_opt(y, m, d);
                if date.is_none() {
                    tracing::debug!(year = y, month = m, day = d, "ignoring impossible day filter");
                }
                date.map(DatePredicate::Day)
            }
            Self::Month {
                year: Some(y),
                month: Some(m),
            } => {
                let month = CalendarMonth::new(y, m);
                if month.is_none() {
                    tracing::debug!(year = y, month = m, "ignoring impossible month filter");
                }
                month.map(DatePredicate::Month)
            }
            Self::Range { start, end } if start.is_some() || end.is_some() => {
                Some(DatePredicate::Range { start, end })
            }
            _ => None,
        }
    }
}

/// A resolved, always-valid date clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePredicate {
    Day(NaiveDate),
    Month(CalendarMonth),
    Range {
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
}

impl DatePredicate {
    pub fn matches(&self, value: Option<DateTime<Utc>>, zone: CalendarZone) -> bool {
        match *self {
            Self::Day(day) => date_day_matches(value, day, zone),
            Self::Month(month) => date_month_matches(value, month, zone),
            Self::Range { start, end } => date_range_matches(value, start, end),
        }
    }
}
