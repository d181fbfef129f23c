//! # Rollup Sources
//!
//! A source is one independently dated collection: a name plus a way to
//! visit `(date, metric)` pairs. Collections share no key with each other,
//! only the notion of a date.

use chrono::{DateTime, Utc};

pub trait RollupSource {
    fn name(&self) -> &str;

    /// Visit every record's date and metric value, in any order.
    fn for_each_entry(&self, visit: &mut dyn FnMut(Option<DateTime<Utc>>, f64));
}

/// A borrowed slice of records with the extractors that date and measure
/// them.
pub struct Collection<'a, T, D, M> {
    name: String,
    records: &'a [T],
    date_of: D,
    metric_of: M,
}

impl<'a, T, D, M> Collection<'a, T, D, M>
where
    D: Fn(&T) -> Option<DateTime<Utc>>,
    M: Fn(&T) -> f64,
{
    pub fn new(name: impl Into<String>, records: &'a [T], date_of: D, metric_of: M) -> Self {
        Self {
            name: name.into(),
            records,
            date_of,
            metric_of,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a, T, D, M> RollupSource for Collection<'a, T, D, M>
where
    D: Fn(&T) -> Option<DateTime<Utc>>,
    M: Fn(&T) -> f64,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn for_each_entry(&self, visit: &mut dyn FnMut(Option<DateTime<Utc>>, f64)) {
        for record in self.records {
            visit((self.date_of)(record), (self.metric_of)(record));
        }
    }
}

/// Pre-extracted `(date, metric)` pairs, as produced by loaders that parse
/// records once and then drop them.
#[derive(Debug, Clone, Default)]
pub struct Entries {
    name: String,
    entries: Vec<(Option<DateTime<Utc>>, f64)>,
}

impl Entries {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, date: Option<DateTime<Utc>>, metric: f64) {
        self.entries.push((date, metric));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Extend<(Option<DateTime<Utc>>, f64)> for Entries {
    fn extend<I: IntoIterator<Item = (Option<DateTime<Utc>>, f64)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl RollupSource for Entries {
    fn name(&self) -> &str {
        &self.name
    }

    fn for_each_entry(&self, visit: &mut dyn FnMut(Option<DateTime<Utc>>, f64)) {
        for (date, metric) in &self.entries {
            visit(*date, *metric);
        }
    }
}
