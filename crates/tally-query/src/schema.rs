//! # Schema
//!
//! The registry of accessors that tells the pipeline how to read a record
//! type `T`: which fields free text searches, which named fields discrete
//! filters apply to, the numeric and date fields, and the sortable keys.
//!
//! A schema is built once per record type and shared; all accessors are
//! `Arc`ed, so cloning is cheap and the schema is `Send + Sync`.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use tally_core::access::{self, DateAccessor, NumberAccessor, TextAccessor};
use tally_core::{BucketSet, CalendarZone, SortClause, SortDirection, SortKey};

pub struct Schema<T> {
    search: Vec<TextAccessor<T>>,
    discrete: BTreeMap<String, TextAccessor<T>>,
    range: Option<NumberAccessor<T>>,
    date: Option<DateAccessor<T>>,
    sort_keys: BTreeMap<String, SortKey<T>>,
    tie_break: Option<SortClause>,
    buckets: BucketSet,
    zone: CalendarZone,
}

impl<T> Schema<T> {
    pub fn new() -> Self {
        Self {
            search: Vec::new(),
            discrete: BTreeMap::new(),
            range: None,
            date: None,
            sort_keys: BTreeMap::new(),
            tie_break: None,
            buckets: BucketSet::default(),
            zone: CalendarZone::default(),
        }
    }

    // -------------------------------------------------------------------------
    // Builder
    // -------------------------------------------------------------------------

    pub fn search<F>(self, get: F) -> Self
    where
        F: for<'a> Fn(&'a T) -> Option<&'a str> + Send + Sync + 'static,
    {
        self.search_accessor(access::text(get))
    }

    pub fn search_with<F>(self, get: F) -> Self
    where
        F: for<'a> Fn(&'a T) -> Option<Cow<'a, str>> + Send + Sync + 'static,
    {
        self.search_accessor(access::text_with(get))
    }

    pub fn search_accessor(mut self, accessor: TextAccessor<T>) -> Self {
        self.search.push(accessor);
        self
    }

    pub fn discrete<F>(self, field: impl Into<String>, get: F) -> Self
    where
        F: for<'a> Fn(&'a T) -> Option<&'a str> + Send + Sync + 'static,
    {
        self.discrete_accessor(field, access::text(get))
    }

    pub fn discrete_accessor(
        mut self,
        field: impl Into<String>,
        accessor: TextAccessor<T>,
    ) -> Self {
        self.discrete.insert(field.into(), accessor);
        self
    }

    /// The numeric field `FilterSpec::range` constrains.
    pub fn range<F>(mut self, get: F) -> Self
    where
        F: Fn(&T) -> Option<f64> + Send + Sync + 'static,
    {
        self.range = Some(access::number(get));
        self
    }

    /// The date field `FilterSpec::date` constrains.
    pub fn date<F>(mut self, get: F) -> Self
    where
        F: Fn(&T) -> Option<DateTime<Utc>> + Send + Sync + 'static,
    {
        self.date = Some(access::date(get));
        self
    }

    pub fn sort_text<F>(self, key: impl Into<String>, get: F) -> Self
    where
        F: for<'a> Fn(&'a T) -> Option<&'a str> + Send + Sync + 'static,
    {
        self.sort_key(key, SortKey::Text(access::text(get)))
    }

    pub fn sort_number<F>(self, key: impl Into<String>, get: F) -> Self
    where
        F: Fn(&T) -> Option<f64> + Send + Sync + 'static,
    {
        self.sort_key(key, SortKey::Number(access::number(get)))
    }

    pub fn sort_date<F>(self, key: impl Into<String>, get: F) -> Self
    where
        F: Fn(&T) -> Option<DateTime<Utc>> + Send + Sync + 'static,
    {
        self.sort_key(key, SortKey::Date(access::date(get)))
    }

    pub fn sort_key(mut self, key: impl Into<String>, sort_key: SortKey<T>) -> Self {
        self.sort_keys.insert(key.into(), sort_key);
        self
    }

    /// A registered sort key appended after every sort spec, typically a
    /// stable identifier, so the final order never depends on input order.
    pub fn tie_break(mut self, key: impl Into<String>, direction: SortDirection) -> Self {
        self.tie_break = Some(SortClause::new(key, direction));
        self
    }

    pub fn buckets(mut self, buckets: BucketSet) -> Self {
        self.buckets = buckets;
        self
    }

    pub fn zone(mut self, zone: CalendarZone) -> Self {
        self.zone = zone;
        self
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    pub fn search_fields(&self) -> &[TextAccessor<T>] {
        &self.search
    }

    pub fn discrete_field(&self, field: &str) -> Option<&TextAccessor<T>> {
        self.discrete.get(field)
    }

    pub fn discrete_names(&self) -> impl Iterator<Item = &str> {
        self.discrete.keys().map(String::as_str)
    }

    pub fn range_field(&self) -> Option<&NumberAccessor<T>> {
        self.range.as_ref()
    }

    pub fn date_field(&self) -> Option<&DateAccessor<T>> {
        self.date.as_ref()
    }

    pub fn sort_key_named(&self, key: &str) -> Option<&SortKey<T>> {
        self.sort_keys.get(key)
    }

    pub fn sort_names(&self) -> impl Iterator<Item = &str> {
        self.sort_keys.keys().map(String::as_str)
    }

    pub fn tie_break_clause(&self) -> Option<&SortClause> {
        self.tie_break.as_ref()
    }

    pub fn bucket_set(&self) -> &BucketSet {
        &self.buckets
    }

    pub fn calendar_zone(&self) -> CalendarZone {
        self.zone
    }
}

impl<T> Default for Schema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Schema<T> {
    fn clone(&self) -> Self {
        Self {
            search: self.search.clone(),
            discrete: self.discrete.clone(),
            range: self.range.clone(),
            date: self.date.clone(),
            sort_keys: self.sort_keys.clone(),
            tie_break: self.tie_break.clone(),
            buckets: self.buckets.clone(),
            zone: self.zone,
        }
    }
}

impl<T> fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("search_fields", &self.search.len())
            .field("discrete", &self.discrete.keys().collect::<Vec<_>>())
            .field("range", &self.range.is_some())
            .field("date", &self.date.is_some())
            .field("sort_keys", &self.sort_keys)
            .field("tie_break", &self.tie_break)
            .field("zone", &self.zone)
            .finish()
    }
}
