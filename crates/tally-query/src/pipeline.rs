//! # Query Pipeline
//!
//! `records -> search -> discrete -> range -> date -> stable sort -> View`.
//!
//! Every clause is compiled once per run into a [`FilterPlan`]; clauses that
//! cannot exclude anything (blank search, sentinel selections, unknown
//! fields, impossible dates) are dropped at compile time. The source
//! collection is only borrowed and the resulting [`View`] holds references.

use std::collections::BTreeMap;

use tally_core::access::{DateAccessor, NumberAccessor, TextAccessor};
use tally_core::predicate::is_sentinel;
use tally_core::{
    chain, compare_by, discrete_matches, numeric_range_matches, Comparator, DatePredicate,
    FilterSpec, NumericBucket, RangeFilter, SortClause, SortSpec, TextQuery,
};

use crate::paginate::{paginate, Page};
use crate::schema::Schema;

// =============================================================================
// View
// =============================================================================

/// The filtered, sorted, unpaginated result of a query.
///
/// Exporters consume the whole view; pagers slice it with [`View::paginate`].
pub struct View<'a, T> {
    rows: Vec<&'a T>,
}

impl<'a, T> View<'a, T> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a T> + '_ {
        self.rows.iter().copied()
    }

    pub fn as_slice(&self) -> &[&'a T] {
        &self.rows
    }

    pub fn into_vec(self) -> Vec<&'a T> {
        self.rows
    }

    pub fn paginate(&self, page_number: i64, page_size: usize) -> Page<&'a T> {
        paginate(&self.rows, page_number, page_size)
    }
}

impl<'a, T> Clone for View<'a, T> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
        }
    }
}

impl<'a, T: std::fmt::Debug> std::fmt::Debug for View<'a, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rows.iter()).finish()
    }
}

impl<'a, T> IntoIterator for View<'a, T> {
    type Item = &'a T;
    type IntoIter = std::vec::IntoIter<&'a T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

// =============================================================================
// Filter plan
// =============================================================================

/// The active clauses of a [`FilterSpec`], bound to a schema's accessors.
pub struct FilterPlan<'s, T> {
    search: Option<(TextQuery, &'s [TextAccessor<T>])>,
    discrete: Vec<(&'s TextAccessor<T>, &'s str)>,
    range: Option<(&'s NumberAccessor<T>, NumericBucket)>,
    date: Option<(&'s DateAccessor<T>, DatePredicate)>,
    schema: &'s Schema<T>,
}

impl<'s, T> FilterPlan<'s, T> {
    pub fn compile(schema: &'s Schema<T>, filter: &'s FilterSpec) -> Self {
        let search = filter
            .search
            .as_deref()
            .and_then(TextQuery::new)
            .and_then(|q| match schema.search_fields() {
                [] => {
                    tracing::debug!("ignoring search: schema has no search fields");
                    None
                }
                fields => Some((q, fields)),
            });

        let discrete = filter
            .discrete
            .iter()
            .filter(|(_, selected)| !is_sentinel(selected))
            .filter_map(|(field, selected)| match schema.discrete_field(field) {
                Some(accessor) => Some((accessor, selected.as_str())),
                None => {
                    tracing::debug!(field = %field, "ignoring filter on unknown discrete field");
                    None
                }
            })
            .collect();

        let range = filter
            .range
            .as_ref()
            .and_then(|range| resolve_range(schema, range))
            .and_then(|bucket| match schema.range_field() {
                Some(accessor) => Some((accessor, bucket)),
                None => {
                    tracing::debug!("ignoring range filter: schema has no numeric field");
                    None
                }
            });

        let date = filter
            .date
            .resolve()
            .and_then(|predicate| match schema.date_field() {
                Some(accessor) => Some((accessor, predicate)),
                None => {
                    tracing::debug!("ignoring date filter: schema has no date field");
                    None
                }
            });

        Self {
            search,
            discrete,
            range,
            date,
            schema,
        }
    }

    /// `true` when the plan keeps every record.
    pub fn is_noop(&self) -> bool {
        self.search.is_none()
            && self.discrete.is_empty()
            && self.range.is_none()
            && self.date.is_none()
    }

    pub fn matches(&self, record: &T) -> bool {
        if let Some((query, fields)) = &self.search {
            if !query.matches(record, fields) {
                return false;
            }
        }
        let discrete_ok = self.discrete.iter().all(|(get, selected)| {
            discrete_matches(get(record).as_deref(), Some(*selected))
        });
        if !discrete_ok {
            return false;
        }
        if let Some((get, bucket)) = &self.range {
            if !numeric_range_matches(get(record), bucket) {
                return false;
            }
        }
        if let Some((get, predicate)) = &self.date {
            if !predicate.matches(get(record), self.schema.calendar_zone()) {
                return false;
            }
        }
        true
    }
}

fn resolve_range<T>(schema: &Schema<T>, range: &RangeFilter) -> Option<NumericBucket> {
    match range {
        RangeFilter::Bucket(name) if is_sentinel(name) => None,
        RangeFilter::Bucket(name) => {
            let bucket = schema.bucket_set().get(name).copied();
            if bucket.is_none() {
                tracing::debug!(bucket = %name, "ignoring unknown range bucket");
            }
            bucket
        }
        RangeFilter::Between(exact) if exact.is_unbounded() => None,
        RangeFilter::Between(exact) => Some(exact.to_bucket()),
    }
}

// =============================================================================
// Sorting
// =============================================================================

/// The comparator for `sort` followed by the schema's tie-break, or `None`
/// when neither names a registered key (source order is kept).
pub fn build_comparator<T: 'static>(schema: &Schema<T>, sort: &SortSpec) -> Option<Comparator<T>> {
    if sort.is_unsorted() && schema.tie_break_clause().is_none() {
        return None;
    }
    let comparators: Vec<Comparator<T>> = sort
        .clauses
        .iter()
        .chain(schema.tie_break_clause())
        .filter_map(|clause| clause_comparator(schema, clause))
        .collect();

    match comparators.len() {
        0 => None,
        1 => comparators.into_iter().next(),
        _ => Some(chain(comparators)),
    }
}

fn clause_comparator<T: 'static>(schema: &Schema<T>, clause: &SortClause) -> Option<Comparator<T>> {
    match schema.sort_key_named(&clause.key) {
        Some(key) => Some(compare_by(key.clone(), clause.direction)),
        None => {
            tracing::debug!(key = %clause.key, "ignoring unknown sort key");
            None
        }
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Filter then stably sort `records` into a new [`View`].
///
/// Accepts any iterator of references, so a previous view can be fed back
/// in: `run_query(view.iter(), ..)`.
pub fn run_query<'a, T, I>(
    records: I,
    schema: &Schema<T>,
    filter: &FilterSpec,
    sort: &SortSpec,
) -> View<'a, T>
where
    T: 'static,
    I: IntoIterator<Item = &'a T>,
{
    let plan = FilterPlan::compile(schema, filter);
    let mut rows: Vec<&'a T> = if plan.is_noop() {
        records.into_iter().collect()
    } else {
        records.into_iter().filter(|r| plan.matches(r)).collect()
    };

    if let Some(cmp) = build_comparator(schema, sort) {
        rows.sort_by(|a, b| cmp(*a, *b));
    }

    tracing::trace!(matched = rows.len(), "query complete");
    View { rows }
}

/// Record counts per value of a discrete field, case-folded. Records with
/// no value are counted under `""`. Unknown fields yield an empty map.
pub fn facet_counts<'a, T, I>(
    records: I,
    schema: &Schema<T>,
    field: &str,
) -> BTreeMap<String, usize>
where
    T: 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut counts = BTreeMap::new();
    let Some(get) = schema.discrete_field(field) else {
        return counts;
    };
    for record in records {
        let key = get(record)
            .map(|v| v.trim().to_lowercase())
            .unwrap_or_default();
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use tally_core::{
        CalendarMonth, CalendarZone, DateFilter, NumericRange, SortDirection,
    };

    #[derive(Debug, Clone, PartialEq)]
    struct Lead {
        id: u32,
        name: String,
        status: Option<String>,
        owner: Option<String>,
        value: Option<f64>,
        created_at: Option<DateTime<Utc>>,
    }

    fn lead(id: u32, name: &str, status: &str) -> Lead {
        Lead {
            id,
            name: name.into(),
            status: Some(status.into()),
            owner: None,
            value: None,
            created_at: None,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn schema() -> Schema<Lead> {
        Schema::new()
            .search(|l: &Lead| Some(l.name.as_str()))
            .discrete("status", |l: &Lead| l.status.as_deref())
            .discrete("owner", |l: &Lead| l.owner.as_deref())
            .range(|l: &Lead| l.value)
            .date(|l: &Lead| l.created_at)
            .sort_text("name", |l: &Lead| Some(l.name.as_str()))
            .sort_number("value", |l: &Lead| l.value)
            .sort_date("created_at", |l: &Lead| l.created_at)
            .sort_number("id", |l: &Lead| Some(f64::from(l.id)))
            .zone(CalendarZone::utc())
    }

    fn ids(view: &View<'_, Lead>) -> Vec<u32> {
        view.iter().map(|l| l.id).collect()
    }

    fn alpha_beta() -> Vec<Lead> {
        vec![lead(1, "Alpha", "New"), lead(2, "Beta", "Closed")]
    }

    #[test]
    fn test_search_scenario() {
        let leads = alpha_beta();
        let filter = FilterSpec::new().search("alp");
        let view = run_query(&leads, &schema(), &filter, &SortSpec::unsorted());
        assert_eq!(ids(&view), vec![1]);
    }

    #[test]
    fn test_search_without_search_fields_is_ignored() {
        let leads = alpha_beta();
        let schema = Schema::new().discrete("status", |l: &Lead| l.status.as_deref());
        let filter = FilterSpec::new().search("zzz");
        assert!(FilterPlan::compile(&schema, &filter).is_noop());
        let view = run_query(&leads, &schema, &filter, &SortSpec::unsorted());
        assert_eq!(ids(&view), vec![1, 2]);
    }

    #[test]
    fn test_discrete_sentinel_scenario() {
        let leads = alpha_beta();
        let filter = FilterSpec::new().discrete("status", "all");
        let view = run_query(&leads, &schema(), &filter, &SortSpec::unsorted());
        assert_eq!(ids(&view), vec![1, 2]);
    }

    #[test]
    fn test_discrete_selection() {
        let leads = alpha_beta();
        let filter = FilterSpec::new().discrete("status", "closed");
        let view = run_query(&leads, &schema(), &filter, &SortSpec::unsorted());
        assert_eq!(ids(&view), vec![2]);
    }

    #[test]
    fn test_date_day_scenario() {
        let mut leads = alpha_beta();
        leads[0].created_at = Some(day(2024, 3, 1));
        leads[1].created_at = Some(day(2024, 3, 2));
        let target = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let filter = FilterSpec::new().date(DateFilter::on_day(target));
        let view = run_query(&leads, &schema(), &filter, &SortSpec::unsorted());
        assert_eq!(ids(&view), vec![1]);
    }

    #[test]
    fn test_date_month_and_range() {
        let mut leads = alpha_beta();
        leads.push(lead(3, "Gamma", "New"));
        leads[0].created_at = Some(day(2024, 2, 28));
        leads[1].created_at = Some(day(2024, 3, 2));
        let unsorted = SortSpec::unsorted();
        let march = CalendarMonth::new(2024, 3).unwrap();
        let in_march = FilterSpec::new().date(DateFilter::in_month(march));
        assert_eq!(ids(&run_query(&leads, &schema(), &in_march, &unsorted)), vec![2]);

        let since = FilterSpec::new().date(DateFilter::between(Some(day(2024, 2, 1)), None));
        assert_eq!(ids(&run_query(&leads, &schema(), &since, &unsorted)), vec![1, 2]);
    }

    #[test]
    fn test_clauses_combine_with_and() {
        let mut leads = vec![
            lead(1, "Acme", "New"),
            lead(2, "Acme West", "Closed"),
            lead(3, "Acme East", "New"),
            lead(4, "Globex", "New"),
        ];
        leads[0].value = Some(500.0);
        leads[2].value = Some(7_500.0);
        leads[3].value = Some(200.0);
        let filter = FilterSpec::new()
            .search("acme")
            .discrete("status", "new")
            .bucket("under_1000");
        let view = run_query(&leads, &schema(), &filter, &SortSpec::unsorted());
        assert_eq!(ids(&view), vec![1]);
    }

    #[test]
    fn test_two_discrete_fields_combine_with_and() {
        fn owned(id: u32, status: &str, owner: &str) -> Lead {
            Lead {
                owner: Some(owner.into()),
                ..lead(id, "Lead", status)
            }
        }
        let leads = vec![
            owned(1, "New", "Ann"),
            owned(2, "New", "Bob"),
            owned(3, "Closed", "Ann"),
            lead(4, "Lead", "New"),
        ];
        let filter = FilterSpec::new()
            .discrete("status", "new")
            .discrete("owner", "ANN");
        let view = run_query(&leads, &schema(), &filter, &SortSpec::unsorted());
        assert_eq!(ids(&view), vec![1]);

        let any_owner = filter.clone().discrete("owner", "all");
        let view = run_query(&leads, &schema(), &any_owner, &SortSpec::unsorted());
        assert_eq!(ids(&view), vec![1, 2, 4]);
    }

    #[test]
    fn test_exact_range_and_missing_value() {
        let mut leads = alpha_beta();
        leads[0].value = Some(50.0);
        let filter = FilterSpec::new().between(NumericRange::new(Some(0.0), Some(10.0)));
        // Beta has no value and counts as 0.
        let view = run_query(&leads, &schema(), &filter, &SortSpec::unsorted());
        assert_eq!(ids(&view), vec![2]);
    }

    #[test]
    fn test_bad_controls_never_blank_the_view() {
        let leads = alpha_beta();
        let filter = FilterSpec::new()
            .discrete("no_such_field", "x")
            .bucket("no_such_bucket")
            .date(DateFilter::Day {
                year: Some(2024),
                month: Some(2),
                day: Some(31),
            });
        let view = run_query(&leads, &schema(), &filter, &SortSpec::unsorted());
        assert_eq!(ids(&view), vec![1, 2]);
    }

    #[test]
    fn test_sort_with_unknown_key_keeps_order() {
        let leads = alpha_beta();
        let sort = SortSpec::by("nope", SortDirection::Desc);
        let view = run_query(&leads, &schema(), &FilterSpec::new(), &sort);
        assert_eq!(ids(&view), vec![1, 2]);
    }

    #[test]
    fn test_sort_desc_and_tie_break() {
        let leads = vec![
            lead(3, "Same", "New"),
            lead(1, "Same", "New"),
            lead(2, "Other", "New"),
        ];
        let schema = schema().tie_break("id", SortDirection::Asc);
        let sort = SortSpec::by("name", SortDirection::Desc);
        let view = run_query(&leads, &schema, &FilterSpec::new(), &sort);
        assert_eq!(ids(&view), vec![1, 3, 2]);
    }

    #[test]
    fn test_source_is_untouched() {
        let leads = vec![lead(2, "B", "New"), lead(1, "A", "New")];
        let before = leads.clone();
        let sort = SortSpec::by("name", SortDirection::Asc);
        let view = run_query(&leads, &schema(), &FilterSpec::new(), &sort);
        assert_eq!(ids(&view), vec![1, 2]);
        assert_eq!(view.into_vec(), vec![&leads[1], &leads[0]]);
        assert_eq!(leads, before);
    }

    #[test]
    fn test_empty_input() {
        let leads: Vec<Lead> = Vec::new();
        let filter = FilterSpec::new().search("x");
        let view = run_query(&leads, &schema(), &filter, &SortSpec::unsorted());
        assert!(view.is_empty());
        assert_eq!(view.paginate(1, 10).total_pages, 0);
    }

    #[test]
    fn test_facet_counts() {
        let leads = vec![
            lead(1, "A", "New"),
            lead(2, "B", "new "),
            lead(3, "C", "Closed"),
            Lead {
                status: None,
                ..lead(4, "D", "")
            },
        ];
        let counts = facet_counts(&leads, &schema(), "status");
        assert_eq!(counts.get("new"), Some(&2));
        assert_eq!(counts.get("closed"), Some(&1));
        assert_eq!(counts.get(""), Some(&1));
        assert!(facet_counts(&leads, &schema(), "region").is_empty());
    }

    // -------------------------------------------------------------------------
    // Randomized properties
    // -------------------------------------------------------------------------

    const STATUSES: [&str; 3] = ["New", "Contacted", "Closed"];
    const NAMES: [&str; 5] = ["Alpha", "Beta", "alpha", "Gamma", "Delta"];

    fn random_leads(rng: &mut StdRng, n: usize) -> Vec<Lead> {
        (0..n)
            .map(|i| Lead {
                id: i as u32,
                name: NAMES.choose(rng).copied().unwrap_or("x").to_string(),
                status: STATUSES.choose(rng).map(|s| s.to_string()),
                owner: None,
                value: rng.gen_bool(0.8).then(|| f64::from(rng.gen_range(0u32..20_000))),
                created_at: rng
                    .gen_bool(0.9)
                    .then(|| day(2024, rng.gen_range(1..=12), rng.gen_range(1..=28))),
            })
            .collect()
    }

    fn random_filter(rng: &mut StdRng) -> FilterSpec {
        let mut filter = FilterSpec::new();
        if rng.gen_bool(0.5) {
            filter = filter.search(["a", "ph", "ET", ""].choose(rng).copied().unwrap_or(""));
        }
        if rng.gen_bool(0.5) {
            let status = ["new", "all", "Closed"].choose(rng).copied().unwrap_or("all");
            filter = filter.discrete("status", status);
        }
        if rng.gen_bool(0.3) {
            let buckets = ["under_1000", "1000_5000", "over_10000"];
            filter = filter.bucket(buckets.choose(rng).copied().unwrap_or("all"));
        }
        if rng.gen_bool(0.3) {
            let month = CalendarMonth::new(2024, rng.gen_range(1..=12)).unwrap();
            filter = filter.date(DateFilter::in_month(month));
        }
        filter
    }

    fn random_sort(rng: &mut StdRng) -> SortSpec {
        let keys = ["name", "value", "created_at"];
        let dirs = [SortDirection::Asc, SortDirection::Desc];
        let key = keys.choose(rng).copied().unwrap_or("name");
        let dir = dirs.choose(rng).copied().unwrap_or_default();
        SortSpec::by(key, dir)
    }

    #[test]
    fn test_neutral_filter_is_identity_up_to_sort() {
        let mut rng = StdRng::seed_from_u64(7);
        let schema = schema();
        let neutral = FilterSpec::new()
            .search("  ")
            .discrete("status", "all")
            .between(NumericRange::from_inputs("", "not a number"));
        for _ in 0..50 {
            let n = rng.gen_range(0..60);
            let leads = random_leads(&mut rng, n);
            let sort = random_sort(&mut rng);

            let view = run_query(&leads, &schema, &neutral, &sort);
            assert_eq!(view.len(), leads.len());

            let mut expected: Vec<&Lead> = leads.iter().collect();
            if let Some(cmp) = build_comparator(&schema, &sort) {
                expected.sort_by(|a, b| cmp(*a, *b));
            }
            assert_eq!(view.as_slice(), expected.as_slice());

            let mut seen: Vec<u32> = ids(&view);
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen.len(), leads.len());
        }
    }

    #[test]
    fn test_reapplying_query_changes_nothing() {
        let mut rng = StdRng::seed_from_u64(11);
        let schema = schema();
        for _ in 0..100 {
            let n = rng.gen_range(0..60);
            let leads = random_leads(&mut rng, n);
            let filter = random_filter(&mut rng);
            let sort = random_sort(&mut rng);

            let once = run_query(&leads, &schema, &filter, &sort);
            let twice = run_query(once.iter(), &schema, &filter, &sort);
            assert_eq!(ids(&once), ids(&twice));
        }
    }

    #[test]
    fn test_pages_reconstruct_view() {
        let mut rng = StdRng::seed_from_u64(23);
        let schema = schema();
        for _ in 0..50 {
            let n = rng.gen_range(0..80);
            let leads = random_leads(&mut rng, n);
            let view = run_query(&leads, &schema, &random_filter(&mut rng), &random_sort(&mut rng));
            let size = rng.gen_range(1..15);
            let total = view.paginate(1, size).total_pages;
            let rebuilt: Vec<&Lead> = (1..=total as i64)
                .flat_map(|p| view.paginate(p, size).items)
                .collect();
            assert_eq!(rebuilt.as_slice(), view.as_slice());
        }
    }
}
