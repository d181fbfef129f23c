//! # Rollup Engine
//!
//! Sums each source's metric over every requested [`TimeWindow`] and then
//! evaluates derived metrics on those sums.
//!
//! - Window bounds are resolved once per call against the caller's `now`.
//! - Each source is read in a single pass that feeds all windows at once.
//! - `Lifetime` adds every value without looking at its date, so it always
//!   equals the all-time total (records without a date included).
//! - Derived metrics only ever see the sums of their own window.
//!
//! The engine keeps no state between calls.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use tally_core::{CalendarZone, TimeWindow, WindowBounds};

use crate::source::RollupSource;

// =============================================================================
// Results
// =============================================================================

/// The per-collection sums of one window, as seen by a derived metric.
#[derive(Debug, Clone, Copy)]
pub struct WindowSums<'a> {
    pub window: TimeWindow,
    sums: &'a BTreeMap<String, f64>,
}

impl<'a> WindowSums<'a> {
    /// Sum for `collection`; `0` when no such collection was rolled up.
    pub fn get(&self, collection: &str) -> f64 {
        self.sums.get(collection).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollupResult {
    pub window: TimeWindow,
    pub per_collection: BTreeMap<String, f64>,
    pub derived: BTreeMap<String, f64>,
}

impl RollupResult {
    pub fn sum(&self, collection: &str) -> f64 {
        self.per_collection.get(collection).copied().unwrap_or(0.0)
    }

    pub fn derived(&self, metric: &str) -> Option<f64> {
        self.derived.get(metric).copied()
    }
}

// =============================================================================
// Derived metrics
// =============================================================================

type DeriveFn = Arc<dyn Fn(&WindowSums<'_>) -> f64 + Send + Sync>;

#[derive(Clone)]
pub struct DerivedMetric {
    name: String,
    derive: DeriveFn,
}

impl DerivedMetric {
    pub fn new<F>(name: impl Into<String>, derive: F) -> Self
    where
        F: Fn(&WindowSums<'_>) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            derive: Arc::new(derive),
        }
    }

    /// `sum(plus) - sum(minus)`, the shape of every net/balance figure.
    pub fn linear(name: impl Into<String>, plus: Vec<String>, minus: Vec<String>) -> Self {
        Self::new(name, move |sums: &WindowSums<'_>| {
            let gained: f64 = plus.iter().map(|c| sums.get(c)).sum();
            let spent: f64 = minus.iter().map(|c| sums.get(c)).sum();
            gained - spent
        })
    }

    pub fn difference(name: impl Into<String>, minuend: &str, subtrahend: &str) -> Self {
        Self::linear(name, vec![minuend.to_string()], vec![subtrahend.to_string()])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, sums: &WindowSums<'_>) -> f64 {
        (self.derive)(sums)
    }
}

impl fmt::Debug for DerivedMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedMetric").field("name", &self.name).finish()
    }
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct RollupEngine {
    derived: Vec<DerivedMetric>,
    zone: CalendarZone,
}

impl RollupEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The zone calendar windows are cut in.
    pub fn with_zone(mut self, zone: CalendarZone) -> Self {
        self.zone = zone;
        self
    }

    pub fn derive(mut self, metric: DerivedMetric) -> Self {
        self.derived.push(metric);
        self
    }

    pub fn compute(
        &self,
        sources: &[&dyn RollupSource],
        now: &DateTime<Utc>,
        windows: &[TimeWindow],
    ) -> Vec<RollupResult> {
        let bounds: Vec<(TimeWindow, WindowBounds)> = windows
            .iter()
            .map(|w| (*w, w.resolve(now, self.zone)))
            .collect();

        let mut per_window: Vec<BTreeMap<String, f64>> = vec![BTreeMap::new(); bounds.len()];
        for source in sources {
            let totals = window_totals(*source, &bounds);
            for (sums, total) in per_window.iter_mut().zip(totals) {
                *sums.entry(source.name().to_string()).or_insert(0.0) += total;
            }
        }

        let results: Vec<RollupResult> = bounds
            .iter()
            .zip(per_window)
            .map(|((window, _), per_collection)| {
                let view = WindowSums {
                    window: *window,
                    sums: &per_collection,
                };
                let derived = self
                    .derived
                    .iter()
                    .map(|m| (m.name.clone(), m.evaluate(&view)))
                    .collect();
                RollupResult {
                    window: *window,
                    per_collection,
                    derived,
                }
            })
            .collect();

        tracing::trace!(
            sources = sources.len(),
            windows = windows.len(),
            "rollup complete"
        );
        results
    }
}

/// One pass over `source`, returning its sum for each window in `bounds`.
fn window_totals(source: &dyn RollupSource, bounds: &[(TimeWindow, WindowBounds)]) -> Vec<f64> {
    let mut totals = vec![0.0; bounds.len()];
    source.for_each_entry(&mut |date, metric| {
        let metric = if metric.is_finite() { metric } else { 0.0 };
        for (total, (window, range)) in totals.iter_mut().zip(bounds) {
            let counted = match window {
                TimeWindow::Lifetime => true,
                _ => date.is_some_and(|d| range.contains(&d)),
            };
            if counted {
                *total += metric;
            }
        }
    });
    totals
}

/// Sums without derived metrics, with calendar windows cut in the local zone.
pub fn compute_rollups(
    sources: &[&dyn RollupSource],
    now: &DateTime<Utc>,
    windows: &[TimeWindow],
) -> Vec<RollupResult> {
    RollupEngine::new().compute(sources, now, windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Collection, Entries};
    use chrono::{Duration, TimeZone};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[derive(Debug, Clone)]
    struct Txn {
        at: Option<DateTime<Utc>>,
        amount: f64,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn txn(at: DateTime<Utc>, amount: f64) -> Txn {
        Txn {
            at: Some(at),
            amount,
        }
    }

    fn collection<'a>(
        name: &str,
        txns: &'a [Txn],
    ) -> Collection<'a, Txn, impl Fn(&Txn) -> Option<DateTime<Utc>>, impl Fn(&Txn) -> f64> {
        Collection::new(name, txns, |t: &Txn| t.at, |t: &Txn| t.amount)
    }

    fn net_engine() -> RollupEngine {
        RollupEngine::new()
            .with_zone(CalendarZone::utc())
            .derive(DerivedMetric::difference("net", "revenue", "expenses"))
    }

    #[test]
    fn test_net_per_window() {
        let revenue = vec![txn(now(), 100.0)];
        let expenses = vec![txn(now(), 40.0)];
        let a = collection("revenue", &revenue);
        let b = collection("expenses", &expenses);

        let results = net_engine().compute(&[&a, &b], &now(), &TimeWindow::ALL);
        for result in &results {
            assert_eq!(result.derived("net"), Some(60.0), "{:?}", result.window);
        }

        let last_year = now() - Duration::days(366);
        let prior = net_engine().compute(&[&a, &b], &last_year, &[TimeWindow::Year]);
        assert_eq!(prior[0].sum("revenue"), 0.0);
        assert_eq!(prior[0].sum("expenses"), 0.0);
        assert_eq!(prior[0].derived("net"), Some(0.0));
    }

    #[test]
    fn test_windows_are_half_open() {
        let midnight = Utc.with_ymd_and_hms(2024, 6, 16, 0, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        let txns = vec![txn(start, 1.0), txn(midnight, 10.0)];
        let a = collection("revenue", &txns);
        let day = net_engine().compute(&[&a], &now(), &[TimeWindow::Day]);
        assert_eq!(day[0].sum("revenue"), 1.0);
    }

    #[test]
    fn test_month_and_year_boundaries() {
        let txns = vec![
            txn(Utc.with_ymd_and_hms(2024, 5, 31, 23, 59, 59).unwrap(), 1.0),
            txn(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(), 2.0),
            txn(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), 4.0),
            txn(Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap(), 8.0),
        ];
        let a = collection("revenue", &txns);
        let results = net_engine().compute(&[&a], &now(), &TimeWindow::ALL);
        let sums: Vec<f64> = results.iter().map(|r| r.sum("revenue")).collect();
        assert_eq!(sums, vec![0.0, 2.0, 7.0, 15.0]);
    }

    #[test]
    fn test_zone_moves_the_day() {
        // 23:30 UTC on the 15th is already the 16th at +02:00.
        let late = Utc.with_ymd_and_hms(2024, 6, 15, 23, 30, 0).unwrap();
        let txns = vec![txn(now(), 5.0)];
        let a = collection("revenue", &txns);
        let engine = RollupEngine::new().with_zone(CalendarZone::fixed_seconds(2 * 3600));
        let day = engine.compute(&[&a], &late, &[TimeWindow::Day]);
        assert_eq!(day[0].sum("revenue"), 0.0);
    }

    #[test]
    fn test_undated_and_non_finite_values() {
        let txns = vec![
            Txn {
                at: None,
                amount: 3.0,
            },
            txn(now(), f64::NAN),
            txn(now(), f64::INFINITY),
            txn(now(), 2.0),
        ];
        let a = collection("revenue", &txns);
        let results = net_engine().compute(&[&a], &now(), &[TimeWindow::Day, TimeWindow::Lifetime]);
        assert_eq!(results[0].sum("revenue"), 2.0);
        assert_eq!(results[1].sum("revenue"), 5.0);
    }

    #[test]
    fn test_empty_collections_sum_to_zero() {
        let none: Vec<Txn> = Vec::new();
        let a = collection("revenue", &none);
        let b = collection("expenses", &none);
        let results = net_engine().compute(&[&a, &b], &now(), &TimeWindow::ALL);
        assert_eq!(results.len(), 4);
        for result in results {
            assert_eq!(result.per_collection.get("revenue"), Some(&0.0));
            assert_eq!(result.per_collection.get("expenses"), Some(&0.0));
            assert_eq!(result.derived("net"), Some(0.0));
        }
        assert!(compute_rollups(&[], &now(), &TimeWindow::ALL)
            .iter()
            .all(|r| r.per_collection.is_empty() && r.derived.is_empty()));
    }

    #[test]
    fn test_results_follow_requested_windows() {
        let windows = [TimeWindow::Lifetime, TimeWindow::Day];
        let results = compute_rollups(&[], &now(), &windows);
        let got: Vec<TimeWindow> = results.iter().map(|r| r.window).collect();
        assert_eq!(got, windows.to_vec());
    }

    #[test]
    fn test_unknown_collection_in_derived_metric_reads_zero() {
        let txns = vec![txn(now(), 9.0)];
        let a = collection("revenue", &txns);
        let engine = RollupEngine::new()
            .with_zone(CalendarZone::utc())
            .derive(DerivedMetric::linear(
                "net",
                vec!["revenue".into(), "memberships".into()],
                vec!["refunds".into()],
            ))
            .derive(DerivedMetric::new("half", |s: &WindowSums<'_>| s.get("revenue") / 2.0));
        let result = &engine.compute(&[&a], &now(), &[TimeWindow::Day])[0];
        assert_eq!(result.derived("net"), Some(9.0));
        assert_eq!(result.derived("half"), Some(4.5));
    }

    #[test]
    fn test_entries_source() {
        let mut entries = Entries::new("expenses");
        entries.push(Some(now()), 12.0);
        entries.extend([(None, 1.0), (Some(now() - Duration::days(40)), 3.0)]);
        let windows = [TimeWindow::Month, TimeWindow::Lifetime];
        let results = net_engine().compute(&[&entries], &now(), &windows);
        assert_eq!(results[0].sum("expenses"), 12.0);
        assert_eq!(results[1].sum("expenses"), 16.0);
        assert_eq!(results[0].derived("net"), Some(-12.0));
    }

    #[test]
    fn test_result_json_shape() {
        let txns = vec![txn(now(), 100.0)];
        let a = collection("revenue", &txns);
        let results = net_engine().compute(&[&a], &now(), &[TimeWindow::Month]);
        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "window": "month",
                "per_collection": {"revenue": 100.0},
                "derived": {"net": 100.0}
            }])
        );
    }

    #[test]
    fn test_sums_are_additive_over_disjoint_splits() {
        let mut rng = StdRng::seed_from_u64(42);
        let engine = RollupEngine::new().with_zone(CalendarZone::utc());
        for _ in 0..50 {
            let n = rng.gen_range(0..100);
            let txns: Vec<Txn> = (0..n)
                .map(|_| Txn {
                    at: rng
                        .gen_bool(0.9)
                        .then(|| now() - Duration::hours(rng.gen_range(0..24 * 800))),
                    amount: f64::from(rng.gen_range(-500i32..5_000)),
                })
                .collect();
            let (left, right): (Vec<Txn>, Vec<Txn>) =
                txns.iter().cloned().partition(|_| rng.gen_bool(0.5));

            let whole = collection("c", &txns);
            let l = collection("c", &left);
            let r = collection("c", &right);
            let all = engine.compute(&[&whole], &now(), &TimeWindow::ALL);
            let parts_l = engine.compute(&[&l], &now(), &TimeWindow::ALL);
            let parts_r = engine.compute(&[&r], &now(), &TimeWindow::ALL);
            for i in 0..TimeWindow::ALL.len() {
                assert_eq!(all[i].sum("c"), parts_l[i].sum("c") + parts_r[i].sum("c"));
            }

            // Two sources with the same name merge into one sum.
            let merged = engine.compute(&[&l, &r], &now(), &TimeWindow::ALL);
            assert_eq!(merged, all);
        }
    }
}
