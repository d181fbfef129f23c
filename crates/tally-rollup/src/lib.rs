//! # tally-rollup: The "Ledger" of TALLY
//!
//! Time-windowed sums over collections that share nothing but a date field,
//! and the composite figures derived from them (`net = revenue - expenses`).
//!
//! `now` is always an argument. Nothing here reads the wall clock, so the
//! same inputs always produce the same [`RollupResult`]s.

pub mod engine;
pub mod source;

pub use engine::{compute_rollups, DerivedMetric, RollupEngine, RollupResult, WindowSums};
pub use source::{Collection, Entries, RollupSource};
