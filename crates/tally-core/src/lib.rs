//! # tally-core: The "Vocabulary" of TALLY
//!
//! Plain-data descriptions of what an operator asked for ([`FilterSpec`],
//! [`SortSpec`], [`TimeWindow`]) and the pure functions that evaluate them
//! against a single record:
//!
//! - [`predicate`]: text, discrete, numeric-range and calendar matches;
//! - [`compare`]: typed comparators and tie-break chaining;
//! - [`calendar`]: the zone every calendar question is answered in.
//!
//! Records are opaque. Each field the engine reads is described by an
//! [`access`] closure supplied by the caller.

pub mod access;
pub mod calendar;
pub mod compare;
pub mod error;
pub mod filter;
pub mod predicate;
pub mod sort;

pub use access::{DateAccessor, NumberAccessor, TextAccessor};
pub use calendar::{CalendarMonth, CalendarZone, TimeWindow, WindowBounds};
pub use compare::{chain, compare_by, Comparator, SortKey, SortKind};
pub use error::ParseError;
pub use filter::{
    BucketSet, DateFilter, DatePredicate, FilterSpec, NumericBucket, NumericRange, RangeFilter,
};
pub use predicate::{
    date_day_matches, date_month_matches, date_range_matches, discrete_matches, is_sentinel,
    numeric_range_matches, text_matches, TextQuery,
};
pub use sort::{SortClause, SortDirection, SortSpec};
