//! # Comparator Library
//!
//! Typed ascending comparisons composed into a total order.
//!
//! - text: byte-wise ordinal, case-sensitive (lower-case in the accessor for
//!   a case-insensitive order);
//! - number: IEEE total order, NaN treated as missing;
//! - date: epoch milliseconds.
//!
//! Missing values order before present ones when ascending. Equal values
//! compare `Equal`, so a stable sort keeps their source order.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::access::{DateAccessor, NumberAccessor, TextAccessor};
use crate::sort::SortDirection;

pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKind {
    String,
    Number,
    Date,
}

/// A typed field a view can be sorted by.
pub enum SortKey<T> {
    Text(TextAccessor<T>),
    Number(NumberAccessor<T>),
    Date(DateAccessor<T>),
}

impl<T> Clone for SortKey<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Text(f) => Self::Text(Arc::clone(f)),
            Self::Number(f) => Self::Number(Arc::clone(f)),
            Self::Date(f) => Self::Date(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for SortKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SortKey::{:?}", self.kind())
    }
}

impl<T> SortKey<T> {
    pub fn kind(&self) -> SortKind {
        match self {
            Self::Text(_) => SortKind::String,
            Self::Number(_) => SortKind::Number,
            Self::Date(_) => SortKind::Date,
        }
    }

    pub fn compare_asc(&self, a: &T, b: &T) -> Ordering {
        match self {
            Self::Text(get) => get(a).cmp(&get(b)),
            Self::Number(get) => compare_numbers(get(a), get(b)),
            Self::Date(get) => get(a)
                .map(|d| d.timestamp_millis())
                .cmp(&get(b).map(|d| d.timestamp_millis())),
        }
    }
}

fn compare_numbers(a: Option<f64>, b: Option<f64>) -> Ordering {
    let a = a.filter(|v| !v.is_nan());
    let b = b.filter(|v| !v.is_nan());
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn compare_by<T: 'static>(key: SortKey<T>, direction: SortDirection) -> Comparator<T> {
    Arc::new(move |a: &T, b: &T| direction.apply(key.compare_asc(a, b)))
}

/// First non-`Equal` result, left to right.
pub fn chain<T: 'static>(comparators: Vec<Comparator<T>>) -> Comparator<T> {
    Arc::new(move |a: &T, b: &T| {
        comparators
            .iter()
            .map(|cmp| cmp(a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}
