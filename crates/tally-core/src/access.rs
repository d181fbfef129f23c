//! Field accessors.
//!
//! The engine never looks inside a record. Callers describe each field it
//! needs with a closure; a `None` result means "the record has no value here".

use std::borrow::Cow;
use std::sync::Arc;

use chrono::{DateTime, Utc};

pub type TextAccessor<T> = Arc<dyn for<'a> Fn(&'a T) -> Option<Cow<'a, str>> + Send + Sync>;
pub type NumberAccessor<T> = Arc<dyn Fn(&T) -> Option<f64> + Send + Sync>;
pub type DateAccessor<T> = Arc<dyn Fn(&T) -> Option<DateTime<Utc>> + Send + Sync>;

/// Wrap a borrowing string getter.
pub fn text<T, F>(get: F) -> TextAccessor<T>
where
    F: for<'a> Fn(&'a T) -> Option<&'a str> + Send + Sync + 'static,
{
    text_with(move |record| get(record).map(Cow::Borrowed))
}

/// Wrap a getter that builds its string (e.g. a joined full name).
pub fn text_with<T, F>(get: F) -> TextAccessor<T>
where
    F: for<'a> Fn(&'a T) -> Option<Cow<'a, str>> + Send + Sync + 'static,
{
    Arc::new(get)
}

pub fn number<T, F>(get: F) -> NumberAccessor<T>
where
    F: Fn(&T) -> Option<f64> + Send + Sync + 'static,
{
    Arc::new(get)
}

pub fn date<T, F>(get: F) -> DateAccessor<T>
where
    F: Fn(&T) -> Option<DateTime<Utc>> + Send + Sync + 'static,
{
    Arc::new(get)
}
