//! Errors raised while parsing user-facing strings into engine types.
//!
//! The engine itself never fails on record data; only the conversion of
//! operator input (`"name:desc"`, `"+05:30"`, `"month"`) can be rejected.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid sort direction '{0}' (expected 'asc' or 'desc')")]
    InvalidDirection(String),

    #[error("invalid sort clause '{0}' (expected 'key' or 'key:asc|desc')")]
    InvalidSortClause(String),

    #[error("invalid time window '{0}' (expected day, month, year or lifetime)")]
    InvalidWindow(String),

    #[error("invalid calendar zone '{0}' (expected 'local', 'utc' or '+HH:MM')")]
    InvalidZone(String),

    #[error("invalid calendar date '{0}'")]
    InvalidDate(String),
}
