//! Sort specification: an ordered list of `(key, direction)` clauses.
//! Later clauses only break ties left by earlier ones.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Apply this direction to an ascending comparison result.
    #[inline]
    pub fn apply(self, ascending: Ordering) -> Ordering {
        match self {
            Self::Asc => ascending,
            Self::Desc => ascending.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

impl FromStr for SortDirection {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            _ => Err(ParseError::InvalidDirection(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortClause {
    pub key: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortClause {
    pub fn new(key: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            key: key.into(),
            direction,
        }
    }

    pub fn asc(key: impl Into<String>) -> Self {
        Self::new(key, SortDirection::Asc)
    }

    pub fn desc(key: impl Into<String>) -> Self {
        Self::new(key, SortDirection::Desc)
    }
}

impl FromStr for SortClause {
    type Err = ParseError;

    /// Parses `key` or `key:asc` / `key:desc`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, direction) = match s.split_once(':') {
            Some((key, dir)) => (key.trim(), dir.parse()?),
            None => (s.trim(), SortDirection::Asc),
        };
        if key.is_empty() {
            return Err(ParseError::InvalidSortClause(s.to_string()));
        }
        Ok(Self::new(key, direction))
    }
}

/// An empty spec keeps source order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortSpec {
    pub clauses: Vec<SortClause>,
}

impl SortSpec {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(key: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            clauses: vec![SortClause::new(key, direction)],
        }
    }

    pub fn then(mut self, key: impl Into<String>, direction: SortDirection) -> Self {
        self.clauses.push(SortClause::new(key, direction));
        self
    }

    pub fn is_unsorted(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl FromIterator<SortClause> for SortSpec {
    fn from_iter<I: IntoIterator<Item = SortClause>>(iter: I) -> Self {
        Self {
            clauses: iter.into_iter().collect(),
        }
    }
}
