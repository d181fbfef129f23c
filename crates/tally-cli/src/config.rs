//! `tally.toml`: how to read records and what to roll up.
//!
//! ```toml
//! [schema]
//! search = ["/name", "/email"]
//! discrete = { status = "/status" }
//! range = "/value"
//! date = "/created_at"
//! tie_break = "id"
//!
//! [schema.sort.name]
//! pointer = "/name"
//! kind = "string"
//!
//! [display]
//! page_size = 25
//! timezone = "+05:30"
//!
//! [[rollup.collections]]
//! name = "revenue"
//! input = "invoices.json"
//! date = "/paid_at"
//! metric = "/amount"
//!
//! [[rollup.derived]]
//! name = "net"
//! plus = ["revenue"]
//! minus = ["expenses"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use tally_core::{CalendarZone, SortKind};
use tally_query::DEFAULT_PAGE_SIZE;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub rollup: RollupConfig,
}

impl Config {
    /// A missing file yields the defaults; an unreadable or malformed one is
    /// an error.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }
}

/// Field locations, as JSON pointers into each record.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct SchemaConfig {
    #[serde(default)]
    pub search: Vec<String>,
    #[serde(default)]
    pub discrete: BTreeMap<String, String>,
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    /// A sort clause (`"id"` or `"id:desc"`) naming one of `sort`.
    #[serde(default)]
    pub tie_break: Option<String>,
    #[serde(default)]
    pub sort: BTreeMap<String, SortFieldConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SortFieldConfig {
    pub pointer: String,
    #[serde(default = "default_sort_kind")]
    pub kind: SortKind,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub timezone: CalendarZone,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            timezone: CalendarZone::Local,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct RollupConfig {
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
    #[serde(default)]
    pub derived: Vec<DerivedConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    pub name: String,
    pub input: PathBuf,
    pub date: String,
    pub metric: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DerivedConfig {
    pub name: String,
    #[serde(default)]
    pub plus: Vec<String>,
    #[serde(default)]
    pub minus: Vec<String>,
}

fn default_sort_kind() -> SortKind {
    SortKind::String
}
fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}
