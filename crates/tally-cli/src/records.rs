//! JSON records and the schema that reads them.
//!
//! Records are arbitrary JSON objects. Every configured field is a JSON
//! pointer (`/customer/name`); values that are absent or of the wrong shape
//! read as missing and the engine applies its usual defaults.

use std::borrow::Cow;
use std::path::Path;

use anyhow::{bail, ensure, Context};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use tally_core::access;
use tally_core::{CalendarZone, SortClause, SortKey, SortKind};
use tally_query::Schema;

use crate::config::SchemaConfig;

pub fn load_records(path: &Path) -> anyhow::Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading records {}", path.display()))?;
    let parsed: Value = serde_json::from_str(&content)
        .with_context(|| format!("parsing records {}", path.display()))?;
    match parsed {
        Value::Array(records) => {
            tracing::debug!(path = %path.display(), count = records.len(), "loaded records");
            Ok(records)
        }
        other => bail!(
            "{}: expected a JSON array of records, found {}",
            path.display(),
            kind_of(&other)
        ),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// Field readers
// =============================================================================

/// Strings as-is; numbers and booleans in their JSON spelling.
pub fn text_at<'a>(record: &'a Value, pointer: &str) -> Option<Cow<'a, str>> {
    match record.pointer(pointer)? {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        _ => None,
    }
}

/// Numbers, or strings that parse as one.
pub fn number_at(record: &Value, pointer: &str) -> Option<f64> {
    match record.pointer(pointer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// RFC 3339 or `YYYY-MM-DD` strings, or integer epoch milliseconds.
pub fn date_at(record: &Value, pointer: &str, zone: CalendarZone) -> Option<DateTime<Utc>> {
    match record.pointer(pointer)? {
        Value::String(s) => zone.parse_instant(s).ok(),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

// =============================================================================
// Schema
// =============================================================================

fn check_pointer(pointer: &str) -> anyhow::Result<()> {
    ensure!(
        pointer.is_empty() || pointer.starts_with('/'),
        "'{}' is not a JSON pointer (expected something like '/status')",
        pointer
    );
    Ok(())
}

pub fn build_schema(config: &SchemaConfig, zone: CalendarZone) -> anyhow::Result<Schema<Value>> {
    let mut schema = Schema::new().zone(zone);

    for pointer in &config.search {
        check_pointer(pointer).context("schema.search")?;
        let pointer = pointer.clone();
        schema = schema.search_with(move |r: &Value| text_at(r, &pointer));
    }

    for (field, pointer) in &config.discrete {
        check_pointer(pointer).with_context(|| format!("schema.discrete.{}", field))?;
        let pointer = pointer.clone();
        let accessor = access::text_with(move |r: &Value| text_at(r, &pointer));
        schema = schema.discrete_accessor(field.clone(), accessor);
    }

    if let Some(pointer) = &config.range {
        check_pointer(pointer).context("schema.range")?;
        let pointer = pointer.clone();
        schema = schema.range(move |r: &Value| number_at(r, &pointer));
    }

    if let Some(pointer) = &config.date {
        check_pointer(pointer).context("schema.date")?;
        let pointer = pointer.clone();
        schema = schema.date(move |r: &Value| date_at(r, &pointer, zone));
    }

    for (name, field) in &config.sort {
        check_pointer(&field.pointer).with_context(|| format!("schema.sort.{}", name))?;
        let pointer = field.pointer.clone();
        let key = match field.kind {
            SortKind::String => {
                SortKey::Text(access::text_with(move |r: &Value| text_at(r, &pointer)))
            }
            SortKind::Number => {
                SortKey::Number(access::number(move |r: &Value| number_at(r, &pointer)))
            }
            SortKind::Date => {
                SortKey::Date(access::date(move |r: &Value| date_at(r, &pointer, zone)))
            }
        };
        schema = schema.sort_key(name.clone(), key);
    }

    if let Some(raw) = &config.tie_break {
        let clause: SortClause = raw.parse().context("schema.tie_break")?;
        ensure!(
            config.sort.contains_key(&clause.key),
            "schema.tie_break: '{}' is not a configured sort key",
            clause.key
        );
        schema = schema.tie_break(clause.key, clause.direction);
    }

    tracing::debug!(?schema, "schema ready");
    Ok(schema)
}
