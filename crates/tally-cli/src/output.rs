//! Rendering pages, views and rollups as JSON or terminal tables.

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

use tally_query::{Page, PageLink};
use tally_rollup::RollupResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    Table,
}

#[derive(Serialize)]
struct PageReport<'p, 'a> {
    #[serde(flatten)]
    page: &'p Page<&'a Value>,
    window: Vec<PageLink>,
}

pub fn render_page(page: &Page<&Value>, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => {
            let report = PageReport {
                page,
                window: page.window(),
            };
            Ok(serde_json::to_string_pretty(&report)?)
        }
        OutputFormat::Table => {
            let mut out = records_table(&page.items);
            out.push('\n');
            out.push_str(&pager_line(page));
            Ok(out)
        }
    }
}

/// The whole view, unpaginated.
pub fn render_view(records: &[&Value], format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        OutputFormat::Table => Ok(format!("{}\n{} records", records_table(records), records.len())),
    }
}

pub fn render_facets(
    counts: &BTreeMap<String, usize>,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(counts)?),
        OutputFormat::Table => {
            let mut builder = Builder::default();
            builder.push_record(["value".to_string(), "count".to_string()]);
            for (value, count) in counts {
                let label = if value.is_empty() { "(none)" } else { value.as_str() };
                builder.push_record([label.to_string(), count.to_string()]);
            }
            Ok(builder.build().with(Style::modern()).to_string())
        }
    }
}

pub fn render_rollups(results: &[RollupResult], format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(results)?),
        OutputFormat::Table => {
            let Some(first) = results.first() else {
                return Ok(String::new());
            };
            let collections: Vec<&String> = first.per_collection.keys().collect();
            let derived: Vec<&String> = first.derived.keys().collect();

            let mut builder = Builder::default();
            builder.push_record(
                std::iter::once("window".to_string())
                    .chain(collections.iter().map(|c| c.to_string()))
                    .chain(derived.iter().map(|d| d.to_string())),
            );
            for result in results {
                builder.push_record(
                    std::iter::once(result.window.to_string())
                        .chain(collections.iter().map(|c| format_amount(result.sum(c))))
                        .chain(
                            derived
                                .iter()
                                .map(|d| format_amount(result.derived(d).unwrap_or(0.0))),
                        ),
                );
            }
            Ok(builder.build().with(Style::modern()).to_string())
        }
    }
}

// =============================================================================
// Table helpers
// =============================================================================

/// Columns are the union of the records' top-level keys, in first-seen order.
fn records_table(records: &[&Value]) -> String {
    let mut columns: Vec<&str> = Vec::new();
    for record in records {
        if let Value::Object(fields) = record {
            for key in fields.keys() {
                if !columns.contains(&key.as_str()) {
                    columns.push(key);
                }
            }
        }
    }
    if columns.is_empty() {
        return "(no records)".to_string();
    }

    let mut builder = Builder::default();
    builder.push_record(columns.iter().map(|c| c.to_string()));
    for record in records {
        builder.push_record(columns.iter().map(|c| cell(record.get(*c))));
    }
    builder.build().with(Style::modern()).to_string()
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn format_amount(value: f64) -> String {
    format!("{:.2}", value)
}

/// `Showing 11-20 of 57  «  1 [2] 3 4 ... 6  »`
fn pager_line(page: &Page<&Value>) -> String {
    if page.total_items == 0 {
        return "No matching records".to_string();
    }
    let links: Vec<String> = page
        .window()
        .into_iter()
        .map(|link| match link {
            PageLink::Page(n) if n == page.page_number => format!("[{}]", n),
            other => other.to_string(),
        })
        .collect();
    format!(
        "Showing {}-{} of {}  {} {} {}",
        page.start_item,
        page.end_item,
        page.total_items,
        if page.has_prev() { "«" } else { " " },
        links.join(" "),
        if page.has_next() { "»" } else { " " },
    )
}
