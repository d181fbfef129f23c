//! # tally-cli: The "Console" of TALLY
//!
//! A thin driver over the engine crates for JSON record files.
//!
//! - `tally query --input leads.json --search acme --sort value:desc` filters,
//!   sorts and pages one file.
//! - `tally facets --input leads.json --field status` counts discrete values.
//! - `tally rollup --window day --window month` sums the collections
//!   configured in `tally.toml`.

use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_core::{
    CalendarMonth, CalendarZone, DateFilter, FilterSpec, NumericRange, SortClause, SortSpec,
    TimeWindow,
};
use tally_query::{facet_counts, run_query};
use tally_rollup::{Collection, DerivedMetric, RollupEngine, RollupSource};

mod config;
mod output;
mod records;

use config::Config;
use output::OutputFormat;

// =============================================================================
// CLI
// =============================================================================

/// Search, filter, sort, page and roll up collections of JSON records.
#[derive(Parser)]
#[command(name = "tally", version, about, long_about = None)]
struct Cli {
    /// Path to config file.
    #[arg(long, global = true, default_value = "tally.toml")]
    config: PathBuf,

    /// Calendar zone for day/month/year questions (`local`, `utc`, `+05:30`).
    #[arg(long, global = true)]
    timezone: Option<CalendarZone>,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter, sort and page a JSON array of records.
    Query(QueryArgs),

    /// Count records per value of a discrete field.
    Facets {
        /// JSON file holding an array of records.
        #[arg(long)]
        input: PathBuf,

        /// A discrete field configured under `[schema.discrete]`.
        #[arg(long)]
        field: String,
    },

    /// Sum the configured collections per time window.
    Rollup {
        /// Reference instant (RFC 3339, `YYYY-MM-DD` or epoch ms). Defaults to now.
        #[arg(long)]
        now: Option<String>,

        /// Windows to compute (default: all of day, month, year, lifetime).
        #[arg(long = "window")]
        windows: Vec<TimeWindow>,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// JSON file holding an array of records.
    #[arg(long)]
    input: PathBuf,

    /// Case-insensitive substring matched against the search fields.
    #[arg(long)]
    search: Option<String>,

    /// Discrete selection as `field=value` (repeatable).
    #[arg(long = "filter", value_parser = parse_selection)]
    filters: Vec<(String, String)>,

    /// Named range bucket (e.g. `under_1000`).
    #[arg(long, conflicts_with_all = ["min", "max"])]
    bucket: Option<String>,

    /// Inclusive lower bound on the range field.
    #[arg(long, allow_hyphen_values = true)]
    min: Option<String>,

    /// Inclusive upper bound on the range field.
    #[arg(long, allow_hyphen_values = true)]
    max: Option<String>,

    /// Only records dated on this calendar day.
    #[arg(long, conflicts_with_all = ["month", "from", "to"])]
    day: Option<NaiveDate>,

    /// Only records dated in this calendar month (`YYYY-MM`).
    #[arg(long, conflicts_with_all = ["from", "to"])]
    month: Option<CalendarMonth>,

    /// Only records dated at or after this instant.
    #[arg(long)]
    from: Option<String>,

    /// Only records dated at or before this instant. A bare `YYYY-MM-DD`
    /// includes the whole of that day.
    #[arg(long)]
    to: Option<String>,

    /// Sort clause `key[:asc|desc]` (repeatable, applied in order).
    #[arg(long = "sort")]
    sort: Vec<SortClause>,

    /// 1-based page number; out-of-range values are clamped.
    #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
    page: i64,

    /// Items per page (default from config).
    #[arg(long)]
    page_size: Option<usize>,

    /// Print the whole view instead of one page.
    #[arg(long)]
    all: bool,
}

fn parse_selection(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(field, value)| (field.trim().to_string(), value.to_string()))
        .filter(|(field, _)| !field.is_empty())
        .ok_or_else(|| format!("expected field=value, got '{}'", raw))
}

// =============================================================================
// Commands
// =============================================================================

fn run_query_command(
    args: QueryArgs,
    config: &Config,
    zone: CalendarZone,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let schema = records::build_schema(&config.schema, zone).context("building schema")?;
    let records = records::load_records(&args.input)?;

    let mut filter = FilterSpec::new();
    filter.search = args.search;
    filter.discrete = args.filters.into_iter().collect();
    if let Some(bucket) = args.bucket {
        filter = filter.bucket(bucket);
    } else if args.min.is_some() || args.max.is_some() {
        let range = NumericRange::from_inputs(
            args.min.as_deref().unwrap_or_default(),
            args.max.as_deref().unwrap_or_default(),
        );
        filter = filter.between(range);
    }
    if let Some(day) = args.day {
        filter = filter.date(DateFilter::on_day(day));
    } else if let Some(month) = args.month {
        filter = filter.date(DateFilter::in_month(month));
    } else if args.from.is_some() || args.to.is_some() {
        let start = args
            .from
            .as_deref()
            .map(|s| zone.parse_instant(s))
            .transpose()
            .context("--from")?;
        let end = args
            .to
            .as_deref()
            .map(|s| zone.parse_end_instant(s))
            .transpose()
            .context("--to")?;
        filter = filter.date(DateFilter::between(start, end));
    }
    let sort: SortSpec = args.sort.into_iter().collect();
    for clause in &sort.clauses {
        if schema.sort_key_named(&clause.key).is_none() {
            let known: Vec<&str> = schema.sort_names().collect();
            tracing::warn!(
                key = %clause.key,
                configured = %known.join(", "),
                "unknown sort key, ignoring"
            );
        }
    }

    let view = run_query(&records, &schema, &filter, &sort);
    tracing::info!(records = records.len(), matched = view.len(), "query");

    let rendered = if args.all {
        output::render_view(&view.into_vec(), format)?
    } else {
        let page_size = args.page_size.unwrap_or(config.display.page_size);
        output::render_page(&view.paginate(args.page, page_size), format)?
    };
    println!("{}", rendered);
    Ok(())
}

fn run_facets_command(
    input: PathBuf,
    field: &str,
    config: &Config,
    zone: CalendarZone,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let schema = records::build_schema(&config.schema, zone).context("building schema")?;
    if schema.discrete_field(field).is_none() {
        let known: Vec<&str> = schema.discrete_names().collect();
        bail!("unknown discrete field '{}' (configured: {})", field, known.join(", "));
    }
    let records = records::load_records(&input)?;
    let counts = facet_counts(&records, &schema, field);
    println!("{}", output::render_facets(&counts, format)?);
    Ok(())
}

fn run_rollup_command(
    now: Option<String>,
    windows: Vec<TimeWindow>,
    config: &Config,
    zone: CalendarZone,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let now: DateTime<Utc> = match now {
        Some(raw) => zone.parse_instant(&raw).context("--now")?,
        None => Utc::now(),
    };
    let windows = if windows.is_empty() {
        TimeWindow::ALL.to_vec()
    } else {
        windows
    };
    if config.rollup.collections.is_empty() {
        tracing::warn!("no [[rollup.collections]] configured");
    }

    let loaded = config
        .rollup
        .collections
        .iter()
        .map(|c| {
            records::load_records(&c.input)
                .with_context(|| format!("collection '{}'", c.name))
                .map(|rows| (c, rows))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let collections: Vec<_> = loaded
        .iter()
        .map(|(c, rows)| {
            Collection::new(
                c.name.clone(),
                rows.as_slice(),
                move |r: &serde_json::Value| records::date_at(r, &c.date, zone),
                move |r: &serde_json::Value| records::number_at(r, &c.metric).unwrap_or(0.0),
            )
        })
        .collect();
    let sources: Vec<&dyn RollupSource> = collections
        .iter()
        .map(|c| c as &dyn RollupSource)
        .collect();

    let engine = config
        .rollup
        .derived
        .iter()
        .fold(RollupEngine::new().with_zone(zone), |engine, d| {
            engine.derive(DerivedMetric::linear(d.name.clone(), d.plus.clone(), d.minus.clone()))
        });
    let results = engine.compute(&sources, &now, &windows);
    tracing::info!(collections = sources.len(), windows = windows.len(), %now, "rollup");

    println!("{}", output::render_rollups(&results, format)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tally=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let zone = cli.timezone.unwrap_or(config.display.timezone);

    match cli.command {
        Commands::Query(args) => run_query_command(args, &config, zone, cli.format),
        Commands::Facets { input, field } => {
            run_facets_command(input, &field, &config, zone, cli.format)
        }
        Commands::Rollup { now, windows } => {
            run_rollup_command(now, windows, &config, zone, cli.format)
        }
    }
}
