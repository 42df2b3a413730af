//! vnprice CLI: fetch Vietnamese equity prices, plan requests, print summaries.
//!
//! Commands:
//! - `fetch`: run the pipeline and write CSV, Markdown and manifest artifacts
//! - `plan`: print the fetch units a run would issue (no network)
//! - `summary`: fetch and print the latest-price table

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vnprice_core::analytics::ReturnWindow;
use vnprice_core::data::Universe;
use vnprice_core::domain::{DateRange, TickerSymbol};
use vnprice_core::fetch::{plan, FetchMode, NullSink, TracingSink};
use vnprice_runner::{
    render_table, save_artifacts, summarize, FetchConfig, FetchReport, Pipeline,
};

#[derive(Parser)]
#[command(
    name = "vnprice",
    about = "vnprice: daily Vietnamese equity prices with primary/secondary failover"
)]
struct Cli {
    /// Log fetch events (failover, retries, mode changes) at debug level.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Selection {
    /// Tickers (e.g. VCB FPT HPG). Defaults to the built-in universe.
    tickers: Vec<String>,

    /// TOML universe file (industry = [tickers]).
    #[arg(long)]
    universe: Option<PathBuf>,

    /// Start date (YYYY-MM-DD). Defaults to the config value.
    #[arg(long)]
    start: Option<String>,

    /// End date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<String>,

    /// Path to a TOML fetch config.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch prices and write ohlcv.csv, returns.csv, summary.md, manifest.json.
    Fetch {
        #[command(flatten)]
        selection: Selection,

        /// Output directory. Defaults to the config value.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the planned fetch units without touching the network.
    Plan {
        #[command(flatten)]
        selection: Selection,

        /// Plan as if the run were already degraded to the secondary source.
        #[arg(long, default_value_t = false)]
        degraded: bool,
    },
    /// Fetch prices and print the latest-price table.
    Summary {
        #[command(flatten)]
        selection: Selection,

        /// Sort column: 1d%, 1w%, 1m% or 6m%.
        #[arg(long)]
        sort_by: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Fetch {
            selection,
            output_dir,
        } => run_fetch(selection, output_dir, cli.verbose),
        Commands::Plan {
            selection,
            degraded,
        } => run_plan(selection, degraded),
        Commands::Summary { selection, sort_by } => run_summary(selection, sort_by, cli.verbose),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,vnprice_core=debug,vnprice_runner=debug,vnprice=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Everything a command needs after resolving CLI flags against the config.
struct Resolved {
    config: FetchConfig,
    tickers: Vec<TickerSymbol>,
    universe: Universe,
    range: DateRange,
}

fn resolve(selection: Selection) -> Result<Resolved> {
    let config = match &selection.config {
        Some(path) => FetchConfig::from_file(path)?,
        None => FetchConfig::default(),
    };

    let universe = match &selection.universe {
        Some(path) => Universe::from_file(path)?,
        None => Universe::default_vn(),
    };

    let tickers = if selection.tickers.is_empty() {
        universe.tickers()?
    } else {
        selection
            .tickers
            .iter()
            .map(|s| TickerSymbol::new(s.to_uppercase()))
            .collect::<Result<Vec<_>, _>>()?
    };
    if tickers.is_empty() {
        bail!("no tickers selected");
    }

    let today = chrono::Local::now().date_naive();
    let configured = config.date_range(today)?;
    let start = parse_date(selection.start.as_deref())?.unwrap_or(configured.start());
    let end = parse_date(selection.end.as_deref())?.unwrap_or(configured.end());
    let range = DateRange::new(start, end)?;
    tracing::debug!(tickers = tickers.len(), %range, "resolved selection");

    Ok(Resolved {
        config,
        tickers,
        universe,
        range,
    })
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
    })
    .transpose()
}

fn run_pipeline(resolved: &Resolved, verbose: bool) -> Result<FetchReport> {
    let pipeline = Pipeline::live(&resolved.config)?;
    let pipeline = if verbose {
        pipeline.with_events(Arc::new(TracingSink))
    } else {
        pipeline.with_events(Arc::new(NullSink))
    };
    Ok(pipeline.run(&resolved.tickers, resolved.range)?)
}

/// Print one line per failed ticker and exit 1 if anything failed.
fn exit_on_problems(report: &FetchReport) {
    if report.all_succeeded() {
        return;
    }
    for line in report.problem_lines() {
        eprintln!("Error: {line}");
    }
    std::process::exit(1);
}

fn run_fetch(selection: Selection, output_dir: Option<PathBuf>, verbose: bool) -> Result<()> {
    let resolved = resolve(selection)?;
    let report = run_pipeline(&resolved, verbose)?;

    let rows = summarize(
        &report,
        Some(&resolved.universe),
        resolved.config.sort_window(),
    );
    let dir = output_dir.unwrap_or_else(|| resolved.config.output.dir.clone());
    let dir = save_artifacts(&report, &rows, &dir)?;

    println!(
        "Fetched {} bars for {}/{} tickers ({}, mode: {})",
        report.bar_count(),
        report.series.len(),
        report.requested.len(),
        report.range,
        report.mode
    );
    println!("Dataset hash: {}", report.dataset_hash);
    println!("Artifacts saved to: {}", dir.display());

    exit_on_problems(&report);
    Ok(())
}

fn run_plan(selection: Selection, degraded: bool) -> Result<()> {
    let resolved = resolve(selection)?;
    let mode = if degraded {
        FetchMode::DegradedSecondaryOnly
    } else {
        FetchMode::Normal
    };

    let units = plan(&resolved.tickers, resolved.range, mode);
    println!(
        "{} unit(s) for {} ticker(s) over {} [{}]",
        units.len(),
        resolved.tickers.len(),
        resolved.range,
        mode
    );
    for unit in &units {
        println!("  {unit}");
    }
    Ok(())
}

fn run_summary(selection: Selection, sort_by: Option<String>, verbose: bool) -> Result<()> {
    let resolved = resolve(selection)?;
    let window = match sort_by.as_deref() {
        Some(label) => ReturnWindow::from_label(label)
            .with_context(|| format!("unknown sort column '{label}' (use 1d%, 1w%, 1m% or 6m%)"))?,
        None => resolved.config.sort_window(),
    };

    let report = run_pipeline(&resolved, verbose)?;
    let rows = summarize(&report, Some(&resolved.universe), window);
    print!("{}", render_table(&rows));

    exit_on_problems(&report);
    Ok(())
}
