//! Fredscope CLI — series, catalog, region and cache management commands.
//!
//! Commands:
//! - `series` — fetch a region's indicators, align them on date, optionally
//!   z-score them, preview the latest rows and export CSV
//! - `catalog` — crawl the category tree and export series metadata
//! - `regions` — list the configured regions and their series
//! - `cache status` — report cached series, entries and size
//! - `cache clean` — remove entries older than a cutoff

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fredscope_core::catalog::{CrawlOptions, LogCrawlProgress};
use fredscope_core::data::{
    CircuitBreaker, FredClient, LogProgress, SeriesCache, ZeroVariancePolicy,
};
use fredscope_core::domain::{AlignedTable, CategoryId};
use fredscope_core::pipeline::PipelineError;
use fredscope_runner::config::API_KEY_ENV;
use fredscope_runner::export::{DEFAULT_CATALOG_FILE, DEFAULT_DATA_FILE};
use fredscope_runner::{
    export_aligned_csv, resolve_api_key, run_catalog_job, run_series_request, write_file,
    AppConfig, CatalogJob, FetchMode, FetchModeKind, RequestError, SeriesRequest, SeriesResponse,
};

#[derive(Parser)]
#[command(
    name = "fredscope",
    about = "Fredscope CLI — FRED economic indicators by region, aligned and normalized"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./fredscope.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only log errors.
    #[arg(short, long, global = true, default_value_t = false)]
    quiet: bool,

    /// Log debug detail.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ZeroVarianceArg {
    /// Blank out constant columns.
    Missing,
    /// Keep constant columns at their raw values.
    Unchanged,
}

impl From<ZeroVarianceArg> for ZeroVariancePolicy {
    fn from(arg: ZeroVarianceArg) -> Self {
        match arg {
            ZeroVarianceArg::Missing => ZeroVariancePolicy::Missing,
            ZeroVarianceArg::Unchanged => ZeroVariancePolicy::Unchanged,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, align and preview a region's indicators.
    Series {
        /// Region name (e.g., National, Missouri, Kansas).
        #[arg(long, default_value = "National")]
        region: String,

        /// Series label within the region; repeat for several. Defaults to
        /// the region's first two.
        #[arg(long = "series")]
        labels: Vec<String>,

        /// Start date (YYYY-MM-DD). Defaults to 2000-01-01.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Show z-scores instead of raw values.
        #[arg(long, default_value_t = false)]
        zscore: bool,

        /// What to do with constant columns under --zscore.
        #[arg(long, value_enum, default_value = "missing")]
        zero_variance: ZeroVarianceArg,

        /// Write the displayed table as CSV (default file: economic_data.csv).
        #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_DATA_FILE)]
        output: Option<PathBuf>,

        /// Rows to preview.
        #[arg(long, default_value_t = 5)]
        rows: usize,

        /// Fetch with up to N parallel workers.
        #[arg(long)]
        parallel: Option<usize>,

        /// Ignore cached entries.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Do not read or write the cache.
        #[arg(long, default_value_t = false)]
        no_cache: bool,

        /// FRED API key. Defaults to $FRED_API_KEY.
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Crawl the category tree and export every series' metadata.
    Catalog {
        /// Category to start from.
        #[arg(long, default_value_t = 0)]
        root: u32,

        /// Stop after this many categories.
        #[arg(long)]
        max_categories: Option<usize>,

        /// Keep one record per series id.
        #[arg(long, default_value_t = false)]
        dedupe: bool,

        /// CSV destination.
        #[arg(long, default_value = DEFAULT_CATALOG_FILE)]
        output: PathBuf,

        /// FRED API key. Defaults to $FRED_API_KEY.
        #[arg(long)]
        api_key: Option<String>,
    },
    /// List configured regions and their series.
    Regions,
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached series, entry counts and size.
    Status {
        /// Cache directory. Defaults to the configured one.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Remove entries cached more than the given number of hours ago.
    Clean {
        #[arg(long)]
        older_than_hours: u64,

        /// Cache directory. Defaults to the configured one.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let config = AppConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Series {
            region,
            labels,
            start,
            end,
            zscore,
            zero_variance,
            output,
            rows,
            parallel,
            force,
            no_cache,
            api_key,
        } => {
            let request = SeriesRequest {
                region,
                labels,
                start: parse_date(start.as_deref())?,
                end: parse_date(end.as_deref())?,
                normalize: zscore,
                zero_variance: zero_variance.into(),
                force,
            };
            let mut config = config;
            if let Some(n) = parallel {
                config.fetch.mode = FetchModeKind::Parallel;
                config.fetch.max_workers = n;
            }
            if no_cache {
                config.cache.enabled = false;
            }
            run_series_cmd(&config, &request, api_key.as_deref(), output.as_deref(), rows)
        }
        Commands::Catalog {
            root,
            max_categories,
            dedupe,
            output,
            api_key,
        } => run_catalog_cmd(&config, root, max_categories, dedupe, output, api_key.as_deref()),
        Commands::Regions => {
            print_regions(&config);
            Ok(())
        }
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => {
                run_cache_status(&cache_dir.unwrap_or_else(|| config.cache.dir.clone()))
            }
            CacheAction::Clean {
                older_than_hours,
                cache_dir,
                confirm,
            } => run_cache_clean(
                &cache_dir.unwrap_or_else(|| config.cache.dir.clone()),
                older_than_hours,
                confirm,
            ),
        },
    }
}

fn default_log_level(quiet: bool, verbose: bool) -> &'static str {
    if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = default_log_level(quiet, verbose);

    let filter = tracing_subscriber::EnvFilter::try_from_env("FREDSCOPE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

fn parse_date(value: Option<&str>) -> Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
        })
        .transpose()
}

fn build_client(config: &AppConfig, api_key: Option<&str>) -> Result<FredClient> {
    let key = resolve_api_key(api_key, std::env::var(API_KEY_ENV).ok())?;
    let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
    Ok(FredClient::new(config.api.client_config(key), circuit_breaker)?)
}

fn run_series_cmd(
    config: &AppConfig,
    request: &SeriesRequest,
    api_key: Option<&str>,
    output: Option<&Path>,
    rows: usize,
) -> Result<()> {
    let client = build_client(config, api_key)?;
    let cache = config
        .cache
        .enabled
        .then(|| SeriesCache::new(&config.cache.dir, config.cache.ttl()));
    if let FetchMode::Parallel { max_workers } = config.fetch_mode() {
        tracing::debug!(max_workers, "parallel fetch enabled");
    }

    let today = chrono::Local::now().date_naive();
    let response = match run_series_request(
        config,
        request,
        &client,
        cache.as_ref(),
        Some(&LogProgress),
        today,
    ) {
        Ok(response) => response,
        Err(RequestError::Pipeline(PipelineError::EmptyResult { failures })) => {
            eprintln!("No data retrieved.");
            for f in &failures {
                eprintln!("  Failed: {f}");
            }
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    print_response(&response, rows);

    if let Some(path) = output {
        write_file(path, &export_aligned_csv(&response.outcome.display)?)?;
        println!();
        println!("Wrote {} rows to {}", response.outcome.display.row_count(), path.display());
    }
    Ok(())
}

fn print_response(response: &SeriesResponse, rows: usize) {
    let outcome = &response.outcome;
    println!();
    println!("=== Economic Indicators ({}) ===", response.region);
    println!("Period:   {} to {}", response.start, response.end);
    println!(
        "Series:   {} requested, {} aligned",
        response.selected.len(),
        outcome.aligned.column_count()
    );
    println!("Rows:     {}", outcome.aligned.row_count());
    if outcome.display != outcome.aligned {
        println!("Values:   z-scores");
    }
    println!();
    println!("--- Latest {} rows ---", rows.min(outcome.display.row_count()));
    print!("{}", render_table(&outcome.display.tail(rows)));

    if !outcome.degenerate.is_empty() {
        println!();
        println!("Constant over the period (no z-score): {}", outcome.degenerate.join(", "));
    }
    if !outcome.failures.is_empty() {
        println!();
        println!("--- Failed series ---");
        for f in &outcome.failures {
            println!("  {f}");
        }
    }
}

/// Fixed-width text rendering: one header line, one line per date.
fn render_table(table: &AlignedTable) -> String {
    let cells: Vec<Vec<String>> = table
        .rows()
        .map(|(date, values)| {
            std::iter::once(date.to_string())
                .chain(values.iter().map(|v| match v {
                    Some(x) => format!("{x:.4}"),
                    None => "-".to_string(),
                }))
                .collect()
        })
        .collect();

    let header: Vec<String> = std::iter::once("date".to_string())
        .chain(table.column_names().into_iter().map(str::to_string))
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            cells
                .iter()
                .map(|row| row[i].len())
                .chain(std::iter::once(header[i].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for line in std::iter::once(&header).chain(cells.iter()) {
        let padded: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{cell:>w$}"))
            .collect();
        out.push_str(padded.join("  ").trim_end());
        out.push('\n');
    }
    out
}

fn run_catalog_cmd(
    config: &AppConfig,
    root: u32,
    max_categories: Option<usize>,
    dedupe: bool,
    output: PathBuf,
    api_key: Option<&str>,
) -> Result<()> {
    let client = build_client(config, api_key)?;
    let job = CatalogJob {
        crawl: CrawlOptions {
            root: CategoryId(root),
            max_categories,
        },
        dedupe,
        output: Some(output),
    };

    let result = run_catalog_job(&client, &job, Some(&LogCrawlProgress { every: 50 }))?;
    let report = &result.report;

    println!();
    println!("=== FRED Catalog ===");
    println!("Categories:  {}", report.visited);
    println!("Records:     {} ({} before dedupe)", report.table.len(), result.raw_records);
    println!("Distinct:    {}", report.table.distinct_ids());
    println!("Calls:       {}", report.series_calls + report.children_calls);
    if report.truncated {
        println!("Stopped early at --max-categories.");
    }
    if !report.failures.is_empty() {
        println!("Failed calls: {} (treated as empty)", report.failures.len());
    }
    if let Some(path) = &result.written_to {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn print_regions(config: &AppConfig) {
    for region in &config.regions {
        println!("{}", region.name);
        for entry in &region.series {
            println!("  {:<12} {}", entry.id, entry.label);
        }
    }
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = SeriesCache::new(cache_dir, Duration::ZERO);
    let status = cache.status();

    println!("{:<20} {:>8} {:>10} {:>12}  {}", "Series", "Entries", "Points", "Size", "Newest");
    println!("{}", "-".repeat(76));
    let mut total_size = 0u64;
    for s in &status {
        total_size += s.bytes;
        let newest = s
            .newest
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "{:<20} {:>8} {:>10} {:>12}  {}",
            s.series_id,
            s.entries,
            s.total_points,
            format_size(s.bytes),
            newest
        );
    }
    println!("{}", "-".repeat(76));
    println!("{} series, {} total", status.len(), format_size(total_size));
    Ok(())
}

fn run_cache_clean(cache_dir: &Path, older_than_hours: u64, confirm: bool) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let older_than = hours(older_than_hours)?;
    let cache = SeriesCache::new(cache_dir, Duration::ZERO);
    let removed = cache.clean(older_than, !confirm)?;

    if removed.is_empty() {
        println!("No entries older than {older_than_hours} hours.");
        return Ok(());
    }

    let verb = if confirm { "Removed" } else { "Would remove" };
    for meta in &removed {
        println!(
            "  {verb} {} {} to {} (cached {})",
            meta.series_id,
            meta.start,
            meta.end,
            meta.cached_at.format("%Y-%m-%d %H:%M")
        );
    }
    if !confirm {
        println!();
        println!("Dry run. Pass --confirm to delete {} entries.", removed.len());
    }
    Ok(())
}

fn hours(count: u64) -> Result<Duration> {
    count
        .checked_mul(3600)
        .map(Duration::from_secs)
        .with_context(|| format!("--older-than-hours {count} is too large"))
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
