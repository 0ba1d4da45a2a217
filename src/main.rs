//! CLI entry point for the meter profiler.
//!
//! Provides subcommands for analyzing a transformer export, a date range of
//! outlet exports, and listing the built-in holiday calendar.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use meter_profiler::analyzers::smoothing::Smoothing;
use meter_profiler::analyzers::types::ProfileGrouping;
use meter_profiler::calendar::{GermanHolidays, Region, SeasonRule};
use meter_profiler::config::{CalendarErrorPolicy, PipelineConfig};
use meter_profiler::loader::{
    DecimalSeparator, LoadedTable, OutletFileTemplate, load_outlet_range, load_transformer_export,
};
use meter_profiler::output::{OutputFormat, write_outputs};
use meter_profiler::pipeline;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "meter_profiler")]
#[command(about = "Derive power metrics from meter exports and build daily load profiles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a transformer export (P/S sums plus per-phase U and I)
    Transformer {
        /// Semicolon-separated export, optionally gzip-compressed
        #[arg(short, long)]
        input: PathBuf,

        /// Directory to write result tables to
        #[arg(short, long, default_value = "out")]
        output_dir: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Analyze a date range of outlet current/voltage export pairs
    Outlet {
        /// Directory holding the daily export files
        #[arg(short, long)]
        dir: PathBuf,

        /// File name pattern with {date} and {kind} placeholders
        #[arg(short, long, default_value = "{date}_{kind}.csv")]
        template: String,

        /// chrono format used to render {date}
        #[arg(long, default_value = "%Y-%m-%d")]
        date_format: String,

        /// First day to load (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Last day to load, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        /// Directory to write result tables to
        #[arg(short, long, default_value = "out")]
        output_dir: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },
    /// List the built-in public holidays of a year
    Holidays {
        #[arg(short, long)]
        year: i32,

        #[arg(short, long, value_enum, default_value_t = Region::Nw)]
        region: Region,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SmoothingKind {
    None,
    MovingAverage,
    Gaussian,
}

/// Options shared by the analysis subcommands. Anything given here
/// overrides the config file.
#[derive(Args, Debug)]
struct RunArgs {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    #[arg(long, value_enum)]
    season_rule: Option<SeasonRule>,

    /// Classify by plain weekday, ignoring holidays
    #[arg(long, default_value_t = false)]
    no_holidays: bool,

    /// CSV of holiday dates replacing the built-in rules
    #[arg(long)]
    holidays_file: Option<PathBuf>,

    #[arg(long, value_enum)]
    region: Option<Region>,

    #[arg(long, value_enum)]
    smoothing: Option<SmoothingKind>,

    /// Moving-average window, in buckets
    #[arg(long)]
    window: Option<usize>,

    /// Gaussian standard deviation, in buckets
    #[arg(long)]
    sigma: Option<f64>,

    #[arg(long)]
    interval_minutes: Option<u32>,

    #[arg(long, value_enum)]
    grouping: Option<ProfileGrouping>,

    /// Drop records whose holiday lookup fails instead of aborting
    #[arg(long, default_value_t = false)]
    skip_calendar_errors: bool,

    #[arg(long, value_enum)]
    decimal: Option<DecimalSeparator>,
}

impl RunArgs {
    /// Loads the config file, if any, and applies the command-line overrides.
    fn config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::load_or_default(self.config.as_deref())?;

        if let Some(format) = self.format {
            config.output_format = format;
        }
        if let Some(rule) = self.season_rule {
            config.season_rule = rule;
        }
        if self.no_holidays {
            config.holiday_adjustment = false;
        }
        if let Some(path) = &self.holidays_file {
            config.holidays_file = Some(path.clone());
        }
        if let Some(region) = self.region {
            config.region = region;
        }
        if let Some(minutes) = self.interval_minutes {
            config.interval_minutes = minutes;
        }
        if let Some(grouping) = self.grouping {
            config.grouping = grouping;
        }
        if self.skip_calendar_errors {
            config.calendar_errors = CalendarErrorPolicy::Skip;
        }
        if let Some(decimal) = self.decimal {
            config.decimal = decimal;
        }
        config.smoothing = self.smoothing(config.smoothing);

        config.validate()?;
        Ok(config)
    }

    fn smoothing(&self, current: Smoothing) -> Smoothing {
        let (default_window, default_min_periods) = match current {
            Smoothing::MovingAverage {
                window,
                min_periods,
            } => (window, min_periods),
            _ => (4, 1),
        };
        let default_sigma = match current {
            Smoothing::Gaussian { sigma } => sigma,
            _ => 1.0,
        };

        let kind = match (self.smoothing, current) {
            (Some(kind), _) => kind,
            (None, Smoothing::None) => SmoothingKind::None,
            (None, Smoothing::MovingAverage { .. }) => SmoothingKind::MovingAverage,
            (None, Smoothing::Gaussian { .. }) => SmoothingKind::Gaussian,
        };

        match kind {
            SmoothingKind::None => Smoothing::None,
            SmoothingKind::MovingAverage => Smoothing::MovingAverage {
                window: self.window.unwrap_or(default_window),
                min_periods: default_min_periods,
            },
            SmoothingKind::Gaussian => Smoothing::Gaussian {
                sigma: self.sigma.unwrap_or(default_sigma),
            },
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/meter_profiler.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("meter_profiler.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Transformer {
            input,
            output_dir,
            run,
        } => {
            let config = run.config()?;
            let table = load_transformer_export(&input, config.decimal)
                .with_context(|| format!("loading {}", input.display()))?;
            let stem = file_stem(&input);
            analyze(&table, &config, &output_dir, &stem)?;
        }
        Commands::Outlet {
            dir,
            template,
            date_format,
            start,
            end,
            output_dir,
            run,
        } => {
            if start > end {
                bail!("--start {start} is after --end {end}");
            }
            let config = run.config()?;
            let template = OutletFileTemplate::new(template, date_format);
            let table = load_outlet_range(&dir, &template, start, end, config.decimal);
            if table.is_empty() {
                bail!("no outlet data found in {} for {start}..={end}", dir.display());
            }
            let stem = format!("outlet_{}_{}", start.format("%Y%m%d"), end.format("%Y%m%d"));
            analyze(&table, &config, &output_dir, &stem)?;
        }
        Commands::Holidays { year, region } => {
            let holidays = GermanHolidays::new(region).holidays_in_year(year)?;
            info!(year, ?region, count = holidays.len(), "Holiday list");
            for (date, name) in holidays {
                println!("{}\t{}\t{}", date, date.format("%a"), name);
            }
        }
    }

    Ok(())
}

/// Runs the pipeline over a loaded table and writes every output table.
#[tracing::instrument(skip(table, config), fields(records = table.records.len()))]
fn analyze(
    table: &LoadedTable,
    config: &PipelineConfig,
    output_dir: &Path,
    stem: &str,
) -> Result<()> {
    let calendar = config.holiday_calendar()?;
    let output = pipeline::run(table, config, calendar.as_ref())?;

    for diagnostic in &output.diagnostics {
        warn!(
            kind = ?diagnostic.kind,
            line = ?diagnostic.line,
            raw = %diagnostic.raw,
            reason = %diagnostic.reason,
            "Excluded row"
        );
    }

    let files = write_outputs(output_dir, stem, &output, config)?;
    for file in &files {
        info!(path = %file.display(), "Wrote output");
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or("export");
    name.trim_end_matches(".gz")
        .trim_end_matches(".csv")
        .to_string()
}
