use super::source::{
    Columns, DecimalSeparator, cell, line_number, parse_number, raw_line, read_text,
    semicolon_reader,
};
use super::{LoadedTable, MeasurementRecord, SourceKind};
use crate::analyzers::utility::{MeanAccumulator, floor_to_interval};
use crate::error::{Diagnostic, LoadError};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const TIME: &str = "Time";
const ACTIVE_CURRENT: [&str; 3] = ["L1_active", "L2_active", "L3_active"];
const CURRENT: [&str; 3] = ["L1", "L2", "L3"];
const VOLTAGE_MV: &str = "Voltage [mV]";

/// Outlet currents are exported in hundredths of an ampere.
const CENTIAMPS_PER_AMP: f64 = 100.0;
const MILLIVOLTS_PER_VOLT: f64 = 1000.0;

/// The two files an outlet export is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutletFileKind {
    Current,
    Voltage,
}

impl OutletFileKind {
    /// Suffix the exporter uses in file names.
    pub fn suffix(&self) -> &'static str {
        match self {
            OutletFileKind::Current => "I",
            OutletFileKind::Voltage => "U",
        }
    }
}

/// File name pattern for daily outlet exports.
///
/// `{date}` is replaced with the day rendered through `date_format`
/// (strftime syntax), `{kind}` with [`OutletFileKind::suffix`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutletFileTemplate {
    pub pattern: String,
    pub date_format: String,
}

impl OutletFileTemplate {
    pub fn new(pattern: impl Into<String>, date_format: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            date_format: date_format.into(),
        }
    }

    pub fn render(&self, date: NaiveDate, kind: OutletFileKind) -> String {
        self.pattern
            .replace("{date}", &date.format(&self.date_format).to_string())
            .replace("{kind}", kind.suffix())
    }
}

/// Parses an outlet `Time` cell. Accepts `YYYY-MM-DD HH:MM[:SS[.fff]]` with
/// a space or `T` separator; a trailing UTC offset is dropped and the wall
/// clock time kept as written.
pub fn parse_outlet_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.naive_local());
    }

    [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

/// Loads the current and voltage files of one outlet export and joins them.
#[tracing::instrument(fields(current = %current_path.display(), voltage = %voltage_path.display()))]
pub fn load_outlet_pair(
    current_path: &Path,
    voltage_path: &Path,
    decimal: DecimalSeparator,
) -> Result<LoadedTable, LoadError> {
    let current_text = read_text(current_path)?;
    let voltage_text = read_text(voltage_path)?;
    parse_outlet_pair(&current_text, current_path, &voltage_text, voltage_path, decimal)
}

/// Joins a current export with its voltage export.
///
/// Current samples are averaged per minute and rounded to whole
/// centi-amps before scaling to amps. Voltage samples are averaged per
/// minute and left-joined onto the current minutes: voltage minutes
/// without current data are dropped, current minutes without voltage keep
/// a missing voltage. The single measured voltage applies to all phases.
pub fn parse_outlet_pair(
    current_text: &str,
    current_origin: &Path,
    voltage_text: &str,
    voltage_origin: &Path,
    decimal: DecimalSeparator,
) -> Result<LoadedTable, LoadError> {
    let mut diagnostics = Vec::new();

    let currents = per_minute_means(
        current_text,
        current_origin,
        &[
            ACTIVE_CURRENT[0],
            ACTIVE_CURRENT[1],
            ACTIVE_CURRENT[2],
            CURRENT[0],
            CURRENT[1],
            CURRENT[2],
        ],
        decimal,
        &mut diagnostics,
    )?;
    let voltages = per_minute_means(
        voltage_text,
        voltage_origin,
        &[VOLTAGE_MV],
        decimal,
        &mut diagnostics,
    )?;

    let unmatched_voltage = voltages.keys().filter(|m| !currents.contains_key(*m)).count();
    if unmatched_voltage > 0 {
        debug!(unmatched_voltage, "voltage minutes without current data dropped");
    }

    let records: Vec<MeasurementRecord> = currents
        .into_iter()
        .map(|(minute, means)| {
            let centiamps = |i: usize| means[i].map(f64::round_ties_even);
            let voltage = voltages
                .get(&minute)
                .and_then(|v| v[0])
                .map(|mv| mv / MILLIVOLTS_PER_VOLT);

            let mut record = MeasurementRecord::empty(minute, SourceKind::ActiveCurrent);
            record.voltage = [voltage; 3];
            for phase in 0..3 {
                record.active_current[phase] = centiamps(phase).map(|c| c / CENTIAMPS_PER_AMP);
                record.current[phase] = centiamps(phase + 3).map(|c| c / CENTIAMPS_PER_AMP);
            }
            record
        })
        .collect();

    info!(
        current = %current_origin.display(),
        records = records.len(),
        excluded = diagnostics.len(),
        "outlet export loaded"
    );

    Ok(LoadedTable {
        records,
        diagnostics,
    })
}

/// Reads `columns` from a semicolon export and averages them per floored
/// minute. Keys come back in ascending order.
fn per_minute_means(
    text: &str,
    origin: &Path,
    columns: &[&str],
    decimal: DecimalSeparator,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<BTreeMap<NaiveDateTime, Vec<Option<f64>>>, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: origin.to_path_buf(),
        source,
    };

    let mut reader = semicolon_reader(text);
    let header = Columns::from_headers(reader.headers().map_err(csv_err)?);
    let time_idx = header.require(TIME, origin)?;
    let value_idx: Vec<Option<usize>> = columns.iter().map(|c| header.find(c)).collect();

    for (name, idx) in columns.iter().zip(&value_idx) {
        if idx.is_none() {
            warn!(
                origin = %origin.display(),
                column = *name,
                "column absent, values will be missing"
            );
        }
    }

    let mut minutes: BTreeMap<NaiveDateTime, Vec<MeanAccumulator>> = BTreeMap::new();

    for result in reader.records() {
        let row = result.map_err(csv_err)?;
        let time_text = cell(&row, Some(time_idx));

        let Some(timestamp) = parse_outlet_time(time_text) else {
            diagnostics.push(Diagnostic::row_parse(
                line_number(&row),
                raw_line(&row),
                format!("{}: unparseable time `{}`", origin.display(), time_text.trim()),
            ));
            continue;
        };

        let accumulators = minutes
            .entry(floor_to_interval(timestamp, 60))
            .or_insert_with(|| vec![MeanAccumulator::default(); columns.len()]);
        for (acc, idx) in accumulators.iter_mut().zip(&value_idx) {
            acc.push(parse_number(cell(&row, *idx), decimal));
        }
    }

    Ok(minutes
        .into_iter()
        .map(|(minute, accs)| (minute, accs.iter().map(MeanAccumulator::mean).collect()))
        .collect())
}

/// Loads every day's outlet pair in `start..=end` from `dir`.
///
/// A day whose files are missing or unreadable is logged and skipped; the
/// remaining days are concatenated in date order.
#[tracing::instrument(skip(template), fields(dir = %dir.display(), %start, %end))]
pub fn load_outlet_range(
    dir: &Path,
    template: &OutletFileTemplate,
    start: NaiveDate,
    end: NaiveDate,
    decimal: DecimalSeparator,
) -> LoadedTable {
    let mut table = LoadedTable::default();

    if start > end {
        warn!("start date is after end date, nothing to load");
        return table;
    }

    for day in start.iter_days().take_while(|d| *d <= end) {
        let current: PathBuf = dir.join(template.render(day, OutletFileKind::Current));
        let voltage: PathBuf = dir.join(template.render(day, OutletFileKind::Voltage));

        match load_outlet_pair(&current, &voltage, decimal) {
            Ok(day_table) => table.extend(day_table),
            Err(e) => warn!(date = %day, error = %e, "skipping day"),
        }
    }

    table
}
