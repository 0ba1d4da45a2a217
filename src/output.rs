//! Export of pipeline results.
//!
//! Supports CSV (optionally gzip-compressed), XLSX workbooks, and a JSON run
//! summary.

use crate::analyzers::types::{EnrichedRow, Profile, SeasonMean};
use crate::config::PipelineConfig;
use crate::error::Diagnostic;
use crate::pipeline::PipelineOutput;
use anyhow::{Context, Result};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIME_OF_DAY_FORMAT: &str = "%H:%M";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Csv,
    CsvGz,
    Xlsx,
}

/// One enriched or resampled row as exported.
#[derive(Debug, Serialize)]
pub struct ExportRow {
    pub timestamp: String,
    pub u_l1: Option<f64>,
    pub u_l2: Option<f64>,
    pub u_l3: Option<f64>,
    pub i_l1: Option<f64>,
    pub i_l2: Option<f64>,
    pub i_l3: Option<f64>,
    pub i_active_l1: Option<f64>,
    pub i_active_l2: Option<f64>,
    pub i_active_l3: Option<f64>,
    pub p_sum_w: Option<f64>,
    pub s_sum_w: Option<f64>,
    pub power_factor: Option<f64>,
    pub cos_phi_l1: Option<f64>,
    pub cos_phi_l2: Option<f64>,
    pub cos_phi_l3: Option<f64>,
    pub active_power_kw: Option<f64>,
    pub apparent_power_kw: Option<f64>,
    pub reactive_power_kw: Option<f64>,
    pub weekday_bucket: &'static str,
    pub day_type: &'static str,
    pub season: &'static str,
    pub holiday: bool,
}

impl From<&EnrichedRow> for ExportRow {
    fn from(row: &EnrichedRow) -> Self {
        let r = &row.record;
        let m = &row.metrics;
        Self {
            timestamp: r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            u_l1: r.voltage[0],
            u_l2: r.voltage[1],
            u_l3: r.voltage[2],
            i_l1: r.current[0],
            i_l2: r.current[1],
            i_l3: r.current[2],
            i_active_l1: r.active_current[0],
            i_active_l2: r.active_current[1],
            i_active_l3: r.active_current[2],
            p_sum_w: r.active_power_sum,
            s_sum_w: r.apparent_power_sum,
            power_factor: m.power_factor,
            cos_phi_l1: m.phase_power_factor[0],
            cos_phi_l2: m.phase_power_factor[1],
            cos_phi_l3: m.phase_power_factor[2],
            active_power_kw: m.active_power_kw,
            apparent_power_kw: m.apparent_power_kw,
            reactive_power_kw: m.reactive_power_kw,
            weekday_bucket: row.calendar.weekday.label(),
            day_type: row.calendar.day_type().label(),
            season: row.calendar.season.label(),
            holiday: row.calendar.holiday,
        }
    }
}

/// One time-of-day bucket of a profile. Absent buckets have no row.
#[derive(Debug, Serialize)]
pub struct ProfileRow {
    pub group: String,
    pub time_of_day: String,
    pub samples: usize,
    pub mean_kw: f64,
    pub smoothed_kw: Option<f64>,
}

impl ProfileRow {
    pub fn from_profiles(profiles: &[Profile]) -> Vec<Self> {
        profiles
            .iter()
            .flat_map(|profile| {
                profile.points.iter().map(move |p| ProfileRow {
                    group: profile.group.to_string(),
                    time_of_day: p.time_of_day.format(TIME_OF_DAY_FORMAT).to_string(),
                    samples: p.samples,
                    mean_kw: p.mean_kw,
                    smoothed_kw: p.smoothed_kw,
                })
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct SeasonRow {
    pub group: String,
    pub season: &'static str,
    pub samples: usize,
    pub mean_kw: f64,
}

impl From<&SeasonMean> for SeasonRow {
    fn from(m: &SeasonMean) -> Self {
        Self {
            group: m.group.to_string(),
            season: m.season.label(),
            samples: m.samples,
            mean_kw: m.mean_kw,
        }
    }
}

/// Written next to the tables as `<stem>_summary.json`.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub rows: usize,
    pub resampled_rows: usize,
    pub profiles: usize,
    pub excluded: usize,
    pub config: &'a PipelineConfig,
    pub diagnostics: &'a [Diagnostic],
    pub files: Vec<PathBuf>,
}

/// Writes rows to a CSV file with a header, gzip-compressed when `gzip`.
pub fn write_table<T: Serialize>(path: &Path, rows: &[T], gzip: bool) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), gzip, "writing CSV table");
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;

    if gzip {
        let mut writer = WriterBuilder::new().from_writer(GzEncoder::new(file, Compression::default()));
        for row in rows {
            writer.serialize(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("flushing {}: {}", path.display(), e.error()))?
            .finish()?;
    } else {
        let mut writer = WriterBuilder::new().from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }

    Ok(())
}

/// A row that can be laid out on a worksheet.
trait SheetRow {
    const HEADERS: &'static [&'static str];
    fn write(&self, sheet: &mut Worksheet, row: u32) -> Result<(), XlsxError>;
}

fn put_number(sheet: &mut Worksheet, row: u32, col: u16, value: Option<f64>) -> Result<(), XlsxError> {
    if let Some(v) = value {
        sheet.write_number(row, col, v)?;
    }
    Ok(())
}

impl SheetRow for ExportRow {
    const HEADERS: &'static [&'static str] = &[
        "timestamp",
        "u_l1",
        "u_l2",
        "u_l3",
        "i_l1",
        "i_l2",
        "i_l3",
        "i_active_l1",
        "i_active_l2",
        "i_active_l3",
        "p_sum_w",
        "s_sum_w",
        "power_factor",
        "cos_phi_l1",
        "cos_phi_l2",
        "cos_phi_l3",
        "active_power_kw",
        "apparent_power_kw",
        "reactive_power_kw",
        "weekday_bucket",
        "day_type",
        "season",
        "holiday",
    ];

    fn write(&self, sheet: &mut Worksheet, row: u32) -> Result<(), XlsxError> {
        sheet.write_string(row, 0, &self.timestamp)?;
        let numbers = [
            self.u_l1,
            self.u_l2,
            self.u_l3,
            self.i_l1,
            self.i_l2,
            self.i_l3,
            self.i_active_l1,
            self.i_active_l2,
            self.i_active_l3,
            self.p_sum_w,
            self.s_sum_w,
            self.power_factor,
            self.cos_phi_l1,
            self.cos_phi_l2,
            self.cos_phi_l3,
            self.active_power_kw,
            self.apparent_power_kw,
            self.reactive_power_kw,
        ];
        for (col, value) in numbers.into_iter().enumerate() {
            put_number(sheet, row, col as u16 + 1, value)?;
        }
        sheet.write_string(row, 19, self.weekday_bucket)?;
        sheet.write_string(row, 20, self.day_type)?;
        sheet.write_string(row, 21, self.season)?;
        sheet.write_boolean(row, 22, self.holiday)?;
        Ok(())
    }
}

impl SheetRow for ProfileRow {
    const HEADERS: &'static [&'static str] =
        &["group", "time_of_day", "samples", "mean_kw", "smoothed_kw"];

    fn write(&self, sheet: &mut Worksheet, row: u32) -> Result<(), XlsxError> {
        sheet.write_string(row, 0, &self.group)?;
        sheet.write_string(row, 1, &self.time_of_day)?;
        sheet.write_number(row, 2, self.samples as f64)?;
        sheet.write_number(row, 3, self.mean_kw)?;
        put_number(sheet, row, 4, self.smoothed_kw)
    }
}

impl SheetRow for SeasonRow {
    const HEADERS: &'static [&'static str] = &["group", "season", "samples", "mean_kw"];

    fn write(&self, sheet: &mut Worksheet, row: u32) -> Result<(), XlsxError> {
        sheet.write_string(row, 0, &self.group)?;
        sheet.write_string(row, 1, self.season)?;
        sheet.write_number(row, 2, self.samples as f64)?;
        sheet.write_number(row, 3, self.mean_kw)?;
        Ok(())
    }
}

fn add_sheet<T: SheetRow>(workbook: &mut Workbook, name: &str, rows: &[T]) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;
    for (col, header) in T::HEADERS.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }
    for (i, row) in rows.iter().enumerate() {
        row.write(sheet, i as u32 + 1)?;
    }
    Ok(())
}

/// Writes all tables of a run to `out_dir`, named after `stem`, plus the
/// JSON run summary. Returns the paths written.
#[tracing::instrument(skip_all, fields(out_dir = %out_dir.display(), stem = %stem, format = ?config.output_format))]
pub fn write_outputs(
    out_dir: &Path,
    stem: &str,
    output: &PipelineOutput,
    config: &PipelineConfig,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let rows: Vec<ExportRow> = output.rows.iter().map(ExportRow::from).collect();
    let resampled: Vec<ExportRow> = output.resampled.iter().map(ExportRow::from).collect();
    let profiles = ProfileRow::from_profiles(&output.profiles);
    let seasons: Vec<SeasonRow> = output.season_means.iter().map(SeasonRow::from).collect();

    let mut files = Vec::new();

    match config.output_format {
        OutputFormat::Csv | OutputFormat::CsvGz => {
            let gzip = config.output_format == OutputFormat::CsvGz;
            let ext = if gzip { "csv.gz" } else { "csv" };
            let path_for = |table: &str| out_dir.join(format!("{stem}_{table}.{ext}"));

            let targets = [
                path_for("rows"),
                path_for("resampled"),
                path_for("profiles"),
                path_for("seasons"),
            ];
            write_table(&targets[0], &rows, gzip)?;
            write_table(&targets[1], &resampled, gzip)?;
            write_table(&targets[2], &profiles, gzip)?;
            write_table(&targets[3], &seasons, gzip)?;
            files.extend(targets);
        }
        OutputFormat::Xlsx => {
            let path = out_dir.join(format!("{stem}.xlsx"));
            let mut workbook = Workbook::new();
            add_sheet(&mut workbook, "rows", &rows)?;
            add_sheet(&mut workbook, "resampled", &resampled)?;
            add_sheet(&mut workbook, "profiles", &profiles)?;
            add_sheet(&mut workbook, "seasons", &seasons)?;
            workbook
                .save(&path)
                .with_context(|| format!("saving workbook {}", path.display()))?;
            files.push(path);
        }
    }

    let summary_path = out_dir.join(format!("{stem}_summary.json"));
    let summary = RunSummary {
        rows: output.rows.len(),
        resampled_rows: output.resampled.len(),
        profiles: output.profiles.len(),
        excluded: output.diagnostics.len(),
        config,
        diagnostics: &output.diagnostics,
        files: files.clone(),
    };
    let mut file = File::create(&summary_path)
        .with_context(|| format!("creating {}", summary_path.display()))?;
    let json = serde_json::to_string_pretty(&summary)?;
    debug!(summary = %json, "run summary");
    file.write_all(json.as_bytes())?;
    files.push(summary_path);

    info!(files = files.len(), "outputs written");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::{ProfileGroup, ProfilePoint};
    use crate::calendar::{DayType, Season};
    use chrono::NaiveTime;
    use flate2::read::GzDecoder;
    use std::fs;
    use std::io::Read;

    fn profile() -> Profile {
        Profile {
            group: ProfileGroup::DayType(DayType::Saturday),
            points: vec![
                ProfilePoint {
                    time_of_day: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
                    samples: 2,
                    mean_kw: 1.5,
                    smoothed_kw: Some(1.25),
                },
                ProfilePoint {
                    time_of_day: NaiveTime::from_hms_opt(0, 15, 0).unwrap(),
                    samples: 1,
                    mean_kw: 0.0,
                    smoothed_kw: None,
                },
            ],
        }
    }

    #[test]
    fn test_profile_rows() {
        let rows = ProfileRow::from_profiles(&[profile()]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].group, "Saturday");
        assert_eq!(rows[0].time_of_day, "00:00");
        assert_eq!(rows[1].mean_kw, 0.0);
        assert_eq!(rows[1].smoothed_kw, None);
    }

    #[test]
    fn test_write_table_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.csv");

        write_table(&path, &ProfileRow::from_profiles(&[profile()]), false).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], "group,time_of_day,samples,mean_kw,smoothed_kw");
        assert_eq!(lines[1], "Saturday,00:00,2,1.5,1.25");
        // missing smoothed value is an empty cell, not zero
        assert_eq!(lines[2], "Saturday,00:15,1,0.0,");
    }

    #[test]
    fn test_write_table_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seasons.csv.gz");
        let rows = vec![SeasonRow::from(&SeasonMean {
            group: ProfileGroup::All,
            season: Season::Summer,
            samples: 3,
            mean_kw: 2.0,
        })];

        write_table(&path, &rows, true).unwrap();

        let mut content = String::new();
        GzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "group,season,samples,mean_kw\nAll days,Summer,3,2.0\n");
    }

    #[test]
    fn test_write_outputs_xlsx() {
        let dir = tempfile::tempdir().unwrap();
        let output = PipelineOutput {
            rows: vec![],
            resampled: vec![],
            profiles: vec![profile()],
            season_means: vec![],
            diagnostics: vec![],
        };
        let config = PipelineConfig {
            output_format: OutputFormat::Xlsx,
            ..Default::default()
        };

        let files = write_outputs(dir.path(), "run", &output, &config).unwrap();

        assert_eq!(files.len(), 2);
        assert!(dir.path().join("run.xlsx").exists());
        let summary = fs::read_to_string(dir.path().join("run_summary.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&summary).unwrap();
        assert_eq!(json["profiles"], 1);
        assert_eq!(json["config"]["output_format"], "xlsx");
    }
}
