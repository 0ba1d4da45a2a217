//! The full analysis as one pure function: loaded table in, enriched rows,
//! resampled rows, profiles and diagnostics out.

use crate::analyzers::aggregate::{profile_by_time_of_day, season_means};
use crate::analyzers::resample::resample;
use crate::analyzers::types::{EnrichedRow, Profile, SeasonMean};
use crate::calendar::{HolidayCalendar, classify};
use crate::config::{CalendarErrorPolicy, PipelineConfig};
use crate::error::{Diagnostic, PipelineError};
use crate::loader::LoadedTable;
use crate::metrics::derive;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Every loaded record with metrics and calendar labels, by timestamp.
    pub rows: Vec<EnrichedRow>,
    /// `rows` averaged into fixed interval buckets.
    pub resampled: Vec<EnrichedRow>,
    pub profiles: Vec<Profile>,
    pub season_means: Vec<SeasonMean>,
    /// Loader diagnostics followed by any records skipped during classification.
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs derivation, classification and aggregation over `table`.
///
/// Holds no state between calls. A failed holiday lookup aborts the run
/// unless `config.calendar_errors` is [`CalendarErrorPolicy::Skip`].
#[tracing::instrument(skip_all, fields(records = table.records.len()))]
pub fn run(
    table: &LoadedTable,
    config: &PipelineConfig,
    holidays: &dyn HolidayCalendar,
) -> Result<PipelineOutput, PipelineError> {
    config.validate()?;

    let options = config.calendar_options();
    let mut diagnostics = table.diagnostics.clone();
    let mut rows = Vec::with_capacity(table.records.len());

    for record in &table.records {
        let calendar = match classify(record.timestamp, &options, holidays) {
            Ok(label) => label,
            Err(source) => match config.calendar_errors {
                CalendarErrorPolicy::Fail => {
                    return Err(PipelineError::Calendar {
                        timestamp: record.timestamp,
                        source,
                    });
                }
                CalendarErrorPolicy::Skip => {
                    warn!(timestamp = %record.timestamp, error = %source, "skipping record");
                    diagnostics.push(Diagnostic::calendar_skipped(record.timestamp, &source));
                    continue;
                }
            },
        };

        rows.push(EnrichedRow {
            record: record.clone(),
            metrics: derive(record),
            calendar,
        });
    }
    rows.sort_by_key(|r| r.record.timestamp);

    let resampled = resample(&rows, config.interval_secs());
    let profiles = profile_by_time_of_day(&resampled, config.grouping, &config.smoothing);
    let season_means = season_means(&resampled, config.grouping);

    if !diagnostics.is_empty() {
        warn!(count = diagnostics.len(), "rows excluded from the analysis");
    }
    info!(
        rows = rows.len(),
        resampled = resampled.len(),
        profiles = profiles.len(),
        "pipeline finished"
    );

    Ok(PipelineOutput {
        rows,
        resampled,
        profiles,
        season_means,
        diagnostics,
    })
}
