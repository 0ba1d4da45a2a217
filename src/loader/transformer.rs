use super::source::{
    Columns, DecimalSeparator, cell, line_number, parse_number, raw_line, read_text,
    semicolon_reader,
};
use super::{LoadedTable, MeasurementRecord, SourceKind};
use crate::error::{Diagnostic, LoadError};
use chrono::NaiveDateTime;
use std::path::Path;
use tracing::{debug, info, warn};

/// `Datum` and `Uhrzeit` joined by a space, e.g. `01.12.23 00:15`.
pub const TRANSFORMER_TIMESTAMP_FORMAT: &str = "%d.%m.%y %H:%M";

const DATE: &str = "Datum";
const TIME: &str = "Uhrzeit";
const ACTIVE_SUM: &str = "P L Sum";
const APPARENT_SUM: &str = "S L Sum";
const VOLTAGE: [&str; 3] = ["U L1", "U L2", "U L3"];
const CURRENT: [&str; 3] = ["I L1", "I L2", "I L3"];

/// Parses the trimmed date and time cells of a transformer export row.
pub fn parse_transformer_timestamp(
    date: &str,
    time: &str,
) -> Result<NaiveDateTime, chrono::ParseError> {
    let combined = format!("{} {}", date.trim(), time.trim());
    NaiveDateTime::parse_from_str(&combined, TRANSFORMER_TIMESTAMP_FORMAT)
}

/// Loads a semicolon-separated transformer export from disk.
#[tracing::instrument(fields(path = %path.display()))]
pub fn load_transformer_export(
    path: &Path,
    decimal: DecimalSeparator,
) -> Result<LoadedTable, LoadError> {
    let text = read_text(path)?;
    parse_transformer_export(&text, path, decimal)
}

/// Parses transformer export text. `origin` is only used in error messages.
///
/// Rows whose timestamp does not parse are excluded and reported in
/// [`LoadedTable::diagnostics`]; numeric cells that do not parse become
/// missing values. Only a missing date/time column fails the whole file.
pub fn parse_transformer_export(
    text: &str,
    origin: &Path,
    decimal: DecimalSeparator,
) -> Result<LoadedTable, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: origin.to_path_buf(),
        source,
    };

    let mut reader = semicolon_reader(text);
    let columns = Columns::from_headers(reader.headers().map_err(csv_err)?);

    let date_idx = columns.require(DATE, origin)?;
    let time_idx = columns.require(TIME, origin)?;
    let active_idx = columns.find(ACTIVE_SUM);
    let apparent_idx = columns.find(APPARENT_SUM);
    let voltage_idx = VOLTAGE.map(|c| columns.find(c));
    let current_idx = CURRENT.map(|c| columns.find(c));

    for (name, idx) in [(ACTIVE_SUM, active_idx), (APPARENT_SUM, apparent_idx)] {
        if idx.is_none() {
            warn!(column = name, "column absent, values will be missing");
        }
    }

    let mut table = LoadedTable::default();

    for result in reader.records() {
        let row = result.map_err(csv_err)?;

        let timestamp = match parse_transformer_timestamp(
            cell(&row, Some(date_idx)),
            cell(&row, Some(time_idx)),
        ) {
            Ok(ts) => ts,
            Err(e) => {
                let line = line_number(&row);
                debug!(line, error = %e, "excluding row with unparseable timestamp");
                table
                    .diagnostics
                    .push(Diagnostic::row_parse(line, raw_line(&row), e.to_string()));
                continue;
            }
        };

        let number = |idx: Option<usize>| parse_number(cell(&row, idx), decimal);

        let mut record = MeasurementRecord::empty(timestamp, SourceKind::SummedPower);
        record.voltage = voltage_idx.map(number);
        record.current = current_idx.map(number);
        record.active_power_sum = number(active_idx);
        record.apparent_power_sum = number(apparent_idx);

        table.records.push(record);
    }

    table.records.sort_by_key(|r| r.timestamp);

    if !table.diagnostics.is_empty() {
        warn!(
            excluded = table.diagnostics.len(),
            "rows excluded because of unparseable timestamps"
        );
    }
    info!(
        origin = %origin.display(),
        records = table.records.len(),
        "transformer export loaded"
    );

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const HEADER: &str = "Datum;Uhrzeit;P L Sum;S L Sum;U L1;I L1;U L2;I L2;U L3;I L3";

    fn parse(body: &str) -> LoadedTable {
        let text = format!("{HEADER}\n{body}");
        parse_transformer_export(&text, Path::new("test.csv"), DecimalSeparator::Comma).unwrap()
    }

    #[test]
    fn test_parse_timestamp_trims_whitespace() {
        let ts = parse_transformer_timestamp(" 01.12.23 ", " 00:15").unwrap();
        let expected = NaiveDate::from_ymd_opt(2023, 12, 1)
            .unwrap()
            .and_hms_opt(0, 15, 0)
            .unwrap();
        assert_eq!(ts, expected);
    }

    #[test]
    fn test_parse_rows() {
        let table = parse("01.12.23;00:00;690;690;230;1;230;1;230;1\n01.12.23;00:15;1380,5;1400;230,2;2;230;2;230;2\n");

        assert_eq!(table.records.len(), 2);
        assert!(table.diagnostics.is_empty());

        let second = &table.records[1];
        assert_eq!(second.source, SourceKind::SummedPower);
        assert_eq!(second.active_power_sum, Some(1380.5));
        assert_eq!(second.apparent_power_sum, Some(1400.0));
        assert_eq!(second.voltage[0], Some(230.2));
        assert_eq!(second.current, [Some(2.0); 3]);
        assert_eq!(second.active_current, [None; 3]);
    }

    #[test]
    fn test_bad_timestamp_is_excluded_with_diagnostic() {
        let table = parse("01.12.23;00:00;690;690;230;1;230;1;230;1\nkaputt;00:15;1;1;1;1;1;1;1;1\n01.12.23;00:30;690;690;230;1;230;1;230;1\n");

        assert_eq!(table.records.len(), 2);
        assert_eq!(table.diagnostics.len(), 1);

        let diag = &table.diagnostics[0];
        assert_eq!(diag.line, Some(3));
        assert!(diag.raw.starts_with("kaputt;00:15"));
    }

    #[test]
    fn test_non_numeric_cells_become_missing() {
        let table = parse("01.12.23;00:00;---;690;230;x;230;1;230;\n");

        let record = &table.records[0];
        assert_eq!(record.active_power_sum, None);
        assert_eq!(record.apparent_power_sum, Some(690.0));
        assert_eq!(record.current, [None, Some(1.0), None]);
    }

    #[test]
    fn test_short_row_keeps_timestamp() {
        let table = parse("01.12.23;00:00;690\n");

        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].active_power_sum, Some(690.0));
        assert_eq!(table.records[0].voltage, [None; 3]);
    }

    #[test]
    fn test_rows_are_sorted_by_timestamp() {
        let table = parse("02.12.23;00:00;1;1;1;1;1;1;1;1\n01.12.23;23:45;1;1;1;1;1;1;1;1\n");

        assert!(table.records[0].timestamp < table.records[1].timestamp);
    }

    #[test]
    fn test_missing_time_column_is_fatal() {
        let text = "Datum;P L Sum\n01.12.23;1\n";
        let err =
            parse_transformer_export(text, Path::new("x.csv"), DecimalSeparator::Comma).unwrap_err();

        assert!(matches!(err, LoadError::MissingColumn { ref column, .. } if column == "Uhrzeit"));
    }

    #[test]
    fn test_padded_header_names() {
        let text = " Datum ; Uhrzeit ;P L Sum\n01.12.23;00:00;5\n";
        let table =
            parse_transformer_export(text, Path::new("x.csv"), DecimalSeparator::Comma).unwrap();

        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].active_power_sum, Some(5.0));
    }
}
