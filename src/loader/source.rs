use crate::error::LoadError;
use csv::StringRecord;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Decimal mark used by numeric cells in an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DecimalSeparator {
    #[default]
    Comma,
    Point,
}

/// Reads a file into text, gunzipping `*.gz` paths and falling back to
/// Latin-1 when the content is not valid UTF-8.
pub fn read_text(path: &Path) -> Result<String, LoadError> {
    let io_err = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut bytes = std::fs::read(path).map_err(io_err)?;

    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        let mut decoded = Vec::new();
        GzDecoder::new(bytes.as_slice())
            .read_to_end(&mut decoded)
            .map_err(io_err)?;
        bytes = decoded;
    }

    Ok(decode(bytes, path))
}

fn decode(bytes: Vec<u8>, path: &Path) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => match text.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        },
        Err(err) => {
            debug!(path = %path.display(), "not valid UTF-8, decoding as Latin-1");
            // Latin-1 maps every byte to the code point of the same value.
            err.into_bytes().into_iter().map(char::from).collect()
        }
    }
}

/// Tolerant numeric coercion: blank or non-numeric text is missing, not an
/// error. Thousands separators are not recognised.
pub fn parse_number(text: &str, decimal: DecimalSeparator) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let value = match decimal {
        DecimalSeparator::Comma => text.replace(',', ".").parse::<f64>().ok()?,
        DecimalSeparator::Point => text.parse::<f64>().ok()?,
    };

    value.is_finite().then_some(value)
}

/// Header lookup with whitespace-trimmed column names.
pub(crate) struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    pub(crate) fn from_headers(headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Self { index }
    }

    pub(crate) fn find(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn require(&self, name: &str, path: &Path) -> Result<usize, LoadError> {
        self.find(name).ok_or_else(|| LoadError::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
        })
    }
}

/// Semicolon-delimited reader over in-memory text. Rows may be ragged.
pub(crate) fn semicolon_reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes())
}

pub(crate) fn cell<'a>(record: &'a StringRecord, idx: Option<usize>) -> &'a str {
    idx.and_then(|i| record.get(i)).unwrap_or("")
}

pub(crate) fn raw_line(record: &StringRecord) -> String {
    record.iter().collect::<Vec<_>>().join(";")
}

pub(crate) fn line_number(record: &StringRecord) -> usize {
    record.position().map(|p| p.line() as usize).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    #[test]
    fn test_parse_number_decimal_comma() {
        assert_eq!(parse_number("230,5", DecimalSeparator::Comma), Some(230.5));
        assert_eq!(parse_number(" 12 ", DecimalSeparator::Comma), Some(12.0));
        assert_eq!(parse_number("-0,25", DecimalSeparator::Comma), Some(-0.25));
    }

    #[test]
    fn test_parse_number_decimal_point() {
        assert_eq!(parse_number("230.5", DecimalSeparator::Point), Some(230.5));
        assert_eq!(parse_number("230,5", DecimalSeparator::Point), None);
    }

    #[test]
    fn test_parse_number_non_numeric_is_missing() {
        assert_eq!(parse_number("", DecimalSeparator::Comma), None);
        assert_eq!(parse_number("n/a", DecimalSeparator::Comma), None);
        assert_eq!(parse_number("---", DecimalSeparator::Point), None);
        assert_eq!(parse_number("NaN", DecimalSeparator::Point), None);
        assert_eq!(parse_number("inf", DecimalSeparator::Point), None);
    }

    #[test]
    fn test_read_text_latin1_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.csv");
        // "Weilerstraße" with ß as the single Latin-1 byte 0xDF
        std::fs::write(&path, b"Weilerstra\xdfe;1\n").unwrap();

        let text = read_text(&path).unwrap();
        assert_eq!(text, "Weilerstraße;1\n");
    }

    #[test]
    fn test_read_text_strips_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bom.csv");
        std::fs::write(&path, "\u{feff}Datum;Uhrzeit\n").unwrap();

        assert_eq!(read_text(&path).unwrap(), "Datum;Uhrzeit\n");
    }

    #[test]
    fn test_read_text_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"Time;L1\n").unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        assert_eq!(read_text(&path).unwrap(), "Time;L1\n");
    }

    #[test]
    fn test_read_text_missing_file() {
        let err = read_text(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_columns_trim_header_names() {
        let headers = StringRecord::from(vec![" Datum", "Uhrzeit ", "U L1"]);
        let columns = Columns::from_headers(&headers);

        assert_eq!(columns.find("Datum"), Some(0));
        assert_eq!(columns.find("Uhrzeit"), Some(1));
        assert!(columns.require("I L1", Path::new("x.csv")).is_err());
    }
}
