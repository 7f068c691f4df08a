//! On-demand export of series and aligned datasets.
//!
//! File names follow `{code}_{timeframe}_{YYYYMMDD}.{ext}` where the date is
//! the requested start. CSV output is UTF-8 with a byte-order mark so
//! spreadsheet tools pick the right encoding; Parquet output matches the
//! master store layout.

use super::align::AlignedDataset;
use super::parquet::{series_to_dataframe, write_parquet_atomic, ParquetError};
use super::schema::Field;
use crate::domain::{format_timestamp, sanitize_symbol, Series, Timeframe};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export")]
    Empty,

    #[error("export I/O error: {0}")]
    Io(String),

    #[error("csv error: {0}")]
    Csv(String),

    #[error(transparent)]
    Parquet(#[from] ParquetError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Parquet,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Parquet => "parquet",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "parquet" => Ok(ExportFormat::Parquet),
            other => Err(format!("unknown export format '{other}' (expected csv or parquet)")),
        }
    }
}

/// `{code}_{timeframe}_{YYYYMMDD}.{ext}`
pub fn export_file_name(
    code: &str,
    timeframe: Timeframe,
    start: NaiveDate,
    format: ExportFormat,
) -> String {
    format!(
        "{}_{}_{}.{}",
        sanitize_symbol(code),
        timeframe,
        start.format("%Y%m%d"),
        format.extension()
    )
}

fn cell(v: Option<f64>) -> String {
    match v {
        Some(x) if !x.is_nan() => x.to_string(),
        _ => String::new(),
    }
}

/// Write a BOM-prefixed CSV file.
pub fn write_csv_with_bom<I>(path: &Path, headers: &[String], rows: I) -> Result<(), ExportError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ExportError::Io(format!("create dir: {e}")))?;
    }
    let mut file = fs::File::create(path)
        .map_err(|e| ExportError::Io(format!("create {}: {e}", path.display())))?;
    file.write_all(UTF8_BOM)
        .map_err(|e| ExportError::Io(format!("write BOM: {e}")))?;

    let mut writer = csv::Writer::from_writer(file);
    writer
        .write_record(headers)
        .map_err(|e| ExportError::Csv(e.to_string()))?;
    for row in rows {
        writer
            .write_record(&row)
            .map_err(|e| ExportError::Csv(e.to_string()))?;
    }
    writer.flush().map_err(|e| ExportError::Io(e.to_string()))
}

/// Write a series as CSV with the master store column names.
pub fn write_series_csv(series: &Series, path: &Path) -> Result<(), ExportError> {
    let with_volume = series.has_volume();
    let mut headers: Vec<String> = [
        Field::Timestamp,
        Field::Open,
        Field::High,
        Field::Low,
        Field::Close,
    ]
    .iter()
    .map(|f| f.column().to_string())
    .collect();
    if with_volume {
        headers.push(Field::Volume.column().to_string());
    }

    let rows = series.bars.iter().map(|b| {
        let mut row = vec![
            format_timestamp(&b.timestamp),
            cell(Some(b.open)),
            cell(Some(b.high)),
            cell(Some(b.low)),
            cell(Some(b.close)),
        ];
        if with_volume {
            row.push(cell(b.volume));
        }
        row
    });
    write_csv_with_bom(path, &headers, rows)
}

/// Export a series into `dir` under the standard file name.
pub fn export_series(
    series: &Series,
    dir: &Path,
    start: NaiveDate,
    format: ExportFormat,
) -> Result<PathBuf, ExportError> {
    if series.is_empty() {
        return Err(ExportError::Empty);
    }
    let path = dir.join(export_file_name(&series.key.symbol, series.key.timeframe, start, format));
    match format {
        ExportFormat::Csv => write_series_csv(series, &path)?,
        ExportFormat::Parquet => {
            let mut df = series_to_dataframe(series)?;
            write_parquet_atomic(&mut df, &path)?;
        }
    }
    Ok(path)
}

/// Export an aligned dataset to `path`; the format follows the argument.
pub fn export_aligned(
    dataset: &AlignedDataset,
    path: &Path,
    format: ExportFormat,
) -> Result<(), ExportError> {
    if dataset.is_empty() {
        return Err(ExportError::Empty);
    }
    match format {
        ExportFormat::Csv => write_csv_with_bom(path, &dataset.headers(), dataset.text_rows()),
        ExportFormat::Parquet => {
            let mut df = dataset.to_dataframe()?;
            write_parquet_atomic(&mut df, path)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, SeriesKey};

    fn series(volume: Option<f64>) -> Series {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Series::new(
            SeriesKey::new("BTC/USDT", Timeframe::D1),
            vec![Bar {
                timestamp: ts,
                open: 1.5,
                high: 2.0,
                low: f64::NAN,
                close: 1.75,
                volume,
            }],
        )
    }

    #[test]
    fn file_name_layout() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(
            export_file_name("1155", Timeframe::D1, start, ExportFormat::Csv),
            "1155_1d_20240102.csv"
        );
        assert_eq!(
            export_file_name("BTC/USDT", Timeframe::Mo1, start, ExportFormat::Parquet),
            "BTC-USDT_1M_20240102.parquet"
        );
    }

    #[test]
    fn csv_has_bom_and_blank_nan() {
        let dir = tempfile::tempdir().unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let path =
            export_series(&series(Some(10.0)), dir.path(), start, ExportFormat::Csv).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Date,Open,High,Low,Close,Volume"));
        assert_eq!(lines.next(), Some("2024-01-02 00:00:00,1.5,2,,1.75,10"));
    }

    #[test]
    fn csv_omits_volume_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.csv");
        write_series_csv(&series(None), &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.trim_start_matches('\u{feff}').starts_with("Date,Open,High,Low,Close\n"));
    }

    #[test]
    fn empty_series_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let empty = Series::empty(SeriesKey::new("X", Timeframe::D1));
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert!(matches!(
            export_series(&empty, dir.path(), start, ExportFormat::Csv),
            Err(ExportError::Empty)
        ));
    }

    #[test]
    fn format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }
}
