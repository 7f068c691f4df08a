//! Parquet I/O helpers shared by the master store and the alignment engine.
//!
//! - Atomic writes (write to .tmp, rename into place), snappy compression
//! - Series ⇄ DataFrame conversion using the on-disk column names
//! - Tolerant time-column reader for externally produced files

use super::schema::{parse_text_stamp, Field};
use crate::domain::{format_timestamp, parse_timestamp, Bar, Series, SeriesKey};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParquetError {
    #[error("parquet I/O error: {0}")]
    Io(String),

    #[error("unexpected frame layout: {0}")]
    Layout(String),
}

/// Column names accepted as the time axis, compared lower-cased.
const TIME_COLUMNS: &[&str] = &["date", "datetime", "timestamp", "time"];

// ── Write ───────────────────────────────────────────────────────────

/// Write a DataFrame with snappy compression, atomically.
pub fn write_parquet_atomic(df: &mut DataFrame, path: &Path) -> Result<(), ParquetError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ParquetError::Io(format!("create dir {}: {e}", parent.display())))?;
    }
    let tmp_path = path.with_extension("parquet.tmp");
    let file = fs::File::create(&tmp_path)
        .map_err(|e| ParquetError::Io(format!("create {}: {e}", tmp_path.display())))?;

    if let Err(e) = ParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .finish(df)
    {
        let _ = fs::remove_file(&tmp_path);
        return Err(ParquetError::Io(format!("write parquet: {e}")));
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        ParquetError::Io(format!("atomic rename failed: {e}"))
    })
}

/// Series to a DataFrame: `Date` text plus OHLC, and `Volume` when any bar
/// carries one.
pub fn series_to_dataframe(series: &Series) -> Result<DataFrame, ParquetError> {
    let bars = &series.bars;
    let dates: Vec<String> = bars.iter().map(|b| format_timestamp(&b.timestamp)).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let mut columns = vec![
        Column::new(Field::Timestamp.column().into(), dates),
        Column::new(Field::Open.column().into(), opens),
        Column::new(Field::High.column().into(), highs),
        Column::new(Field::Low.column().into(), lows),
        Column::new(Field::Close.column().into(), closes),
    ];
    if series.has_volume() {
        let volumes: Vec<Option<f64>> = bars.iter().map(|b| b.volume).collect();
        columns.push(Column::new(Field::Volume.column().into(), volumes));
    }

    DataFrame::new(columns).map_err(|e| ParquetError::Layout(format!("dataframe creation: {e}")))
}

pub fn write_series(series: &Series, path: &Path) -> Result<(), ParquetError> {
    let mut df = series_to_dataframe(series)?;
    write_parquet_atomic(&mut df, path)
}

// ── Read ────────────────────────────────────────────────────────────

pub fn read_parquet(path: &Path) -> Result<DataFrame, ParquetError> {
    let file = fs::File::open(path)
        .map_err(|e| ParquetError::Io(format!("open {}: {e}", path.display())))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| ParquetError::Io(format!("read {}: {e}", path.display())))
}

/// A numeric column as `Option<f64>`, `None` if the column is absent.
/// Integer columns are widened to f64.
pub fn read_f64_column(
    df: &DataFrame,
    name: &str,
) -> Result<Option<Vec<Option<f64>>>, ParquetError> {
    let Ok(column) = df.column(name) else {
        return Ok(None);
    };
    let cast = column
        .cast(&DataType::Float64)
        .map_err(|e| ParquetError::Layout(format!("{name} is not numeric: {e}")))?;
    let ca = cast
        .f64()
        .map_err(|e| ParquetError::Layout(format!("{name} column type: {e}")))?;
    Ok(Some(ca.into_iter().collect()))
}

/// Time axis of an externally produced frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeColumn {
    pub name: String,
    /// Zone-aware values converted to UTC; naive values as stored.
    pub values: Vec<NaiveDateTime>,
    /// True if any value carried zone information.
    pub zone_aware: bool,
}

fn epoch_to_naive(v: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let per_sec: i64 = match unit {
        TimeUnit::Nanoseconds => 1_000_000_000,
        TimeUnit::Microseconds => 1_000_000,
        TimeUnit::Milliseconds => 1_000,
    };
    let secs = v.div_euclid(per_sec);
    let nanos = v.rem_euclid(per_sec) * (1_000_000_000 / per_sec);
    DateTime::from_timestamp(secs, nanos as u32).map(|d| d.naive_utc())
}

/// Locate and decode the time column: text, Datetime (with or without
/// zone) or Date.
pub fn read_time_column(df: &DataFrame) -> Result<TimeColumn, ParquetError> {
    let column = df
        .get_columns()
        .iter()
        .find(|c| TIME_COLUMNS.contains(&c.name().to_lowercase().as_str()))
        .ok_or_else(|| ParquetError::Layout("no Date column".into()))?;
    let name = column.name().to_string();
    let null_at = |i: usize| ParquetError::Layout(format!("null {name} at row {i}"));

    match column.dtype() {
        DataType::String => {
            let ca = column
                .str()
                .map_err(|e| ParquetError::Layout(format!("{name} column type: {e}")))?;
            let mut zone_aware = false;
            let mut values = Vec::with_capacity(ca.len());
            for (i, cell) in ca.into_iter().enumerate() {
                let text = cell.ok_or_else(|| null_at(i))?;
                let stamp = parse_text_stamp(text).ok_or_else(|| {
                    ParquetError::Layout(format!("unparseable {name} '{text}' at row {i}"))
                })?;
                if stamp.offset.is_some() {
                    zone_aware = true;
                    values.push(stamp.to_utc());
                } else {
                    values.push(stamp.wall);
                }
            }
            Ok(TimeColumn { name, values, zone_aware })
        }
        DataType::Datetime(unit, tz) => {
            let unit = *unit;
            let zone_aware = tz.is_some();
            let phys = column
                .cast(&DataType::Int64)
                .map_err(|e| ParquetError::Layout(format!("{name} cast: {e}")))?;
            let ca = phys
                .i64()
                .map_err(|e| ParquetError::Layout(format!("{name} column type: {e}")))?;
            let values = ca
                .into_iter()
                .enumerate()
                .map(|(i, v)| v.and_then(|v| epoch_to_naive(v, unit)).ok_or_else(|| null_at(i)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TimeColumn { name, values, zone_aware })
        }
        DataType::Date => {
            let phys = column
                .cast(&DataType::Int32)
                .map_err(|e| ParquetError::Layout(format!("{name} cast: {e}")))?;
            let ca = phys
                .i32()
                .map_err(|e| ParquetError::Layout(format!("{name} column type: {e}")))?;
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(|| ParquetError::Layout("epoch".into()))?;
            let values = ca
                .into_iter()
                .enumerate()
                .map(|(i, v)| {
                    v.map(|days| epoch + chrono::Duration::days(i64::from(days)))
                        .ok_or_else(|| null_at(i))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TimeColumn {
                name,
                values,
                zone_aware: false,
            })
        }
        other => Err(ParquetError::Layout(format!(
            "{name} has unsupported type {other:?}"
        ))),
    }
}

/// Decode a master store frame. Requires `Date` text and the four price
/// columns; `Volume` is optional.
pub fn dataframe_to_series(df: &DataFrame, key: SeriesKey) -> Result<Series, ParquetError> {
    let date_col = df
        .column(Field::Timestamp.column())
        .map_err(|e| ParquetError::Layout(format!("missing Date column: {e}")))?;
    let dates = date_col
        .str()
        .map_err(|e| ParquetError::Layout(format!("Date column type: {e}")))?;

    let mut prices = Vec::with_capacity(4);
    for field in [Field::Open, Field::High, Field::Low, Field::Close] {
        let values = read_f64_column(df, field.column())?
            .ok_or_else(|| ParquetError::Layout(format!("missing column '{}'", field.column())))?;
        prices.push(values);
    }
    let volumes = read_f64_column(df, Field::Volume.column())?;

    let mut bars = Vec::with_capacity(df.height());
    for (i, cell) in dates.into_iter().enumerate() {
        let text = cell.ok_or_else(|| ParquetError::Layout(format!("null Date at row {i}")))?;
        let timestamp = parse_timestamp(text)
            .ok_or_else(|| ParquetError::Layout(format!("bad Date '{text}' at row {i}")))?;
        let price = |k: usize| prices[k][i].unwrap_or(f64::NAN);
        bars.push(Bar {
            timestamp,
            open: price(0),
            high: price(1),
            low: price(2),
            close: price(3),
            volume: volumes.as_ref().and_then(|v| v[i]),
        });
    }

    Ok(Series::new(key, bars))
}

/// Read a master store file into a series.
pub fn read_series(path: &Path, key: SeriesKey) -> Result<Series, ParquetError> {
    let df = read_parquet(path)?;
    if df.height() == 0 {
        return Err(ParquetError::Layout("empty parquet file".into()));
    }
    dataframe_to_series(&df, key)
}
