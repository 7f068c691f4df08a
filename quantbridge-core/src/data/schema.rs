//! Schema normalizer: arbitrary provider columns to the canonical OHLCV schema.
//!
//! Rules, applied per column in table order:
//! - columns whose lower-cased name contains `adj`, `dividend` or `split` are dropped
//! - the first keyword rule that matches the lower-cased name assigns the field
//! - a field already assigned by an earlier column is not reassigned; the later
//!   column is discarded
//!
//! Timestamp cells are parsed into `RawStamp`, which keeps any zone offset the
//! provider supplied so the timezone stage can honor it.

use super::provider::{RawTable, RawValue};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Canonical fields, in canonical output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    Timestamp,
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::Timestamp => "timestamp",
            Field::Open => "open",
            Field::High => "high",
            Field::Low => "low",
            Field::Close => "close",
            Field::Volume => "volume",
        }
    }

    /// Column name on disk (master store, exports, aligned datasets).
    pub fn column(self) -> &'static str {
        match self {
            Field::Timestamp => "Date",
            Field::Open => "Open",
            Field::High => "High",
            Field::Low => "Low",
            Field::Close => "Close",
            Field::Volume => "Volume",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Substrings that disqualify a column before matching.
pub const DROP_KEYWORDS: &[&str] = &["adj", "dividend", "split"];

/// Keyword rules; the first rule with a matching substring wins.
pub const FIELD_RULES: &[(&[&str], Field)] = &[
    (&["date", "time"], Field::Timestamp),
    (&["open"], Field::Open),
    (&["high"], Field::High),
    (&["low"], Field::Low),
    (&["close"], Field::Close),
    (&["volume", "vol"], Field::Volume),
];

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("no timestamp-like column among {columns:?}")]
    MissingTimestamp { columns: Vec<String> },

    #[error("unparseable timestamp at row {row}: {value}")]
    BadTimestamp { row: usize, value: String },
}

// ── Timestamps ──────────────────────────────────────────────────────

/// A parsed provider timestamp: wall clock plus the offset it was expressed
/// in, if the provider gave one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawStamp {
    pub wall: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

impl RawStamp {
    pub fn naive(wall: NaiveDateTime) -> Self {
        Self { wall, offset: None }
    }

    pub fn utc(wall: NaiveDateTime) -> Self {
        Self {
            wall,
            offset: FixedOffset::east_opt(0),
        }
    }

    /// The instant as UTC wall clock. Offset-less stamps are taken as UTC.
    pub fn to_utc(&self) -> NaiveDateTime {
        match self.offset {
            Some(off) => self.wall - Duration::seconds(i64::from(off.local_minus_utc())),
            None => self.wall,
        }
    }
}

/// Epoch integers at or above this are milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

fn from_epoch(v: i64) -> Option<RawStamp> {
    let dt = if v.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(v)?
    } else {
        DateTime::from_timestamp(v, 0)?
    };
    Some(RawStamp::utc(dt.naive_utc()))
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"];

/// Parse a textual timestamp in any of the accepted layouts.
pub fn parse_text_stamp(s: &str) -> Option<RawStamp> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(RawStamp {
            wall: dt.naive_local(),
            offset: Some(*dt.offset()),
        });
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(RawStamp {
                wall: dt.naive_local(),
                offset: Some(*dt.offset()),
            });
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(wall) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(RawStamp::naive(wall));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(RawStamp::naive)
}

/// Parse a timestamp cell. `Ok(None)` for null cells.
pub fn parse_stamp(value: &RawValue) -> Result<Option<RawStamp>, String> {
    match value {
        RawValue::Null => Ok(None),
        RawValue::Int(v) => from_epoch(*v).map(Some).ok_or_else(|| v.to_string()),
        RawValue::Number(f) if f.is_finite() => {
            from_epoch(*f as i64).map(Some).ok_or_else(|| f.to_string())
        }
        RawValue::Number(f) if f.is_nan() => Ok(None),
        RawValue::Number(f) => Err(f.to_string()),
        RawValue::Text(s) if s.trim().is_empty() => Ok(None),
        RawValue::Text(s) => parse_text_stamp(s).map(Some).ok_or_else(|| s.clone()),
    }
}

/// Numeric cell to `Option<f64>`; NaN and unparseable text become `None`.
pub fn parse_number(value: &RawValue) -> Option<f64> {
    let v = match value {
        RawValue::Number(f) => *f,
        RawValue::Int(i) => *i as f64,
        RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
        RawValue::Null => return None,
    };
    (!v.is_nan()).then_some(v)
}

// ── Normalized table ────────────────────────────────────────────────

/// Provider rows mapped onto the canonical fields that could be matched.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    pub stamps: Vec<RawStamp>,
    /// Numeric fields present, in canonical order.
    pub columns: Vec<(Field, Vec<Option<f64>>)>,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    /// Output fields in canonical order; the timestamp is always first.
    pub fn fields(&self) -> Vec<Field> {
        std::iter::once(Field::Timestamp)
            .chain(self.columns.iter().map(|(f, _)| *f))
            .collect()
    }

    pub fn values(&self, field: Field) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_slice())
    }

    /// Keep only rows whose stamp satisfies `keep`.
    pub fn retain_rows(&mut self, keep: impl Fn(&RawStamp) -> bool) {
        let mask: Vec<bool> = self.stamps.iter().map(&keep).collect();
        let mut i = 0;
        self.stamps.retain(|_| {
            i += 1;
            mask[i - 1]
        });
        for (_, values) in &mut self.columns {
            let mut i = 0;
            values.retain(|_| {
                i += 1;
                mask[i - 1]
            });
        }
    }
}

/// Pick the canonical field for a raw column name, if any.
pub fn match_field(column_name: &str) -> Option<Field> {
    let lower = column_name.to_lowercase();
    if DROP_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return None;
    }
    FIELD_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, field)| *field)
}

/// Map a raw provider table onto the canonical schema.
pub fn normalize(table: &RawTable) -> Result<NormalizedTable, NormalizeError> {
    let mut assigned: Vec<(Field, usize)> = Vec::new();
    for (idx, column) in table.columns.iter().enumerate() {
        let Some(field) = match_field(&column.name) else {
            debug!(column = %column.name, "column dropped by schema normalizer");
            continue;
        };
        if assigned.iter().any(|(f, _)| *f == field) {
            debug!(column = %column.name, %field, "duplicate column discarded");
            continue;
        }
        assigned.push((field, idx));
    }
    assigned.sort_by_key(|(f, _)| *f);

    let ts_idx = assigned
        .iter()
        .find(|(f, _)| *f == Field::Timestamp)
        .map(|(_, idx)| *idx)
        .ok_or_else(|| NormalizeError::MissingTimestamp {
            columns: table.column_names().into_iter().map(String::from).collect(),
        })?;

    let ts_values = &table.columns[ts_idx].values;
    let mut rows = Vec::with_capacity(table.row_count());
    let mut stamps = Vec::with_capacity(table.row_count());
    for row in 0..table.row_count() {
        let cell = ts_values.get(row).unwrap_or(&RawValue::Null);
        match parse_stamp(cell) {
            Ok(Some(stamp)) => {
                stamps.push(stamp);
                rows.push(row);
            }
            Ok(None) => debug!(row, "row without timestamp skipped"),
            Err(value) => return Err(NormalizeError::BadTimestamp { row, value }),
        }
    }

    let columns = assigned
        .iter()
        .filter(|(f, _)| *f != Field::Timestamp)
        .map(|(field, idx)| {
            let cells = &table.columns[*idx].values;
            let values = rows
                .iter()
                .map(|&r| cells.get(r).and_then(parse_number))
                .collect();
            (*field, values)
        })
        .collect();

    Ok(NormalizedTable { stamps, columns })
}
