//! Two-series time alignment.
//!
//! Two series sampled on different calendars are joined on the union of
//! their timestamps. Rows present on only one side carry `None` for the
//! other side's columns, unless forward fill is enabled for that side.
//!
//! Two entry points:
//! - `align_files`: any two Parquet files; symbol taken from the file stem
//! - `align_datasets`: two master store records resampled to one timeframe
//!
//! Only the five price/volume columns are carried, prefixed `{symbol}_`.
//! `is_overlap` marks rows where both closes are present.

use super::parquet::{
    read_f64_column, read_parquet, read_time_column, write_parquet_atomic, ParquetError,
};
use super::resample::{resample_series, Frequency};
use super::schema::Field;
use crate::domain::{format_timestamp, sanitize_symbol, Series, SeriesKey, Timeframe};
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Rows shown from each end of a large preview.
pub const PREVIEW_EDGE_ROWS: usize = 50;

pub const OVERLAP_COLUMN: &str = "is_overlap";

const VALUE_FIELDS: [Field; 5] = [
    Field::Open,
    Field::High,
    Field::Low,
    Field::Close,
    Field::Volume,
];

#[derive(Debug, Error)]
pub enum AlignError {
    #[error("{path} not found; download {symbol} {timeframe} into the store first")]
    MissingInput {
        symbol: String,
        timeframe: String,
        path: PathBuf,
    },

    #[error("input file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("both inputs resolve to symbol '{0}'")]
    SameSymbol(String),

    #[error("timeframe {0} cannot be used for alignment")]
    UnsupportedTimeframe(Timeframe),

    #[error("{path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ParquetError,
    },

    #[error("write aligned dataset: {0}")]
    Write(#[from] ParquetError),
}

/// Which side forward fill applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillTarget {
    A,
    #[default]
    B,
    Both,
}

impl FillTarget {
    fn covers_a(self) -> bool {
        matches!(self, FillTarget::A | FillTarget::Both)
    }

    fn covers_b(self) -> bool {
        matches!(self, FillTarget::B | FillTarget::Both)
    }
}

impl std::str::FromStr for FillTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(FillTarget::A),
            "b" => Ok(FillTarget::B),
            "both" => Ok(FillTarget::Both),
            other => Err(format!("unknown fill target '{other}' (expected a, b or both)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignOptions {
    pub forward_fill: bool,
    pub fill_target: FillTarget,
    /// File name inside the processed directory; generated when absent.
    pub output_name: Option<String>,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            forward_fill: true,
            fill_target: FillTarget::B,
            output_name: None,
        }
    }
}

// ── Dataset ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct AlignedColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Outer join of two series on timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedDataset {
    pub timestamps: Vec<NaiveDateTime>,
    /// Side A columns first, then side B.
    pub columns: Vec<AlignedColumn>,
    pub is_overlap: Vec<bool>,
}

impl AlignedDataset {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    fn take_rows(&self, rows: impl Iterator<Item = usize> + Clone) -> Self {
        Self {
            timestamps: rows.clone().map(|i| self.timestamps[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| AlignedColumn {
                    name: c.name.clone(),
                    values: rows.clone().map(|i| c.values[i]).collect(),
                })
                .collect(),
            is_overlap: rows.map(|i| self.is_overlap[i]).collect(),
        }
    }

    /// Whole table up to 100 rows, otherwise the first and last 50.
    pub fn preview(&self) -> Self {
        let n = self.len();
        if n <= 2 * PREVIEW_EDGE_ROWS {
            return self.clone();
        }
        self.take_rows((0..PREVIEW_EDGE_ROWS).chain(n - PREVIEW_EDGE_ROWS..n))
    }

    /// `Date`, the value columns, `is_overlap`.
    pub fn headers(&self) -> Vec<String> {
        std::iter::once(Field::Timestamp.column().to_string())
            .chain(self.columns.iter().map(|c| c.name.clone()))
            .chain(std::iter::once(OVERLAP_COLUMN.to_string()))
            .collect()
    }

    /// Rows rendered as text; missing values are empty.
    pub fn text_rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        (0..self.len()).map(move |i| {
            let mut row = Vec::with_capacity(self.columns.len() + 2);
            row.push(format_timestamp(&self.timestamps[i]));
            for c in &self.columns {
                row.push(c.values[i].map(|v| v.to_string()).unwrap_or_default());
            }
            row.push(self.is_overlap[i].to_string());
            row
        })
    }

    pub fn to_dataframe(&self) -> Result<DataFrame, ParquetError> {
        let mut columns = Vec::with_capacity(self.columns.len() + 2);
        let dates: Vec<String> = self.timestamps.iter().map(format_timestamp).collect();
        columns.push(Column::new(Field::Timestamp.column().into(), dates));
        for c in &self.columns {
            columns.push(Column::new(c.name.as_str().into(), c.values.clone()));
        }
        columns.push(Column::new(OVERLAP_COLUMN.into(), self.is_overlap.clone()));
        DataFrame::new(columns).map_err(|e| ParquetError::Layout(format!("aligned frame: {e}")))
    }

    /// BLAKE3 digest of the full content, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for name in self.headers() {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
        }
        for (i, ts) in self.timestamps.iter().enumerate() {
            hasher.update(&ts.and_utc().timestamp().to_le_bytes());
            for c in &self.columns {
                match c.values[i] {
                    Some(v) => hasher.update(&v.to_bits().to_le_bytes()),
                    None => hasher.update(&[0xff]),
                };
            }
            hasher.update(&[u8::from(self.is_overlap[i])]);
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Summary figures of an aligned dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignStats {
    pub rows: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
    pub span_days: i64,
    /// Percentage of rows with side A's close present.
    pub coverage_a: Option<f64>,
    pub coverage_b: Option<f64>,
    pub overlap_pct: f64,
}

impl AlignStats {
    fn compute(dataset: &AlignedDataset, symbol_a: &str, symbol_b: &str) -> Self {
        let rows = dataset.len();
        let pct = |count: usize| if rows == 0 { 0.0 } else { count as f64 * 100.0 / rows as f64 };
        let coverage = |symbol: &str| {
            dataset
                .column(&prefixed(symbol, Field::Close))
                .map(|v| pct(v.iter().filter(|x| x.is_some()).count()))
        };
        let first = dataset.timestamps.first().copied();
        let last = dataset.timestamps.last().copied();
        Self {
            rows,
            first,
            last,
            span_days: match (first, last) {
                (Some(a), Some(b)) => (b - a).num_days(),
                _ => 0,
            },
            coverage_a: coverage(symbol_a),
            coverage_b: coverage(symbol_b),
            overlap_pct: pct(dataset.is_overlap.iter().filter(|o| **o).count()),
        }
    }
}

/// Result of one alignment run.
#[derive(Debug, Clone)]
pub struct AlignOutcome {
    pub full: AlignedDataset,
    pub preview: AlignedDataset,
    pub path: PathBuf,
    pub stats: AlignStats,
}

// ── Join ────────────────────────────────────────────────────────────

/// One side before the join: time axis plus named value columns.
#[derive(Debug, Clone)]
struct Side {
    symbol: String,
    times: Vec<NaiveDateTime>,
    columns: Vec<(Field, Vec<Option<f64>>)>,
}

impl Side {
    fn from_series(symbol: &str, series: &Series) -> Self {
        let bars = &series.bars;
        let finite = |v: f64| (!v.is_nan()).then_some(v);
        let mut columns = vec![
            (Field::Open, bars.iter().map(|b| finite(b.open)).collect()),
            (Field::High, bars.iter().map(|b| finite(b.high)).collect()),
            (Field::Low, bars.iter().map(|b| finite(b.low)).collect()),
            (Field::Close, bars.iter().map(|b| finite(b.close)).collect()),
        ];
        if series.has_volume() {
            columns.push((Field::Volume, bars.iter().map(|b| b.volume).collect()));
        }
        Self {
            symbol: symbol.to_string(),
            times: bars.iter().map(|b| b.timestamp).collect(),
            columns,
        }
    }
}

pub fn prefixed(symbol: &str, field: Field) -> String {
    format!("{symbol}_{}", field.column())
}

fn forward_fill(values: &mut [Option<f64>]) {
    let mut last = None;
    for v in values.iter_mut() {
        match v {
            Some(x) => last = Some(*x),
            None => *v = last,
        }
    }
}

/// Outer join on timestamp; a duplicated timestamp within one side keeps its
/// last row.
fn outer_join(a: &Side, b: &Side, fill: Option<FillTarget>) -> AlignedDataset {
    let axis: BTreeSet<NaiveDateTime> = a.times.iter().chain(&b.times).copied().collect();
    let timestamps: Vec<NaiveDateTime> = axis.into_iter().collect();

    let mut columns = Vec::new();
    for (side, fill_side) in [
        (a, fill.is_some_and(FillTarget::covers_a)),
        (b, fill.is_some_and(FillTarget::covers_b)),
    ] {
        let index: HashMap<NaiveDateTime, usize> =
            side.times.iter().enumerate().map(|(i, t)| (*t, i)).collect();
        for (field, source) in &side.columns {
            let mut values: Vec<Option<f64>> = timestamps
                .iter()
                .map(|t| index.get(t).and_then(|&i| source[i]))
                .collect();
            if fill_side {
                forward_fill(&mut values);
            }
            columns.push(AlignedColumn {
                name: prefixed(&side.symbol, *field),
                values,
            });
        }
    }

    let mut dataset = AlignedDataset {
        is_overlap: vec![false; timestamps.len()],
        timestamps,
        columns,
    };
    let close_a = dataset.column(&prefixed(&a.symbol, Field::Close)).map(<[_]>::to_vec);
    let close_b = dataset.column(&prefixed(&b.symbol, Field::Close)).map(<[_]>::to_vec);
    if let (Some(ca), Some(cb)) = (close_a, close_b) {
        dataset.is_overlap = ca.iter().zip(&cb).map(|(x, y)| x.is_some() && y.is_some()).collect();
    }
    dataset
}

/// Symbol from a `{symbol}_{timeframe}` file stem.
pub fn symbol_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    match stem.rsplit_once('_') {
        Some((symbol, _)) => symbol.to_string(),
        None => stem.to_string(),
    }
}

fn load_side(path: &Path) -> Result<Side, AlignError> {
    if !path.exists() {
        return Err(AlignError::FileNotFound(path.to_path_buf()));
    }
    let read_err = |source| AlignError::Read {
        path: path.to_path_buf(),
        source,
    };
    let symbol = symbol_from_path(path);
    let df = read_parquet(path).map_err(read_err)?;
    let time = read_time_column(&df).map_err(read_err)?;
    if time.zone_aware {
        info!(%symbol, "zone-aware timestamps converted to UTC");
    } else {
        warn!(%symbol, "timestamps carry no zone; used as stored");
    }

    let mut columns = Vec::new();
    for field in VALUE_FIELDS {
        if let Some(values) = read_f64_column(&df, field.column()).map_err(read_err)? {
            let values = values.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect();
            columns.push((field, values));
        }
    }
    Ok(Side {
        symbol,
        times: time.values,
        columns,
    })
}

fn strip_bang(symbol: &str) -> String {
    sanitize_symbol(&symbol.replace('!', ""))
}

/// Aligns files and store records into the processed directory.
#[derive(Debug, Clone)]
pub struct AlignmentEngine {
    store_dir: PathBuf,
    processed_dir: PathBuf,
}

impl AlignmentEngine {
    pub fn new(store_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
            processed_dir: processed_dir.into(),
        }
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    /// Align two arbitrary Parquet files.
    pub fn align_files(
        &self,
        path_a: &Path,
        path_b: &Path,
        opts: &AlignOptions,
    ) -> Result<AlignOutcome, AlignError> {
        let a = load_side(path_a)?;
        let b = load_side(path_b)?;
        if a.symbol == b.symbol {
            return Err(AlignError::SameSymbol(a.symbol));
        }
        info!(
            a = %a.symbol,
            rows_a = a.times.len(),
            b = %b.symbol,
            rows_b = b.times.len(),
            "aligning files"
        );

        let fill = opts.forward_fill.then_some(opts.fill_target);
        let full = outer_join(&a, &b, fill);
        let name = opts.output_name.clone().unwrap_or_else(|| {
            format!(
                "aligned_{}_{}.parquet",
                strip_bang(&a.symbol),
                strip_bang(&b.symbol)
            )
        });
        self.finish(full, &a.symbol, &b.symbol, &name)
    }

    /// Align two store records after resampling both to `timeframe`.
    pub fn align_datasets(
        &self,
        base: &str,
        target: &str,
        timeframe: Timeframe,
        output_name: Option<&str>,
    ) -> Result<AlignOutcome, AlignError> {
        let (base, target) = (base.trim(), target.trim());
        if base == target {
            return Err(AlignError::SameSymbol(base.to_string()));
        }
        let freq = Frequency::from_timeframe(timeframe)
            .ok_or(AlignError::UnsupportedTimeframe(timeframe))?;
        let a = Side::from_series(base, &self.load_record(base, timeframe, freq)?);
        let b = Side::from_series(target, &self.load_record(target, timeframe, freq)?);
        info!(%base, %target, %timeframe, "aligning store records");

        let full = outer_join(&a, &b, None);
        let name = output_name.map(str::to_string).unwrap_or_else(|| {
            format!("merged_{}_{}_{timeframe}.parquet", strip_bang(base), strip_bang(target))
        });
        self.finish(full, base, target, &name)
    }

    fn load_record(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        freq: Frequency,
    ) -> Result<Series, AlignError> {
        let key = SeriesKey::new(symbol, timeframe);
        let path = self.store_dir.join(format!("{}.parquet", key.file_stem()));
        if !path.exists() {
            return Err(AlignError::MissingInput {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
                path,
            });
        }
        let series = super::parquet::read_series(&path, key).map_err(|source| AlignError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(resample_series(&series.canonicalize(), freq, timeframe))
    }

    fn finish(
        &self,
        full: AlignedDataset,
        a: &str,
        b: &str,
        name: &str,
    ) -> Result<AlignOutcome, AlignError> {
        let stats = AlignStats::compute(&full, a, b);
        info!(
            rows = stats.rows,
            span_days = stats.span_days,
            coverage_a = ?stats.coverage_a,
            coverage_b = ?stats.coverage_b,
            overlap_pct = stats.overlap_pct,
            "alignment statistics"
        );

        let path = self.processed_dir.join(name);
        let mut df = full.to_dataframe()?;
        write_parquet_atomic(&mut df, &path)?;
        info!(path = %path.display(), fingerprint = %full.fingerprint(), "aligned dataset written");

        Ok(AlignOutcome {
            preview: full.preview(),
            full,
            path,
            stats,
        })
    }
}
