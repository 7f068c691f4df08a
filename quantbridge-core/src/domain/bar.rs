//! Bar and Series: the fundamental market data units.

use super::timeframe::Timeframe;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wall-clock rendering used everywhere a timestamp leaves memory.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a timestamp in the canonical `YYYY-MM-DD HH:MM:SS` form.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a canonical `YYYY-MM-DD HH:MM:SS` timestamp.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()
}

/// One OHLCV observation.
///
/// Timestamps are zone-stripped wall clock in the configured civil timezone.
/// Price fields the provider did not deliver are NaN; volume is absent for
/// instruments that do not report it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

/// Identity of a series: `(symbol, timeframe)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }

    /// File stem used by the master store and exports: `{symbol}_{timeframe}`.
    ///
    /// Path separators in the symbol (crypto pairs such as `BTC/USDT`) are
    /// replaced with `-`.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", sanitize_symbol(&self.symbol), self.timeframe)
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.symbol, self.timeframe)
    }
}

/// Make a symbol safe to embed in a file name.
pub fn sanitize_symbol(symbol: &str) -> String {
    symbol
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '-' } else { c })
        .collect()
}

/// An ordered sequence of bars for one `(symbol, timeframe)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub key: SeriesKey,
    pub bars: Vec<Bar>,
}

impl Series {
    pub fn new(key: SeriesKey, bars: Vec<Bar>) -> Self {
        Self { key, bars }
    }

    pub fn empty(key: SeriesKey) -> Self {
        Self {
            key,
            bars: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.bars.first().map(|b| b.timestamp)
    }

    /// Latest timestamp. Uses max rather than the last row so that an
    /// unsorted record read from disk still reports its true edge.
    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.bars.iter().map(|b| b.timestamp).max()
    }

    /// True if any bar carries a volume value.
    pub fn has_volume(&self) -> bool {
        self.bars.iter().any(|b| b.volume.is_some())
    }

    /// Sort ascending by timestamp and collapse duplicate timestamps,
    /// keeping the last occurrence in input order.
    pub fn canonicalize(mut self) -> Self {
        self.bars.sort_by_key(|b| b.timestamp);
        let mut out: Vec<Bar> = Vec::with_capacity(self.bars.len());
        for bar in self.bars {
            match out.last_mut() {
                Some(prev) if prev.timestamp == bar.timestamp => *prev = bar,
                _ => out.push(bar),
            }
        }
        self.bars = out;
        self
    }

    /// Concatenate `delta` after the stored rows and canonicalize, so rows
    /// from `delta` win on timestamp collision.
    pub fn merge(mut self, delta: Series) -> Self {
        self.bars.extend(delta.bars);
        self.canonicalize()
    }

    /// True if timestamps are strictly increasing.
    pub fn is_strictly_ascending(&self) -> bool {
        self.bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
    }
}
