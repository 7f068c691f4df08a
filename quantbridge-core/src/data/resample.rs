//! OHLCV resampling to a coarser frequency.
//!
//! Aggregation per bucket: open = first, high = max, low = min, close = last,
//! volume = sum. NaN prices and absent volumes are skipped, so a bucket only
//! yields NaN for a field when none of its rows had a value. Buckets without
//! rows never appear in the output.

use crate::domain::{Bar, Series, SeriesKey, Timeframe};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

/// Target bucket layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// Fixed-width buckets of this many seconds, floored from the Unix epoch.
    Fixed(i64),
    /// Monday through Sunday, labeled by the Sunday.
    Weekly,
    /// Calendar month, labeled by its last day.
    Monthly,
}

impl Frequency {
    /// Parse a resampling code: `1m 5m 15m 30m 1h 4h 1d 1w 1M`.
    pub fn from_code(code: &str) -> Option<Self> {
        let f = match code.trim() {
            "1m" => Frequency::Fixed(60),
            "5m" => Frequency::Fixed(5 * 60),
            "15m" => Frequency::Fixed(15 * 60),
            "30m" => Frequency::Fixed(30 * 60),
            "1h" => Frequency::Fixed(3600),
            "4h" => Frequency::Fixed(4 * 3600),
            "1d" => Frequency::Fixed(86_400),
            "1w" => Frequency::Weekly,
            "1M" => Frequency::Monthly,
            _ => return None,
        };
        Some(f)
    }

    /// `None` for timeframes without a defined aggregation (`1y`).
    pub fn from_timeframe(tf: Timeframe) -> Option<Self> {
        Self::from_code(tf.code())
    }

    /// Bucket label for a timestamp.
    pub fn bucket(&self, ts: NaiveDateTime) -> NaiveDateTime {
        match *self {
            Frequency::Fixed(width) if width > 0 => {
                let secs = ts.and_utc().timestamp();
                let floored = secs.div_euclid(width) * width;
                DateTime::from_timestamp(floored, 0)
                    .map(|d| d.naive_utc())
                    .unwrap_or(ts)
            }
            Frequency::Fixed(_) => ts,
            Frequency::Weekly => {
                let date = ts.date();
                let to_sunday = 6 - i64::from(date.weekday().num_days_from_monday());
                midnight(date + Duration::days(to_sunday))
            }
            Frequency::Monthly => {
                let date = ts.date();
                let (y, m) = if date.month() == 12 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), date.month() + 1)
                };
                let last = NaiveDate::from_ymd_opt(y, m, 1)
                    .and_then(|d| d.pred_opt())
                    .unwrap_or(date);
                midnight(last)
            }
        }
    }
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}

#[derive(Default)]
struct Bucket {
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

fn present(v: f64) -> Option<f64> {
    (!v.is_nan()).then_some(v)
}

impl Bucket {
    fn push(&mut self, bar: &Bar) {
        if self.open.is_none() {
            self.open = present(bar.open);
        }
        if let Some(h) = present(bar.high) {
            self.high = Some(self.high.map_or(h, |cur| cur.max(h)));
        }
        if let Some(l) = present(bar.low) {
            self.low = Some(self.low.map_or(l, |cur| cur.min(l)));
        }
        if let Some(c) = present(bar.close) {
            self.close = Some(c);
        }
        if let Some(v) = bar.volume.filter(|v| !v.is_nan()) {
            self.volume = Some(self.volume.unwrap_or(0.0) + v);
        }
    }

    fn into_bar(self, timestamp: NaiveDateTime) -> Option<Bar> {
        if self.open.is_none()
            && self.high.is_none()
            && self.low.is_none()
            && self.close.is_none()
            && self.volume.is_none()
        {
            return None;
        }
        Some(Bar {
            timestamp,
            open: self.open.unwrap_or(f64::NAN),
            high: self.high.unwrap_or(f64::NAN),
            low: self.low.unwrap_or(f64::NAN),
            close: self.close.unwrap_or(f64::NAN),
            volume: self.volume,
        })
    }
}

/// Aggregate bars into `freq` buckets, ascending by bucket label.
pub fn resample(bars: &[Bar], freq: Frequency) -> Vec<Bar> {
    let mut order: Vec<&Bar> = bars.iter().collect();
    order.sort_by_key(|b| b.timestamp);

    let mut buckets: BTreeMap<NaiveDateTime, Bucket> = BTreeMap::new();
    for bar in order {
        buckets.entry(freq.bucket(bar.timestamp)).or_default().push(bar);
    }

    buckets
        .into_iter()
        .filter_map(|(label, bucket)| bucket.into_bar(label))
        .collect()
}

/// Resample a whole series, keeping its symbol under a new timeframe key.
pub fn resample_series(series: &Series, freq: Frequency, timeframe: Timeframe) -> Series {
    Series::new(
        SeriesKey::new(series.key.symbol.clone(), timeframe),
        resample(&series.bars, freq),
    )
}
