//! Midday session filter.
//!
//! Removes bars whose wall-clock minute falls strictly inside the closure
//! window. With the default 12:30–14:30 window, 12:30 and 14:30 are kept,
//! 12:31 through 14:29 are removed. Seconds are ignored.

use crate::domain::{AssetClass, Series};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A closed-market window, exclusive at both ends at minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for SessionWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(12, 30, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(14, 30, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

fn minute_of_day(t: &NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

impl SessionWindow {
    /// True if `t` is inside the closure.
    pub fn contains(&self, t: &NaiveTime) -> bool {
        let m = minute_of_day(t);
        minute_of_day(&self.start) < m && m < minute_of_day(&self.end)
    }

    /// Drop closure-window bars from `series` if `asset` has a midday break.
    /// Returns the number of bars removed.
    pub fn apply(&self, series: &mut Series, asset: AssetClass) -> usize {
        if !asset.has_midday_break() {
            return 0;
        }
        let before = series.len();
        series.bars.retain(|b| !self.contains(&b.timestamp.time()));
        let removed = before - series.len();
        debug!(%asset, removed, "session filter applied");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, SeriesKey, Timeframe};
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn series_at(times: &[(u32, u32)]) -> Series {
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let bars = times
            .iter()
            .map(|&(h, m)| Bar {
                timestamp: day.and_time(t(h, m)),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: None,
            })
            .collect();
        Series::new(SeriesKey::new("1155", Timeframe::M1), bars)
    }

    #[test]
    fn window_boundaries() {
        let w = SessionWindow::default();
        assert!(!w.contains(&t(12, 30)));
        assert!(w.contains(&t(12, 31)));
        assert!(w.contains(&t(13, 0)));
        assert!(w.contains(&t(13, 59)));
        assert!(w.contains(&t(14, 29)));
        assert!(!w.contains(&t(14, 30)));
        assert!(!w.contains(&t(9, 0)));
        assert!(!w.contains(&t(17, 0)));
    }

    #[test]
    fn seconds_do_not_matter() {
        let w = SessionWindow::default();
        assert!(!w.contains(&NaiveTime::from_hms_opt(12, 30, 59).unwrap()));
        assert!(w.contains(&NaiveTime::from_hms_opt(14, 29, 59).unwrap()));
    }

    #[test]
    fn applies_only_to_midday_break_assets() {
        let w = SessionWindow::default();
        let times = [(9, 0), (12, 30), (12, 45), (13, 30), (14, 15), (14, 30), (16, 45)];

        let mut s = series_at(&times);
        assert_eq!(w.apply(&mut s, AssetClass::MalaysiaStock), 3);
        assert_eq!(s.len(), 4);

        let mut s = series_at(&times);
        assert_eq!(w.apply(&mut s, AssetClass::Crypto), 0);
        assert_eq!(s.len(), times.len());
    }
}
