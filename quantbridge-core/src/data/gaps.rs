//! Leading-edge coverage check.
//!
//! Only the first returned bar is compared with the requested start. The end
//! of the range and interior holes are not inspected. The lag is counted in
//! whole days, truncated, so a few extra hours never tip it over.

use crate::domain::Series;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOLERANCE_DAYS: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapReport {
    pub has_warning: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapAnalyzer {
    /// Largest whole-day lag still reported as full coverage.
    pub tolerance_days: i64,
}

impl Default for GapAnalyzer {
    fn default() -> Self {
        Self::with_tolerance_days(DEFAULT_TOLERANCE_DAYS)
    }
}

impl GapAnalyzer {
    pub fn with_tolerance_days(days: i64) -> Self {
        Self {
            tolerance_days: days,
        }
    }

    pub fn analyze(
        &self,
        series: &Series,
        requested_start: NaiveDateTime,
        _requested_end: NaiveDateTime,
    ) -> GapReport {
        let Some(first) = series.first_timestamp() else {
            return GapReport {
                has_warning: true,
                message: "no data returned for the requested range".into(),
            };
        };

        if (first - requested_start).num_days() > self.tolerance_days {
            GapReport {
                has_warning: true,
                message: format!(
                    "partial data: requested from {}, data starts {}",
                    requested_start.date(),
                    first.date()
                ),
            }
        } else {
            GapReport {
                has_warning: false,
                message: format!("full coverage: {} rows", series.len()),
            }
        }
    }
}

/// Analyze with the default three-day tolerance.
pub fn analyze(
    series: &Series,
    requested_start: NaiveDateTime,
    requested_end: NaiveDateTime,
) -> GapReport {
    GapAnalyzer::default().analyze(series, requested_start, requested_end)
}
