//! Timezone standardizer.
//!
//! Every fetched series is expressed in one civil timezone (default
//! `Asia/Kuala_Lumpur`) and stored as zone-stripped wall clock. Stamps that
//! arrive without an offset are assumed to be UTC.

use super::schema::RawStamp;
use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;

pub const DEFAULT_TIMEZONE: &str = "Asia/Kuala_Lumpur";

/// Converts raw stamps into wall clock of a target zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimezoneStandardizer {
    target: Tz,
}

impl Default for TimezoneStandardizer {
    fn default() -> Self {
        Self {
            target: chrono_tz::Asia::Kuala_Lumpur,
        }
    }
}

impl TimezoneStandardizer {
    pub fn new(target: Tz) -> Self {
        Self { target }
    }

    /// Build from an IANA zone name such as `Asia/Kuala_Lumpur`.
    pub fn from_name(name: &str) -> Result<Self, String> {
        name.parse::<Tz>()
            .map(Self::new)
            .map_err(|e| format!("unknown timezone '{name}': {e}"))
    }

    pub fn target(&self) -> Tz {
        self.target
    }

    /// Convert one stamp into target-zone wall clock.
    pub fn convert(&self, stamp: &RawStamp) -> NaiveDateTime {
        Utc.from_utc_datetime(&stamp.to_utc())
            .with_timezone(&self.target)
            .naive_local()
    }

    /// Convert a column of stamps.
    pub fn standardize(&self, stamps: &[RawStamp]) -> Vec<NaiveDateTime> {
        let naive = stamps.iter().filter(|s| s.offset.is_none()).count();
        if naive > 0 {
            debug!(
                rows = naive,
                target = %self.target,
                "timestamps without offset assumed to be UTC"
            );
        }
        stamps.iter().map(|s| self.convert(s)).collect()
    }
}
