//! Property tests for pipeline invariants.
//!
//! Uses proptest to verify:
//! 1. Schema mapping: output fields are unique, in canonical order, timestamp first
//! 2. Canonical series: strictly ascending, last duplicate wins
//! 3. Merge: union of timestamps, delta wins on collision
//! 4. Resampling: labels are bucket-aligned and volume is conserved
//! 5. Alignment preview size

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use quantbridge_core::data::align::{AlignedColumn, AlignedDataset, PREVIEW_EDGE_ROWS};
use quantbridge_core::data::provider::{RawTable, RawValue};
use quantbridge_core::data::resample::{resample, Frequency};
use quantbridge_core::data::schema::{match_field, normalize, Field};
use quantbridge_core::domain::{Bar, Series, SeriesKey, Timeframe};
use std::collections::{BTreeMap, BTreeSet};

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

// ── Strategies (proptest) ────────────────────────────────────────────

const COLUMN_POOL: &[&str] = &[
    "Open",
    "open_price",
    "High",
    "Low",
    "Close",
    "Adj Close",
    "Volume",
    "Dividends",
    "Stock Splits",
    "last",
    "vwap",
    "trades",
    "high",
    "CLOSE",
];

fn arb_columns() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(COLUMN_POOL, 0..COLUMN_POOL.len()).prop_shuffle()
}

/// Bars on a coarse minute grid so duplicates are common.
fn arb_bars(max: usize) -> impl Strategy<Value = Vec<Bar>> {
    let row = (0i64..40, 1.0..100.0_f64, prop::option::of(0.0..1000.0_f64));
    prop::collection::vec(row, 0..max).prop_map(|rows| {
        rows.into_iter()
            .map(|(slot, price, volume)| Bar {
                timestamp: epoch() + Duration::minutes(slot * 7),
                open: price,
                high: price + 1.0,
                low: price - 1.0,
                close: price,
                volume,
            })
            .collect()
    })
}

fn key() -> SeriesKey {
    SeriesKey::new("SPY", Timeframe::M1)
}

// ── 1. Schema mapping ────────────────────────────────────────────────

proptest! {
    #[test]
    fn normalized_fields_are_unique_and_ordered(
        columns in arb_columns(),
        date_first in any::<bool>(),
    ) {
        let mut table = RawTable::new();
        if date_first {
            table.push_column("Date", vec![RawValue::from("2024-01-02 09:00:00")]);
        }
        for name in &columns {
            table.push_column(*name, vec![RawValue::Number(1.0)]);
        }
        if !date_first {
            table.push_column("Date", vec![RawValue::from("2024-01-02 09:00:00")]);
        }

        let normalized = normalize(&table).unwrap();
        let fields = normalized.fields();
        prop_assert_eq!(fields[0], Field::Timestamp);
        prop_assert!(fields.windows(2).all(|w| w[0] < w[1]));

        // Every output field traces back to a matching input column.
        for field in &fields[1..] {
            prop_assert!(columns.iter().any(|c| match_field(c) == Some(*field)));
        }
        prop_assert_eq!(normalized.len(), 1);
    }

    #[test]
    fn dropped_keywords_never_map(
        name in "(adj|Adj|ADJ|dividend|Dividends|split|Splits)[ a-z]{0,6}",
    ) {
        prop_assert_eq!(match_field(&name), None);
    }
}

// ── 2. Canonical series ──────────────────────────────────────────────

proptest! {
    #[test]
    fn canonicalize_is_ascending_and_keeps_last(bars in arb_bars(80)) {
        let mut expected: BTreeMap<NaiveDateTime, f64> = BTreeMap::new();
        for b in &bars {
            expected.insert(b.timestamp, b.close);
        }

        let series = Series::new(key(), bars).canonicalize();
        prop_assert!(series.is_strictly_ascending());
        prop_assert_eq!(series.len(), expected.len());
        for b in &series.bars {
            prop_assert_eq!(Some(&b.close), expected.get(&b.timestamp));
        }
    }

    #[test]
    fn canonicalize_is_idempotent(bars in arb_bars(60)) {
        let once = Series::new(key(), bars).canonicalize();
        let twice = once.clone().canonicalize();
        prop_assert_eq!(once, twice);
    }
}

// ── 3. Merge ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn merge_is_union_and_delta_wins(stored in arb_bars(40), delta in arb_bars(40)) {
        let stored = Series::new(key(), stored).canonicalize();
        let delta = Series::new(key(), delta).canonicalize();

        let union: BTreeSet<NaiveDateTime> = stored
            .bars
            .iter()
            .chain(&delta.bars)
            .map(|b| b.timestamp)
            .collect();
        let merged = stored.merge(delta.clone());

        prop_assert!(merged.is_strictly_ascending());
        prop_assert_eq!(merged.len(), union.len());
        for d in &delta.bars {
            let m = merged.bars.iter().find(|b| b.timestamp == d.timestamp).unwrap();
            prop_assert_eq!(m.close, d.close);
        }
    }
}

// ── 4. Resampling ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn resample_labels_are_aligned_and_volume_conserved(
        bars in arb_bars(80),
        code in prop::sample::select(vec!["5m", "15m", "1h", "1d", "1w", "1M"]),
    ) {
        let freq = Frequency::from_code(code).unwrap();
        let out = resample(&bars, freq);

        prop_assert!(out.len() <= bars.len());
        prop_assert!(out.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        for b in &out {
            prop_assert_eq!(freq.bucket(b.timestamp), b.timestamp);
        }

        let total_in: f64 = bars.iter().filter_map(|b| b.volume).sum();
        let total_out: f64 = out.iter().filter_map(|b| b.volume).sum();
        prop_assert!((total_in - total_out).abs() <= 1e-6 * total_in.max(1.0));

        for b in &bars {
            let label = freq.bucket(b.timestamp);
            let agg = out.iter().find(|o| o.timestamp == label).unwrap();
            prop_assert!(agg.high >= b.high);
            prop_assert!(agg.low <= b.low);
        }
    }
}

// ── 5. Preview size ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn preview_never_exceeds_two_edges(n in 0usize..400) {
        let dataset = AlignedDataset {
            timestamps: (0..n as i64).map(|i| epoch() + Duration::minutes(i)).collect(),
            columns: vec![AlignedColumn {
                name: "A_Close".into(),
                values: (0..n).map(|i| Some(i as f64)).collect(),
            }],
            is_overlap: vec![true; n],
        };
        let preview = dataset.preview();
        prop_assert_eq!(preview.len(), n.min(2 * PREVIEW_EDGE_ROWS));
        prop_assert_eq!(preview.timestamps.first(), dataset.timestamps.first());
        prop_assert_eq!(preview.timestamps.last(), dataset.timestamps.last());
    }
}
