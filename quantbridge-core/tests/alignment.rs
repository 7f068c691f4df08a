//! Integration tests for the alignment engine, file and store-pair forms.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use quantbridge_core::data::align::{AlignError, AlignOptions, AlignmentEngine, FillTarget};
use quantbridge_core::data::export::{export_aligned, ExportFormat};
use quantbridge_core::data::parquet::{read_parquet, write_parquet_atomic, write_series};
use quantbridge_core::domain::{format_timestamp, Bar, Series, SeriesKey, Timeframe};
use std::path::{Path, PathBuf};

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

fn bars(times: &[NaiveDateTime], base: f64) -> Vec<Bar> {
    times
        .iter()
        .enumerate()
        .map(|(i, &timestamp)| {
            let v = base + i as f64;
            Bar {
                timestamp,
                open: v,
                high: v + 0.5,
                low: v - 0.5,
                close: v,
                volume: Some(10.0),
            }
        })
        .collect()
}

/// Write `{symbol}_{tf}.parquet` in the store layout.
fn write_record(
    dir: &Path,
    symbol: &str,
    tf: Timeframe,
    times: &[NaiveDateTime],
    base: f64,
) -> PathBuf {
    let key = SeriesKey::new(symbol, tf);
    let path = dir.join(format!("{}.parquet", key.file_stem()));
    write_series(&Series::new(key, bars(times, base)), &path).unwrap();
    path
}

fn minutes(start: NaiveDateTime, step: i64, count: i64) -> Vec<NaiveDateTime> {
    (0..count).map(|i| start + Duration::minutes(i * step)).collect()
}

#[test]
fn file_alignment_is_an_outer_join_with_overlap_flag() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_record(dir.path(), "FCPO1!", Timeframe::M15, &minutes(t0(), 15, 4), 100.0);
    let later = minutes(t0() + Duration::minutes(30), 15, 4);
    let b = write_record(dir.path(), "ZL1!", Timeframe::M15, &later, 50.0);

    let engine = AlignmentEngine::new(dir.path(), dir.path().join("processed"));
    let opts = AlignOptions {
        forward_fill: false,
        ..AlignOptions::default()
    };
    let outcome = engine.align_files(&a, &b, &opts).unwrap();
    let full = &outcome.full;

    // 09:00 .. 10:15 in 15-minute steps.
    assert_eq!(full.len(), 6);
    assert!(full.timestamps.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(full.is_overlap, vec![false, false, true, true, false, false]);
    assert_eq!(full.column("FCPO1!_Close").unwrap()[4], None);
    assert_eq!(full.column("ZL1!_Close").unwrap()[0], None);

    assert!(outcome.path.ends_with("aligned_FCPO1_ZL1.parquet"));
    let df = read_parquet(&outcome.path).unwrap();
    assert_eq!(df.height(), 6);
    assert!(df.column("is_overlap").is_ok());
    assert!(df.column("ZL1!_Volume").is_ok());

    assert_eq!(outcome.stats.rows, 6);
    assert_eq!(outcome.stats.coverage_a, Some(4.0 * 100.0 / 6.0));
    assert!((outcome.stats.overlap_pct - 100.0 / 3.0).abs() < 1e-9);
}

#[test]
fn forward_fill_is_scoped_to_the_selected_side() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_record(dir.path(), "A", Timeframe::H1, &minutes(t0(), 60, 4), 1.0);
    let b = write_record(dir.path(), "B", Timeframe::H1, &[t0(), t0() + Duration::hours(2)], 10.0);
    let engine = AlignmentEngine::new(dir.path(), dir.path().join("out"));

    let fill_b = AlignOptions {
        forward_fill: true,
        fill_target: FillTarget::B,
        output_name: Some("b.parquet".into()),
    };
    let out = engine.align_files(&a, &b, &fill_b).unwrap();
    assert_eq!(
        out.full.column("B_Close").unwrap(),
        &[Some(10.0), Some(10.0), Some(11.0), Some(11.0)]
    );
    assert!(out.full.is_overlap.iter().all(|o| *o));
    assert!(out.path.ends_with("b.parquet"));

    // Filling only A leaves B's holes in place.
    let fill_a = AlignOptions {
        fill_target: FillTarget::A,
        output_name: Some("a.parquet".into()),
        ..fill_b
    };
    let out = engine.align_files(&a, &b, &fill_a).unwrap();
    assert_eq!(out.full.column("B_Close").unwrap()[1], None);
    assert_eq!(out.full.is_overlap, vec![true, false, true, false]);
}

#[test]
fn leading_gap_is_not_filled() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_record(dir.path(), "A", Timeframe::H1, &minutes(t0(), 60, 3), 1.0);
    let b = write_record(dir.path(), "B", Timeframe::H1, &[t0() + Duration::hours(1)], 10.0);
    let engine = AlignmentEngine::new(dir.path(), dir.path());

    let out = engine
        .align_files(&a, &b, &AlignOptions {
            fill_target: FillTarget::Both,
            ..AlignOptions::default()
        })
        .unwrap();
    assert_eq!(out.full.column("B_Close").unwrap(), &[None, Some(10.0), Some(10.0)]);
}

#[test]
fn large_result_previews_first_and_last_fifty() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_record(dir.path(), "A", Timeframe::M1, &minutes(t0(), 1, 500), 1.0);
    let b = write_record(dir.path(), "B", Timeframe::M1, &minutes(t0(), 2, 250), 1.0);
    let engine = AlignmentEngine::new(dir.path(), dir.path().join("out"));

    let out = engine.align_files(&a, &b, &AlignOptions::default()).unwrap();
    assert_eq!(out.full.len(), 500);
    assert_eq!(out.preview.len(), 100);
    assert_eq!(out.preview.timestamps[..50], out.full.timestamps[..50]);
    assert_eq!(out.preview.timestamps[50..], out.full.timestamps[450..]);
}

#[test]
fn zone_aware_input_is_converted_to_utc() {
    let dir = tempfile::tempdir().unwrap();
    let a_path = dir.path().join("KLCI_1h.parquet");
    let mut df = DataFrame::new(vec![
        Column::new("Date".into(), vec!["2024-03-04 09:00:00+08:00", "2024-03-04 10:00:00+08:00"]),
        Column::new("Close".into(), vec![1.0, 2.0]),
    ])
    .unwrap();
    write_parquet_atomic(&mut df, &a_path).unwrap();

    let utc = |h: u32| {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    };
    let b_path = write_record(dir.path(), "SPX", Timeframe::H1, &[utc(1), utc(2)], 5.0);

    let engine = AlignmentEngine::new(dir.path(), dir.path().join("out"));
    let out = engine
        .align_files(&a_path, &b_path, &AlignOptions {
            forward_fill: false,
            ..AlignOptions::default()
        })
        .unwrap();
    assert_eq!(out.full.timestamps, vec![utc(1), utc(2)]);
    assert_eq!(out.full.is_overlap, vec![true, true]);
    assert!(out.full.column("KLCI_Open").is_none());
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let engine = AlignmentEngine::new(dir.path(), dir.path());
    let err = engine
        .align_files(
            &dir.path().join("X_1d.parquet"),
            &dir.path().join("Y_1d.parquet"),
            &AlignOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, AlignError::FileNotFound(_)));
}

#[test]
fn store_pair_is_resampled_and_joined() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store");
    std::fs::create_dir_all(&store).unwrap();
    // Base in 5-minute bars, target already at 15 minutes.
    write_record(&store, "FCPO1!", Timeframe::M15, &minutes(t0(), 5, 6), 100.0);
    let target = minutes(t0() + Duration::minutes(15), 15, 2);
    write_record(&store, "ZL1!", Timeframe::M15, &target, 50.0);

    let engine = AlignmentEngine::new(&store, dir.path().join("processed"));
    let out = engine
        .align_datasets("FCPO1!", "ZL1!", Timeframe::M15, None)
        .unwrap();

    assert_eq!(out.full.timestamps, minutes(t0(), 15, 3));
    // First 15-minute bucket of the base: closes 100, 101, 102.
    let close = out.full.column("FCPO1!_Close").unwrap();
    assert_eq!(close[0], Some(102.0));
    assert_eq!(out.full.column("FCPO1!_Open").unwrap()[0], Some(100.0));
    assert_eq!(out.full.column("FCPO1!_Volume").unwrap()[0], Some(30.0));
    // Base buckets are 09:00 and 09:15; target bars are 09:15 and 09:30.
    assert_eq!(out.full.is_overlap, vec![false, true, false]);
    assert!(out.path.ends_with("merged_FCPO1_ZL1_15m.parquet"));
}

#[test]
fn store_pair_missing_record_names_the_symbol() {
    let dir = tempfile::tempdir().unwrap();
    write_record(dir.path(), "FCPO1!", Timeframe::M15, &minutes(t0(), 15, 2), 1.0);
    let engine = AlignmentEngine::new(dir.path(), dir.path());

    match engine.align_datasets("FCPO1!", "ZL1!", Timeframe::M15, None) {
        Err(AlignError::MissingInput { symbol, .. }) => assert_eq!(symbol, "ZL1!"),
        other => panic!("expected MissingInput, got {other:?}"),
    }
}

#[test]
fn aligned_dataset_exports_to_csv() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_record(dir.path(), "A", Timeframe::H1, &[t0()], 1.0);
    let b = write_record(dir.path(), "B", Timeframe::H1, &[t0() + Duration::hours(1)], 2.0);
    let engine = AlignmentEngine::new(dir.path(), dir.path().join("out"));
    let out = engine
        .align_files(&a, &b, &AlignOptions {
            forward_fill: false,
            ..AlignOptions::default()
        })
        .unwrap();

    let csv_path = dir.path().join("export").join("aligned.csv");
    export_aligned(&out.full, &csv_path, ExportFormat::Csv).unwrap();
    let text = std::fs::read_to_string(&csv_path).unwrap();
    let mut lines = text.trim_start_matches('\u{feff}').lines();
    assert_eq!(
        lines.next(),
        Some(
            "Date,A_Open,A_High,A_Low,A_Close,A_Volume,\
             B_Open,B_High,B_Low,B_Close,B_Volume,is_overlap"
        )
    );
    assert_eq!(
        lines.next(),
        Some(format!("{},1,1.5,0.5,1,10,,,,,,false", format_timestamp(&t0())).as_str())
    );
}
