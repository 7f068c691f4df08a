//! End-to-end pipeline: provider → router → master store → gaps → export.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use quantbridge_core::data::export::{export_series, ExportFormat};
use quantbridge_core::data::gaps::GapAnalyzer;
use quantbridge_core::data::provider::{
    DataProvider, RawQuery, RawTable, RawValue, SourceError,
};
use quantbridge_core::data::router::SourceRouter;
use quantbridge_core::data::store::{MasterStore, UpdateRequest};
use quantbridge_core::data::FetchError;
use quantbridge_core::domain::{AssetClass, SeriesKey, Timeframe};
use std::sync::{Arc, Mutex};

fn day(m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Serves daily bars from `listed` onward, stamped at Kuala Lumpur midnight
/// the way the equity provider renders daily rows.
#[derive(Clone)]
struct DailyProvider {
    listed: NaiveDateTime,
    queries: Arc<Mutex<Vec<RawQuery>>>,
}

impl DailyProvider {
    fn new(listed: NaiveDateTime) -> Self {
        Self {
            listed,
            queries: Arc::default(),
        }
    }

    fn queries(&self) -> Vec<RawQuery> {
        self.queries.lock().unwrap().clone()
    }
}

impl DataProvider for DailyProvider {
    fn name(&self) -> &str {
        "daily"
    }

    fn fetch(&self, query: &RawQuery) -> Result<RawTable, SourceError> {
        self.queries.lock().unwrap().push(query.clone());
        let mut stamps = Vec::new();
        let mut closes = Vec::new();
        let mut t = query.start.max(self.listed);
        while t <= query.end {
            stamps.push(RawValue::Text(format!("{}+08:00", t.format("%Y-%m-%d %H:%M:%S"))));
            closes.push(RawValue::Number(100.0 + (t - self.listed).num_days() as f64));
            t += Duration::days(1);
        }
        let n = stamps.len();
        Ok(RawTable::new()
            .with_column("Datetime", stamps)
            .with_column("Open", closes.clone())
            .with_column("High", closes.clone())
            .with_column("Low", closes.clone())
            .with_column("Close", closes)
            .with_column("Adj Close", vec![RawValue::Number(0.0); n])
            .with_column("Volume", vec![RawValue::Int(500); n]))
    }
}

fn request(start: Option<NaiveDateTime>, end: NaiveDateTime) -> UpdateRequest {
    UpdateRequest {
        symbol: "1155".into(),
        timeframe: Timeframe::D1,
        asset_class: AssetClass::MalaysiaStock,
        start,
        end,
        exchange: None,
        proxy: None,
        session_filter: false,
    }
}

#[test]
fn fetch_store_update_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let provider = DailyProvider::new(day(1, 1));
    let router = SourceRouter::default().with_equity(provider.clone());
    let store = MasterStore::new(dir.path().join("store"));

    let first = store.update(&request(Some(day(1, 1)), day(1, 10)), &router).unwrap();
    assert_eq!(first.len(), 10);
    assert_eq!(first.first_timestamp(), Some(day(1, 1)));
    assert_eq!(first.key.symbol, "1155");
    // Keyed on the code as entered, not the provider ticker.
    assert!(store.path_for(&first.key).ends_with("1155_1d.parquet"));
    assert!(!dir.path().join("store").join("1155.KL_1d.parquet").exists());

    let second = store.update(&request(None, day(1, 15)), &router).unwrap();
    assert_eq!(second.len(), 15);
    assert_eq!(second.bars[14].close, 114.0);

    let queries = provider.queries();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].code, "1155.KL");
    assert_eq!(queries[0].interval, "1d");
    assert_eq!(queries[1].start, day(1, 11));

    let entries = store.status().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].rows, Some(15));

    let export_dir = dir.path().join("export");
    let path = export_series(&second, &export_dir, day(1, 1).date(), ExportFormat::Csv).unwrap();
    assert!(path.ends_with("1155_1d_20240101.csv"));
    let text = std::fs::read_to_string(&path).unwrap();
    // BOM, header, 15 rows.
    assert!(text.starts_with('\u{feff}'));
    assert_eq!(text.lines().count(), 16);
}

#[test]
fn late_listing_is_reported_as_partial() {
    let dir = tempfile::tempdir().unwrap();
    let router = SourceRouter::default().with_equity(DailyProvider::new(day(3, 1)));
    let store = MasterStore::new(dir.path());

    let requested = day(1, 1);
    let series = store.update(&request(Some(requested), day(3, 5)), &router).unwrap();
    let report = GapAnalyzer::with_tolerance_days(5).analyze(&series, requested, day(3, 5));
    assert!(report.has_warning);
    assert!(report.message.contains("2024-03-01"));

    let report = GapAnalyzer::with_tolerance_days(5).analyze(&series, day(2, 28), day(3, 5));
    assert!(!report.has_warning);
}

#[test]
fn unsupported_timeframe_never_touches_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let provider = DailyProvider::new(day(1, 1));
    let router = SourceRouter::default().with_equity(provider.clone());
    let store = MasterStore::new(dir.path());

    let mut req = request(Some(day(1, 1)), day(1, 10));
    req.timeframe = Timeframe::Y1;
    let err = store.update(&req, &router).unwrap_err();
    assert!(matches!(err, FetchError::InvalidConfiguration(_)));
    assert!(provider.queries().is_empty());
    assert!(!store.contains(&SeriesKey::new("1155", Timeframe::Y1)));
}
