//! Source router: dispatches a fetch request to a retrieval strategy, then
//! runs the normalization pipeline.
//!
//! Pipeline after a successful provider call, in fixed order:
//! 1. schema normalizer
//! 2. strategy range filter (crypto: `<= end`, charting: `[start, end]`)
//! 3. timezone standardizer
//! 4. canonical ordering (ascending, unique timestamps)
//! 5. session filter, when requested
//!
//! Dispatch and interval mapping are plain lookup tables held in
//! `RouterTables`, so they can be swapped or inspected in isolation.

use super::classify::{classify, ErrorCategory};
use super::crypto::{find_venue, DEFAULT_VENUE};
use super::error::{FetchError, GRANULARITY_HINT, NETWORK_HINT, PROXY_TIP};
use super::provider::{DataProvider, RawQuery, SourceError};
use super::schema::{normalize, Field, NormalizedTable};
use super::session::SessionWindow;
use super::timezone::TimezoneStandardizer;
use crate::domain::{AssetClass, Bar, Series, SeriesKey, Timeframe};
use chrono::NaiveDateTime;
use std::fmt;
use tracing::{debug, info};

// ── Requests ────────────────────────────────────────────────────────

/// Everything needed to perform one fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub asset_class: AssetClass,
    /// Code as entered; provider-specific preprocessing happens in the router.
    pub code: String,
    pub timeframe: Timeframe,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Crypto venue label or id; ignored by other strategies.
    pub exchange: Option<String>,
    pub proxy: Option<String>,
    pub session_filter: bool,
}

/// Anything that can produce a normalized series for a request.
///
/// The master store depends on this rather than on the router so tests can
/// substitute a scripted source.
pub trait SeriesSource: Send + Sync {
    fn fetch(&self, request: &FetchRequest) -> Result<Series, FetchError>;
}

// ── Lookup tables ───────────────────────────────────────────────────

/// The three retrieval strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Equities and generic futures through the equity history provider.
    Equity,
    /// Bursa derivatives through the charting platform provider.
    Charting,
    /// Spot crypto through an exchange venue.
    Crypto,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::Equity => "equity",
            StrategyKind::Charting => "charting",
            StrategyKind::Crypto => "crypto",
        })
    }
}

/// Timeframe to provider-native interval string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTable(pub &'static [(Timeframe, &'static str)]);

impl IntervalTable {
    pub fn lookup(&self, tf: Timeframe) -> Option<&'static str> {
        self.0.iter().find(|(t, _)| *t == tf).map(|(_, code)| *code)
    }
}

pub const ASSET_STRATEGIES: &[(AssetClass, StrategyKind)] = &[
    (AssetClass::MalaysiaStock, StrategyKind::Equity),
    (AssetClass::UsStock, StrategyKind::Equity),
    (AssetClass::GlobalFutures, StrategyKind::Equity),
    (AssetClass::BursaFutures, StrategyKind::Charting),
    (AssetClass::Crypto, StrategyKind::Crypto),
];

pub const EQUITY_INTERVALS: IntervalTable = IntervalTable(&[
    (Timeframe::M1, "1m"),
    (Timeframe::M5, "5m"),
    (Timeframe::M15, "15m"),
    (Timeframe::H1, "1h"),
    (Timeframe::D1, "1d"),
    (Timeframe::W1, "1wk"),
    (Timeframe::Mo1, "1mo"),
]);

pub const CRYPTO_INTERVALS: IntervalTable = IntervalTable(&[
    (Timeframe::M1, "1m"),
    (Timeframe::M5, "5m"),
    (Timeframe::M15, "15m"),
    (Timeframe::H1, "1h"),
    (Timeframe::D1, "1d"),
    (Timeframe::W1, "1w"),
    (Timeframe::Mo1, "1M"),
]);

pub const CHARTING_INTERVALS: IntervalTable = IntervalTable(&[
    (Timeframe::M1, "1"),
    (Timeframe::M5, "5"),
    (Timeframe::M15, "15"),
    (Timeframe::H1, "60"),
    (Timeframe::D1, "1D"),
    (Timeframe::W1, "1W"),
    (Timeframe::Mo1, "1M"),
]);

/// Futures product prefixes listed on CBOT; any other charting code goes to MYX.
pub const CBOT_PREFIXES: &[&str] = &["ZL", "BO", "ZS", "ZC", "ZW", "MYM", "ZN", "ZT", "ZF", "ZB"];
pub const CHARTING_DEFAULT_VENUE: &str = "MYX";

/// Pick the charting venue from the code's product prefix.
pub fn charting_venue(code: &str) -> &'static str {
    let upper = code.trim().to_uppercase();
    if CBOT_PREFIXES.iter().any(|p| upper.starts_with(p)) {
        "CBOT"
    } else {
        CHARTING_DEFAULT_VENUE
    }
}

/// Bars requested from the count-based charting provider.
pub fn charting_bar_count(tf: Timeframe) -> usize {
    if tf.is_sub_hour() {
        10_000
    } else {
        3_000
    }
}

/// All routing data, injected into the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterTables {
    pub strategies: &'static [(AssetClass, StrategyKind)],
    pub equity_intervals: IntervalTable,
    pub crypto_intervals: IntervalTable,
    pub charting_intervals: IntervalTable,
}

impl Default for RouterTables {
    fn default() -> Self {
        Self {
            strategies: ASSET_STRATEGIES,
            equity_intervals: EQUITY_INTERVALS,
            crypto_intervals: CRYPTO_INTERVALS,
            charting_intervals: CHARTING_INTERVALS,
        }
    }
}

impl RouterTables {
    pub fn strategy_for(&self, asset: AssetClass) -> Option<StrategyKind> {
        self.strategies
            .iter()
            .find(|(a, _)| *a == asset)
            .map(|(_, kind)| *kind)
    }

    pub fn intervals(&self, kind: StrategyKind) -> IntervalTable {
        match kind {
            StrategyKind::Equity => self.equity_intervals,
            StrategyKind::Crypto => self.crypto_intervals,
            StrategyKind::Charting => self.charting_intervals,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub struct SourceRouter {
    tables: RouterTables,
    equity: Option<Box<dyn DataProvider>>,
    crypto: Option<Box<dyn DataProvider>>,
    charting: Option<Box<dyn DataProvider>>,
    timezone: TimezoneStandardizer,
    session: SessionWindow,
    default_venue: String,
}

impl Default for SourceRouter {
    fn default() -> Self {
        Self::new(RouterTables::default())
    }
}

impl SourceRouter {
    /// A router with no providers installed.
    pub fn new(tables: RouterTables) -> Self {
        Self {
            tables,
            equity: None,
            crypto: None,
            charting: None,
            timezone: TimezoneStandardizer::default(),
            session: SessionWindow::default(),
            default_venue: DEFAULT_VENUE.to_string(),
        }
    }

    pub fn with_equity(mut self, provider: impl DataProvider + 'static) -> Self {
        self.equity = Some(Box::new(provider));
        self
    }

    pub fn with_crypto(mut self, provider: impl DataProvider + 'static) -> Self {
        self.crypto = Some(Box::new(provider));
        self
    }

    pub fn with_charting(mut self, provider: impl DataProvider + 'static) -> Self {
        self.charting = Some(Box::new(provider));
        self
    }

    pub fn with_timezone(mut self, timezone: TimezoneStandardizer) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_session_window(mut self, window: SessionWindow) -> Self {
        self.session = window;
        self
    }

    pub fn with_default_venue(mut self, venue: impl Into<String>) -> Self {
        self.default_venue = venue.into();
        self
    }

    /// Fetch, normalize, and standardize one series.
    pub fn fetch(&self, req: &FetchRequest) -> Result<Series, FetchError> {
        let kind = self.tables.strategy_for(req.asset_class).ok_or_else(|| {
            FetchError::InvalidConfiguration(format!(
                "no retrieval strategy for asset class '{}'",
                req.asset_class
            ))
        })?;
        let interval = self.tables.intervals(kind).lookup(req.timeframe).ok_or_else(|| {
            FetchError::InvalidConfiguration(format!(
                "timeframe {} has no {kind} provider interval",
                req.timeframe
            ))
        })?;

        info!(
            code = %req.code,
            asset = %req.asset_class,
            timeframe = %req.timeframe,
            strategy = %kind,
            start = %req.start,
            end = %req.end,
            "routing fetch"
        );

        let table = match kind {
            StrategyKind::Equity => self.fetch_equity(req, interval)?,
            StrategyKind::Crypto => self.fetch_crypto(req, interval)?,
            StrategyKind::Charting => self.fetch_charting(req, interval)?,
        };

        let key = SeriesKey::new(req.code.trim(), req.timeframe);
        let stamps = self.timezone.standardize(&table.stamps);
        let mut series = assemble(key, &table, stamps).canonicalize();

        if req.session_filter {
            self.session.apply(&mut series, req.asset_class);
        }
        if series.is_empty() {
            return Err(FetchError::no_data(&req.code, req.asset_class));
        }

        debug!(rows = series.len(), "fetch complete");
        Ok(series)
    }

    fn provider(&self, kind: StrategyKind) -> Result<&dyn DataProvider, FetchError> {
        let slot = match kind {
            StrategyKind::Equity => &self.equity,
            StrategyKind::Crypto => &self.crypto,
            StrategyKind::Charting => &self.charting,
        };
        slot.as_deref().ok_or_else(|| {
            FetchError::InvalidConfiguration(format!("no {kind} provider configured"))
        })
    }

    /// Call the provider and normalize its table, classifying failures.
    fn call(
        &self,
        kind: StrategyKind,
        req: &FetchRequest,
        query: RawQuery,
    ) -> Result<NormalizedTable, FetchError> {
        let provider = self.provider(kind)?;
        debug!(
            provider = provider.name(),
            code = %query.code,
            interval = %query.interval,
            "provider call"
        );

        let raw = provider
            .fetch(&query)
            .map_err(|e| classify_failure(&e, req, kind))?;
        if raw.is_empty() {
            return Err(FetchError::no_data(&req.code, req.asset_class));
        }
        normalize(&raw).map_err(|e| FetchError::UnknownProviderError {
            message: format!("{}: {e}", provider.name()),
        })
    }

    fn fetch_equity(
        &self,
        req: &FetchRequest,
        interval: &str,
    ) -> Result<NormalizedTable, FetchError> {
        let query = RawQuery {
            code: req.asset_class.preprocess_code(&req.code),
            interval: interval.to_string(),
            start: req.start,
            end: req.end,
            venue: None,
            proxy: req.proxy.clone(),
            bar_count: None,
        };
        self.call(StrategyKind::Equity, req, query)
    }

    fn fetch_crypto(
        &self,
        req: &FetchRequest,
        interval: &str,
    ) -> Result<NormalizedTable, FetchError> {
        let requested = req.exchange.as_deref().unwrap_or(&self.default_venue);
        let venue = find_venue(requested).ok_or_else(|| {
            FetchError::InvalidConfiguration(format!("unknown crypto venue '{requested}'"))
        })?;
        let query = RawQuery {
            code: req.code.trim().to_uppercase(),
            interval: interval.to_string(),
            start: req.start,
            end: req.end,
            venue: Some(venue.id.to_string()),
            proxy: req.proxy.clone(),
            bar_count: None,
        };
        let mut table = self.call(StrategyKind::Crypto, req, query)?;
        let end = req.end;
        table.retain_rows(|s| s.to_utc() <= end);
        if table.is_empty() {
            return Err(FetchError::no_data(&req.code, req.asset_class));
        }
        Ok(table)
    }

    fn fetch_charting(
        &self,
        req: &FetchRequest,
        interval: &str,
    ) -> Result<NormalizedTable, FetchError> {
        let code = req.code.trim().to_uppercase();
        let venue = charting_venue(&code);
        let query = RawQuery {
            code,
            interval: interval.to_string(),
            start: req.start,
            end: req.end,
            venue: Some(venue.to_string()),
            proxy: req.proxy.clone(),
            bar_count: Some(charting_bar_count(req.timeframe)),
        };
        let mut table = self.call(StrategyKind::Charting, req, query)?;
        let (start, end) = (req.start, req.end);
        table.retain_rows(|s| {
            let t = s.to_utc();
            start <= t && t <= end
        });
        if table.is_empty() {
            return Err(FetchError::no_data(&req.code, req.asset_class));
        }
        Ok(table)
    }
}

impl SeriesSource for SourceRouter {
    fn fetch(&self, request: &FetchRequest) -> Result<Series, FetchError> {
        SourceRouter::fetch(self, request)
    }
}

/// Turn a provider failure into the user-facing taxonomy.
pub fn classify_failure(err: &SourceError, req: &FetchRequest, kind: StrategyKind) -> FetchError {
    match classify(&err.message, &err.type_name) {
        ErrorCategory::Network => {
            let hint = if kind == StrategyKind::Crypto && req.proxy.is_none() {
                format!("{NETWORK_HINT} {PROXY_TIP}")
            } else {
                NETWORK_HINT.to_string()
            };
            FetchError::NetworkFailure {
                message: err.message.clone(),
                hint,
            }
        }
        ErrorCategory::Granularity => FetchError::UnsupportedGranularity {
            timeframe: req.timeframe.to_string(),
            hint: GRANULARITY_HINT.to_string(),
        },
        ErrorCategory::NoData => FetchError::no_data(&req.code, req.asset_class),
        ErrorCategory::Unknown => FetchError::UnknownProviderError {
            message: err.to_string(),
        },
    }
}

/// Build bars from a normalized table and its standardized timestamps.
/// Fields the provider did not deliver become NaN prices or absent volume.
fn assemble(key: SeriesKey, table: &NormalizedTable, stamps: Vec<NaiveDateTime>) -> Series {
    let open = table.values(Field::Open);
    let high = table.values(Field::High);
    let low = table.values(Field::Low);
    let close = table.values(Field::Close);
    let volume = table.values(Field::Volume);
    let price = |col: Option<&[Option<f64>]>, i: usize| col.and_then(|c| c[i]).unwrap_or(f64::NAN);

    let bars = stamps
        .into_iter()
        .enumerate()
        .map(|(i, timestamp)| Bar {
            timestamp,
            open: price(open, i),
            high: price(high, i),
            low: price(low, i),
            close: price(close, i),
            volume: volume.and_then(|c| c[i]),
        })
        .collect();
    Series::new(key, bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::error::Disposition;
    use crate::data::provider::{RawTable, RawValue};
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    /// Provider that returns a canned result and records every query.
    #[derive(Clone)]
    struct Scripted {
        result: Result<RawTable, SourceError>,
        seen: Arc<Mutex<Vec<RawQuery>>>,
    }

    impl Scripted {
        fn ok(table: RawTable) -> Self {
            Self {
                result: Ok(table),
                seen: Arc::default(),
            }
        }

        fn err(type_name: &str, message: &str) -> Self {
            Self {
                result: Err(SourceError::new(type_name, message)),
                seen: Arc::default(),
            }
        }

        fn queries(&self) -> Vec<RawQuery> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl DataProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fetch(&self, query: &RawQuery) -> Result<RawTable, SourceError> {
            self.seen.lock().unwrap().push(query.clone());
            self.result.clone()
        }
    }

    /// Intraday UTC epoch rows: 2024-03-04 03:00..07:00 UTC hourly,
    /// which is 11:00..15:00 in Kuala Lumpur.
    fn intraday_table() -> RawTable {
        let base = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp();
        let hours: Vec<i64> = (0..5).map(|h| base + h * 3600).collect();
        RawTable::new()
            .with_column("Datetime", hours.iter().map(|&t| RawValue::Int(t)).collect())
            .with_column("Open", hours.iter().map(|_| 1.0.into()).collect())
            .with_column("High", hours.iter().map(|_| 2.0.into()).collect())
            .with_column("Low", hours.iter().map(|_| 0.5.into()).collect())
            .with_column("Close", (0..5).map(|i| RawValue::Number(i as f64)).collect())
            .with_column("Adj Close", hours.iter().map(|_| 99.0.into()).collect())
            .with_column("Volume", hours.iter().map(|_| RawValue::Int(10)).collect())
    }

    fn request(asset: AssetClass, code: &str, tf: Timeframe) -> FetchRequest {
        FetchRequest {
            asset_class: asset,
            code: code.into(),
            timeframe: tf,
            start: at("2024-03-01 00:00:00"),
            end: at("2024-03-10 00:00:00"),
            exchange: None,
            proxy: None,
            session_filter: false,
        }
    }

    #[test]
    fn equity_pipeline_normalizes_and_converts_timezone() {
        let provider = Scripted::ok(intraday_table());
        let router = SourceRouter::default().with_equity(provider.clone());
        let series = router
            .fetch(&request(AssetClass::MalaysiaStock, "1155", Timeframe::H1))
            .unwrap();

        assert_eq!(series.len(), 5);
        assert_eq!(series.bars[0].timestamp, at("2024-03-04 11:00:00"));
        assert_eq!(series.bars[0].volume, Some(10.0));
        assert!(series.is_strictly_ascending());

        let q = &provider.queries()[0];
        assert_eq!(q.code, "1155.KL");
        assert_eq!(q.interval, "1h");
    }

    #[test]
    fn session_filter_runs_after_timezone_conversion() {
        let router = SourceRouter::default().with_equity(Scripted::ok(intraday_table()));
        let mut req = request(AssetClass::MalaysiaStock, "1155", Timeframe::H1);
        req.session_filter = true;
        let series = router.fetch(&req).unwrap();
        let hours: Vec<u32> = series
            .bars
            .iter()
            .map(|b| chrono::Timelike::hour(&b.timestamp))
            .collect();
        assert_eq!(hours, vec![11, 12, 15]);
    }

    #[test]
    fn session_filter_ignored_for_us_stocks() {
        let router = SourceRouter::default().with_equity(Scripted::ok(intraday_table()));
        let mut req = request(AssetClass::UsStock, "AAPL", Timeframe::H1);
        req.session_filter = true;
        assert_eq!(router.fetch(&req).unwrap().len(), 5);
    }

    #[test]
    fn yearly_timeframe_is_rejected() {
        let router = SourceRouter::default().with_equity(Scripted::ok(intraday_table()));
        let err = router
            .fetch(&request(AssetClass::UsStock, "AAPL", Timeframe::Y1))
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidConfiguration(_)));
        assert_eq!(err.disposition(), Disposition::FixInput);
    }

    #[test]
    fn unknown_asset_class_in_table_is_rejected() {
        static EQUITY_ONLY: &[(AssetClass, StrategyKind)] =
            &[(AssetClass::UsStock, StrategyKind::Equity)];
        let tables = RouterTables {
            strategies: EQUITY_ONLY,
            ..RouterTables::default()
        };
        let router = SourceRouter::new(tables).with_crypto(Scripted::ok(intraday_table()));
        let err = router
            .fetch(&request(AssetClass::Crypto, "BTC/USDT", Timeframe::H1))
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidConfiguration(_)));
    }

    #[test]
    fn missing_provider_is_a_configuration_error() {
        let router = SourceRouter::default();
        let err = router
            .fetch(&request(AssetClass::BursaFutures, "FCPO1!", Timeframe::D1))
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidConfiguration(_)));
    }

    #[test]
    fn network_failure_is_classified_with_proxy_tip_for_crypto() {
        let router =
            SourceRouter::default().with_crypto(Scripted::err("ConnectError", "connection reset"));
        let err = router
            .fetch(&request(AssetClass::Crypto, "BTC/USDT", Timeframe::H1))
            .unwrap_err();
        assert_eq!(err.disposition(), Disposition::RetryNow);
        assert!(err.hint().unwrap().contains("proxy"));

        let mut req = request(AssetClass::Crypto, "BTC/USDT", Timeframe::H1);
        req.proxy = Some("http://127.0.0.1:7890".into());
        let err = router.fetch(&req).unwrap_err();
        assert!(!err.hint().unwrap().contains("set a proxy"));
    }

    #[test]
    fn granularity_and_no_data_are_classified() {
        let router = SourceRouter::default()
            .with_equity(Scripted::err("HTTP 422", "1m data not available for startTime"));
        let err = router
            .fetch(&request(AssetClass::UsStock, "AAPL", Timeframe::M1))
            .unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedGranularity { .. }));

        let router = SourceRouter::default().with_equity(Scripted::ok(RawTable::new()));
        let err = router
            .fetch(&request(AssetClass::UsStock, "ZZZZ", Timeframe::D1))
            .unwrap_err();
        assert_eq!(err.disposition(), Disposition::NothingToRetry);
    }

    #[test]
    fn unknown_failure_wraps_raw_message() {
        let router =
            SourceRouter::default().with_equity(Scripted::err("ParseError", "unexpected payload"));
        let err = router
            .fetch(&request(AssetClass::UsStock, "AAPL", Timeframe::D1))
            .unwrap_err();
        match err {
            FetchError::UnknownProviderError { message } => {
                assert!(message.contains("unexpected payload"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn crypto_rows_after_end_are_dropped_and_venue_resolved() {
        let provider = Scripted::ok(intraday_table());
        let router = SourceRouter::default().with_crypto(provider.clone());
        let mut req = request(AssetClass::Crypto, "btc/usdt", Timeframe::H1);
        req.end = at("2024-03-04 05:00:00");
        let series = router.fetch(&req).unwrap();
        assert_eq!(series.len(), 3);

        let q = &provider.queries()[0];
        assert_eq!(q.code, "BTC/USDT");
        assert_eq!(q.venue.as_deref(), Some("luno"));
    }

    #[test]
    fn unknown_crypto_venue_is_rejected() {
        let router = SourceRouter::default().with_crypto(Scripted::ok(intraday_table()));
        let mut req = request(AssetClass::Crypto, "BTC/USDT", Timeframe::H1);
        req.exchange = Some("Mt. Gox".into());
        assert!(matches!(
            router.fetch(&req),
            Err(FetchError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn charting_strategy_selects_venue_and_bar_count() {
        let provider = Scripted::ok(intraday_table());
        let router = SourceRouter::default().with_charting(provider.clone());

        router
            .fetch(&request(AssetClass::BursaFutures, "fcpo1!", Timeframe::M5))
            .unwrap();
        router
            .fetch(&request(AssetClass::BursaFutures, "ZS1!", Timeframe::D1))
            .unwrap();

        let queries = provider.queries();
        assert_eq!(queries[0].venue.as_deref(), Some("MYX"));
        assert_eq!(queries[0].bar_count, Some(10_000));
        assert_eq!(queries[1].venue.as_deref(), Some("CBOT"));
        assert_eq!(queries[1].bar_count, Some(3_000));
    }

    #[test]
    fn charting_rows_outside_range_yield_no_data() {
        let router = SourceRouter::default().with_charting(Scripted::ok(intraday_table()));
        let mut req = request(AssetClass::BursaFutures, "FCPO1!", Timeframe::H1);
        req.start = at("2024-05-01 00:00:00");
        req.end = at("2024-05-02 00:00:00");
        let err = router.fetch(&req).unwrap_err();
        assert!(err.hint().unwrap().contains("FCPO1!"));
    }

    #[test]
    fn interval_tables_cover_all_but_yearly() {
        let tables = RouterTables::default();
        for kind in [StrategyKind::Equity, StrategyKind::Crypto, StrategyKind::Charting] {
            for tf in Timeframe::ALL {
                assert_eq!(tables.intervals(kind).lookup(tf).is_some(), tf != Timeframe::Y1);
            }
        }
        assert_eq!(EQUITY_INTERVALS.lookup(Timeframe::W1), Some("1wk"));
        assert_eq!(CRYPTO_INTERVALS.lookup(Timeframe::Mo1), Some("1M"));
    }

    #[test]
    fn every_asset_class_has_a_strategy() {
        let tables = RouterTables::default();
        for asset in AssetClass::ALL {
            assert!(tables.strategy_for(asset).is_some());
        }
    }
}
