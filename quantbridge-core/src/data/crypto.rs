//! Spot crypto candles from public exchange REST APIs.
//!
//! Each venue differs in URL layout, symbol spelling, interval codes, page
//! direction, and payload shape. `VenueApi` captures those differences;
//! `CryptoClient` does the HTTP and paging. All traffic, including the
//! first request, goes through the query's proxy when one is set.
//!
//! The returned table uses the columns `timestamp` (epoch ms), `open`,
//! `high`, `low`, `close`, `volume`.

use super::provider::{DataProvider, RawQuery, RawTable, RawValue, SourceError};
use chrono::NaiveDateTime;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_VENUE: &str = "Luno (Malaysia)";

/// Upper bound on pages per call; a 1m history over a long range would
/// otherwise hammer the venue.
const MAX_PAGES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueApi {
    Luno,
    Binance,
    Okx,
    Bybit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Venue {
    pub label: &'static str,
    pub id: &'static str,
    pub api: VenueApi,
}

pub const VENUES: &[Venue] = &[
    Venue {
        label: "Luno (Malaysia)",
        id: "luno",
        api: VenueApi::Luno,
    },
    Venue {
        label: "Binance (Global)",
        id: "binance",
        api: VenueApi::Binance,
    },
    Venue {
        label: "OKX",
        id: "okx",
        api: VenueApi::Okx,
    },
    Venue {
        label: "Bybit",
        id: "bybit",
        api: VenueApi::Bybit,
    },
];

/// Look up a venue by label or id, case-insensitive.
pub fn find_venue(name: &str) -> Option<&'static Venue> {
    let name = name.trim();
    VENUES
        .iter()
        .find(|v| v.label.eq_ignore_ascii_case(name) || v.id.eq_ignore_ascii_case(name))
}

/// One decoded candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub timestamp_ms: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl VenueApi {
    /// Venue-native interval for a unified interval code.
    pub fn interval(self, unified: &str) -> Option<&'static str> {
        let table: &[(&str, &str)] = match self {
            VenueApi::Luno => &[
                ("1m", "60"),
                ("5m", "300"),
                ("15m", "900"),
                ("1h", "3600"),
                ("1d", "86400"),
                ("1w", "604800"),
            ],
            VenueApi::Binance => &[
                ("1m", "1m"),
                ("5m", "5m"),
                ("15m", "15m"),
                ("1h", "1h"),
                ("1d", "1d"),
                ("1w", "1w"),
                ("1M", "1M"),
            ],
            VenueApi::Okx => &[
                ("1m", "1m"),
                ("5m", "5m"),
                ("15m", "15m"),
                ("1h", "1H"),
                ("1d", "1D"),
                ("1w", "1W"),
                ("1M", "1M"),
            ],
            VenueApi::Bybit => &[
                ("1m", "1"),
                ("5m", "5"),
                ("15m", "15"),
                ("1h", "60"),
                ("1d", "D"),
                ("1w", "W"),
                ("1M", "M"),
            ],
        };
        table.iter().find(|(u, _)| *u == unified).map(|(_, v)| *v)
    }

    /// Venue spelling of a `BASE/QUOTE` pair.
    pub fn pair(self, symbol: &str) -> String {
        let symbol = symbol.trim().to_uppercase();
        let (base, quote) = symbol.split_once('/').unwrap_or((symbol.as_str(), ""));
        match self {
            VenueApi::Luno => {
                let base = if base == "BTC" { "XBT" } else { base };
                let quote = if quote == "BTC" { "XBT" } else { quote };
                format!("{base}{quote}")
            }
            VenueApi::Binance | VenueApi::Bybit => format!("{base}{quote}"),
            VenueApi::Okx if quote.is_empty() => base.to_string(),
            VenueApi::Okx => format!("{base}-{quote}"),
        }
    }

    /// Pages run forward from the start (true) or backward from the end.
    fn ascending(self) -> bool {
        matches!(self, VenueApi::Luno | VenueApi::Binance)
    }

    fn page_limit(self) -> usize {
        match self {
            VenueApi::Luno | VenueApi::Binance | VenueApi::Bybit => 1000,
            VenueApi::Okx => 100,
        }
    }

    /// URL for one page. `cursor` is the first timestamp for ascending
    /// venues and the last (inclusive) for descending ones.
    fn page_url(
        self,
        pair: &str,
        interval: &str,
        cursor: i64,
        start_ms: i64,
        end_ms: i64,
    ) -> String {
        let limit = self.page_limit();
        match self {
            VenueApi::Luno => format!(
                "https://api.luno.com/api/exchange/1/candles?pair={pair}\
                 &since={cursor}&duration={interval}"
            ),
            VenueApi::Binance => format!(
                "https://api.binance.com/api/v3/klines?symbol={pair}&interval={interval}\
                 &startTime={cursor}&endTime={end_ms}&limit={limit}"
            ),
            VenueApi::Okx => format!(
                "https://www.okx.com/api/v5/market/history-candles?instId={pair}&bar={interval}\
                 &after={}&limit={limit}",
                cursor + 1
            ),
            VenueApi::Bybit => format!(
                "https://api.bybit.com/v5/market/kline?category=spot&symbol={pair}\
                 &interval={interval}&start={start_ms}&end={cursor}&limit={limit}"
            ),
        }
    }

    /// Decode one page payload.
    pub fn parse_page(self, body: &Value) -> Result<Vec<Candle>, SourceError> {
        match self {
            VenueApi::Luno => {
                if let Some(msg) = body.get("error").and_then(Value::as_str) {
                    return Err(SourceError::new("ExchangeError", msg));
                }
                let candles = body
                    .get("candles")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                candles
                    .iter()
                    .map(|c| {
                        Ok(Candle {
                            timestamp_ms: c
                                .get("timestamp")
                                .and_then(Value::as_i64)
                                .ok_or_else(|| bad_payload("candle without timestamp"))?,
                            open: c.get("open").and_then(number),
                            high: c.get("high").and_then(number),
                            low: c.get("low").and_then(number),
                            close: c.get("close").and_then(number),
                            volume: c.get("volume").and_then(number),
                        })
                    })
                    .collect()
            }
            VenueApi::Binance => {
                if let Some(msg) = body.get("msg").and_then(Value::as_str) {
                    return Err(SourceError::new("ExchangeError", msg));
                }
                rows(body.as_array())
            }
            VenueApi::Okx => {
                let code = body.get("code").and_then(Value::as_str).unwrap_or("0");
                if code != "0" {
                    let msg = body.get("msg").and_then(Value::as_str).unwrap_or_default();
                    return Err(SourceError::new("ExchangeError", format!("{code}: {msg}")));
                }
                rows(body.get("data").and_then(Value::as_array))
            }
            VenueApi::Bybit => {
                let code = body.get("retCode").and_then(Value::as_i64).unwrap_or(0);
                if code != 0 {
                    let msg = body.get("retMsg").and_then(Value::as_str).unwrap_or_default();
                    return Err(SourceError::new("ExchangeError", format!("{code}: {msg}")));
                }
                rows(body.pointer("/result/list").and_then(Value::as_array))
            }
        }
    }
}

fn bad_payload(msg: &str) -> SourceError {
    SourceError::new("BadResponse", msg)
}

/// Venues quote numbers as strings or as JSON numbers.
fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Array-of-arrays payloads: `[ts, open, high, low, close, volume, ...]`.
fn rows(list: Option<&Vec<Value>>) -> Result<Vec<Candle>, SourceError> {
    let Some(list) = list else {
        return Ok(Vec::new());
    };
    list.iter()
        .map(|row| {
            let cell = |i: usize| row.get(i).and_then(number);
            let timestamp_ms =
                cell(0).ok_or_else(|| bad_payload("kline without timestamp"))? as i64;
            Ok(Candle {
                timestamp_ms,
                open: cell(1),
                high: cell(2),
                low: cell(3),
                close: cell(4),
                volume: cell(5),
            })
        })
        .collect()
}

fn epoch_ms(t: NaiveDateTime) -> i64 {
    t.and_utc().timestamp_millis()
}

/// Transport failures keep a type name the classifier recognizes.
fn transport_error(e: &reqwest::Error) -> SourceError {
    let type_name = if e.is_timeout() {
        "TimeoutError"
    } else if e.is_connect() {
        "ConnectError"
    } else {
        "RequestException"
    };
    SourceError::new(type_name, e.to_string())
}

/// Candles into the provider table layout.
pub fn candles_to_table(candles: &[Candle]) -> RawTable {
    let col = |f: fn(&Candle) -> Option<f64>| {
        candles.iter().map(|c| RawValue::from(f(c))).collect()
    };
    RawTable::new()
        .with_column(
            "timestamp",
            candles.iter().map(|c| RawValue::Int(c.timestamp_ms)).collect(),
        )
        .with_column("open", col(|c| c.open))
        .with_column("high", col(|c| c.high))
        .with_column("low", col(|c| c.low))
        .with_column("close", col(|c| c.close))
        .with_column("volume", col(|c| c.volume))
}

/// HTTP client for the venue table.
pub struct CryptoClient {
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl CryptoClient {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: Self::build_client(timeout, None)?,
            timeout,
        })
    }

    fn build_client(
        timeout: Duration,
        proxy: Option<&str>,
    ) -> Result<reqwest::blocking::Client, SourceError> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("quantbridge/0.1");
        if let Some(url) = proxy {
            let proxy = reqwest::Proxy::all(url).map_err(|e| {
                SourceError::new("ProxyError", format!("invalid proxy '{url}': {e}"))
            })?;
            builder = builder.proxy(proxy);
        }
        builder
            .build()
            .map_err(|e| SourceError::new("RequestException", format!("http client: {e}")))
    }

    fn get_json(client: &reqwest::blocking::Client, url: &str) -> Result<Value, SourceError> {
        debug!(url, "crypto page request");
        let resp = client.get(url).send().map_err(|e| transport_error(&e))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(SourceError::new("HTTPError", format!("HTTP {status}: {text}")));
        }
        resp.json()
            .map_err(|e| SourceError::new("BadResponse", format!("unreadable body: {e}")))
    }

    fn fetch_candles(&self, venue: &Venue, query: &RawQuery) -> Result<Vec<Candle>, SourceError> {
        let api = venue.api;
        let interval = api.interval(&query.interval).ok_or_else(|| {
            SourceError::new(
                "NotSupported",
                format!("interval not supported by {}: {}", venue.label, query.interval),
            )
        })?;
        let pair = api.pair(&query.code);
        let (start_ms, end_ms) = (epoch_ms(query.start), epoch_ms(query.end));

        let proxied;
        let client = match query.proxy.as_deref() {
            Some(url) => {
                proxied = Self::build_client(self.timeout, Some(url))?;
                &proxied
            }
            None => &self.client,
        };

        let mut out = Vec::new();
        let mut cursor = if api.ascending() { start_ms } else { end_ms };
        for page in 0..MAX_PAGES {
            let url = api.page_url(&pair, interval, cursor, start_ms, end_ms);
            let body = Self::get_json(client, &url)?;
            let candles = api.parse_page(&body)?;
            let Some(edge) = (if api.ascending() {
                candles.iter().map(|c| c.timestamp_ms).max()
            } else {
                candles.iter().map(|c| c.timestamp_ms).min()
            }) else {
                break;
            };
            let full = candles.len() >= api.page_limit();
            out.extend(
                candles
                    .into_iter()
                    .filter(|c| c.timestamp_ms >= start_ms && c.timestamp_ms <= end_ms),
            );

            if api.ascending() {
                if edge >= end_ms || !full {
                    break;
                }
                cursor = edge + 1;
            } else {
                if edge <= start_ms || !full {
                    break;
                }
                cursor = edge - 1;
            }
            if page + 1 == MAX_PAGES {
                warn!(venue = venue.id, %pair, "page limit reached, result truncated");
            }
        }

        out.sort_by_key(|c| c.timestamp_ms);
        Ok(out)
    }
}

impl DataProvider for CryptoClient {
    fn name(&self) -> &str {
        "crypto_exchange"
    }

    fn fetch(&self, query: &RawQuery) -> Result<RawTable, SourceError> {
        let requested = query.venue.as_deref().unwrap_or(DEFAULT_VENUE);
        let venue = find_venue(requested).ok_or_else(|| {
            SourceError::new("ExchangeNotAvailable", format!("unknown venue '{requested}'"))
        })?;
        let candles = self.fetch_candles(venue, query)?;
        debug!(venue = venue.id, rows = candles.len(), "crypto fetch complete");
        Ok(candles_to_table(&candles))
    }
}
