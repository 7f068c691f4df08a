//! Yahoo Finance equity history provider.
//!
//! Fetches OHLCV bars from Yahoo's v8 chart API for stocks and generic
//! futures, with retries and exponential backoff on transient failures.
//!
//! Timestamps are emitted as text carrying the exchange's UTC offset
//! (`meta.gmtoffset`). Daily and longer bars are labelled with the local
//! session date at midnight, matching how the exchange reports them.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes; parse failures surface as unknown provider errors.

use super::provider::{DataProvider, RawQuery, RawTable, RawValue, SourceError};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    gmtoffset: Option<i32>,
    exchange_timezone_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Intervals whose bars are labelled by session date.
fn is_date_interval(interval: &str) -> bool {
    matches!(interval, "1d" | "5d" | "1wk" | "1mo" | "3mo")
}

fn cell(column: &Option<Vec<Option<f64>>>, i: usize) -> Option<f64> {
    column.as_ref().and_then(|v| v.get(i).copied().flatten())
}

/// Render a bar time in the exchange offset.
fn render_stamp(epoch: i64, offset: FixedOffset, date_label: bool) -> Option<String> {
    let local = DateTime::from_timestamp(epoch, 0)?.with_timezone(&offset);
    let local = if date_label {
        let midnight = local.date_naive().and_hms_opt(0, 0, 0)?;
        offset.from_local_datetime(&midnight).single()?
    } else {
        local
    };
    Some(local.format("%Y-%m-%d %H:%M:%S%:z").to_string())
}

/// Parse the chart API response into a raw table.
///
/// Columns: `Datetime`, `Open`, `High`, `Low`, `Close`, `Adj Close`,
/// `Volume`. Rows where every price and the volume are missing (holidays)
/// are skipped.
fn parse_response(
    symbol: &str,
    interval: &str,
    resp: ChartResponse,
) -> Result<RawTable, SourceError> {
    let result = match (resp.chart.result, resp.chart.error) {
        (_, Some(err)) => {
            return Err(SourceError::new(err.code, err.description));
        }
        (Some(result), None) => result,
        (None, None) => {
            return Err(SourceError::new("YFException", "empty result with no error"));
        }
    };

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::new("YFException", format!("No data found for {symbol}")))?;

    let Some(timestamps) = data.timestamp else {
        return Ok(RawTable::new());
    };

    let meta = data.meta;
    let gmtoffset = meta.as_ref().and_then(|m| m.gmtoffset).unwrap_or(0);
    let offset = FixedOffset::east_opt(gmtoffset)
        .ok_or_else(|| SourceError::new("YFException", format!("bad gmtoffset {gmtoffset}")))?;
    if let Some(zone) = meta.as_ref().and_then(|m| m.exchange_timezone_name.as_deref()) {
        debug!(symbol, zone, gmtoffset, "exchange timezone");
    }

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::new("YFException", "no quote data"))?;
    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let date_label = is_date_interval(interval);
    let n = timestamps.len();
    let mut stamps = Vec::with_capacity(n);
    let mut opens = Vec::with_capacity(n);
    let mut highs = Vec::with_capacity(n);
    let mut lows = Vec::with_capacity(n);
    let mut closes = Vec::with_capacity(n);
    let mut adj = Vec::with_capacity(n);
    let mut volumes = Vec::with_capacity(n);

    for (i, &ts) in timestamps.iter().enumerate() {
        let open = cell(&quote.open, i);
        let high = cell(&quote.high, i);
        let low = cell(&quote.low, i);
        let close = cell(&quote.close, i);
        let volume = cell(&quote.volume, i);

        if open.is_none()
            && high.is_none()
            && low.is_none()
            && close.is_none()
            && volume.is_none()
        {
            continue;
        }

        let stamp = render_stamp(ts, offset, date_label)
            .ok_or_else(|| SourceError::new("YFException", format!("invalid timestamp: {ts}")))?;
        stamps.push(RawValue::Text(stamp));
        opens.push(RawValue::from(open));
        highs.push(RawValue::from(high));
        lows.push(RawValue::from(low));
        closes.push(RawValue::from(close));
        adj.push(RawValue::from(
            adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten()),
        ));
        volumes.push(RawValue::from(volume));
    }

    Ok(RawTable::new()
        .with_column("Datetime", stamps)
        .with_column("Open", opens)
        .with_column("High", highs)
        .with_column("Low", lows)
        .with_column("Close", closes)
        .with_column("Adj Close", adj)
        .with_column("Volume", volumes))
}

/// Transport failures keep a type name the classifier recognizes.
fn transport_error(e: &reqwest::Error) -> SourceError {
    let type_name = if e.is_timeout() {
        "ReadTimeout"
    } else if e.is_connect() {
        "ConnectionError"
    } else {
        "RequestException"
    };
    SourceError::new(type_name, e.to_string())
}

/// Yahoo Finance data provider.
pub struct YahooClient {
    client: reqwest::blocking::Client,
    timeout: Duration,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooClient {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: Self::build_client(timeout, None)?,
            timeout,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    fn build_client(
        timeout: Duration,
        proxy: Option<&str>,
    ) -> Result<reqwest::blocking::Client, SourceError> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36");
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

    /// Build the chart API URL. Range bounds are taken as UTC.
    fn chart_url(symbol: &str, interval: &str, start: NaiveDateTime, end: NaiveDateTime) -> String {
        let start_ts = start.and_utc().timestamp();
        let end_ts = end.and_utc().timestamp();
        format!(
            "{BASE_URL}/{symbol}?period1={start_ts}&period2={end_ts}&interval={interval}\
             &includeAdjustedClose=true&events=div%2Csplits"
        )
    }

    /// Execute the request with retry on transient failures.
    fn fetch_with_retry(&self, query: &RawQuery) -> Result<RawTable, SourceError> {
        let proxied;
        let client = match query.proxy.as_deref() {
            Some(url) => {
                proxied = Self::build_client(self.timeout, Some(url))?;
                &proxied
            }
            None => &self.client,
        };

        let url = Self::chart_url(&query.code, &query.interval, query.start, query.end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            match client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                        || status.is_server_error()
                    {
                        warn!(
                            symbol = %query.code,
                            %status,
                            attempt,
                            "transient HTTP status, retrying"
                        );
                        last_error = Some(SourceError::new("HTTPError", format!("HTTP {status}")));
                        continue;
                    }

                    // 404 and 400 still carry a chart error payload worth surfacing.
                    let chart: ChartResponse = resp.json().map_err(|e| {
                        SourceError::new(
                            "YFException",
                            format!(
                                "HTTP {status}: failed to parse response for {}: {e}",
                                query.code
                            ),
                        )
                    })?;
                    return parse_response(&query.code, &query.interval, chart);
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    warn!(symbol = %query.code, attempt, error = %e, "transport failure, retrying");
                    last_error = Some(transport_error(&e));
                }
                Err(e) => return Err(transport_error(&e)),
            }
        }

        Err(last_error
            .unwrap_or_else(|| SourceError::new("RequestException", "max retries exceeded")))
    }
}

impl DataProvider for YahooClient {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, query: &RawQuery) -> Result<RawTable, SourceError> {
        let table = self.fetch_with_retry(query)?;
        debug!(symbol = %query.code, rows = table.row_count(), "yahoo fetch complete");
        Ok(table)
    }
}
