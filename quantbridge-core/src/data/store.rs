//! Master store: one Parquet record per `(symbol, timeframe)`.
//!
//! Layout: `{store_dir}/{symbol}_{timeframe}.parquet`
//!
//! Features:
//! - Incremental update: fetch only `[last + 1 day, end]` and merge, delta wins
//! - Full overwrite on every update, written atomically (tmp + rename)
//! - Unreadable records trigger a full rebuild instead of an error
//! - Updates to the same key are serialized; distinct keys never contend
//! - Maintenance: status listing, removal, bulk CSV export

use super::error::{FetchError, StoreError};
use super::export::{write_series_csv, ExportError};
use super::parquet::{read_parquet, read_series, write_series};
use super::router::{FetchRequest, SeriesSource};
use crate::domain::{AssetClass, Series, SeriesKey, Timeframe};
use chrono::{Duration, NaiveDateTime};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

pub const DEFAULT_LOOKBACK_DAYS: i64 = 365;

/// Parameters of one incremental update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub asset_class: AssetClass,
    /// Start of a full fetch; defaults to `end - lookback`.
    pub start: Option<NaiveDateTime>,
    pub end: NaiveDateTime,
    pub exchange: Option<String>,
    pub proxy: Option<String>,
    pub session_filter: bool,
}

impl UpdateRequest {
    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(self.symbol.trim(), self.timeframe)
    }

    fn fetch_request(&self, start: NaiveDateTime) -> FetchRequest {
        FetchRequest {
            asset_class: self.asset_class,
            code: self.symbol.clone(),
            timeframe: self.timeframe,
            start,
            end: self.end,
            exchange: self.exchange.clone(),
            proxy: self.proxy.clone(),
            session_filter: self.session_filter,
        }
    }
}

/// One record as reported by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct StoreEntry {
    pub symbol: String,
    pub timeframe: String,
    pub rows: Option<usize>,
    pub last_timestamp: Option<NaiveDateTime>,
    pub size_bytes: u64,
    pub path: PathBuf,
}

/// Result of exporting one record during a bulk export.
#[derive(Debug)]
pub struct ExportOutcome {
    pub source: PathBuf,
    pub result: Result<PathBuf, ExportError>,
}

pub struct MasterStore {
    root: PathBuf,
    lookback: Duration,
    locks: Mutex<HashMap<SeriesKey, Arc<Mutex<()>>>>,
}

impl MasterStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lookback: Duration::days(DEFAULT_LOOKBACK_DAYS),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Window used for a first fetch when the request has no start.
    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.lookback = Duration::days(days);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/{symbol}_{timeframe}.parquet`
    pub fn path_for(&self, key: &SeriesKey) -> PathBuf {
        self.root.join(format!("{}.parquet", key.file_stem()))
    }

    pub fn contains(&self, key: &SeriesKey) -> bool {
        self.path_for(key).exists()
    }

    /// Read a stored record.
    pub fn get(&self, symbol: &str, timeframe: Timeframe) -> Result<Series, StoreError> {
        self.load(&SeriesKey::new(symbol.trim(), timeframe))
    }

    fn load(&self, key: &SeriesKey) -> Result<Series, StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        }
        read_series(&path, key.clone()).map_err(|e| StoreError::Corrupt {
            path,
            reason: e.to_string(),
        })
    }

    /// Overwrite the record for the series' key.
    pub fn put(&self, series: &Series) -> Result<(), StoreError> {
        let path = self.path_for(&series.key);
        write_series(series, &path).map_err(|e| StoreError::Io(e.to_string()))?;
        debug!(
            key = %series.key,
            rows = series.len(),
            path = %path.display(),
            "store record written"
        );
        Ok(())
    }

    fn key_lock(&self, key: &SeriesKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.clone()).or_default().clone()
    }

    /// Bring the record up to `req.end` and persist it.
    ///
    /// Always writes the record before returning, even when nothing new was
    /// fetched. Read failures of the existing record are never returned;
    /// they fall back to a full fetch.
    pub fn update(
        &self,
        req: &UpdateRequest,
        source: &dyn SeriesSource,
    ) -> Result<Series, FetchError> {
        let key = req.key();
        let lock = self.key_lock(&key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let stored = match self.load(&key) {
            Ok(series) if !series.is_empty() => Some(series),
            Ok(_) => {
                warn!(%key, "empty store record, rebuilding");
                None
            }
            Err(StoreError::NotFound { .. }) => None,
            Err(e) => {
                warn!(%key, error = %e, "unreadable store record, rebuilding");
                None
            }
        };

        let result = match stored {
            Some(stored) => self.merge_delta(stored, req, source)?,
            None => {
                let start = req.start.unwrap_or(req.end - self.lookback);
                info!(%key, %start, end = %req.end, "full fetch");
                let fetched = source.fetch(&req.fetch_request(start))?;
                Series::new(key, fetched.bars).canonicalize()
            }
        };

        self.put(&result)?;
        Ok(result)
    }

    fn merge_delta(
        &self,
        stored: Series,
        req: &UpdateRequest,
        source: &dyn SeriesSource,
    ) -> Result<Series, FetchError> {
        let stored = stored.canonicalize();
        let Some(last) = stored.last_timestamp() else {
            return Ok(stored);
        };

        let delta_start = last + Duration::days(1);
        if delta_start > req.end {
            debug!(key = %stored.key, %last, "store is current");
            return Ok(stored);
        }

        info!(key = %stored.key, start = %delta_start, end = %req.end, "delta fetch");
        match source.fetch(&req.fetch_request(delta_start)) {
            Ok(delta) if delta.is_empty() => Ok(stored),
            Ok(delta) => {
                let before = stored.len();
                let merged = stored.merge(delta);
                info!(
                    key = %merged.key,
                    added = merged.len().saturating_sub(before),
                    "delta merged"
                );
                Ok(merged)
            }
            Err(FetchError::NoDataFound { .. }) => {
                debug!(key = %stored.key, "no delta available");
                Ok(stored)
            }
            Err(e) => Err(e),
        }
    }

    // ── Maintenance ─────────────────────────────────────────────────

    fn record_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries =
            fs::read_dir(&self.root).map_err(|e| StoreError::Io(format!("read dir: {e}")))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| StoreError::Io(format!("dir entry: {e}")))?
                .path();
            if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// List every record with row count, last timestamp, and size.
    pub fn status(&self) -> Result<Vec<StoreEntry>, StoreError> {
        let mut out = Vec::new();
        for path in self.record_paths()? {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let (symbol, timeframe) = match stem.rsplit_once('_') {
                Some((s, tf)) => (s.to_string(), tf.to_string()),
                None => (stem.clone(), String::new()),
            };
            let size_bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

            let (rows, last_timestamp) = match timeframe.parse::<Timeframe>() {
                Ok(tf) => match read_series(&path, SeriesKey::new(symbol.clone(), tf)) {
                    Ok(series) => (Some(series.len()), series.last_timestamp()),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "unreadable store record");
                        (None, None)
                    }
                },
                Err(_) => (read_parquet(&path).ok().map(|df| df.height()), None),
            };

            out.push(StoreEntry {
                symbol,
                timeframe,
                rows,
                last_timestamp,
                size_bytes,
                path,
            });
        }
        Ok(out)
    }

    /// Delete one record. Returns false if it did not exist.
    pub fn remove(&self, key: &SeriesKey) -> Result<bool, StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .map_err(|e| StoreError::Io(format!("remove {}: {e}", path.display())))?;
        info!(%key, "store record removed");
        Ok(true)
    }

    /// Delete every record. Returns the number removed.
    pub fn clear(&self) -> Result<usize, StoreError> {
        let paths = self.record_paths()?;
        for path in &paths {
            fs::remove_file(path)
                .map_err(|e| StoreError::Io(format!("remove {}: {e}", path.display())))?;
        }
        info!(removed = paths.len(), "store cleared");
        Ok(paths.len())
    }

    /// Convert every record to `{out_dir}/{stem}.csv` in parallel.
    pub fn export_all_csv(&self, out_dir: &Path) -> Result<Vec<ExportOutcome>, StoreError> {
        let paths = self.record_paths()?;
        fs::create_dir_all(out_dir)
            .map_err(|e| StoreError::Io(format!("create {}: {e}", out_dir.display())))?;

        let outcomes: Vec<ExportOutcome> = paths
            .par_iter()
            .map(|path| {
                let result = export_record_csv(path, out_dir);
                ExportOutcome {
                    source: path.clone(),
                    result,
                }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(exported = outcomes.len() - failed, failed, "bulk export finished");
        Ok(outcomes)
    }
}

fn export_record_csv(path: &Path, out_dir: &Path) -> Result<PathBuf, ExportError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ExportError::Io(format!("bad file name {}", path.display())))?;
    let (symbol, tf) = stem
        .rsplit_once('_')
        .ok_or_else(|| ExportError::Io(format!("not a store record: {stem}")))?;
    let timeframe = tf
        .parse::<Timeframe>()
        .map_err(|e| ExportError::Io(e.to_string()))?;

    let series = read_series(path, SeriesKey::new(symbol, timeframe))?;
    let target = out_dir.join(format!("{stem}.csv"));
    write_series_csv(&series, &target)?;
    Ok(target)
}
