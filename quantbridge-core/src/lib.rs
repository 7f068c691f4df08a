//! Quantbridge Core: OHLCV retrieval, normalization, storage, and alignment.
//!
//! This crate contains the whole data pipeline:
//! - Domain types (bars, series, asset classes, timeframes)
//! - Provider boundary and HTTP clients (equity history, crypto venues)
//! - Normalization: schema mapping, timezone standardization, session filter
//! - Source router with a classified error taxonomy
//! - Master store with incremental, deduplicating updates
//! - Gap analysis, resampling, two-series alignment, export
//! - Background worker and TOML configuration

pub mod config;
pub mod data;
pub mod domain;
pub mod worker;
