//! Domain types for quantbridge

pub mod asset;
pub mod bar;
pub mod timeframe;

pub use asset::{AssetClass, ParseAssetClassError};
pub use bar::{
    format_timestamp, parse_timestamp, sanitize_symbol, Bar, Series, SeriesKey, TIMESTAMP_FORMAT,
};
pub use timeframe::{ParseTimeframeError, Timeframe};
