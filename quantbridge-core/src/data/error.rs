//! Structured error types for the fetch, store, and normalization paths.
//!
//! These are designed to be displayable in both CLI and worker contexts.
//! Every fetch failure carries a remediation hint, and `disposition()`
//! tells a caller whether to retry, fix the input, or give up.

use crate::domain::AssetClass;
use std::path::PathBuf;
use thiserror::Error;

pub const NETWORK_HINT: &str =
    "Check the internet connection and any VPN or firewall in the way, then retry.";

pub const PROXY_TIP: &str =
    "If the exchange is blocked in your region, set a proxy such as http://127.0.0.1:7890.";

pub const GRANULARITY_HINT: &str =
    "Minute bars are only kept for the most recent 7 to 30 days; \
     shorten the range or pick a coarser timeframe.";

/// Example codes for an asset class, shown when a code yields nothing.
pub fn code_examples(asset: AssetClass) -> &'static str {
    match asset {
        AssetClass::MalaysiaStock => {
            "Bursa codes are numeric, e.g. 1155 (Maybank) or 5347 (Tenaga)."
        }
        AssetClass::UsStock => "US tickers are alphabetic, e.g. AAPL, MSFT, BRK.B.",
        AssetClass::GlobalFutures => "Futures use continuous symbols, e.g. GC=F, ES=F, CL=F.",
        AssetClass::BursaFutures => {
            "Bursa derivatives use continuous contract codes, e.g. FCPO1!, FKLI1!."
        }
        AssetClass::Crypto => "Crypto pairs are BASE/QUOTE, e.g. BTC/USDT, ETH/MYR.",
    }
}

/// What a caller can usefully do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Transient; the same request may succeed later.
    RetryNow,
    /// The request itself is wrong (code, timeframe, venue, range).
    FixInput,
    /// The request is valid but the provider has nothing for it.
    NothingToRetry,
    Unknown,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network failure: {message}. {hint}")]
    NetworkFailure { message: String, hint: String },

    #[error("no data found for '{code}'. {hint}")]
    NoDataFound { code: String, hint: String },

    #[error("timeframe {timeframe} is not available for this range. {hint}")]
    UnsupportedGranularity { timeframe: String, hint: String },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("provider error: {message}")]
    UnknownProviderError { message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FetchError {
    pub fn disposition(&self) -> Disposition {
        match self {
            FetchError::NetworkFailure { .. } => Disposition::RetryNow,
            FetchError::InvalidConfiguration(_) | FetchError::UnsupportedGranularity { .. } => {
                Disposition::FixInput
            }
            FetchError::NoDataFound { .. } => Disposition::NothingToRetry,
            FetchError::UnknownProviderError { .. } | FetchError::Store(_) => Disposition::Unknown,
        }
    }

    /// Remediation hint, if the category carries one.
    pub fn hint(&self) -> Option<&str> {
        match self {
            FetchError::NetworkFailure { hint, .. }
            | FetchError::NoDataFound { hint, .. }
            | FetchError::UnsupportedGranularity { hint, .. } => Some(hint),
            _ => None,
        }
    }

    pub fn no_data(code: &str, asset: AssetClass) -> Self {
        FetchError::NoDataFound {
            code: code.to_string(),
            hint: format!(
                "The code may not exist or the range may be empty. {}",
                code_examples(asset)
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no stored record for {key}")]
    NotFound { key: String },

    #[error("corrupt store record {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("store I/O error: {0}")]
    Io(String),
}
