//! Keyword classification of provider failures.
//!
//! Providers surface failures as free text plus a type name. The category is
//! decided by substring matching against the tables below, case-insensitive,
//! in the order network, granularity, no-data.

/// Failure category before remediation hints are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    NoData,
    Granularity,
    Unknown,
}

/// Matched against the message and the type name.
pub const NETWORK_KEYWORDS: &[&str] = &[
    "connection",
    "timeout",
    "network",
    "unreachable",
    "failed to establish",
    "timed out",
    "refused",
    "no internet",
    "dns",
    "resolve",
    "gaierror",
    "proxy",
    "connecterror",
    "connecttimeout",
    "urlerror",
    "requestexception",
];

/// Matched against the message only.
pub const GRANULARITY_KEYWORDS: &[&str] = &[
    "data not available",
    "minute",
    "granularity",
    "requested range must be within",
    "interval not supported",
];

/// Matched against the message only.
pub const NO_DATA_KEYWORDS: &[&str] = &[
    "no data",
    "not found",
    "delisted",
    "no price data",
    "empty result",
];

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

/// Classify a raw provider failure.
pub fn classify(message: &str, type_name: &str) -> ErrorCategory {
    let message = message.to_lowercase();
    let type_name = type_name.to_lowercase();

    if contains_any(&message, NETWORK_KEYWORDS) || contains_any(&type_name, NETWORK_KEYWORDS) {
        return ErrorCategory::Network;
    }
    // A provider that dereferences a missing response body reports a type
    // error mentioning NoneType; that only happens when the request failed.
    if type_name == "typeerror" && message.contains("nonetype") {
        return ErrorCategory::Network;
    }
    if contains_any(&message, GRANULARITY_KEYWORDS) {
        return ErrorCategory::Granularity;
    }
    if contains_any(&message, NO_DATA_KEYWORDS) {
        return ErrorCategory::NoData;
    }
    ErrorCategory::Unknown
}
