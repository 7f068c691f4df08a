//! Request validation run before any provider is contacted.

use super::error::{code_examples, FetchError};
use crate::domain::AssetClass;
use chrono::{Duration, NaiveDateTime};

/// Longest range a single request may span.
pub const MAX_RANGE_DAYS: i64 = 730;

/// Check that a user-entered code has the shape its asset class expects.
pub fn validate_code(code: &str, asset: AssetClass) -> Result<(), FetchError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(FetchError::InvalidConfiguration("code must not be empty".into()));
    }

    let ok = match asset {
        AssetClass::MalaysiaStock => code.chars().all(|c| c.is_ascii_digit() || c == '.')
            && code.chars().any(|c| c.is_ascii_digit()),
        AssetClass::UsStock => code.chars().all(|c| c.is_ascii_alphabetic() || c == '.')
            && code.chars().any(|c| c.is_ascii_alphabetic()),
        AssetClass::GlobalFutures => code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '=' | '-' | '.')),
        AssetClass::BursaFutures => code.chars().all(|c| !c.is_whitespace()),
        AssetClass::Crypto => code.contains('/'),
    };

    if ok {
        Ok(())
    } else {
        Err(FetchError::InvalidConfiguration(format!(
            "'{code}' is not a valid {} code. {}",
            asset.label(),
            code_examples(asset)
        )))
    }
}

/// Check a requested range: ordered, not starting in the future, and at
/// most `MAX_RANGE_DAYS` long.
pub fn validate_date_range(
    start: NaiveDateTime,
    end: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<(), FetchError> {
    if start >= end {
        return Err(FetchError::InvalidConfiguration(format!(
            "start {start} must be before end {end}"
        )));
    }
    if start > now {
        return Err(FetchError::InvalidConfiguration(format!(
            "start {start} is in the future"
        )));
    }
    if end - start > Duration::days(MAX_RANGE_DAYS) {
        return Err(FetchError::InvalidConfiguration(format!(
            "range exceeds {MAX_RANGE_DAYS} days"
        )));
    }
    Ok(())
}
