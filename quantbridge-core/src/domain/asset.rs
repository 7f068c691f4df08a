//! Asset classes and their code conventions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown asset class '{0}'")]
pub struct ParseAssetClassError(pub String);

/// The five asset classes the pipeline can route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetClass {
    /// Bursa Malaysia equities, numeric codes such as `1155`.
    MalaysiaStock,
    UsStock,
    /// Futures through the equity provider (`GC=F`, `ES=F`).
    GlobalFutures,
    /// Bursa derivatives through the charting provider (`FCPO1!`).
    BursaFutures,
    Crypto,
}

impl AssetClass {
    pub const ALL: [AssetClass; 5] = [
        AssetClass::MalaysiaStock,
        AssetClass::UsStock,
        AssetClass::GlobalFutures,
        AssetClass::BursaFutures,
        AssetClass::Crypto,
    ];

    /// Machine name, also accepted by `FromStr`.
    pub fn name(self) -> &'static str {
        match self {
            AssetClass::MalaysiaStock => "malaysia-stock",
            AssetClass::UsStock => "us-stock",
            AssetClass::GlobalFutures => "global-futures",
            AssetClass::BursaFutures => "bursa-futures",
            AssetClass::Crypto => "crypto",
        }
    }

    /// Human label as shown on the input surface.
    pub fn label(self) -> &'static str {
        match self {
            AssetClass::MalaysiaStock => "Malaysia Stock",
            AssetClass::UsStock => "US Stock",
            AssetClass::GlobalFutures => "Futures - Global",
            AssetClass::BursaFutures => "Bursa Futures (TV)",
            AssetClass::Crypto => "Crypto",
        }
    }

    /// Markets with a midday closure subject to the session filter.
    pub fn has_midday_break(self) -> bool {
        matches!(self, AssetClass::MalaysiaStock | AssetClass::GlobalFutures)
    }

    /// Translate a user-entered code into the provider's symbol.
    ///
    /// Numeric Bursa codes get the `.KL` exchange suffix; everything else is
    /// passed through trimmed.
    pub fn preprocess_code(self, code: &str) -> String {
        let code = code.trim();
        match self {
            AssetClass::MalaysiaStock
                if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) =>
            {
                format!("{code}.KL")
            }
            _ => code.to_string(),
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AssetClass {
    type Err = ParseAssetClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        AssetClass::ALL
            .into_iter()
            .find(|a| {
                a.name().eq_ignore_ascii_case(needle) || a.label().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| ParseAssetClassError(needle.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malaysia_numeric_codes_get_suffix() {
        assert_eq!(AssetClass::MalaysiaStock.preprocess_code(" 1155 "), "1155.KL");
        assert_eq!(AssetClass::MalaysiaStock.preprocess_code("1155.KL"), "1155.KL");
        assert_eq!(AssetClass::UsStock.preprocess_code("1155"), "1155");
    }

    #[test]
    fn parses_machine_names_and_labels() {
        assert_eq!("crypto".parse::<AssetClass>().unwrap(), AssetClass::Crypto);
        assert_eq!(
            "Futures - Global".parse::<AssetClass>().unwrap(),
            AssetClass::GlobalFutures
        );
        assert!("bonds".parse::<AssetClass>().is_err());
    }

    #[test]
    fn midday_break_classes() {
        assert!(AssetClass::MalaysiaStock.has_midday_break());
        assert!(AssetClass::GlobalFutures.has_midday_break());
        assert!(!AssetClass::Crypto.has_midday_break());
        assert!(!AssetClass::UsStock.has_midday_break());
    }
}
