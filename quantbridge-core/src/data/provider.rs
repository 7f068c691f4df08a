//! Upstream provider boundary: raw tables, queries, and the provider trait.
//!
//! Providers are black boxes that turn a `RawQuery` into a `RawTable` with
//! whatever column names and cell types the upstream API uses. Everything
//! after that (schema mapping, timezone, session filtering) happens in the
//! normalization pipeline, so providers never see the canonical schema.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One cell of a raw provider table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Text(String),
    Number(f64),
    /// Integers; in a timestamp column these are Unix epoch seconds or
    /// milliseconds.
    Int(i64),
    Null,
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Int(v)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(RawValue::Null)
    }
}

/// A named column of raw cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub values: Vec<RawValue>,
}

/// Column-oriented result of one provider call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<RawColumn>,
}

impl RawTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column append.
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<RawValue>) -> Self {
        self.push_column(name, values);
        self
    }

    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<RawValue>) {
        self.columns.push(RawColumn {
            name: name.into(),
            values,
        });
    }

    /// Row count, taken from the longest column.
    pub fn row_count(&self) -> usize {
        self.columns.iter().map(|c| c.values.len()).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Parameters handed to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuery {
    /// Provider-side symbol, already preprocessed.
    pub code: String,
    /// Provider-native interval string from the router's interval table.
    pub interval: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub venue: Option<String>,
    pub proxy: Option<String>,
    /// Number of most recent bars to request, for count-based providers.
    pub bar_count: Option<usize>,
}

/// A provider failure before classification.
///
/// `type_name` is the provider's own notion of the error kind (transport
/// error class, HTTP status class, API error code) and feeds the keyword
/// classifier together with `message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    pub message: String,
    pub type_name: String,
}

impl SourceError {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            type_name: type_name.into(),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

impl std::error::Error for SourceError {}

/// Trait for upstream data providers.
///
/// Implementations handle the specifics of one upstream API. They do not
/// know about normalization or the master store.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch raw OHLCV rows for the query.
    fn fetch(&self, query: &RawQuery) -> Result<RawTable, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_count_uses_longest_column() {
        let t = RawTable::new()
            .with_column("Date", vec!["2024-01-01".into(), "2024-01-02".into()])
            .with_column("Close", vec![RawValue::Number(1.0)]);
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.column_names(), vec!["Date", "Close"]);
    }

    #[test]
    fn option_converts_to_null() {
        let v: RawValue = Option::<f64>::None.into();
        assert_eq!(v, RawValue::Null);
        let v: RawValue = Some(2.5).into();
        assert_eq!(v, RawValue::Number(2.5));
    }
}
