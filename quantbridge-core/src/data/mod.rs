//! Market data: providers, normalization pipeline, master store, alignment.

pub mod align;
pub mod classify;
pub mod crypto;
pub mod error;
pub mod export;
pub mod gaps;
pub mod parquet;
pub mod provider;
pub mod resample;
pub mod router;
pub mod schema;
pub mod session;
pub mod store;
pub mod timezone;
pub mod validate;
pub mod yahoo;

pub use align::{
    AlignError, AlignOptions, AlignOutcome, AlignStats, AlignedDataset, AlignmentEngine,
    FillTarget,
};
pub use crypto::CryptoClient;
pub use error::{Disposition, FetchError, StoreError};
pub use export::{ExportError, ExportFormat};
pub use gaps::{GapAnalyzer, GapReport};
pub use provider::{DataProvider, RawQuery, RawTable, RawValue, SourceError};
pub use resample::{resample, Frequency};
pub use router::{FetchRequest, SeriesSource, SourceRouter};
pub use session::SessionWindow;
pub use store::{MasterStore, StoreEntry, UpdateRequest};
pub use timezone::TimezoneStandardizer;
pub use yahoo::YahooClient;
