//! Data acquisition, normalization, merging and storage

pub mod circuit_breaker;
pub mod fetch;
pub mod merge;
pub mod normalize;
pub mod pacing;
pub mod provider;
pub mod retry;
pub mod store;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use fetch::{FetchClient, FetchConfig, FetchedSeries};
pub use merge::{merge, MergeStats, Merged};
pub use normalize::{normalize, NormalizeReport};
pub use pacing::{RecordingSleeper, Sleeper, ThreadSleeper};
pub use provider::{
    CorporateEvent, ErrorKind, EventKind, FetchError, ProviderSeries, QuoteProvider, RawBar,
};
pub use retry::RetryPolicy;
pub use store::{CacheMeta, DatasetFormat, DatasetStore, FileStore, StorageError};
pub use yahoo::YahooProvider;
