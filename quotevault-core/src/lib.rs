//! quotevault core: price rows, provider access, indicators, merge and storage.
//!
//! This crate holds everything a single symbol goes through:
//! - Domain types (price rows, the closed indicator column schema, fetch windows)
//! - Quote provider trait, Yahoo provider and circuit breaker
//! - Retrying, paced fetch client
//! - Indicator catalog and the augmentation stage
//! - Incremental merge engine
//! - Dataset storage (CSV or Parquet) with atomic replace

pub mod data;
pub mod domain;
pub mod indicators;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared with the scheduler are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::PriceRow>();
        require_sync::<domain::PriceRow>();
        require_send::<domain::SymbolDataset>();
        require_sync::<domain::SymbolDataset>();
        require_send::<domain::WindowPolicy>();
        require_sync::<domain::WindowPolicy>();

        require_send::<data::FetchError>();
        require_sync::<data::FetchError>();
        require_send::<data::StorageError>();
        require_sync::<data::StorageError>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();
        require_send::<data::FileStore>();
        require_sync::<data::FileStore>();
        require_send::<data::RecordingSleeper>();
        require_sync::<data::RecordingSleeper>();

        require_send::<indicators::Augmenter>();
        require_sync::<indicators::Augmenter>();
    }

    /// Providers, stores and indicators are used as trait objects.
    #[test]
    fn boundary_traits_are_object_safe() {
        fn _provider(_: &dyn data::QuoteProvider) {}
        fn _store(_: &dyn data::DatasetStore) {}
        fn _sleeper(_: &dyn data::Sleeper) {}
        fn _indicator(_: &dyn indicators::Indicator) {}
    }
}
