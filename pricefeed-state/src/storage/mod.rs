pub mod cache;
pub mod traits;

pub use self::{
    cache::{AccountCache, ObservationCache, PriceOracleCache},
    traits::{AccountStorage, PersistentState, PriceOracleStorage},
};

/// Mutable ledger state a block is executed against.
///
/// Holding the caches behind `&mut` keeps execution single-writer; clone the
/// underlying stores to validate speculatively on an independent snapshot.
pub struct StateCaches<'a> {
    pub accounts: &'a mut dyn AccountStorage,
    pub prices: &'a mut dyn PriceOracleStorage,
    pub observations: &'a mut ObservationCache,
}

impl<'a> StateCaches<'a> {
    pub fn new(
        accounts: &'a mut dyn AccountStorage,
        prices: &'a mut dyn PriceOracleStorage,
        observations: &'a mut ObservationCache,
    ) -> Self {
        Self {
            accounts,
            prices,
            observations,
        }
    }
}
