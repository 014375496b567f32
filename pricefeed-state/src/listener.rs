use std::collections::BTreeMap;

use log::trace;
use parking_lot::RwLock;
use pricefeed_tx::PriceKey;

use crate::traits::PriceListener;

/// Keeps every committed block median in memory for downstream readers.
#[derive(Debug, Default)]
pub struct PriceTicker {
    committed: RwLock<BTreeMap<u32, BTreeMap<PriceKey, u64>>>,
}

impl PriceTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently committed median for `key`.
    pub fn latest(&self, key: &PriceKey) -> Option<u64> {
        self.committed
            .read()
            .values()
            .rev()
            .find_map(|prices| prices.get(key).copied())
    }
}

impl PriceListener for PriceTicker {
    fn on_prices_committed(&self, height: u32, prices: &BTreeMap<PriceKey, u64>) {
        trace!(target: "median", "[PriceTicker] committed {} prices at {}", prices.len(), height);
        self.committed.write().insert(height, prices.clone());
    }

    fn on_prices_reverted(&self, height: u32) {
        trace!(target: "median", "[PriceTicker] reverted {}", height);
        self.committed.write().remove(&height);
    }
}

#[cfg(test)]
mod tests {
    use pricefeed_tx::{CoinType, PriceType};

    use super::*;

    #[test]
    fn test_latest_survives_revert_of_tip() {
        let usd = PriceKey::new(CoinType::Native, PriceType::Usd);
        let eur = PriceKey::new(CoinType::Native, PriceType::Eur);
        let ticker = PriceTicker::new();

        ticker.on_prices_committed(1, &BTreeMap::from([(usd, 10), (eur, 3)]));
        ticker.on_prices_committed(2, &BTreeMap::from([(usd, 11)]));
        assert_eq!(ticker.latest(&usd), Some(11));
        assert_eq!(ticker.latest(&eur), Some(3));

        ticker.on_prices_reverted(2);
        assert_eq!(ticker.latest(&usd), Some(10));
        ticker.on_prices_reverted(1);
        assert_eq!(ticker.latest(&eur), None);
    }
}
