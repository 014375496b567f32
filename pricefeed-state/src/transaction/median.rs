use std::collections::BTreeMap;

use log::debug;
use pricefeed_tx::{BlockPriceMedianTx, PriceKey};

use super::{BlockPriceMedianUndo, Execute, TxContext, TxUndo};
use crate::{
    error::{ExecutionError, UndoError, ValidationError},
    median::aggregate,
    storage::StateCaches,
};

/// First difference between the recomputed and the submitted mapping.
fn describe_mismatch(
    expected: &BTreeMap<PriceKey, u64>,
    actual: &BTreeMap<PriceKey, u64>,
) -> String {
    for (key, price) in expected {
        match actual.get(key) {
            None => return format!("missing {key}"),
            Some(submitted) if submitted != price => {
                return format!("{key} is {submitted}, expected {price}")
            }
            Some(_) => {}
        }
    }
    match actual.keys().find(|key| !expected.contains_key(*key)) {
        Some(key) => format!("unobserved {key}"),
        None => String::from("mapping differs"),
    }
}

impl Execute for BlockPriceMedianTx {
    fn check(&self, ctx: &TxContext, caches: &StateCaches) -> Result<(), ValidationError> {
        if self.version != ctx.params.tx_version {
            return Err(ValidationError::UnsupportedVersion {
                version: self.version,
                expected: ctx.params.tx_version,
            });
        }
        if self.valid_height != ctx.height {
            return Err(ValidationError::MedianMismatch {
                height: ctx.height,
                reason: format!("valid height {}", self.valid_height),
            });
        }

        let expected = aggregate(caches.observations.points_at(ctx.height));
        if expected != self.median_prices {
            return Err(ValidationError::MedianMismatch {
                height: ctx.height,
                reason: describe_mismatch(&expected, &self.median_prices),
            });
        }
        Ok(())
    }

    fn execute(
        &self,
        ctx: &TxContext,
        index: usize,
        caches: &mut StateCaches,
    ) -> Result<TxUndo, ExecutionError> {
        let previous = self
            .median_prices
            .iter()
            .map(|(key, price)| {
                let previous = caches.prices.get_price(ctx.height, key);
                caches.prices.put_price(ctx.height, *key, *price);
                (*key, previous)
            })
            .collect();

        for listener in ctx.listeners {
            listener.on_prices_committed(ctx.height, &self.median_prices);
        }

        debug!(
            target: "median",
            "[execute] #{} committed {} medians at height {}",
            index,
            self.median_prices.len(),
            ctx.height
        );

        Ok(TxUndo::BlockPriceMedian(BlockPriceMedianUndo {
            height: ctx.height,
            previous,
        }))
    }

    fn undo(
        &self,
        ctx: &TxContext,
        undo: &TxUndo,
        caches: &mut StateCaches,
    ) -> Result<(), UndoError> {
        let undo = match undo {
            TxUndo::BlockPriceMedian(undo) if undo.height == self.valid_height => undo,
            _ => return Err(UndoError::MismatchedRecord),
        };

        for (key, previous) in undo.previous.iter().rev() {
            match previous {
                Some(price) => caches.prices.put_price(undo.height, *key, *price),
                None => caches.prices.remove_price(undo.height, key),
            }
        }

        for listener in ctx.listeners {
            listener.on_prices_reverted(undo.height);
        }

        debug!(target: "median", "[undo] reverted medians at height {}", undo.height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pricefeed_tx::{AccountId, CoinType, PricePoint, PriceType};

    use super::*;
    use crate::{
        error::ErrorKind,
        feeder::StaticFeederRegistry,
        listener::PriceTicker,
        params::ConsensusParams,
        storage::{AccountCache, ObservationCache, PriceOracleCache, PriceOracleStorage},
        traits::PriceListener,
        verifier::Secp256k1Verifier,
    };

    const HEIGHT: u32 = 7;

    fn usd() -> PriceKey {
        PriceKey::new(CoinType::Native, PriceType::Usd)
    }

    fn observations() -> ObservationCache {
        let mut observations = ObservationCache::new();
        for (feeder, price) in [(1u8, 100u64), (2, 300), (3, 200)] {
            observations.insert(
                HEIGHT,
                AccountId([feeder; 20]),
                vec![PricePoint::new(CoinType::Native, PriceType::Usd, price)],
            );
        }
        observations.insert(
            HEIGHT,
            AccountId([4; 20]),
            vec![PricePoint::new(CoinType::Stable, PriceType::Eur, 5)],
        );
        observations
    }

    fn check(
        tx: &BlockPriceMedianTx,
        observations: &mut ObservationCache,
    ) -> Result<(), ValidationError> {
        let params = ConsensusParams::default();
        let feeders = StaticFeederRegistry::new();
        let ctx = TxContext {
            height: HEIGHT,
            params: &params,
            feeders: &feeders,
            verifier: &Secp256k1Verifier,
            listeners: &[],
        };
        let mut accounts = AccountCache::new();
        let mut prices = PriceOracleCache::new();
        let caches = StateCaches::new(&mut accounts, &mut prices, observations);
        tx.check(&ctx, &caches)
    }

    fn expected_prices() -> BTreeMap<PriceKey, u64> {
        let mut prices = BTreeMap::new();
        prices.insert(usd(), 200);
        prices.insert(PriceKey::new(CoinType::Stable, PriceType::Eur), 5);
        prices
    }

    #[test]
    fn test_matching_median_passes() {
        let tx = BlockPriceMedianTx::new(AccountId([9; 20]), HEIGHT, expected_prices());
        assert!(check(&tx, &mut observations()).is_ok());

        let empty = BlockPriceMedianTx::new(AccountId([9; 20]), HEIGHT, BTreeMap::new());
        assert!(check(&empty, &mut ObservationCache::new()).is_ok());
    }

    #[test]
    fn test_altered_omitted_or_extra_keys_mismatch() {
        let mut altered = expected_prices();
        altered.insert(usd(), 201);
        let mut omitted = expected_prices();
        omitted.remove(&usd());
        let mut extra = expected_prices();
        extra.insert(PriceKey::new(CoinType::Governance, PriceType::Btc), 1);

        for prices in [altered, omitted, extra] {
            let tx = BlockPriceMedianTx::new(AccountId([9; 20]), HEIGHT, prices);
            let err = check(&tx, &mut observations()).unwrap_err();
            assert!(matches!(err, ValidationError::MedianMismatch { .. }));
            assert_eq!(err.kind(), ErrorKind::Consensus);
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn test_wrong_height_mismatch() {
        let tx = BlockPriceMedianTx::new(AccountId([9; 20]), HEIGHT + 1, expected_prices());
        let err = check(&tx, &mut observations()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Consensus);
    }

    #[test]
    fn test_execute_and_undo_notify_listeners() {
        let params = ConsensusParams::default();
        let feeders = StaticFeederRegistry::new();
        let ticker = Arc::new(PriceTicker::new());
        let listeners: Vec<Arc<dyn PriceListener>> =
            vec![ticker.clone() as Arc<dyn PriceListener>];
        let ctx = TxContext {
            height: HEIGHT,
            params: &params,
            feeders: &feeders,
            verifier: &Secp256k1Verifier,
            listeners: &listeners,
        };

        let mut accounts = AccountCache::new();
        let mut prices = PriceOracleCache::new();
        // a stale value at this height must come back after undo
        prices.put_price(HEIGHT, usd(), 1);
        let before = prices.clone();
        let mut observations = observations();

        let tx = BlockPriceMedianTx::new(AccountId([9; 20]), HEIGHT, expected_prices());
        let mut caches = StateCaches::new(&mut accounts, &mut prices, &mut observations);
        let undo = tx.execute(&ctx, 4, &mut caches).unwrap();
        assert_eq!(caches.prices.get_price(HEIGHT, &usd()), Some(200));
        assert_eq!(ticker.latest(&usd()), Some(200));

        tx.undo(&ctx, &undo, &mut caches).unwrap();
        assert_eq!(prices, before);
        assert_eq!(ticker.latest(&usd()), None);
    }
}
