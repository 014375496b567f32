use log::debug;
use pricefeed_tx::{AccountId, PriceFeedTx};

use super::{Execute, PriceFeedUndo, TxContext, TxUndo};
use crate::{
    error::{ExecutionError, UndoError, ValidationError},
    storage::StateCaches,
};

impl Execute for PriceFeedTx {
    fn check(&self, ctx: &TxContext, caches: &StateCaches) -> Result<(), ValidationError> {
        let count = self.price_points.len();
        if count == 0 || count > ctx.params.max_price_points {
            return Err(ValidationError::InvalidPointCount(
                count,
                ctx.params.max_price_points,
            ));
        }
        if let Some(key) = self.duplicate_key() {
            return Err(ValidationError::DuplicateObservation(key));
        }
        if self.version != ctx.params.tx_version {
            return Err(ValidationError::UnsupportedVersion {
                version: self.version,
                expected: ctx.params.tx_version,
            });
        }
        if self.valid_height < ctx.height {
            return Err(ValidationError::Expired {
                valid_height: self.valid_height,
                height: ctx.height,
            });
        }

        if !ctx.feeders.is_authorized_feeder(&self.tx_uid, ctx.height) {
            return Err(ValidationError::UnauthorizedFeeder {
                uid: self.tx_uid,
                height: ctx.height,
            });
        }

        let balance = caches.accounts.get_balance(&self.tx_uid);
        if balance < self.fee {
            return Err(ValidationError::InsufficientFunds {
                uid: self.tx_uid,
                balance,
                fee: self.fee,
            });
        }

        let pubkey = caches
            .accounts
            .get_pubkey(&self.tx_uid)
            .filter(|pubkey| AccountId::from_pubkey(pubkey) == self.tx_uid)
            .ok_or(ValidationError::BadSignature(self.tx_uid))?;
        if !ctx
            .verifier
            .verify(&pubkey, &self.signature_hash(false), &self.signature)
        {
            return Err(ValidationError::BadSignature(self.tx_uid));
        }

        Ok(())
    }

    fn execute(
        &self,
        ctx: &TxContext,
        index: usize,
        caches: &mut StateCaches,
    ) -> Result<TxUndo, ExecutionError> {
        if caches.observations.contains(ctx.height, &self.tx_uid) {
            return Err(ExecutionError::DuplicateSubmission {
                feeder: self.tx_uid,
                height: ctx.height,
            });
        }

        let prior_balance = caches.accounts.get_balance(&self.tx_uid);
        caches.accounts.debit(&self.tx_uid, self.fee)?;
        let observation_created = caches.observations.insert(
            ctx.height,
            self.tx_uid,
            self.price_points.as_ref().clone(),
        );

        debug!(
            target: "pricefeed",
            "[execute] #{} {} at height {}: {} points, fee {}",
            index,
            self.tx_uid,
            ctx.height,
            self.price_points.len(),
            self.fee
        );

        Ok(TxUndo::PriceFeed(PriceFeedUndo {
            feeder: self.tx_uid,
            height: ctx.height,
            fee: self.fee,
            prior_balance,
            observation_created,
        }))
    }

    fn undo(
        &self,
        _ctx: &TxContext,
        undo: &TxUndo,
        caches: &mut StateCaches,
    ) -> Result<(), UndoError> {
        let undo = match undo {
            TxUndo::PriceFeed(undo) if undo.feeder == self.tx_uid => undo,
            _ => return Err(UndoError::MismatchedRecord),
        };

        if undo.observation_created && !caches.observations.contains(undo.height, &undo.feeder) {
            return Err(UndoError::MissingObservation {
                feeder: undo.feeder,
                height: undo.height,
            });
        }

        // nothing is touched unless the refund lands exactly on the prior balance
        let balance = caches.accounts.get_balance(&undo.feeder);
        if balance.checked_add(undo.fee) != Some(undo.prior_balance) {
            return Err(UndoError::BalanceMismatch {
                uid: undo.feeder,
                expected: undo.prior_balance,
                actual: balance.saturating_add(undo.fee),
            });
        }

        caches.accounts.credit(&undo.feeder, undo.fee)?;
        if undo.observation_created {
            caches.observations.remove(undo.height, &undo.feeder);
        }

        debug!(
            target: "pricefeed",
            "[undo] {} at height {}: refunded {}",
            undo.feeder,
            undo.height,
            undo.fee
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pricefeed_tx::{CoinType, PricePoint, PriceType};

    use super::*;
    use crate::{
        error::ErrorKind,
        feeder::StaticFeederRegistry,
        params::ConsensusParams,
        storage::{AccountCache, AccountStorage, ObservationCache, PriceOracleCache},
        traits::PriceListener,
        verifier::{self, Secp256k1Verifier},
    };

    const KEY: [u8; 32] = [0x21; 32];
    const HEIGHT: u32 = 100;

    struct Fixture {
        params: ConsensusParams,
        feeders: StaticFeederRegistry,
        accounts: AccountCache,
        prices: PriceOracleCache,
        observations: ObservationCache,
        listeners: Vec<Arc<dyn PriceListener>>,
        uid: AccountId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut accounts = AccountCache::new();
            let uid = accounts.insert_account(verifier::public_key(&KEY).unwrap(), 1_000);
            let mut feeders = StaticFeederRegistry::new();
            feeders.authorize(uid, 0);
            Self {
                params: ConsensusParams::default(),
                feeders,
                accounts,
                prices: PriceOracleCache::new(),
                observations: ObservationCache::new(),
                listeners: Vec::new(),
                uid,
            }
        }

        fn signed_feed(&self, prices: &[u64]) -> PriceFeedTx {
            let price_types = [PriceType::Usd, PriceType::Eur, PriceType::Btc, PriceType::Eth];
            let points = prices
                .iter()
                .zip(price_types)
                .map(|(price, price_type)| PricePoint::new(CoinType::Native, price_type, *price))
                .collect();
            let mut tx = PriceFeedTx::new(self.uid, HEIGHT, 10, points);
            tx.signature = verifier::sign(&KEY, &tx.signature_hash(false)).unwrap();
            tx
        }

        fn run<T>(&mut self, f: impl FnOnce(&TxContext, &mut StateCaches) -> T) -> T {
            let ctx = TxContext {
                height: HEIGHT,
                params: &self.params,
                feeders: &self.feeders,
                verifier: &Secp256k1Verifier,
                listeners: &self.listeners,
            };
            let mut caches =
                StateCaches::new(&mut self.accounts, &mut self.prices, &mut self.observations);
            f(&ctx, &mut caches)
        }
    }

    #[test]
    fn test_execute_then_undo_restores_state() {
        let mut fixture = Fixture::new();
        let tx = fixture.signed_feed(&[100, 200]);
        let uid = fixture.uid;

        let undo = fixture.run(|ctx, caches| {
            tx.check(ctx, caches).unwrap();
            tx.execute(ctx, 0, caches).unwrap()
        });
        assert_eq!(fixture.accounts.get_balance(&uid), 990);
        assert_eq!(fixture.observations.get(HEIGHT, &uid).map(<[_]>::len), Some(2));

        fixture.run(|ctx, caches| tx.undo(ctx, &undo, caches)).unwrap();
        assert_eq!(fixture.accounts.get_balance(&uid), 1_000);
        assert!(fixture.observations.is_empty());

        // re-executing after undo reproduces the same state
        let again = fixture.run(|ctx, caches| tx.execute(ctx, 0, caches)).unwrap();
        assert_eq!(again, undo);
    }

    #[test]
    fn test_point_count_is_structural() {
        let mut fixture = Fixture::new();
        let batches: [&[u64]; 2] = [&[], &[1, 2, 3, 4]];
        for prices in batches {
            let tx = fixture.signed_feed(prices);
            let err = fixture.run(|ctx, caches| tx.check(ctx, caches)).unwrap_err();
            assert_eq!(err, ValidationError::InvalidPointCount(0, 3));
            assert_eq!(err.kind(), ErrorKind::Structural);
        }
    }

    #[test]
    fn test_duplicate_observation() {
        let mut fixture = Fixture::new();
        let point = PricePoint::new(CoinType::Native, PriceType::Usd, 1);
        let mut tx = PriceFeedTx::new(fixture.uid, HEIGHT, 10, vec![point, point]);
        tx.signature = verifier::sign(&KEY, &tx.signature_hash(false)).unwrap();

        let err = fixture.run(|ctx, caches| tx.check(ctx, caches)).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateObservation(point.key()));
    }

    #[test]
    fn test_unauthorized_and_bad_signature() {
        let mut fixture = Fixture::new();
        let tx = fixture.signed_feed(&[100]);

        let mut tampered = tx.clone();
        tampered.signature[0] ^= 0x01;
        let err = fixture
            .run(|ctx, caches| tampered.check(ctx, caches))
            .unwrap_err();
        assert_eq!(err, ValidationError::BadSignature(fixture.uid));
        assert_eq!(err.kind(), ErrorKind::Authorization);

        fixture.feeders.revoke(&fixture.uid, HEIGHT);
        let err = fixture.run(|ctx, caches| tx.check(ctx, caches)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert!(matches!(err, ValidationError::UnauthorizedFeeder { .. }));
    }

    #[test]
    fn test_insufficient_funds() {
        let mut fixture = Fixture::new();
        fixture.accounts.set_balance(fixture.uid, 9);
        let tx = fixture.signed_feed(&[100]);

        let err = fixture.run(|ctx, caches| tx.check(ctx, caches)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_expired_feed() {
        let mut fixture = Fixture::new();
        let mut tx = PriceFeedTx::with_price_point(
            fixture.uid,
            HEIGHT - 1,
            10,
            PricePoint::new(CoinType::Native, PriceType::Usd, 1),
        );
        tx.signature = verifier::sign(&KEY, &tx.signature_hash(false)).unwrap();

        let err = fixture.run(|ctx, caches| tx.check(ctx, caches)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Expired {
                valid_height: HEIGHT - 1,
                height: HEIGHT
            }
        );
    }

    #[test]
    fn test_second_submission_at_height_is_rejected() {
        let mut fixture = Fixture::new();
        let first = fixture.signed_feed(&[100]);
        let second = fixture.signed_feed(&[101]);

        fixture.run(|ctx, caches| first.execute(ctx, 0, caches)).unwrap();
        let err = fixture
            .run(|ctx, caches| second.execute(ctx, 5, caches))
            .unwrap_err();
        assert_eq!(
            err,
            ExecutionError::DuplicateSubmission {
                feeder: fixture.uid,
                height: HEIGHT
            }
        );
        assert_eq!(err.kind(), ErrorKind::Idempotency);
        // only the first fee was taken
        assert_eq!(fixture.accounts.get_balance(&fixture.uid), 990);
    }

    #[test]
    fn test_undo_without_observation_is_fatal() {
        let mut fixture = Fixture::new();
        let tx = fixture.signed_feed(&[100]);
        let undo = fixture.run(|ctx, caches| tx.execute(ctx, 0, caches)).unwrap();
        fixture.observations.remove(HEIGHT, &fixture.uid);

        let err = fixture
            .run(|ctx, caches| tx.undo(ctx, &undo, caches))
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, UndoError::MissingObservation { .. }));
    }

    #[test]
    fn test_failed_undo_leaves_state_untouched() {
        let mut fixture = Fixture::new();
        let tx = fixture.signed_feed(&[100]);
        let undo = fixture.run(|ctx, caches| tx.execute(ctx, 0, caches)).unwrap();
        assert_eq!(fixture.accounts.get_balance(&fixture.uid), 990);

        // balance moved outside this transaction's undo pairing
        fixture.accounts.set_balance(fixture.uid, 500);
        let err = fixture
            .run(|ctx, caches| tx.undo(ctx, &undo, caches))
            .unwrap_err();
        assert_eq!(
            err,
            UndoError::BalanceMismatch {
                uid: fixture.uid,
                expected: 1_000,
                actual: 510,
            }
        );
        assert_eq!(fixture.accounts.get_balance(&fixture.uid), 500);
        assert!(fixture.observations.contains(HEIGHT, &fixture.uid));
    }
}
