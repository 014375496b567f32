use std::{collections::HashSet, fmt, io};

use bitcoin::consensus::{encode::serialize, Encodable};
use log::warn;
use pricefeed_macros::ConsensusEncoding;

use super::{
    account::AccountId,
    common::{CompactVec, VarInt},
    hash::{SigHash, SigHashCache},
    price::{PriceKey, PricePoint},
    TxType, CURRENT_TX_VERSION,
};

/// Most price points a single feed may carry.
pub const MAX_PRICE_POINTS: usize = 3;

/// Feeds are scheduled ahead of every fee-market transaction.
pub const PRICE_FEED_PRIORITY: f64 = 10000.0;

/// A feeder's signed batch of price observations.
#[derive(ConsensusEncoding, Debug, Clone)]
pub struct PriceFeedTx {
    #[varint]
    pub version: u32,
    #[varint]
    pub valid_height: u32,
    pub tx_uid: AccountId,
    #[varint]
    pub fee: u64,
    pub price_points: CompactVec<PricePoint>,
    pub signature: Vec<u8>,
    #[skip]
    sig_hash: SigHashCache,
}

impl PartialEq for PriceFeedTx {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.valid_height == other.valid_height
            && self.tx_uid == other.tx_uid
            && self.fee == other.fee
            && self.price_points == other.price_points
            && self.signature == other.signature
    }
}

impl Eq for PriceFeedTx {}

impl PriceFeedTx {
    /// Builds an unsigned feed. A batch that is empty or longer than
    /// [`MAX_PRICE_POINTS`] is dropped whole, leaving a feed with no points that
    /// fails validation.
    pub fn new(
        tx_uid: AccountId,
        valid_height: u32,
        fee: u64,
        price_points: Vec<PricePoint>,
    ) -> Self {
        let price_points = if price_points.is_empty() || price_points.len() > MAX_PRICE_POINTS {
            warn!(
                target: "pricefeed",
                "[PriceFeedTx::new] dropping batch of {} price points from {}",
                price_points.len(),
                tx_uid
            );
            Vec::new()
        } else {
            price_points
        };

        Self {
            version: CURRENT_TX_VERSION,
            valid_height,
            tx_uid,
            fee,
            price_points: price_points.into(),
            signature: Vec::new(),
            sig_hash: SigHashCache::default(),
        }
    }

    pub fn with_price_point(
        tx_uid: AccountId,
        valid_height: u32,
        fee: u64,
        price_point: PricePoint,
    ) -> Self {
        Self::new(tx_uid, valid_height, fee, vec![price_point])
    }

    pub fn priority(&self) -> f64 {
        PRICE_FEED_PRIORITY
    }

    /// First key that appears more than once in the batch.
    pub fn duplicate_key(&self) -> Option<PriceKey> {
        let mut seen = HashSet::new();
        self.price_points
            .iter()
            .map(PricePoint::key)
            .find(|key| !seen.insert(*key))
    }

    /// Bytes covered by the signature: version, type tag, validity height,
    /// submitter and the points in submission order. Fee and signature are not
    /// part of it.
    pub fn signature_hash_input(&self) -> Vec<u8> {
        serialize(&FeedPreimage(self))
    }

    pub fn signature_hash(&self, recalculate: bool) -> SigHash {
        self.sig_hash
            .get_or_compute(recalculate, || self.signature_hash_input())
    }
}

impl fmt::Display for PriceFeedTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "txType: PRICE_FEED, hash: {}, ver: {}, uid: {}, fee: {}, valid_height: {}",
            self.signature_hash(false),
            self.version,
            self.tx_uid,
            self.fee,
            self.valid_height
        )?;
        for point in &self.price_points {
            write!(f, ", {{{point}}}")?;
        }
        Ok(())
    }
}

struct FeedPreimage<'a>(&'a PriceFeedTx);

impl Encodable for FeedPreimage<'_> {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let tx = self.0;
        let mut len = VarInt(u64::from(tx.version)).consensus_encode(w)?;
        len += TxType::PriceFeed.consensus_encode(w)?;
        len += VarInt(u64::from(tx.valid_height)).consensus_encode(w)?;
        len += tx.tx_uid.consensus_encode(w)?;
        len += tx.price_points.consensus_encode(w)?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::{CoinType, PriceType};

    fn point(price: u64) -> PricePoint {
        PricePoint::new(CoinType::Native, PriceType::Usd, price)
    }

    #[test]
    fn test_batch_size_bounds() {
        let uid = AccountId([7; 20]);
        assert!(PriceFeedTx::new(uid, 10, 1, vec![]).price_points.is_empty());
        assert_eq!(PriceFeedTx::new(uid, 10, 1, vec![point(1); 3]).price_points.len(), 3);
        // oversized batches are dropped, not truncated
        assert!(PriceFeedTx::new(uid, 10, 1, vec![point(1); 4]).price_points.is_empty());
    }

    #[test]
    fn test_duplicate_key() {
        let uid = AccountId([7; 20]);
        let tx = PriceFeedTx::new(
            uid,
            10,
            1,
            vec![
                point(1),
                PricePoint::new(CoinType::Native, PriceType::Eur, 2),
                point(3),
            ],
        );
        assert_eq!(
            tx.duplicate_key(),
            Some(PriceKey::new(CoinType::Native, PriceType::Usd))
        );
    }

    #[test]
    fn test_signature_hash_is_memoized_until_recalculated() {
        let mut tx = PriceFeedTx::with_price_point(AccountId([7; 20]), 10, 1, point(100));
        let first = tx.signature_hash(false);
        assert_eq!(first, tx.signature_hash(false));

        tx.price_points = vec![point(101)].into();
        assert_eq!(first, tx.signature_hash(false));
        let recomputed = tx.signature_hash(true);
        assert_ne!(first, recomputed);
        assert_eq!(recomputed, tx.signature_hash(false));
    }

    #[test]
    fn test_fee_and_signature_are_not_signed() {
        let tx = PriceFeedTx::with_price_point(AccountId([7; 20]), 10, 1, point(100));
        let mut other = tx.clone();
        other.fee = 2;
        other.signature = vec![1, 2, 3];
        assert_eq!(tx.signature_hash(true), other.signature_hash(true));
    }

    #[test]
    fn test_display() {
        let tx = PriceFeedTx::new(
            AccountId([7; 20]),
            10,
            1,
            vec![point(100), PricePoint::new(CoinType::Stable, PriceType::Eur, 2)],
        );
        let shown = tx.to_string();
        assert!(shown.starts_with("txType: PRICE_FEED, hash: "));
        assert!(shown.contains(&format!("uid: {}, fee: 1, valid_height: 10", tx.tx_uid)));
        assert!(shown.ends_with(
            ", {coinType:0, priceType:0, price:100}, {coinType:2, priceType:2, price:2}"
        ));
    }
}
