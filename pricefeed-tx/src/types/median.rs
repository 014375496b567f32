use std::{collections::BTreeMap, fmt, io};

use bitcoin::consensus::{
    encode::{self, serialize},
    Decodable, Encodable,
};

use super::{
    account::AccountId,
    common::{CompactVec, VarInt},
    hash::{SigHash, SigHashCache},
    price::{CoinType, PriceKey, PricePoint, PriceType},
    TxType, CURRENT_TX_VERSION,
};

/// The median closes the block after every other transaction.
pub const BLOCK_PRICE_MEDIAN_PRIORITY: f64 = 0.0;

/// Block-level median of every price observed in the block, synthesized by the
/// block producer.
#[derive(Debug, Clone)]
pub struct BlockPriceMedianTx {
    pub version: u32,
    pub valid_height: u32,
    pub tx_uid: AccountId,
    pub median_prices: BTreeMap<PriceKey, u64>,
    sig_hash: SigHashCache,
}

impl PartialEq for BlockPriceMedianTx {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.valid_height == other.valid_height
            && self.tx_uid == other.tx_uid
            && self.median_prices == other.median_prices
    }
}

impl Eq for BlockPriceMedianTx {}

impl BlockPriceMedianTx {
    pub fn new(tx_uid: AccountId, height: u32, median_prices: BTreeMap<PriceKey, u64>) -> Self {
        Self {
            version: CURRENT_TX_VERSION,
            valid_height: height,
            tx_uid,
            median_prices,
            sig_hash: SigHashCache::default(),
        }
    }

    pub fn fee(&self) -> u64 {
        0
    }

    pub fn priority(&self) -> f64 {
        BLOCK_PRICE_MEDIAN_PRIORITY
    }

    pub fn median_price(&self, coin_type: CoinType, price_type: PriceType) -> Option<u64> {
        self.median_prices
            .get(&PriceKey::new(coin_type, price_type))
            .copied()
    }

    /// Median prices as triples in ascending key order. Sorted here rather
    /// than taken from the map so the wire order never depends on the container.
    pub fn price_points(&self) -> Vec<PricePoint> {
        let mut points: Vec<PricePoint> = self
            .median_prices
            .iter()
            .map(|(key, price)| PricePoint::new(key.coin_type, key.price_type, *price))
            .collect();
        points.sort_by_key(PricePoint::key);
        points
    }

    pub fn signature_hash_input(&self) -> Vec<u8> {
        serialize(&MedianPreimage(self))
    }

    pub fn signature_hash(&self, recalculate: bool) -> SigHash {
        self.sig_hash
            .get_or_compute(recalculate, || self.signature_hash_input())
    }
}

impl fmt::Display for BlockPriceMedianTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "txType: BLOCK_PRICE_MEDIAN, hash: {}, ver: {}, uid: {}, valid_height: {}",
            self.signature_hash(false),
            self.version,
            self.tx_uid,
            self.valid_height
        )?;
        for point in self.price_points() {
            write!(f, ", {{{point}}}")?;
        }
        Ok(())
    }
}

impl Encodable for BlockPriceMedianTx {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let mut len = VarInt(u64::from(self.version)).consensus_encode(w)?;
        len += VarInt(u64::from(self.valid_height)).consensus_encode(w)?;
        len += self.tx_uid.consensus_encode(w)?;
        len += CompactVec::from(self.price_points()).consensus_encode(w)?;
        Ok(len)
    }
}

fn decode_u32<R: io::Read + ?Sized>(r: &mut R) -> Result<u32, encode::Error> {
    u32::try_from(VarInt::consensus_decode(r)?.0)
        .map_err(|_| encode::Error::ParseFailed("VarInt out of range for field"))
}

impl Decodable for BlockPriceMedianTx {
    fn consensus_decode<R: io::Read + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
        let version = decode_u32(r)?;
        let valid_height = decode_u32(r)?;
        let tx_uid = AccountId::consensus_decode(r)?;
        let points = CompactVec::<PricePoint>::consensus_decode(r)?.into_inner();

        let mut median_prices = BTreeMap::new();
        let mut previous: Option<PriceKey> = None;
        for point in points {
            let key = point.key();
            if previous.is_some_and(|prev| prev >= key) {
                return Err(encode::Error::ParseFailed(
                    "Median prices not in strictly ascending key order",
                ));
            }
            previous = Some(key);
            median_prices.insert(key, point.price);
        }

        Ok(Self {
            version,
            valid_height,
            tx_uid,
            median_prices,
            sig_hash: SigHashCache::default(),
        })
    }
}

struct MedianPreimage<'a>(&'a BlockPriceMedianTx);

impl Encodable for MedianPreimage<'_> {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let tx = self.0;
        let mut len = VarInt(u64::from(tx.version)).consensus_encode(w)?;
        len += TxType::BlockPriceMedian.consensus_encode(w)?;
        len += VarInt(u64::from(tx.valid_height)).consensus_encode(w)?;
        len += tx.tx_uid.consensus_encode(w)?;
        len += CompactVec::from(tx.price_points()).consensus_encode(w)?;
        Ok(len)
    }
}
