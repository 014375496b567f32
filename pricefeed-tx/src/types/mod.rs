pub mod account;
pub mod common;
pub mod feed;
pub mod hash;
pub mod median;
pub mod price;
pub mod summary;

use std::{collections::BTreeSet, fmt, io};

use bitcoin::consensus::{encode, Decodable, Encodable};
use serde::Serialize;

pub use self::{
    account::AccountId,
    feed::{PriceFeedTx, MAX_PRICE_POINTS, PRICE_FEED_PRIORITY},
    hash::SigHash,
    median::{BlockPriceMedianTx, BLOCK_PRICE_MEDIAN_PRIORITY},
    price::{CoinType, PriceKey, PricePoint, PriceType},
    summary::{PricePointSummary, PriceTxSummary},
};

pub const CURRENT_TX_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum TxType {
    PriceFeed = 22,
    BlockPriceMedian = 23,
}

impl From<TxType> for u8 {
    fn from(tx_type: TxType) -> Self {
        tx_type as u8
    }
}

impl TryFrom<u8> for TxType {
    type Error = encode::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            22 => Ok(TxType::PriceFeed),
            23 => Ok(TxType::BlockPriceMedian),
            _ => Err(encode::Error::ParseFailed("Unknown transaction type")),
        }
    }
}

impl Encodable for TxType {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        u8::from(*self).consensus_encode(w)
    }
}

impl Decodable for TxType {
    fn consensus_decode<R: io::Read + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
        TxType::try_from(u8::consensus_decode(r)?)
    }
}

/// Price-oracle transaction as it travels in a block: type tag, then the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceTx {
    PriceFeed(PriceFeedTx),
    BlockPriceMedian(BlockPriceMedianTx),
}

impl PriceTx {
    pub fn tx_type(&self) -> TxType {
        match self {
            PriceTx::PriceFeed(_) => TxType::PriceFeed,
            PriceTx::BlockPriceMedian(_) => TxType::BlockPriceMedian,
        }
    }

    pub fn valid_height(&self) -> u32 {
        match self {
            PriceTx::PriceFeed(tx) => tx.valid_height,
            PriceTx::BlockPriceMedian(tx) => tx.valid_height,
        }
    }

    pub fn tx_uid(&self) -> AccountId {
        match self {
            PriceTx::PriceFeed(tx) => tx.tx_uid,
            PriceTx::BlockPriceMedian(tx) => tx.tx_uid,
        }
    }

    pub fn fee(&self) -> u64 {
        match self {
            PriceTx::PriceFeed(tx) => tx.fee,
            PriceTx::BlockPriceMedian(tx) => tx.fee(),
        }
    }

    pub fn priority(&self) -> f64 {
        match self {
            PriceTx::PriceFeed(tx) => tx.priority(),
            PriceTx::BlockPriceMedian(tx) => tx.priority(),
        }
    }

    pub fn signature_hash(&self, recalculate: bool) -> SigHash {
        match self {
            PriceTx::PriceFeed(tx) => tx.signature_hash(recalculate),
            PriceTx::BlockPriceMedian(tx) => tx.signature_hash(recalculate),
        }
    }

    pub fn is_median(&self) -> bool {
        matches!(self, PriceTx::BlockPriceMedian(_))
    }

    /// Accounts a wallet or index should associate with this transaction: the
    /// feeder of a feed, the producer of a median.
    pub fn involved_key_ids(&self) -> BTreeSet<AccountId> {
        BTreeSet::from([self.tx_uid()])
    }

    pub fn summary(&self) -> PriceTxSummary {
        PriceTxSummary::from(self)
    }
}

impl fmt::Display for PriceTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceTx::PriceFeed(tx) => fmt::Display::fmt(tx, f),
            PriceTx::BlockPriceMedian(tx) => fmt::Display::fmt(tx, f),
        }
    }
}

impl From<PriceFeedTx> for PriceTx {
    fn from(tx: PriceFeedTx) -> Self {
        PriceTx::PriceFeed(tx)
    }
}

impl From<BlockPriceMedianTx> for PriceTx {
    fn from(tx: BlockPriceMedianTx) -> Self {
        PriceTx::BlockPriceMedian(tx)
    }
}

impl Encodable for PriceTx {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let mut len = self.tx_type().consensus_encode(w)?;
        len += match self {
            PriceTx::PriceFeed(tx) => tx.consensus_encode(w)?,
            PriceTx::BlockPriceMedian(tx) => tx.consensus_encode(w)?,
        };
        Ok(len)
    }
}

impl Decodable for PriceTx {
    fn consensus_decode<R: io::Read + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
        let message = match TxType::consensus_decode(r)? {
            TxType::PriceFeed => PriceTx::PriceFeed(PriceFeedTx::consensus_decode(r)?),
            TxType::BlockPriceMedian => {
                PriceTx::BlockPriceMedian(BlockPriceMedianTx::consensus_decode(r)?)
            }
        };
        Ok(message)
    }
}
