use std::{cmp::Ordering, fmt, io};

use bitcoin::consensus::{encode, Decodable, Encodable};
use pricefeed_macros::ConsensusEncoding;
use serde::{Deserialize, Serialize};

/// Priced asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CoinType {
    Native = 0,
    Governance = 1,
    Stable = 2,
}

/// Quote metric a price is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PriceType {
    Usd = 0,
    Cny = 1,
    Eur = 2,
    Btc = 3,
    Usdt = 4,
    Eth = 5,
}

impl From<CoinType> for u8 {
    fn from(coin_type: CoinType) -> Self {
        coin_type as u8
    }
}

impl TryFrom<u8> for CoinType {
    type Error = encode::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CoinType::Native),
            1 => Ok(CoinType::Governance),
            2 => Ok(CoinType::Stable),
            _ => Err(encode::Error::ParseFailed("Unknown coin type")),
        }
    }
}

impl From<PriceType> for u8 {
    fn from(price_type: PriceType) -> Self {
        price_type as u8
    }
}

impl TryFrom<u8> for PriceType {
    type Error = encode::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PriceType::Usd),
            1 => Ok(PriceType::Cny),
            2 => Ok(PriceType::Eur),
            3 => Ok(PriceType::Btc),
            4 => Ok(PriceType::Usdt),
            5 => Ok(PriceType::Eth),
            _ => Err(encode::Error::ParseFailed("Unknown price type")),
        }
    }
}

impl Encodable for CoinType {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        u8::from(*self).consensus_encode(w)
    }
}

impl Decodable for CoinType {
    fn consensus_decode<R: io::Read + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
        CoinType::try_from(u8::consensus_decode(r)?)
    }
}

impl Encodable for PriceType {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        u8::from(*self).consensus_encode(w)
    }
}

impl Decodable for PriceType {
    fn consensus_decode<R: io::Read + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
        PriceType::try_from(u8::consensus_decode(r)?)
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinType::Native => write!(f, "NATIVE"),
            CoinType::Governance => write!(f, "GOVERNANCE"),
            CoinType::Stable => write!(f, "STABLE"),
        }
    }
}

impl fmt::Display for PriceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceType::Usd => write!(f, "USD"),
            PriceType::Cny => write!(f, "CNY"),
            PriceType::Eur => write!(f, "EUR"),
            PriceType::Btc => write!(f, "BTC"),
            PriceType::Usdt => write!(f, "USDT"),
            PriceType::Eth => write!(f, "ETH"),
        }
    }
}

/// Aggregation key of a price: asset and quote metric.
///
/// Ordered by the wire bytes, coin type first, which is the canonical order of
/// median prices on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceKey {
    pub coin_type: CoinType,
    pub price_type: PriceType,
}

impl PriceKey {
    pub fn new(coin_type: CoinType, price_type: PriceType) -> Self {
        Self {
            coin_type,
            price_type,
        }
    }

    fn wire_bytes(&self) -> (u8, u8) {
        (u8::from(self.coin_type), u8::from(self.price_type))
    }
}

impl Ord for PriceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.wire_bytes().cmp(&other.wire_bytes())
    }
}

impl PartialOrd for PriceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PriceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.coin_type, self.price_type)
    }
}

/// A single observation: `price` of `coin_type` quoted in `price_type`, scaled by [`crate::COIN`].
#[derive(ConsensusEncoding, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PricePoint {
    pub coin_type: CoinType,
    pub price_type: PriceType,
    #[varint]
    pub price: u64,
}

impl PricePoint {
    pub fn new(coin_type: CoinType, price_type: PriceType, price: u64) -> Self {
        Self {
            coin_type,
            price_type,
            price,
        }
    }

    pub fn key(&self) -> PriceKey {
        PriceKey::new(self.coin_type, self.price_type)
    }
}

impl fmt::Display for PricePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "coinType:{}, priceType:{}, price:{}",
            u8::from(self.coin_type),
            u8::from(self.price_type),
            self.price
        )
    }
}
