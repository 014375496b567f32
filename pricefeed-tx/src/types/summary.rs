use serde::Serialize;

use super::{price::PricePoint, PriceTx, TxType};

/// Price point as shown to RPC and tooling consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePointSummary {
    pub coin_type: String,
    pub price_type: String,
    pub price: u64,
}

impl From<&PricePoint> for PricePointSummary {
    fn from(point: &PricePoint) -> Self {
        Self {
            coin_type: point.coin_type.to_string(),
            price_type: point.price_type.to_string(),
            price: point.price,
        }
    }
}

/// JSON view of a price transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTxSummary {
    #[serde(rename = "type")]
    pub tx_type: TxType,
    pub version: u32,
    pub uid: String,
    pub valid_height: u32,
    pub fee: u64,
    pub priority: f64,
    pub sig_hash: String,
    pub involved_key_ids: Vec<String>,
    pub prices: Vec<PricePointSummary>,
}

impl From<&PriceTx> for PriceTxSummary {
    fn from(tx: &PriceTx) -> Self {
        let (version, prices) = match tx {
            PriceTx::PriceFeed(feed) => (
                feed.version,
                feed.price_points.iter().map(PricePointSummary::from).collect(),
            ),
            PriceTx::BlockPriceMedian(median) => (
                median.version,
                median.price_points().iter().map(PricePointSummary::from).collect(),
            ),
        };
        Self {
            tx_type: tx.tx_type(),
            version,
            uid: tx.tx_uid().to_string(),
            valid_height: tx.valid_height(),
            fee: tx.fee(),
            priority: tx.priority(),
            sig_hash: tx.signature_hash(false).to_string(),
            involved_key_ids: tx.involved_key_ids().iter().map(ToString::to_string).collect(),
            prices,
        }
    }
}
