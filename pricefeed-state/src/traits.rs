use std::collections::BTreeMap;

use pricefeed_tx::{AccountId, PriceKey, SigHash};

/// Answers whether an account may submit price feeds at a height.
pub trait FeederEligibility {
    fn is_authorized_feeder(&self, uid: &AccountId, height: u32) -> bool;
}

/// Checks a signature over a transaction's signature hash.
pub trait SignatureVerifier {
    fn verify(&self, pubkey: &[u8], message: &SigHash, signature: &[u8]) -> bool;
}

/// Downstream consumer of committed block medians.
pub trait PriceListener: Send + Sync {
    fn on_prices_committed(&self, height: u32, prices: &BTreeMap<PriceKey, u64>);
    fn on_prices_reverted(&self, height: u32);
}
