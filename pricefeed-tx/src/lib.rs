extern crate self as pricefeed_tx;

pub mod types;

pub use bitcoin::consensus::{deserialize, serialize};

pub use crate::types::*;

/// Fixed-point scale of every price: 1e8 units per 1.0.
pub const COIN: u64 = 100_000_000;
