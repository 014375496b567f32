pub mod block;
pub mod error;
pub mod feeder;
pub mod listener;
pub mod median;
pub mod params;
pub mod storage;
pub mod traits;
pub mod transaction;
pub mod verifier;

pub use crate::{
    block::{connect_block, disconnect_block, BlockTemplate, BlockUndo, ConnectedBlock, PriceBlock},
    error::ErrorKind,
    transaction::{Execute, TrackedTx, TxContext, TxStatus, TxUndo},
};
