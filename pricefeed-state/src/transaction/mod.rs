mod feed;
mod median;

use std::sync::Arc;

use pricefeed_tx::{AccountId, PriceKey, PriceTx};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ExecutionError, StatusError, UndoError, ValidationError},
    params::ConsensusParams,
    storage::StateCaches,
    traits::{FeederEligibility, PriceListener, SignatureVerifier},
};

/// Read-only collaborators and the height a transaction is applied at.
#[derive(Clone, Copy)]
pub struct TxContext<'a> {
    pub height: u32,
    pub params: &'a ConsensusParams,
    pub feeders: &'a dyn FeederEligibility,
    pub verifier: &'a dyn SignatureVerifier,
    pub listeners: &'a [Arc<dyn PriceListener>],
}

impl<'a> TxContext<'a> {
    pub fn at(&self, height: u32) -> TxContext<'a> {
        TxContext { height, ..*self }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFeedUndo {
    pub feeder: AccountId,
    pub height: u32,
    pub fee: u64,
    pub prior_balance: u64,
    pub observation_created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPriceMedianUndo {
    pub height: u32,
    /// Value of every touched key before execution, `None` if it was absent.
    pub previous: Vec<(PriceKey, Option<u64>)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxUndo {
    PriceFeed(PriceFeedUndo),
    BlockPriceMedian(BlockPriceMedianUndo),
}

/// Check, apply and revert contract shared by both transaction kinds.
pub trait Execute {
    /// Validates against the current state. Never mutates.
    fn check(&self, ctx: &TxContext, caches: &StateCaches) -> Result<(), ValidationError>;

    /// Applies the transaction. On error no state has been touched.
    fn execute(
        &self,
        ctx: &TxContext,
        index: usize,
        caches: &mut StateCaches,
    ) -> Result<TxUndo, ExecutionError>;

    /// Exact inverse of a successful [`Execute::execute`].
    fn undo(
        &self,
        ctx: &TxContext,
        undo: &TxUndo,
        caches: &mut StateCaches,
    ) -> Result<(), UndoError>;
}

impl Execute for PriceTx {
    fn check(&self, ctx: &TxContext, caches: &StateCaches) -> Result<(), ValidationError> {
        match self {
            PriceTx::PriceFeed(tx) => tx.check(ctx, caches),
            PriceTx::BlockPriceMedian(tx) => tx.check(ctx, caches),
        }
    }

    fn execute(
        &self,
        ctx: &TxContext,
        index: usize,
        caches: &mut StateCaches,
    ) -> Result<TxUndo, ExecutionError> {
        match self {
            PriceTx::PriceFeed(tx) => tx.execute(ctx, index, caches),
            PriceTx::BlockPriceMedian(tx) => tx.execute(ctx, index, caches),
        }
    }

    fn undo(
        &self,
        ctx: &TxContext,
        undo: &TxUndo,
        caches: &mut StateCaches,
    ) -> Result<(), UndoError> {
        match self {
            PriceTx::PriceFeed(tx) => tx.undo(ctx, undo, caches),
            PriceTx::BlockPriceMedian(tx) => tx.undo(ctx, undo, caches),
        }
    }
}

/// `Pending -> Checked -> Executed -> Undone`. An undone transaction is inert
/// and may be checked again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Checked,
    Executed,
    Undone,
}

impl TxStatus {
    pub fn transition(self, to: TxStatus) -> Result<TxStatus, StatusError> {
        match (self, to) {
            (TxStatus::Pending | TxStatus::Undone, TxStatus::Checked)
            | (TxStatus::Checked, TxStatus::Executed)
            | (TxStatus::Executed, TxStatus::Undone) => Ok(to),
            (from, to) => Err(StatusError { from, to }),
        }
    }
}

/// A transaction together with its lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedTx {
    tx: PriceTx,
    status: TxStatus,
}

impl TrackedTx {
    pub fn new(tx: PriceTx) -> Self {
        Self {
            tx,
            status: TxStatus::Pending,
        }
    }

    /// Wraps a transaction already applied to the caches, e.g. one read back
    /// from a connected block.
    pub fn executed(tx: PriceTx) -> Self {
        Self {
            tx,
            status: TxStatus::Executed,
        }
    }

    pub fn tx(&self) -> &PriceTx {
        &self.tx
    }

    pub fn status(&self) -> TxStatus {
        self.status
    }

    pub fn into_inner(self) -> PriceTx {
        self.tx
    }

    pub fn check(&mut self, ctx: &TxContext, caches: &StateCaches) -> Result<(), ValidationError> {
        let next = self.status.transition(TxStatus::Checked)?;
        self.tx.check(ctx, caches)?;
        self.status = next;
        Ok(())
    }

    pub fn execute(
        &mut self,
        ctx: &TxContext,
        index: usize,
        caches: &mut StateCaches,
    ) -> Result<TxUndo, ExecutionError> {
        let next = self.status.transition(TxStatus::Executed)?;
        let undo = self.tx.execute(ctx, index, caches)?;
        self.status = next;
        Ok(undo)
    }

    pub fn undo(
        &mut self,
        ctx: &TxContext,
        undo: &TxUndo,
        caches: &mut StateCaches,
    ) -> Result<(), UndoError> {
        let next = self.status.transition(TxStatus::Undone)?;
        self.tx.undo(ctx, undo, caches)?;
        self.status = next;
        Ok(())
    }
}
