use log::{debug, trace, warn};
use pricefeed_tx::{AccountId, BlockPriceMedianTx, PriceTx};
use serde::{Deserialize, Serialize};

use crate::{
    error::{BlockError, TxError, UndoError},
    median::aggregate,
    storage::StateCaches,
    transaction::{TrackedTx, TxContext, TxUndo},
};

/// Price-oracle transactions of one block, median last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceBlock {
    pub height: u32,
    pub transactions: Vec<PriceTx>,
}

impl PriceBlock {
    pub fn median(&self) -> Option<&BlockPriceMedianTx> {
        match self.transactions.last() {
            Some(PriceTx::BlockPriceMedian(tx)) => Some(tx),
            _ => None,
        }
    }
}

/// Undo records of a connected block, keyed by transaction index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockUndo {
    pub height: u32,
    pub entries: Vec<(usize, TxUndo)>,
}

struct Applied {
    index: usize,
    tx: TrackedTx,
    undo: TxUndo,
}

fn apply(
    tx: &mut TrackedTx,
    ctx: &TxContext,
    index: usize,
    caches: &mut StateCaches,
) -> Result<TxUndo, TxError> {
    tx.check(ctx, caches)?;
    Ok(tx.execute(ctx, index, caches)?)
}

fn rollback(
    ctx: &TxContext,
    caches: &mut StateCaches,
    applied: &mut Vec<Applied>,
) -> Result<(), UndoError> {
    while let Some(mut entry) = applied.pop() {
        trace!(target: "block", "[rollback] undoing #{}", entry.index);
        entry.tx.undo(ctx, &entry.undo, caches)?;
    }
    Ok(())
}

/// Rolls back everything applied so far and reports `source` as the reason the
/// block was rejected.
fn reject(
    ctx: &TxContext,
    caches: &mut StateCaches,
    applied: &mut Vec<Applied>,
    index: usize,
    source: TxError,
) -> BlockError {
    warn!(
        target: "block",
        "Rejecting block {} at index {}: {}",
        ctx.height,
        index,
        source
    );
    match rollback(ctx, caches, applied) {
        Ok(()) => BlockError::Rejected {
            height: ctx.height,
            index,
            source,
        },
        Err(e) => BlockError::Undo(e),
    }
}

fn into_block(height: u32, applied: Vec<Applied>) -> (PriceBlock, BlockUndo) {
    let mut transactions = Vec::with_capacity(applied.len());
    let mut entries = Vec::with_capacity(applied.len());
    for entry in applied {
        entries.push((entry.index, entry.undo));
        transactions.push(entry.tx.into_inner());
    }
    (
        PriceBlock {
            height,
            transactions,
        },
        BlockUndo { height, entries },
    )
}

/// Block assembled by the producer from pending transactions.
#[derive(Debug)]
pub struct BlockTemplate {
    pub block: PriceBlock,
    pub undo: BlockUndo,
    /// Pending transactions that failed check or execution.
    pub excluded: Vec<(PriceTx, TxError)>,
    /// Number of pending transactions dropped past their validity height.
    pub expired: usize,
}

impl BlockTemplate {
    /// Orders `pending` by priority, applies every feed that passes, then
    /// synthesizes and applies the block median last.
    pub fn build(
        ctx: &TxContext,
        caches: &mut StateCaches,
        height: u32,
        producer: AccountId,
        pending: Vec<PriceTx>,
    ) -> Result<Self, BlockError> {
        let ctx = ctx.at(height);

        let mut expired = 0;
        let mut candidates = Vec::with_capacity(pending.len());
        for tx in pending {
            if tx.is_median() {
                warn!(target: "block", "[build] dropping submitted median from {}", tx.tx_uid());
            } else if tx.valid_height() < height {
                trace!(
                    target: "block",
                    "[build] dropping expired tx from {}, valid until {}",
                    tx.tx_uid(),
                    tx.valid_height()
                );
                expired += 1;
            } else {
                candidates.push(tx);
            }
        }
        candidates.sort_by(|a, b| b.priority().total_cmp(&a.priority()));

        let mut applied = Vec::with_capacity(candidates.len() + 1);
        let mut excluded = Vec::new();
        for tx in candidates {
            let index = applied.len();
            let mut tx = TrackedTx::new(tx);
            match apply(&mut tx, &ctx, index, caches) {
                Ok(undo) => applied.push(Applied { index, tx, undo }),
                Err(e) => {
                    debug!(target: "block", "[build] excluding tx from {}: {}", tx.tx().tx_uid(), e);
                    excluded.push((tx.into_inner(), e));
                }
            }
        }

        let medians = aggregate(caches.observations.points_at(height));
        let index = applied.len();
        let mut median = TrackedTx::new(BlockPriceMedianTx::new(producer, height, medians).into());
        match apply(&mut median, &ctx, index, caches) {
            Ok(undo) => applied.push(Applied {
                index,
                tx: median,
                undo,
            }),
            Err(e) => return Err(reject(&ctx, caches, &mut applied, index, e)),
        }

        debug!(
            target: "block",
            "[build] block {}: {} transactions, {} excluded, {} expired",
            height,
            applied.len(),
            excluded.len(),
            expired
        );

        let (block, undo) = into_block(height, applied);
        Ok(Self {
            block,
            undo,
            excluded,
            expired,
        })
    }
}

/// Result of connecting a received block.
#[derive(Debug)]
pub struct ConnectedBlock {
    pub undo: BlockUndo,
    /// Feeds left out of execution, by block index.
    pub excluded: Vec<(usize, TxError)>,
}

fn check_median_placement(block: &PriceBlock) -> Result<(), BlockError> {
    let height = block.height;
    let positions: Vec<usize> = block
        .transactions
        .iter()
        .enumerate()
        .filter(|(_, tx)| tx.is_median())
        .map(|(index, _)| index)
        .collect();

    match positions.as_slice() {
        [] => Err(BlockError::MissingMedian { height }),
        [index] if index + 1 != block.transactions.len() => Err(BlockError::MisplacedMedian {
            height,
            index: *index,
        }),
        [_] => Ok(()),
        _ => Err(BlockError::DuplicateMedian { height }),
    }
}

/// Applies a received block in index order.
///
/// Feeds that fail are excluded and reported. A missing or misplaced median,
/// a median that does not match the recomputed one, or any fatal error rejects
/// the whole block and leaves the caches as they were.
pub fn connect_block(
    ctx: &TxContext,
    caches: &mut StateCaches,
    block: &PriceBlock,
) -> Result<ConnectedBlock, BlockError> {
    let ctx = ctx.at(block.height);
    check_median_placement(block)?;

    let mut applied = Vec::with_capacity(block.transactions.len());
    let mut excluded = Vec::new();
    for (index, tx) in block.transactions.iter().enumerate() {
        let mut tx = TrackedTx::new(tx.clone());
        match apply(&mut tx, &ctx, index, caches) {
            Ok(undo) => applied.push(Applied { index, tx, undo }),
            Err(e) if e.is_fatal() || tx.tx().is_median() => {
                return Err(reject(&ctx, caches, &mut applied, index, e));
            }
            Err(e) => {
                debug!(target: "block", "[connect] excluding #{} in block {}: {}", index, block.height, e);
                excluded.push((index, e));
            }
        }
    }

    debug!(
        target: "block",
        "[connect] block {}: {} applied, {} excluded",
        block.height,
        applied.len(),
        excluded.len()
    );

    let (_, undo) = into_block(block.height, applied);
    Ok(ConnectedBlock { undo, excluded })
}

/// Reverts a connected block by replaying its undo records in reverse.
pub fn disconnect_block(
    ctx: &TxContext,
    caches: &mut StateCaches,
    block: &PriceBlock,
    undo: &BlockUndo,
) -> Result<(), BlockError> {
    let ctx = ctx.at(block.height);
    if undo.height != block.height {
        return Err(BlockError::UndoHeightMismatch {
            height: block.height,
            undo_height: undo.height,
        });
    }

    let median_index = block.transactions.len().saturating_sub(1);
    if undo.entries.last().map(|(index, _)| *index) != Some(median_index) {
        return Err(BlockError::MissingUndo {
            height: block.height,
            index: median_index,
        });
    }

    for (index, record) in undo.entries.iter().rev() {
        let tx = block
            .transactions
            .get(*index)
            .ok_or(UndoError::MismatchedRecord)?;
        TrackedTx::executed(tx.clone()).undo(&ctx, record, caches)?;
    }

    debug!(
        target: "block",
        "[disconnect] block {}: reverted {} transactions",
        block.height,
        undo.entries.len()
    );
    Ok(())
}
