use std::io;

use pricefeed_tx::{AccountId, PriceKey};
use thiserror::Error;

use crate::{params::Network, transaction::TxStatus};

/// Coarse classification shared by every transaction-level error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed transaction, rejected before any state is read.
    Structural,
    /// Submitter not allowed to feed or signature does not verify.
    Authorization,
    /// Balance too low or the account store refused the operation.
    Resource,
    /// The block as a whole is invalid.
    Consensus,
    /// Feeder already submitted at this height.
    Idempotency,
    /// Broken internal invariant.
    Internal,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("illegal transaction status transition {from:?} -> {to:?}")]
pub struct StatusError {
    pub from: TxStatus,
    pub to: TxStatus,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("Account: unknown account {0}")]
    UnknownAccount(AccountId),
    #[error("Account: balance {balance} of {uid} does not cover {amount}")]
    InsufficientBalance {
        uid: AccountId,
        balance: u64,
        amount: u64,
    },
    #[error("Account: balance of {0} overflows")]
    Overflow(AccountId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("PriceFeed: {0} price points, expected 1..={1}")]
    InvalidPointCount(usize, usize),
    #[error("PriceFeed: duplicate observation for {0}")]
    DuplicateObservation(PriceKey),
    #[error("PriceTx: unsupported version {version}, expected {expected}")]
    UnsupportedVersion { version: u32, expected: u32 },
    #[error("PriceFeed: valid until height {valid_height}, block height is {height}")]
    Expired { valid_height: u32, height: u32 },
    #[error("PriceFeed: {uid} is not an authorized feeder at height {height}")]
    UnauthorizedFeeder { uid: AccountId, height: u32 },
    #[error("PriceFeed: balance {balance} of {uid} does not cover fee {fee}")]
    InsufficientFunds { uid: AccountId, balance: u64, fee: u64 },
    #[error("PriceFeed: bad signature from {0}")]
    BadSignature(AccountId),
    #[error("BlockPriceMedian: mismatch at height {height}: {reason}")]
    MedianMismatch { height: u32, reason: String },
    #[error(transparent)]
    Status(#[from] StatusError),
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::InvalidPointCount(..)
            | ValidationError::DuplicateObservation(_)
            | ValidationError::UnsupportedVersion { .. }
            | ValidationError::Expired { .. } => ErrorKind::Structural,
            ValidationError::UnauthorizedFeeder { .. } | ValidationError::BadSignature(_) => {
                ErrorKind::Authorization
            }
            ValidationError::InsufficientFunds { .. } => ErrorKind::Resource,
            ValidationError::MedianMismatch { .. } => ErrorKind::Consensus,
            ValidationError::Status(_) => ErrorKind::Internal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Consensus | ErrorKind::Internal)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("PriceFeed: {feeder} already submitted at height {height}")]
    DuplicateSubmission { feeder: AccountId, height: u32 },
    #[error("PriceTx: {0}")]
    Account(#[from] AccountError),
    #[error(transparent)]
    Status(#[from] StatusError),
}

impl ExecutionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutionError::DuplicateSubmission { .. } => ErrorKind::Idempotency,
            ExecutionError::Account(_) => ErrorKind::Resource,
            ExecutionError::Status(_) => ErrorKind::Internal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}

/// Undo failures mean the caches no longer match the undo log; always fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UndoError {
    #[error("Undo: no observation from {feeder} at height {height}")]
    MissingObservation { feeder: AccountId, height: u32 },
    #[error("Undo: balance of {uid} is {actual} after refund, expected {expected}")]
    BalanceMismatch {
        uid: AccountId,
        expected: u64,
        actual: u64,
    },
    #[error("Undo: record does not belong to this transaction")]
    MismatchedRecord,
    #[error("Undo: {0}")]
    Account(#[from] AccountError),
    #[error(transparent)]
    Status(#[from] StatusError),
}

impl UndoError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }

    pub fn is_fatal(&self) -> bool {
        true
    }
}

/// Reason a single transaction was left out of a block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl TxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TxError::Validation(e) => e.kind(),
            TxError::Execution(e) => e.kind(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        match self {
            TxError::Validation(e) => e.is_fatal(),
            TxError::Execution(e) => e.is_fatal(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("Block {height}: no BlockPriceMedian transaction")]
    MissingMedian { height: u32 },
    #[error("Block {height}: BlockPriceMedian at index {index} is not the last transaction")]
    MisplacedMedian { height: u32, index: usize },
    #[error("Block {height}: more than one BlockPriceMedian transaction")]
    DuplicateMedian { height: u32 },
    #[error("Block {height}: rejected transaction at index {index}: {source}")]
    Rejected {
        height: u32,
        index: usize,
        #[source]
        source: TxError,
    },
    #[error("Block {height}: undo log has no entry for index {index}")]
    MissingUndo { height: u32, index: usize },
    #[error("Block {height}: undo log is for height {undo_height}")]
    UndoHeightMismatch { height: u32, undo_height: u32 },
    #[error(transparent)]
    Undo(#[from] UndoError),
}

impl BlockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlockError::Rejected { source, .. } => source.kind(),
            BlockError::MissingMedian { .. }
            | BlockError::MisplacedMedian { .. }
            | BlockError::DuplicateMedian { .. } => ErrorKind::Consensus,
            BlockError::MissingUndo { .. }
            | BlockError::UndoHeightMismatch { .. }
            | BlockError::Undo(_) => ErrorKind::Internal,
        }
    }
}

#[derive(Error, Debug)]
pub enum PersistentStateError {
    #[error("PersistentState: IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("PersistentState: Bincode error: {0}")]
    BincodeError(#[from] bincode::Error),
}

#[derive(Error, Debug)]
pub enum ParamsError {
    #[error("Params: invalid network {0}")]
    InvalidNetwork(String),
    #[error("Params: max_price_points must be within 1..=3, got {0}")]
    InvalidMaxPricePoints(usize),
    #[error("Params: parameters of {0} cannot be overridden")]
    OverrideNotAllowed(Network),
    #[error("Params: IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Params: serde_json error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
}
