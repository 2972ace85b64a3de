//! Error types for ledger operations.

use thiserror::Error;

use crate::Amount;
use crate::id::EntropyError;
use crate::model::WalletId;
use crate::store::StoreError;

/// Top-level error returned by [`Engine`](super::Engine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("wallet {0} not found")]
    NotFound(WalletId),

    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("no free wallet id after {attempts} attempts")]
    IdSpaceExhausted { attempts: usize },

    #[error(transparent)]
    Entropy(#[from] EntropyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error fetching a single wallet inside a transfer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("wallet {0} not found")]
    NotFound(WalletId),

    #[error("fetch of wallet {0} ended without a result")]
    Interrupted(WalletId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which side of the pair failed to load. The source is always inspected first.
#[derive(Debug, Error)]
pub enum PairLoadError {
    #[error("source: {0}")]
    Source(LoadError),

    #[error("destination: {0}")]
    Destination(LoadError),
}

/// Validator verdict when a transfer may not proceed.
///
/// Sender shortfall and destination underflow are not distinguished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("resulting balances must both stay above zero")]
    InsufficientOrInvalid,
}

/// Error during transfer execution. The store is left unchanged.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("source wallet {0} not found")]
    SourceNotFound(WalletId),

    #[error("destination wallet unavailable: {0}")]
    DestinationUnavailable(LoadError),

    #[error("transfer of {amount} rejected: {reason}")]
    InvalidTransfer { amount: Amount, reason: Rejection },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<PairLoadError> for TransferError {
    fn from(e: PairLoadError) -> Self {
        match e {
            PairLoadError::Source(LoadError::NotFound(id)) => TransferError::SourceNotFound(id),
            PairLoadError::Source(LoadError::Store(e)) => TransferError::Store(e),
            PairLoadError::Source(e @ LoadError::Interrupted(_)) => {
                TransferError::Store(StoreError::Query(e.to_string()))
            }
            PairLoadError::Destination(e) => TransferError::DestinationUnavailable(e),
        }
    }
}
