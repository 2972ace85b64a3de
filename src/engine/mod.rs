//! Ledger engine.
//!
//! The engine owns the ledger store and runs every operation against it:
//! wallet creation, wallet lookup, funds transfer and transaction history.
//! A transfer is one store transaction: both wallets are loaded concurrently,
//! the business rule is checked, then both balances and the audit record are
//! written and committed together. Any failure rolls the whole unit back.
//!
//! No application-level locking is done. Each transfer opens its transaction
//! holding the SQLite write lock, so concurrent transfers queue on the store's
//! busy timeout and run one after another; they never interleave their writes.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::Amount;
use crate::id::{IdSource, RandomIds};
use crate::model::{HistoryEntry, TransactionRecord, TransferRequest, Wallet, WalletId};
use crate::store::{Store, StoreError, TxScope};

pub mod loader;
pub mod validator;
pub use validator::{Approved, validate};

mod error;
pub use error::{EngineError, LoadError, PairLoadError, Rejection, TransferError};

/// Fresh ids tried before wallet creation gives up.
pub const MAX_ID_ATTEMPTS: usize = 3;

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Balance every new wallet starts with.
    pub initial_balance: Amount,
    /// Length of generated wallet ids.
    pub id_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_balance: Amount::from_units(100),
            id_length: 12,
        }
    }
}

/// The ledger engine.
pub struct Engine {
    store: Store,
    config: EngineConfig,
    ids: Arc<dyn IdSource>,
}

/// Public API
impl Engine {
    pub fn new(store: Store, config: EngineConfig) -> Self {
        let ids = Arc::new(RandomIds::new(config.id_length));
        Self::with_id_source(store, config, ids)
    }

    pub fn with_id_source(
        store: Store,
        config: EngineConfig,
        ids: Arc<dyn IdSource>,
    ) -> Self {
        Self { store, config, ids }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Create a wallet holding the configured initial balance.
    ///
    /// A primary key collision regenerates the id, up to [`MAX_ID_ATTEMPTS`]
    /// times. Any other store failure is returned as is.
    pub async fn create_wallet(&self) -> Result<Wallet, EngineError> {
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let wallet = Wallet {
                id: self.ids.next_id()?,
                balance: self.config.initial_balance,
            };

            match self.store.insert_wallet(&wallet).await {
                Ok(()) => {
                    info!(id = %wallet.id, balance = %wallet.balance, "wallet created");
                    return Ok(wallet);
                }
                Err(StoreError::UniqueViolation(_)) => {
                    warn!(id = %wallet.id, attempt, "wallet id already taken");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::IdSpaceExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    /// Return one wallet.
    pub async fn wallet(&self, id: &WalletId) -> Result<Wallet, EngineError> {
        self.store
            .wallet(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(id.clone()))
    }

    /// Every transaction where the wallet is either side, in store order.
    pub async fn history(&self, id: &WalletId) -> Result<Vec<HistoryEntry>, EngineError> {
        self.wallet(id).await?;
        let records = self.store.history(id).await?;
        Ok(records.into_iter().map(HistoryEntry::from).collect())
    }

    /// Move funds between two wallets as one atomic unit.
    pub async fn transfer(
        &self,
        request: TransferRequest,
    ) -> Result<TransactionRecord, EngineError> {
        let result = self.execute_transfer(&request).await;
        Self::log_transfer(&request, &result);
        Ok(result?)
    }
}

/// Private API
impl Engine {
    fn log_transfer(request: &TransferRequest, result: &Result<TransactionRecord, TransferError>) {
        match result {
            Ok(_) => info!(
                from = %request.source,
                to = %request.destination,
                amount = %request.amount,
                self_transfer = request.is_self_transfer(),
                "transfer applied"
            ),
            Err(e) => info!(
                from = %request.source,
                to = %request.destination,
                amount = %request.amount,
                reason = %e,
                "transfer rejected"
            ),
        }
    }

    /// Run a transfer:
    /// - Open a transaction
    /// - Load source and destination concurrently
    /// - Validate the resulting balances
    /// - Write source, then destination, then the audit record
    /// - Commit
    async fn execute_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<TransactionRecord, TransferError> {
        let scope = self.store.begin().await?;

        let (source, destination) =
            match loader::load_pair(&scope, &request.source, &request.destination).await {
                Ok(pair) => pair,
                Err(e) => return Err(Self::abort(scope, e.into()).await),
            };

        let approved = match validate(source.balance, destination.balance, request.amount) {
            Ok(approved) => approved,
            Err(reason) => {
                let rejected = TransferError::InvalidTransfer {
                    amount: request.amount,
                    reason,
                };
                return Err(Self::abort(scope, rejected).await);
            }
        };

        let record = TransactionRecord {
            from: request.source.clone(),
            to: request.destination.clone(),
            amount: request.amount,
            timestamp: Utc::now(),
        };

        if let Err(e) = Self::write(&scope, request, &approved, &record).await {
            return Err(Self::abort(scope, e.into()).await);
        }

        scope.commit().await?;
        Ok(record)
    }

    /// When source and destination coincide the destination write lands last.
    async fn write(
        scope: &TxScope,
        request: &TransferRequest,
        approved: &Approved,
        record: &TransactionRecord,
    ) -> Result<(), StoreError> {
        scope.update_balance(&request.source, approved.source).await?;
        scope.update_balance(&request.destination, approved.destination).await?;
        scope.append_record(record).await
    }

    /// Roll back and hand the original error back to the caller.
    async fn abort(scope: TxScope, error: TransferError) -> TransferError {
        if let Err(e) = scope.rollback().await {
            warn!(reason = %e, "rollback failed");
        }
        error
    }
}
