use std::sync::Arc;

use sqlx::{Sqlite, Transaction};
use tokio::sync::Mutex;
use tracing::debug;

use crate::Amount;
use crate::model::{TransactionRecord, Wallet, WalletId};

use super::error::{StoreError, StoreResult};
use super::{WalletRow, encode_timestamp};

/// A cloneable handle on one open store transaction.
///
/// Every clone issues its statements on the same transaction, so several tasks
/// can read within one snapshot. Statements are serialized on the underlying
/// connection. The transaction is committed or rolled back through the last
/// handle; dropping every handle without committing rolls it back.
#[derive(Clone)]
pub struct TxScope {
    inner: Arc<Mutex<Transaction<'static, Sqlite>>>,
}

impl TxScope {
    pub(super) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tx)),
        }
    }

    pub async fn fetch_wallet(&self, id: &WalletId) -> StoreResult<Option<Wallet>> {
        let mut tx = self.inner.lock().await;
        let row = sqlx::query_as::<_, WalletRow>("select id, balance from wallets where id = ?")
            .bind(id.as_str())
            .fetch_optional(&mut **tx)
            .await?;

        row.map(WalletRow::into_wallet).transpose()
    }

    pub async fn update_balance(&self, id: &WalletId, balance: Amount) -> StoreResult<()> {
        let mut tx = self.inner.lock().await;
        sqlx::query("update wallets set balance = ? where id = ?")
            .bind(balance.to_string())
            .bind(id.as_str())
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub async fn append_record(&self, record: &TransactionRecord) -> StoreResult<()> {
        let mut tx = self.inner.lock().await;
        sqlx::query(
            r#"
            insert into wallet_transactions (author_id, sender_id, balance, date)
            values (?, ?, ?, ?)
            "#,
        )
        .bind(record.from.as_str())
        .bind(record.to.as_str())
        .bind(record.amount.to_string())
        .bind(encode_timestamp(&record.timestamp))
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Commit the transaction. Fails if another handle is still alive.
    pub async fn commit(self) -> StoreResult<()> {
        let tx = Arc::try_unwrap(self.inner)
            .map_err(|_| StoreError::Transaction("transaction scope is still shared".to_string()))?
            .into_inner();
        tx.commit().await.map_err(StoreError::transaction)
    }

    /// Roll back the transaction.
    ///
    /// When a detached reader still holds a handle, the rollback happens as soon
    /// as that reader drops it.
    pub async fn rollback(self) -> StoreResult<()> {
        match Arc::try_unwrap(self.inner) {
            Ok(tx) => tx.into_inner().rollback().await.map_err(StoreError::transaction),
            Err(_) => {
                debug!("rollback deferred to the last transaction handle");
                Ok(())
            }
        }
    }
}
