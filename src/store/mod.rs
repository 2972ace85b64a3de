//! Durable ledger store: the wallet table and the append-only transaction log.
//!
//! Backed by SQLite through a `sqlx` connection pool. Balances and amounts are
//! kept as canonical decimal text so that SQLite numeric affinity never turns
//! them into binary floating point. Timestamps are RFC 3339 text in UTC.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio_stream::StreamExt;
use tracing::{debug, instrument};

use crate::Amount;
use crate::model::{TransactionRecord, Wallet, WalletId};

mod error;
pub use error::{StoreError, StoreResult};

mod scope;
pub use scope::TxScope;

const WALLETS_TABLE: &str = r#"
    create table if not exists wallets (
        id text not null primary key,
        balance text not null
    )
"#;

const TRANSACTIONS_TABLE: &str = r#"
    create table if not exists wallet_transactions (
        author_id text not null,
        sender_id text not null,
        balance text not null,
        date text not null,

        foreign key (author_id) references wallets (id),
        foreign key (sender_id) references wallets (id)
    )
"#;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite connection URL, e.g. `sqlite://data.db` or `sqlite::memory:`.
    pub url: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Connection acquisition timeout.
    pub acquire_timeout: Duration,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout: Duration,
    /// Idle connection timeout. `None` keeps connections open.
    pub idle_timeout: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data.db".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }
}

impl StoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// A private in-memory database. Each SQLite memory connection is its own
    /// database, so the pool holds exactly one connection that never expires.
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            idle_timeout: None,
            ..Default::default()
        }
    }
}

/// Connection pool wrapper with the ledger queries.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open the database, creating the file if it does not exist.
    #[instrument(skip_all)]
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        debug!(
            url = %config.url,
            max_conn = config.max_connections,
            "Creating connection pool"
        );

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout);
        if config.idle_timeout.is_none() {
            pool_options = pool_options.max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create the ledger tables if they are missing.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> StoreResult<()> {
        sqlx::query(WALLETS_TABLE).execute(&self.pool).await?;
        sqlx::query(TRANSACTIONS_TABLE).execute(&self.pool).await?;

        debug!("Schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Open a transaction scope for a multi-statement unit of work.
    ///
    /// The scope takes the database write lock up front (`BEGIN IMMEDIATE`).
    /// A deferred transaction would read under a shared lock and then fail
    /// with `SQLITE_BUSY` on upgrade, skipping the busy handler; taking the
    /// lock at `BEGIN` makes concurrent scopes wait out `busy_timeout` instead.
    pub async fn begin(&self) -> StoreResult<TxScope> {
        let tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(StoreError::transaction)?;
        Ok(TxScope::new(tx))
    }

    pub async fn insert_wallet(&self, wallet: &Wallet) -> StoreResult<()> {
        sqlx::query("insert into wallets (id, balance) values (?, ?)")
            .bind(wallet.id.as_str())
            .bind(wallet.balance.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn wallet(&self, id: &WalletId) -> StoreResult<Option<Wallet>> {
        let row = sqlx::query_as::<_, WalletRow>(
            "select id, balance from wallets where id = ? limit 1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(WalletRow::into_wallet).transpose()
    }

    /// Every record where `id` is either side of the transfer, in retrieval order.
    pub async fn history(&self, id: &WalletId) -> StoreResult<Vec<TransactionRecord>> {
        let mut rows = sqlx::query_as::<_, RecordRow>(
            r#"
            select author_id, sender_id, balance, date
            from wallet_transactions
            where author_id = ? or sender_id = ?
            "#,
        )
        .bind(id.as_str())
        .bind(id.as_str())
        .fetch(&self.pool);

        let mut records = Vec::new();
        while let Some(row) = rows.next().await {
            records.push(row?.into_record()?);
        }

        Ok(records)
    }
}

pub(crate) fn encode_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_amount(column: &str, value: &str) -> StoreResult<Amount> {
    value
        .parse()
        .map_err(|e| StoreError::CorruptRow(format!("{column} = {value:?}: {e}")))
}

#[derive(sqlx::FromRow)]
pub(crate) struct WalletRow {
    id: String,
    balance: String,
}

impl WalletRow {
    pub(crate) fn into_wallet(self) -> StoreResult<Wallet> {
        Ok(Wallet {
            balance: decode_amount("wallets.balance", &self.balance)?,
            id: WalletId::from(self.id),
        })
    }
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    author_id: String,
    sender_id: String,
    balance: String,
    date: String,
}

impl RecordRow {
    fn into_record(self) -> StoreResult<TransactionRecord> {
        let timestamp = DateTime::parse_from_rfc3339(&self.date)
            .map_err(|e| {
                StoreError::CorruptRow(format!("wallet_transactions.date = {:?}: {e}", self.date))
            })?
            .with_timezone(&Utc);

        Ok(TransactionRecord {
            amount: decode_amount("wallet_transactions.balance", &self.balance)?,
            from: WalletId::from(self.author_id),
            to: WalletId::from(self.sender_id),
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> Store {
        let store = Store::connect(&StoreConfig::in_memory()).await.unwrap();
        store.bootstrap().await.unwrap();
        store
    }

    fn wallet(id: &str, balance: i64) -> Wallet {
        Wallet {
            id: id.into(),
            balance: Amount::from_units(balance),
        }
    }

    fn record(from: &str, to: &str, amount: i64) -> TransactionRecord {
        TransactionRecord {
            from: from.into(),
            to: to.into(),
            amount: Amount::from_units(amount),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let store = store().await;
        store.bootstrap().await.unwrap();
    }

    #[tokio::test]
    async fn insert_and_fetch_wallet() {
        let store = store().await;
        store.insert_wallet(&wallet("abc", 100)).await.unwrap();

        let fetched = store.wallet(&"abc".into()).await.unwrap();
        assert_eq!(fetched, Some(wallet("abc", 100)));
        assert_eq!(store.wallet(&"missing".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_id_is_a_unique_violation() {
        let store = store().await;
        store.insert_wallet(&wallet("abc", 100)).await.unwrap();

        let err = store.insert_wallet(&wallet("abc", 5)).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)), "{err:?}");
    }

    #[tokio::test]
    async fn balances_keep_exact_decimals() {
        let store = store().await;
        let precise = Wallet {
            id: "p".into(),
            balance: "1234567890.123456789012".parse().unwrap(),
        };
        store.insert_wallet(&precise).await.unwrap();

        assert_eq!(store.wallet(&"p".into()).await.unwrap(), Some(precise));
    }

    #[tokio::test]
    async fn record_requires_existing_wallets() {
        let store = store().await;
        store.insert_wallet(&wallet("a", 100)).await.unwrap();

        let scope = store.begin().await.unwrap();
        let err = scope.append_record(&record("a", "ghost", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)), "{err:?}");
        scope.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn scope_writes_are_invisible_until_commit() {
        let store = store().await;
        store.insert_wallet(&wallet("a", 100)).await.unwrap();

        let scope = store.begin().await.unwrap();
        scope.update_balance(&"a".into(), Amount::from_units(1)).await.unwrap();
        scope.rollback().await.unwrap();
        assert_eq!(store.wallet(&"a".into()).await.unwrap(), Some(wallet("a", 100)));

        let scope = store.begin().await.unwrap();
        scope.update_balance(&"a".into(), Amount::from_units(1)).await.unwrap();
        scope.commit().await.unwrap();
        assert_eq!(store.wallet(&"a".into()).await.unwrap(), Some(wallet("a", 1)));
    }

    #[tokio::test]
    async fn commit_fails_while_scope_is_shared() {
        let store = store().await;
        let scope = store.begin().await.unwrap();
        let other = scope.clone();

        assert!(matches!(scope.commit().await, Err(StoreError::Transaction(_))));
        other.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn history_matches_either_side() {
        let store = store().await;
        for id in ["a", "b", "c"] {
            store.insert_wallet(&wallet(id, 100)).await.unwrap();
        }

        let scope = store.begin().await.unwrap();
        scope.append_record(&record("a", "b", 1)).await.unwrap();
        scope.append_record(&record("b", "c", 2)).await.unwrap();
        scope.append_record(&record("c", "c", 3)).await.unwrap();
        scope.commit().await.unwrap();

        let amounts = |records: Vec<TransactionRecord>| -> Vec<Amount> {
            records.into_iter().map(|r| r.amount).collect()
        };
        let units = |values: &[i64]| -> Vec<Amount> {
            values.iter().map(|v| Amount::from_units(*v)).collect()
        };

        assert_eq!(amounts(store.history(&"a".into()).await.unwrap()), units(&[1]));
        assert_eq!(amounts(store.history(&"b".into()).await.unwrap()), units(&[1, 2]));
        assert_eq!(amounts(store.history(&"c".into()).await.unwrap()), units(&[2, 3]));
    }

    #[tokio::test]
    async fn file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("ledger.db").display());

        let store = Store::connect(&StoreConfig::new(&url)).await.unwrap();
        store.bootstrap().await.unwrap();
        store.insert_wallet(&wallet("kept", 100)).await.unwrap();
        store.close().await;

        let reopened = Store::connect(&StoreConfig::new(&url)).await.unwrap();
        reopened.bootstrap().await.unwrap();
        assert_eq!(
            reopened.wallet(&"kept".into()).await.unwrap(),
            Some(wallet("kept", 100))
        );
    }

    #[tokio::test]
    async fn open_scope_makes_other_writers_wait() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("ledger.db").display());
        let store = Store::connect(&StoreConfig::new(&url)).await.unwrap();
        store.bootstrap().await.unwrap();
        store.insert_wallet(&wallet("a", 100)).await.unwrap();

        let first = store.begin().await.unwrap();
        assert_eq!(first.fetch_wallet(&"a".into()).await.unwrap(), Some(wallet("a", 100)));

        let waiting = tokio::spawn({
            let store = store.clone();
            async move {
                let second = store.begin().await?;
                let seen = second.fetch_wallet(&"a".into()).await?;
                second.rollback().await?;
                Ok::<_, StoreError>(seen)
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        first.update_balance(&"a".into(), Amount::from_units(40)).await.unwrap();
        first.commit().await.unwrap();

        let seen = waiting.await.unwrap().unwrap();
        assert_eq!(seen, Some(wallet("a", 40)));
    }
}
