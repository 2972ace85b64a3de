//! Concurrent loading of the two wallets involved in a transfer.

use tokio::sync::oneshot;
use tracing::debug;

use crate::model::{Wallet, WalletId};
use crate::store::TxScope;

use super::error::{LoadError, PairLoadError};

type Slot = oneshot::Receiver<Result<Wallet, LoadError>>;

/// Fetch `source` and `destination` in parallel within `scope`.
///
/// Both fetches start immediately on their own tasks. The source result is
/// awaited first; if it failed, the destination slot is dropped unread and its
/// task finishes on its own. The ids may be equal.
pub async fn load_pair(
    scope: &TxScope,
    source: &WalletId,
    destination: &WalletId,
) -> Result<(Wallet, Wallet), PairLoadError> {
    let source_slot = spawn_fetch(scope.clone(), source.clone());
    let destination_slot = spawn_fetch(scope.clone(), destination.clone());

    let source = receive(source_slot, source).await.map_err(PairLoadError::Source)?;
    let destination = receive(destination_slot, destination)
        .await
        .map_err(PairLoadError::Destination)?;

    Ok((source, destination))
}

fn spawn_fetch(scope: TxScope, id: WalletId) -> Slot {
    let (sender, receiver) = oneshot::channel();

    tokio::spawn(async move {
        let fetched = scope.fetch_wallet(&id).await;
        let result = match fetched {
            Ok(Some(wallet)) => Ok(wallet),
            Ok(None) => Err(LoadError::NotFound(id)),
            Err(e) => Err(LoadError::Store(e)),
        };
        // release the transaction before reporting so the caller can finish it
        drop(scope);

        if sender.send(result).is_err() {
            debug!("wallet fetch result discarded");
        }
    });

    receiver
}

async fn receive(slot: Slot, id: &WalletId) -> Result<Wallet, LoadError> {
    slot.await
        .unwrap_or_else(|_| Err(LoadError::Interrupted(id.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Amount;
    use crate::store::{Store, StoreConfig};

    async fn store_with(wallets: &[(&str, i64)]) -> Store {
        let store = Store::connect(&StoreConfig::in_memory()).await.unwrap();
        store.bootstrap().await.unwrap();
        for (id, balance) in wallets {
            store
                .insert_wallet(&Wallet {
                    id: (*id).into(),
                    balance: Amount::from_units(*balance),
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn loads_both_wallets_in_order() {
        let store = store_with(&[("a", 10), ("b", 20)]).await;
        let scope = store.begin().await.unwrap();

        let (source, destination) = load_pair(&scope, &"a".into(), &"b".into()).await.unwrap();
        assert_eq!(source.balance, Amount::from_units(10));
        assert_eq!(destination.balance, Amount::from_units(20));

        // both tasks have released their handles
        scope.commit().await.unwrap();
    }

    #[tokio::test]
    async fn same_id_loads_twice() {
        let store = store_with(&[("a", 10)]).await;
        let scope = store.begin().await.unwrap();

        let (source, destination) = load_pair(&scope, &"a".into(), &"a".into()).await.unwrap();
        assert_eq!(source, destination);
        scope.commit().await.unwrap();
    }

    #[tokio::test]
    async fn source_failure_wins_over_destination_failure() {
        let store = store_with(&[]).await;
        let scope = store.begin().await.unwrap();

        let err = load_pair(&scope, &"nope".into(), &"also-nope".into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PairLoadError::Source(LoadError::NotFound(id)) if id.as_str() == "nope"
        ));
        scope.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn destination_failure_reported_when_source_loads() {
        let store = store_with(&[("a", 10)]).await;
        let scope = store.begin().await.unwrap();

        let err = load_pair(&scope, &"a".into(), &"ghost".into()).await.unwrap_err();
        assert!(matches!(err, PairLoadError::Destination(LoadError::NotFound(_))));
        scope.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn abandoned_fetch_releases_the_connection() {
        // single-connection pool: a leaked transaction would starve the next query
        let store = store_with(&[("b", 20)]).await;
        let scope = store.begin().await.unwrap();

        assert!(load_pair(&scope, &"ghost".into(), &"b".into()).await.is_err());
        scope.rollback().await.unwrap();

        let wallet = store.wallet(&"b".into()).await.unwrap();
        assert_eq!(wallet.map(|w| w.balance), Some(Amount::from_units(20)));
    }
}
