pub mod amount;
pub mod api;
pub mod config;
pub mod engine;
pub mod id;
pub mod model;
pub mod store;

pub use amount::Amount;
pub use engine::{Engine, EngineConfig};
pub use model::{HistoryEntry, TransactionRecord, TransferRequest, Wallet, WalletId};
pub use store::{Store, StoreConfig};
