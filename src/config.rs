//! Command-line and environment configuration.

use std::time::Duration;

use clap::Parser;

use crate::Amount;
use crate::engine::EngineConfig;
use crate::store::StoreConfig;

/// Wallet ledger HTTP service.
#[derive(Parser, Debug)]
#[command(name = "wallet-ledger")]
#[command(about = "Minimal wallet ledger: create wallets, transfer funds, read history")]
#[command(version)]
pub struct Cli {
    /// Address the HTTP server binds to.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// SQLite database URL.
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://data.db")]
    pub database_url: String,

    /// Maximum number of pooled database connections.
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Milliseconds a writer waits on a locked database.
    #[arg(long, env = "DB_BUSY_TIMEOUT_MS", default_value_t = 5000)]
    pub busy_timeout_ms: u64,

    /// Balance every new wallet starts with.
    #[arg(long, env = "INITIAL_BALANCE", default_value = "100")]
    pub initial_balance: Amount,

    /// Length of generated wallet ids.
    #[arg(
        long,
        env = "WALLET_ID_LENGTH",
        default_value_t = 12,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub id_length: u16,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_connections: self.max_connections,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            ..StoreConfig::new(&self.database_url)
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            initial_balance: self.initial_balance,
            id_length: usize::from(self.id_length),
        }
    }
}
