//! Core domain types for the wallet ledger.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::Amount;

/// Opaque wallet identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(String);

impl WalletId {
    pub fn new(id: impl Into<String>) -> Self {
        WalletId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WalletId {
    fn from(id: &str) -> Self {
        WalletId(id.to_string())
    }
}

impl From<String> for WalletId {
    fn from(id: String) -> Self {
        WalletId(id)
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A wallet row: identifier and current balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wallet {
    pub id: WalletId,
    pub balance: Amount,
}

/// Audit record of one committed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// Wallet the funds were debited from.
    pub from: WalletId,
    /// Wallet the funds were credited to.
    pub to: WalletId,
    /// The requested amount, as sent by the client.
    pub amount: Amount,
    pub timestamp: DateTime<Utc>,
}

/// A request to move `amount` from `source` to `destination`.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source: WalletId,
    pub destination: WalletId,
    pub amount: Amount,
}

impl TransferRequest {
    pub fn new(
        source: impl Into<WalletId>,
        destination: impl Into<WalletId>,
        amount: Amount,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            amount,
        }
    }

    pub fn is_self_transfer(&self) -> bool {
        self.source == self.destination
    }
}

/// Display form of a [`TransactionRecord`] as returned by the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub from: WalletId,
    pub to: WalletId,
    pub amount: Amount,
    /// RFC 3339, second precision, UTC.
    pub time: String,
}

impl From<TransactionRecord> for HistoryEntry {
    fn from(record: TransactionRecord) -> Self {
        Self {
            from: record.from,
            to: record.to,
            amount: record.amount,
            time: record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn history_entry_formats_time_as_rfc3339() {
        let record = TransactionRecord {
            from: "alice".into(),
            to: "bob".into(),
            amount: Amount::from_units(30),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap(),
        };
        let entry = HistoryEntry::from(record);
        assert_eq!(entry.time, "2024-03-01T12:30:05Z");
        assert_eq!(entry.from.as_str(), "alice");
        assert_eq!(entry.to.as_str(), "bob");
    }

    #[test]
    fn history_entry_json_shape() {
        let entry = HistoryEntry {
            from: "a".into(),
            to: "b".into(),
            amount: Amount::from_units(5),
            time: "2024-03-01T12:30:05Z".to_string(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "from": "a",
                "to": "b",
                "amount": "5",
                "time": "2024-03-01T12:30:05Z"
            })
        );
    }

    #[test]
    fn self_transfer_detection() {
        let request = TransferRequest::new("x", "x", Amount::from_units(1));
        assert!(request.is_self_transfer());
        let request = TransferRequest::new("x", "y", Amount::from_units(1));
        assert!(!request.is_self_transfer());
    }
}
