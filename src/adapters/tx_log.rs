//! Append-only sink for submitted transactions

use alloy::primitives::{Address, TxHash};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

/// Token approval carried alongside an approval transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalInfo {
    pub token: Address,
    pub spender: Address,
}

/// What gets recorded with each transaction hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub summary: String,
    pub approval: Option<ApprovalInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: TxHash,
    pub entry: TransactionEntry,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait TransactionLog: Send + Sync {
    async fn record(&self, hash: TxHash, entry: TransactionEntry);
}

/// Keeps records in memory for the lifetime of the process
#[derive(Debug, Default)]
pub struct InMemoryTransactionLog {
    records: RwLock<Vec<TransactionRecord>>,
}

impl InMemoryTransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<TransactionRecord> {
        self.records.read().await.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionLog for InMemoryTransactionLog {
    async fn record(&self, hash: TxHash, entry: TransactionEntry) {
        info!(%hash, summary = %entry.summary, "Transaction submitted");
        self.records.write().await.push(TransactionRecord {
            hash,
            entry,
            recorded_at: Utc::now(),
        });
    }
}
