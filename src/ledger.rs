//! Batch ledger: the advisory record of bulk certificate operations.
//!
//! The ledger is a convenience/audit trail, not a correctness-critical
//! structure. Orchestrator callers generate the batch ID up front (so
//! certificates can be tagged even if the ledger write later fails) and
//! swallow `record` failures with a warning.

use crate::db::{self, Pool};
use crate::error::OpError;
use crate::model::{Batch, BatchKind};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait BatchLedger: Send + Sync {
    /// Mint a fresh batch ID. Must be called before any dependent
    /// certificate write so records can carry the tag regardless of
    /// whether `record` succeeds.
    fn new_batch_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    async fn record(
        &self,
        id: &str,
        kind: BatchKind,
        count: i64,
        description: &str,
    ) -> Result<(), OpError>;

    /// All batches, newest first.
    async fn list_recent(&self) -> Result<Vec<Batch>, OpError>;

    async fn get(&self, id: &str) -> Result<Option<Batch>, OpError>;

    async fn delete(&self, id: &str) -> Result<(), OpError>;
}

/// Ledger backed by the `batches` table.
pub struct SqliteLedger {
    pool: Pool,
}

impl SqliteLedger {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchLedger for SqliteLedger {
    async fn record(
        &self,
        id: &str,
        kind: BatchKind,
        count: i64,
        description: &str,
    ) -> Result<(), OpError> {
        db::insert_batch(&self.pool, id, kind, count, description).await
    }

    async fn list_recent(&self) -> Result<Vec<Batch>, OpError> {
        db::list_batches(&self.pool).await
    }

    async fn get(&self, id: &str) -> Result<Option<Batch>, OpError> {
        db::get_batch(&self.pool, id).await
    }

    async fn delete(&self, id: &str) -> Result<(), OpError> {
        db::delete_batch(&self.pool, id).await
    }
}
