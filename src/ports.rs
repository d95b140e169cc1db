//! Seams between the payment services and their infrastructure.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    LedgerEffect, LedgerEntry, PaymentRequest, PaymentStatus, PaymentType, ProviderUpdate,
    UserBalance,
};
use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient funds for user {user_id}")]
    InsufficientFunds { user_id: Uuid },

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Persistence for payment requests, the transaction ledger and user balances.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn ping(&self) -> RepositoryResult<()>;

    async fn insert_request(&self, request: &PaymentRequest) -> RepositoryResult<PaymentRequest>;

    async fn get_request(&self, reference: &str) -> RepositoryResult<Option<PaymentRequest>>;

    /// Records non-terminal progress. Never touches a terminal record.
    async fn record_progress(
        &self,
        reference: &str,
        status: PaymentStatus,
        update: &ProviderUpdate,
    ) -> RepositoryResult<Option<PaymentRequest>>;

    /// Moves a non-terminal request to `status` and applies `effect` in the
    /// same unit of work. Returns `None` when the request was already terminal,
    /// in which case nothing is changed.
    async fn finalize(
        &self,
        reference: &str,
        status: PaymentStatus,
        update: &ProviderUpdate,
        effect: Option<&LedgerEffect>,
    ) -> RepositoryResult<Option<PaymentRequest>>;

    /// Adds `delta` to the user's fiat balance atomically, refusing to go
    /// below zero. Returns the new balance.
    async fn adjust_fiat_balance(&self, user_id: Uuid, delta: &BigDecimal)
        -> RepositoryResult<BigDecimal>;

    async fn get_balance(&self, user_id: Uuid) -> RepositoryResult<Option<UserBalance>>;

    async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<LedgerEntry>>;

    /// Non-terminal requests created before `older_than`, oldest first.
    async fn list_unsettled(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> RepositoryResult<Vec<PaymentRequest>>;
}

/// Outbound request to the mobile-money provider.
#[derive(Debug, Clone)]
pub struct PaymentInstruction {
    pub payment_type: PaymentType,
    pub reference: String,
    pub amount: BigDecimal,
    pub phone: String,
    pub callback_url: String,
}

/// What the provider answered to an initiation or status query.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    pub status: Option<String>,
    pub provider_reference: Option<String>,
    pub checkout_id: Option<String>,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(&self, instruction: &PaymentInstruction) -> Result<ProviderReply, ProviderError>;

    async fn query_status(&self, reference: &str) -> Result<ProviderReply, ProviderError>;

    /// Cheap readiness probe used by the health check.
    fn ready(&self) -> Result<(), ProviderError>;
}
