//! Postgres implementation of PaymentStore.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;
use crate::domain::{
    LedgerEffect, LedgerEntry, PaymentRequest, PaymentStatus, ProviderUpdate, UserBalance,
};
use crate::ports::{PaymentStore, RepositoryError, RepositoryResult};

/// Postgres-backed payment store.
#[derive(Clone)]
pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PaymentStore for PostgresPaymentStore {
    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_request(&self, request: &PaymentRequest) -> RepositoryResult<PaymentRequest> {
        queries::insert_payment_request(&self.pool, request)
            .await?
            .into_domain()
    }

    async fn get_request(&self, reference: &str) -> RepositoryResult<Option<PaymentRequest>> {
        queries::get_payment_request(&self.pool, reference)
            .await?
            .map(|row| row.into_domain())
            .transpose()
    }

    async fn record_progress(
        &self,
        reference: &str,
        status: PaymentStatus,
        update: &ProviderUpdate,
    ) -> RepositoryResult<Option<PaymentRequest>> {
        if status.is_terminal() {
            return Err(RepositoryError::Corrupt(format!(
                "terminal status {} must go through finalize",
                status
            )));
        }

        queries::record_payment_progress(&self.pool, reference, status, update)
            .await?
            .map(|row| row.into_domain())
            .transpose()
    }

    async fn finalize(
        &self,
        reference: &str,
        status: PaymentStatus,
        update: &ProviderUpdate,
        effect: Option<&LedgerEffect>,
    ) -> RepositoryResult<Option<PaymentRequest>> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = queries::settle_payment_request(&mut tx, reference, status, update).await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };
        let settled = row.into_domain()?;

        if let Some(effect) = effect {
            if let Some(delta) = &effect.balance_delta {
                if queries::adjust_fiat_balance(&mut tx, settled.user_id, delta)
                    .await?
                    .is_none()
                {
                    tx.rollback().await?;
                    return Err(RepositoryError::InsufficientFunds {
                        user_id: settled.user_id,
                    });
                }
            }
            queries::insert_ledger_entry(&mut tx, &effect.entry).await?;
        }

        tx.commit().await?;
        Ok(Some(settled))
    }

    async fn adjust_fiat_balance(
        &self,
        user_id: Uuid,
        delta: &BigDecimal,
    ) -> RepositoryResult<BigDecimal> {
        let mut tx = self.pool.begin().await?;
        match queries::adjust_fiat_balance(&mut tx, user_id, delta).await? {
            Some(balance) => {
                tx.commit().await?;
                Ok(balance)
            }
            None => {
                tx.rollback().await?;
                Err(RepositoryError::InsufficientFunds { user_id })
            }
        }
    }

    async fn get_balance(&self, user_id: Uuid) -> RepositoryResult<Option<UserBalance>> {
        Ok(queries::get_user_balance(&self.pool, user_id)
            .await?
            .map(|row| row.into_domain()))
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<LedgerEntry>> {
        let rows = queries::list_ledger_entries(&self.pool, user_id, limit, offset).await?;
        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn list_unsettled(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> RepositoryResult<Vec<PaymentRequest>> {
        queries::list_unsettled_requests(&self.pool, older_than, limit)
            .await?
            .into_iter()
            .map(|row| row.into_domain())
            .collect()
    }
}
