//! Row types for SQLx. Converted into domain types at the adapter boundary.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::{LedgerEntry, PaymentRequest, PaymentStatus, PaymentType, UserBalance};
use crate::ports::RepositoryError;

#[derive(Debug, FromRow)]
pub struct PaymentRequestRow {
    pub reference: String,
    pub user_id: Uuid,
    pub payment_type: String,
    pub amount: BigDecimal,
    pub phone: String,
    pub status: String,
    pub provider_reference: Option<String>,
    pub checkout_id: Option<String>,
    pub provider_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRequestRow {
    pub fn into_domain(self) -> Result<PaymentRequest, RepositoryError> {
        let payment_type = self.payment_type.parse::<PaymentType>().map_err(|e| {
            RepositoryError::Corrupt(format!("payment {}: {}", self.reference, e))
        })?;
        let status = self.status.parse::<PaymentStatus>().map_err(|e| {
            RepositoryError::Corrupt(format!("payment {}: {}", self.reference, e))
        })?;

        Ok(PaymentRequest {
            reference: self.reference,
            user_id: self.user_id,
            payment_type,
            amount: self.amount,
            phone: self.phone,
            status,
            provider_reference: self.provider_reference,
            checkout_id: self.checkout_id,
            provider_data: self.provider_data,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct LedgerEntryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub transaction_type: String,
    pub currency: String,
    pub amount: BigDecimal,
    pub status: String,
    pub description: String,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntryRow {
    pub fn into_domain(self) -> LedgerEntry {
        LedgerEntry {
            id: self.id,
            user_id: self.user_id,
            transaction_type: self.transaction_type,
            currency: self.currency,
            amount: self.amount,
            status: self.status,
            description: self.description,
            reference: self.reference,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct UserBalanceRow {
    pub user_id: Uuid,
    pub fiat_balance: BigDecimal,
    pub crypto_balances: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl UserBalanceRow {
    pub fn into_domain(self) -> UserBalance {
        UserBalance {
            user_id: self.user_id,
            fiat_balance: self.fiat_balance,
            crypto_balances: self.crypto_balances,
            updated_at: self.updated_at,
        }
    }
}
