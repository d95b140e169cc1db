use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::db::models::{LedgerEntryRow, PaymentRequestRow, UserBalanceRow};
use crate::domain::{LedgerEntry, PaymentRequest, PaymentStatus, ProviderUpdate};

const PAYMENT_COLUMNS: &str = "reference, user_id, payment_type, amount, phone, status, \
     provider_reference, checkout_id, provider_data, created_at, updated_at";

// --- Payment request queries ---

pub async fn insert_payment_request(pool: &PgPool, request: &PaymentRequest) -> Result<PaymentRequestRow> {
    sqlx::query_as::<_, PaymentRequestRow>(&format!(
        r#"
        INSERT INTO payment_requests (
            reference, user_id, payment_type, amount, phone, status,
            provider_reference, checkout_id, provider_data, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {}
        "#,
        PAYMENT_COLUMNS
    ))
    .bind(&request.reference)
    .bind(request.user_id)
    .bind(request.payment_type.as_str())
    .bind(&request.amount)
    .bind(&request.phone)
    .bind(request.status.as_str())
    .bind(&request.provider_reference)
    .bind(&request.checkout_id)
    .bind(&request.provider_data)
    .bind(request.created_at)
    .bind(request.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn get_payment_request(pool: &PgPool, reference: &str) -> Result<Option<PaymentRequestRow>> {
    sqlx::query_as::<_, PaymentRequestRow>(&format!(
        "SELECT {} FROM payment_requests WHERE reference = $1",
        PAYMENT_COLUMNS
    ))
    .bind(reference)
    .fetch_optional(pool)
    .await
}

/// Non-terminal update. `queued` never falls back to `pending`.
pub async fn record_payment_progress(
    pool: &PgPool,
    reference: &str,
    status: PaymentStatus,
    update: &ProviderUpdate,
) -> Result<Option<PaymentRequestRow>> {
    sqlx::query_as::<_, PaymentRequestRow>(&format!(
        r#"
        UPDATE payment_requests
        SET status = $2,
            provider_reference = COALESCE($3, provider_reference),
            checkout_id = COALESCE($4, checkout_id),
            provider_data = COALESCE($5, provider_data),
            updated_at = NOW()
        WHERE reference = $1
          AND status IN ('pending', 'queued')
          AND (status = 'pending' OR $2 <> 'pending')
        RETURNING {}
        "#,
        PAYMENT_COLUMNS
    ))
    .bind(reference)
    .bind(status.as_str())
    .bind(&update.provider_reference)
    .bind(&update.checkout_id)
    .bind(&update.provider_data)
    .fetch_optional(pool)
    .await
}

/// Compare-and-set to a terminal status. Returns `None` if the row was
/// already terminal.
pub async fn settle_payment_request(
    executor: &mut SqlxTransaction<'_, Postgres>,
    reference: &str,
    status: PaymentStatus,
    update: &ProviderUpdate,
) -> Result<Option<PaymentRequestRow>> {
    sqlx::query_as::<_, PaymentRequestRow>(&format!(
        r#"
        UPDATE payment_requests
        SET status = $2,
            provider_reference = COALESCE($3, provider_reference),
            checkout_id = COALESCE($4, checkout_id),
            provider_data = COALESCE($5, provider_data),
            updated_at = NOW()
        WHERE reference = $1 AND status IN ('pending', 'queued')
        RETURNING {}
        "#,
        PAYMENT_COLUMNS
    ))
    .bind(reference)
    .bind(status.as_str())
    .bind(&update.provider_reference)
    .bind(&update.checkout_id)
    .bind(&update.provider_data)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn list_unsettled_requests(
    pool: &PgPool,
    older_than: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<PaymentRequestRow>> {
    sqlx::query_as::<_, PaymentRequestRow>(&format!(
        r#"
        SELECT {} FROM payment_requests
        WHERE status IN ('pending', 'queued') AND created_at < $1
        ORDER BY created_at ASC
        LIMIT $2
        "#,
        PAYMENT_COLUMNS
    ))
    .bind(older_than)
    .bind(limit)
    .fetch_all(pool)
    .await
}

// --- Ledger queries ---

pub async fn insert_ledger_entry(
    executor: &mut SqlxTransaction<'_, Postgres>,
    entry: &LedgerEntry,
) -> Result<LedgerEntryRow> {
    sqlx::query_as::<_, LedgerEntryRow>(
        r#"
        INSERT INTO transactions (
            id, user_id, transaction_type, currency, amount, status, description, reference, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, user_id, transaction_type, currency, amount, status, description, reference, created_at
        "#,
    )
    .bind(entry.id)
    .bind(entry.user_id)
    .bind(&entry.transaction_type)
    .bind(&entry.currency)
    .bind(&entry.amount)
    .bind(&entry.status)
    .bind(&entry.description)
    .bind(&entry.reference)
    .bind(entry.created_at)
    .fetch_one(&mut **executor)
    .await
}

pub async fn list_ledger_entries(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<LedgerEntryRow>> {
    sqlx::query_as::<_, LedgerEntryRow>(
        r#"
        SELECT id, user_id, transaction_type, currency, amount, status, description, reference, created_at
        FROM transactions
        WHERE user_id = $1
        ORDER BY created_at DESC, id
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

// --- Balance queries ---

/// Adds `delta` in a single statement. Returns `None` when a debit would take
/// the balance below zero (or the user has no balance row yet).
pub async fn adjust_fiat_balance(
    executor: &mut SqlxTransaction<'_, Postgres>,
    user_id: Uuid,
    delta: &BigDecimal,
) -> Result<Option<BigDecimal>> {
    if delta >= &BigDecimal::from(0) {
        let balance = sqlx::query_scalar::<_, BigDecimal>(
            r#"
            INSERT INTO user_balances (user_id, fiat_balance, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET fiat_balance = user_balances.fiat_balance + EXCLUDED.fiat_balance,
                updated_at = NOW()
            RETURNING fiat_balance
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .fetch_one(&mut **executor)
        .await?;
        return Ok(Some(balance));
    }

    sqlx::query_scalar::<_, BigDecimal>(
        r#"
        UPDATE user_balances
        SET fiat_balance = fiat_balance + $2, updated_at = NOW()
        WHERE user_id = $1 AND fiat_balance + $2 >= 0
        RETURNING fiat_balance
        "#,
    )
    .bind(user_id)
    .bind(delta)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn get_user_balance(pool: &PgPool, user_id: Uuid) -> Result<Option<UserBalanceRow>> {
    sqlx::query_as::<_, UserBalanceRow>(
        "SELECT user_id, fiat_balance, crypto_balances, updated_at FROM user_balances WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}
