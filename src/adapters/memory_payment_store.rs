//! In-process PaymentStore used by tests and local runs without Postgres.
//!
//! A single lock guards every table, so `finalize` is atomic the same way the
//! Postgres transaction is.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    LedgerEffect, LedgerEntry, PaymentRequest, PaymentStatus, ProviderUpdate, UserBalance,
};
use crate::ports::{PaymentStore, RepositoryError, RepositoryResult};

#[derive(Default)]
struct Tables {
    requests: HashMap<String, PaymentRequest>,
    ledger: Vec<LedgerEntry>,
    balances: HashMap<Uuid, UserBalance>,
}

#[derive(Default)]
pub struct MemoryPaymentStore {
    tables: Mutex<Tables>,
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn apply_update(request: &mut PaymentRequest, status: PaymentStatus, update: &ProviderUpdate) {
    request.status = status;
    if update.provider_reference.is_some() {
        request.provider_reference = update.provider_reference.clone();
    }
    if update.checkout_id.is_some() {
        request.checkout_id = update.checkout_id.clone();
    }
    if update.provider_data.is_some() {
        request.provider_data = update.provider_data.clone();
    }
    request.updated_at = Utc::now();
}

fn adjust(tables: &mut Tables, user_id: Uuid, delta: &BigDecimal) -> RepositoryResult<BigDecimal> {
    let zero = BigDecimal::from(0);
    let current = tables
        .balances
        .get(&user_id)
        .map(|b| b.fiat_balance.clone())
        .unwrap_or_else(|| zero.clone());
    let next = current + delta;
    if next < zero {
        return Err(RepositoryError::InsufficientFunds { user_id });
    }

    let balance = tables.balances.entry(user_id).or_insert_with(|| UserBalance {
        user_id,
        fiat_balance: zero,
        crypto_balances: serde_json::json!({}),
        updated_at: Utc::now(),
    });
    balance.fiat_balance = next.clone();
    balance.updated_at = Utc::now();
    Ok(next)
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }

    async fn insert_request(&self, request: &PaymentRequest) -> RepositoryResult<PaymentRequest> {
        let mut tables = self.lock();
        if tables.requests.contains_key(&request.reference) {
            return Err(RepositoryError::Corrupt(format!(
                "duplicate reference {}",
                request.reference
            )));
        }
        tables
            .requests
            .insert(request.reference.clone(), request.clone());
        Ok(request.clone())
    }

    async fn get_request(&self, reference: &str) -> RepositoryResult<Option<PaymentRequest>> {
        Ok(self.lock().requests.get(reference).cloned())
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

        let mut tables = self.lock();
        match tables.requests.get_mut(reference) {
            Some(request) if request.status.can_transition_to(status) => {
                apply_update(request, status, update);
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn finalize(
        &self,
        reference: &str,
        status: PaymentStatus,
        update: &ProviderUpdate,
        effect: Option<&LedgerEffect>,
    ) -> RepositoryResult<Option<PaymentRequest>> {
        let mut tables = self.lock();
        let Some(request) = tables.requests.get(reference) else {
            return Ok(None);
        };
        if request.status.is_terminal() {
            return Ok(None);
        }
        let user_id = request.user_id;

        if let Some(effect) = effect {
            if let Some(delta) = &effect.balance_delta {
                adjust(&mut tables, user_id, delta)?;
            }
            tables.ledger.push(effect.entry.clone());
        }

        let request = tables
            .requests
            .get_mut(reference)
            .ok_or_else(|| RepositoryError::NotFound(reference.to_string()))?;
        apply_update(request, status, update);
        Ok(Some(request.clone()))
    }

    async fn adjust_fiat_balance(
        &self,
        user_id: Uuid,
        delta: &BigDecimal,
    ) -> RepositoryResult<BigDecimal> {
        adjust(&mut self.lock(), user_id, delta)
    }

    async fn get_balance(&self, user_id: Uuid) -> RepositoryResult<Option<UserBalance>> {
        Ok(self.lock().balances.get(&user_id).cloned())
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<LedgerEntry>> {
        let tables = self.lock();
        Ok(tables
            .ledger
            .iter()
            .rev()
            .filter(|entry| entry.user_id == user_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_unsettled(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> RepositoryResult<Vec<PaymentRequest>> {
        let tables = self.lock();
        let mut pending: Vec<PaymentRequest> = tables
            .requests
            .values()
            .filter(|r| !r.status.is_terminal() && r.created_at < older_than)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at);
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }
}
