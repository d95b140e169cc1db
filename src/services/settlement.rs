use crate::domain::{
    LedgerEffect, LedgerEntry, LedgerEntryType, PaymentRequest, PaymentStatus, PaymentType,
    ProviderUpdate,
};
use crate::ports::{PaymentStore, RepositoryResult};

/// Balance and ledger consequences of `request` reaching `status`.
pub fn ledger_effect(
    request: &PaymentRequest,
    status: PaymentStatus,
    currency: &str,
) -> Option<LedgerEffect> {
    let amount = request.amount.clone();
    let reference = Some(request.reference.clone());

    match (request.payment_type, status) {
        (PaymentType::Deposit, PaymentStatus::Completed) => Some(LedgerEffect {
            balance_delta: Some(amount.clone()),
            entry: LedgerEntry::new(
                request.user_id,
                LedgerEntryType::Deposit,
                currency,
                amount,
                format!("M-Pesa deposit {}", request.reference),
                reference,
            ),
        }),
        // Funds were reserved when the withdrawal was initiated.
        (PaymentType::Withdrawal, PaymentStatus::Completed) => Some(LedgerEffect {
            balance_delta: None,
            entry: LedgerEntry::new(
                request.user_id,
                LedgerEntryType::Withdrawal,
                currency,
                -amount,
                format!("M-Pesa withdrawal {}", request.reference),
                reference,
            ),
        }),
        (PaymentType::Withdrawal, PaymentStatus::Failed | PaymentStatus::Canceled) => {
            Some(LedgerEffect {
                balance_delta: Some(amount.clone()),
                entry: LedgerEntry::new(
                    request.user_id,
                    LedgerEntryType::Refund,
                    currency,
                    amount,
                    format!("Refund for {} withdrawal {}", status, request.reference),
                    reference,
                ),
            })
        }
        _ => None,
    }
}

/// Drives `request` to a terminal `status`, applying its ledger effect once.
///
/// Returns `None` when another caller already settled the request.
pub async fn finalize(
    store: &dyn PaymentStore,
    request: &PaymentRequest,
    status: PaymentStatus,
    update: &ProviderUpdate,
    currency: &str,
) -> RepositoryResult<Option<PaymentRequest>> {
    debug_assert!(status.is_terminal());
    let effect = ledger_effect(request, status, currency);

    let settled = store
        .finalize(&request.reference, status, update, effect.as_ref())
        .await?;

    match &settled {
        Some(updated) => tracing::info!(
            reference = %updated.reference,
            payment_type = %updated.payment_type,
            status = %updated.status,
            amount = %updated.amount,
            balance_delta = ?effect.as_ref().and_then(|e| e.balance_delta.as_ref()).map(|d| d.to_string()),
            "Payment settled"
        ),
        None => tracing::debug!(
            reference = %request.reference,
            "Payment already settled, skipping side effects"
        ),
    }

    Ok(settled)
}

/// Result of applying a provider-reported status to a stored request.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// This call moved the request to a terminal status and applied its effect.
    Settled(PaymentRequest),
    /// The request was already terminal; nothing was changed.
    AlreadySettled(PaymentRequest),
    /// Non-terminal progress was recorded.
    Progressed(PaymentRequest),
    Unchanged(PaymentRequest),
}

impl Transition {
    pub fn request(&self) -> &PaymentRequest {
        match self {
            Transition::Settled(r)
            | Transition::AlreadySettled(r)
            | Transition::Progressed(r)
            | Transition::Unchanged(r) => r,
        }
    }

    pub fn into_request(self) -> PaymentRequest {
        match self {
            Transition::Settled(r)
            | Transition::AlreadySettled(r)
            | Transition::Progressed(r)
            | Transition::Unchanged(r) => r,
        }
    }
}

/// Applies `status` reported by the provider for `request`.
///
/// Shared by the callback handler and the status poller so that both paths
/// produce the same side effects, at most once per request.
pub async fn apply_status(
    store: &dyn PaymentStore,
    request: &PaymentRequest,
    status: PaymentStatus,
    update: &ProviderUpdate,
    currency: &str,
) -> RepositoryResult<Transition> {
    if request.status.is_terminal() {
        return Ok(Transition::AlreadySettled(request.clone()));
    }

    if status.is_terminal() {
        return match finalize(store, request, status, update, currency).await? {
            Some(settled) => Ok(Transition::Settled(settled)),
            None => {
                let current = store
                    .get_request(&request.reference)
                    .await?
                    .unwrap_or_else(|| request.clone());
                Ok(Transition::AlreadySettled(current))
            }
        };
    }

    let changed = status != request.status
        || (update.provider_reference.is_some()
            && update.provider_reference != request.provider_reference)
        || (update.checkout_id.is_some() && update.checkout_id != request.checkout_id);

    if !changed || !request.status.can_transition_to(status) {
        return Ok(Transition::Unchanged(request.clone()));
    }

    match store.record_progress(&request.reference, status, update).await? {
        Some(updated) => {
            tracing::debug!(
                reference = %updated.reference,
                status = %updated.status,
                "Payment progress recorded"
            );
            Ok(Transition::Progressed(updated))
        }
        None => Ok(Transition::Unchanged(request.clone())),
    }
}
