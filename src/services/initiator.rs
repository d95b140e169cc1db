//! Deposit and withdrawal initiation.
//!
//! Withdrawals reserve funds before the provider is called; any failure after
//! the reservation releases it exactly once.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::settlement;
use super::PaymentSettings;
use crate::domain::{PaymentRequest, PaymentStatus, PaymentType, ProviderUpdate};
use crate::error::AppError;
use crate::ports::{PaymentGateway, PaymentInstruction, PaymentStore};
use crate::validation::{
    parse_amount, parse_user_id, sanitize_string, validate_enum, validate_required,
    PhoneNormalizer, ValidationError, PAYMENT_TYPES,
};

/// Body of `POST /payments?action=process`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProcessPaymentRequest {
    #[serde(default)]
    pub uuid: String,
    /// Number or numeric string.
    #[serde(default)]
    #[schema(value_type = String, example = "500")]
    pub amount: Value,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default, rename = "type")]
    pub payment_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ProcessPaymentResponse {
    pub success: bool,
    pub reference: String,
    pub status: String,
    pub message: String,
    #[schema(value_type = Object)]
    pub provider_data: Value,
    /// Recent debug log lines, filled in at the HTTP boundary.
    #[serde(default)]
    pub logs: Vec<String>,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPayment {
    pub user_id: Uuid,
    pub payment_type: PaymentType,
    pub amount: BigDecimal,
    pub phone: String,
}

pub struct PaymentInitiator {
    store: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    phones: PhoneNormalizer,
    settings: PaymentSettings,
}

impl PaymentInitiator {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        phones: PhoneNormalizer,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            phones,
            settings,
        }
    }

    pub fn validate(&self, input: &ProcessPaymentRequest) -> Result<ValidatedPayment, ValidationError> {
        let user_id = parse_user_id(&input.uuid)?;
        let amount = parse_amount(&input.amount)?;

        let kind = sanitize_string(&input.payment_type).to_ascii_lowercase();
        validate_enum("type", &kind, PAYMENT_TYPES)?;
        let payment_type = kind
            .parse::<PaymentType>()
            .map_err(|e| ValidationError::new("type", e))?;

        validate_required("phone_number", &input.phone_number)?;
        let phone = self.phones.normalize(&input.phone_number)?;

        Ok(ValidatedPayment {
            user_id,
            payment_type,
            amount,
            phone,
        })
    }

    pub async fn initiate(
        &self,
        input: ProcessPaymentRequest,
    ) -> Result<ProcessPaymentResponse, AppError> {
        let payment = self.validate(&input)?;
        let request = PaymentRequest::new(
            payment.user_id,
            payment.payment_type,
            payment.amount.clone(),
            payment.phone.clone(),
        );

        info!(
            reference = %request.reference,
            payment_type = %request.payment_type,
            amount = %request.amount,
            "Initiating payment"
        );

        let is_withdrawal = payment.payment_type == PaymentType::Withdrawal;
        if is_withdrawal {
            let remaining = self
                .store
                .adjust_fiat_balance(payment.user_id, &(-payment.amount.clone()))
                .await?;
            info!(
                reference = %request.reference,
                remaining = %remaining,
                "Withdrawal funds reserved"
            );
        }

        let request = match self.store.insert_request(&request).await {
            Ok(stored) => stored,
            Err(err) => {
                error!(reference = %request.reference, error = %err, "Failed to persist payment request");
                if is_withdrawal {
                    self.release_reservation(&request).await;
                }
                return Err(err.into());
            }
        };

        let instruction = PaymentInstruction {
            payment_type: request.payment_type,
            reference: request.reference.clone(),
            amount: request.amount.clone(),
            phone: request.phone.clone(),
            callback_url: self.settings.callback_url.clone(),
        };

        let reply = match self.gateway.initiate(&instruction).await {
            Ok(reply) => reply,
            Err(err) => {
                error!(reference = %request.reference, error = %err, "Provider rejected payment initiation");
                let update = ProviderUpdate {
                    provider_data: Some(json!({ "error": err.to_string() })),
                    ..Default::default()
                };
                if let Err(settle_err) = settlement::finalize(
                    self.store.as_ref(),
                    &request,
                    PaymentStatus::Failed,
                    &update,
                    &self.settings.currency,
                )
                .await
                {
                    error!(
                        reference = %request.reference,
                        error = %settle_err,
                        "Failed to mark payment as failed"
                    );
                }
                return Err(err.into());
            }
        };

        let update = ProviderUpdate {
            provider_reference: reply.provider_reference.clone(),
            checkout_id: reply.checkout_id.clone(),
            provider_data: Some(reply.raw.clone()),
        };
        // The provider has accepted the payment, so a failure here only loses
        // the correlation ids; the callback still resolves by our reference.
        if let Err(err) = self
            .store
            .record_progress(&request.reference, PaymentStatus::Pending, &update)
            .await
        {
            warn!(reference = %request.reference, error = %err, "Failed to record provider reply");
        }

        info!(
            reference = %request.reference,
            provider_reference = ?reply.provider_reference,
            checkout_id = ?reply.checkout_id,
            "Payment initiated"
        );

        Ok(ProcessPaymentResponse {
            success: true,
            message: initiation_message(&request),
            reference: request.reference,
            status: PaymentStatus::Pending.to_string(),
            provider_data: reply.raw,
            logs: Vec::new(),
        })
    }

    async fn release_reservation(&self, request: &PaymentRequest) {
        match self
            .store
            .adjust_fiat_balance(request.user_id, &request.amount)
            .await
        {
            Ok(balance) => warn!(
                reference = %request.reference,
                balance = %balance,
                "Withdrawal reservation released"
            ),
            Err(err) => error!(
                reference = %request.reference,
                user_id = %request.user_id,
                amount = %request.amount,
                error = %err,
                "Failed to release withdrawal reservation"
            ),
        }
    }
}

fn initiation_message(request: &PaymentRequest) -> String {
    match request.payment_type {
        PaymentType::Deposit => format!(
            "STK push sent to {}. Enter your M-Pesa PIN to complete the deposit.",
            request.phone
        ),
        PaymentType::Withdrawal => format!(
            "Withdrawal of {} to {} is being processed.",
            request.amount, request.phone
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FakeGateway, MemoryPaymentStore};
    use std::str::FromStr;

    fn initiator(store: Arc<MemoryPaymentStore>, gateway: Arc<FakeGateway>) -> PaymentInitiator {
        PaymentInitiator::new(
            store,
            gateway,
            PhoneNormalizer::new("254"),
            PaymentSettings::new("KES", "https://api.example.com"),
        )
    }

    fn input(user_id: Uuid, amount: Value, kind: &str) -> ProcessPaymentRequest {
        ProcessPaymentRequest {
            uuid: user_id.to_string(),
            amount,
            phone_number: "0712345678".to_string(),
            payment_type: kind.to_string(),
        }
    }

    #[tokio::test]
    async fn deposit_persists_pending_request() {
        let store = Arc::new(MemoryPaymentStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let user = Uuid::new_v4();

        let response = initiator(store.clone(), gateway.clone())
            .initiate(input(user, json!(500), "deposit"))
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.status, "pending");
        assert!(response.reference.starts_with("DEP-"));
        assert_eq!(gateway.initiate_calls(), 1);

        let stored = store.get_request(&response.reference).await.unwrap().unwrap();
        assert_eq!(stored.phone, "254712345678");
        assert_eq!(stored.status, PaymentStatus::Pending);
        assert_eq!(
            stored.provider_reference,
            Some(format!("PRV-{}", response.reference))
        );

        let sent = gateway.last_instruction().unwrap();
        assert_eq!(sent.callback_url, "https://api.example.com/payments?action=callback");
    }

    #[tokio::test]
    async fn validation_errors_skip_provider_and_store() {
        let store = Arc::new(MemoryPaymentStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let service = initiator(store.clone(), gateway.clone());
        let user = Uuid::new_v4();

        let mut bad_phone = input(user, json!(500), "deposit");
        bad_phone.phone_number = "12345".to_string();

        for bad in [
            input(user, json!(-1), "deposit"),
            input(user, json!(500), "transfer"),
            ProcessPaymentRequest {
                uuid: String::new(),
                ..input(user, json!(500), "deposit")
            },
            bad_phone,
        ] {
            let err = service.initiate(bad).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);
        }

        assert_eq!(gateway.initiate_calls(), 0);
        assert_eq!(store.request_count(), 0);
    }

    #[tokio::test]
    async fn withdrawal_reserves_funds() {
        let store = Arc::new(MemoryPaymentStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let user = Uuid::new_v4();
        store.adjust_fiat_balance(user, &BigDecimal::from(1000)).await.unwrap();

        let response = initiator(store.clone(), gateway)
            .initiate(input(user, json!("250.50"), "withdrawal"))
            .await
            .unwrap();

        assert!(response.reference.starts_with("WDR-"));
        let balance = store.get_balance(user).await.unwrap().unwrap();
        assert_eq!(balance.fiat_balance, BigDecimal::from_str("749.50").unwrap());
    }

    #[tokio::test]
    async fn withdrawal_without_funds_is_rejected() {
        let store = Arc::new(MemoryPaymentStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let user = Uuid::new_v4();
        store.adjust_fiat_balance(user, &BigDecimal::from(100)).await.unwrap();

        let err = initiator(store.clone(), gateway.clone())
            .initiate(input(user, json!(500), "withdrawal"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InsufficientFunds(_)));
        assert_eq!(gateway.initiate_calls(), 0);
        assert_eq!(store.request_count(), 0);
    }

    #[tokio::test]
    async fn provider_failure_refunds_withdrawal_once() {
        let store = Arc::new(MemoryPaymentStore::new());
        let gateway = Arc::new(FakeGateway::new());
        gateway.fail_initiation(502);
        let user = Uuid::new_v4();
        store.adjust_fiat_balance(user, &BigDecimal::from(800)).await.unwrap();

        let err = initiator(store.clone(), gateway)
            .initiate(input(user, json!(500), "withdrawal"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));

        let balance = store.get_balance(user).await.unwrap().unwrap();
        assert_eq!(balance.fiat_balance, BigDecimal::from(800));

        let ledger = store.list_transactions(user, 10, 0).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].transaction_type, "refund");
        assert_eq!(ledger[0].amount, BigDecimal::from(500));
    }
}
