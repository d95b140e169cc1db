//! Asynchronous provider notifications.
//!
//! The provider retries any non-2xx answer, so [`CallbackHandler::handle`]
//! never fails: every outcome, including internal errors, is acknowledged.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use super::settlement::{self, Transition};
use super::{PaymentSettings, StatusCache};
use crate::domain::{PaymentStatus, ProviderUpdate};
use crate::ports::PaymentStore;
use crate::provider::client::string_field;
use crate::utils::sanitize::sanitize_json;

const REFERENCE_KEYS: &[&str] = &["ExternalReference", "external_reference", "User_Reference"];
const STATUS_KEYS: &[&str] = &["Status", "status"];
const RESULT_CODE_KEYS: &[&str] = &["ResultCode", "result_code"];
const PROVIDER_REFERENCE_KEYS: &[&str] = &["MpesaReceiptNumber", "provider_reference", "reference"];
const CHECKOUT_KEYS: &[&str] = &["CheckoutRequestID", "checkout_request_id"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct CallbackAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub message: String,
}

impl CallbackAck {
    fn new(reference: Option<String>, status: Option<PaymentStatus>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            reference,
            status: status.map(|s| s.to_string()),
            message: message.into(),
        }
    }
}

/// Fields extracted from a provider notification.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackPayload {
    pub reference: Option<String>,
    pub status: PaymentStatus,
    pub update: ProviderUpdate,
}

/// Reads a notification body. The interesting fields may be nested under
/// `response` or sit at the root.
pub fn parse_callback(raw: &Value) -> CallbackPayload {
    let body = raw.get("response").filter(|v| v.is_object()).unwrap_or(raw);

    let status = match string_field(body, STATUS_KEYS) {
        Some(status) => PaymentStatus::from_provider(&status),
        None => match string_field(body, RESULT_CODE_KEYS).as_deref() {
            Some("0") => PaymentStatus::Completed,
            Some(_) => PaymentStatus::Failed,
            None => PaymentStatus::Pending,
        },
    };

    CallbackPayload {
        reference: string_field(body, REFERENCE_KEYS),
        status,
        update: ProviderUpdate {
            provider_reference: string_field(body, PROVIDER_REFERENCE_KEYS),
            checkout_id: string_field(body, CHECKOUT_KEYS),
            provider_data: Some(raw.clone()),
        },
    }
}

pub struct CallbackHandler {
    store: Arc<dyn PaymentStore>,
    cache: Arc<StatusCache>,
    settings: PaymentSettings,
}

impl CallbackHandler {
    pub fn new(store: Arc<dyn PaymentStore>, cache: Arc<StatusCache>, settings: PaymentSettings) -> Self {
        Self {
            store,
            cache,
            settings,
        }
    }

    pub async fn handle(&self, body: &[u8]) -> CallbackAck {
        let raw: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, bytes = body.len(), "Ignoring unparseable payment callback");
                return CallbackAck::new(None, None, "Callback received");
            }
        };
        debug!(payload = %sanitize_json(&raw), "Payment callback received");

        let payload = parse_callback(&raw);
        let Some(reference) = payload.reference.clone() else {
            warn!("Payment callback without a reference");
            return CallbackAck::new(None, None, "Callback received");
        };

        let request = match self.store.get_request(&reference).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                warn!(reference = %reference, "Payment callback for unknown reference");
                return CallbackAck::new(Some(reference), None, "Callback received");
            }
            Err(err) => {
                error!(reference = %reference, error = %err, "Failed to load payment for callback");
                return CallbackAck::new(Some(reference), None, "Callback received");
            }
        };

        if request.status.is_terminal() {
            info!(
                reference = %reference,
                status = %request.status,
                "Payment already processed, ignoring callback"
            );
            return CallbackAck::new(Some(reference), Some(request.status), "Already processed");
        }

        let outcome = settlement::apply_status(
            self.store.as_ref(),
            &request,
            payload.status,
            &payload.update,
            &self.settings.currency,
        )
        .await;

        match outcome {
            Ok(transition) => {
                let current = transition.request().status;
                if current.is_terminal() {
                    self.cache.remove(&reference);
                }
                let message = match transition {
                    Transition::Settled(_) => "Payment processed",
                    Transition::AlreadySettled(_) => "Already processed",
                    Transition::Progressed(_) | Transition::Unchanged(_) => "Status recorded",
                };
                info!(reference = %reference, status = %current, outcome = message, "Payment callback handled");
                CallbackAck::new(Some(reference), Some(current), message)
            }
            Err(err) => {
                error!(
                    reference = %reference,
                    status = %payload.status,
                    error = %err,
                    "Failed to apply payment callback"
                );
                CallbackAck::new(Some(reference), None, "Callback received")
            }
        }
    }
}
