//! Scripted `PaymentGateway` for local runs and tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::json;

use crate::ports::{PaymentGateway, PaymentInstruction, ProviderReply};
use crate::provider::ProviderError;

pub const FAKE_CHECKOUT_ID: &str = "ws_CO_123";

/// Counts calls and answers with a configurable provider status. Initiation
/// replies carry `PRV-<reference>` as the provider reference.
pub struct FakeGateway {
    initiate_calls: AtomicUsize,
    status_calls: AtomicUsize,
    initiate_failure: Mutex<Option<u16>>,
    status_reply: Mutex<Result<String, u16>>,
    last_instruction: Mutex<Option<PaymentInstruction>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            initiate_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            initiate_failure: Mutex::new(None),
            status_reply: Mutex::new(Ok("PENDING".to_string())),
            last_instruction: Mutex::new(None),
        }
    }

    /// Every later initiation fails with this HTTP status.
    pub fn fail_initiation(&self, status: u16) {
        *lock(&self.initiate_failure) = Some(status);
    }

    pub fn set_status(&self, status: &str) {
        *lock(&self.status_reply) = Ok(status.to_string());
    }

    /// Status queries fail with this HTTP status until `set_status` is called.
    pub fn fail_status(&self, status: u16) {
        *lock(&self.status_reply) = Err(status);
    }

    pub fn initiate_calls(&self) -> usize {
        self.initiate_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn last_instruction(&self) -> Option<PaymentInstruction> {
        lock(&self.last_instruction).clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initiate(&self, instruction: &PaymentInstruction) -> Result<ProviderReply, ProviderError> {
        self.initiate_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_instruction) = Some(instruction.clone());

        if let Some(status) = *lock(&self.initiate_failure) {
            return Err(ProviderError::Status {
                status,
                body: "provider unavailable".to_string(),
            });
        }

        let provider_reference = format!("PRV-{}", instruction.reference);
        Ok(ProviderReply {
            status: Some("QUEUED".to_string()),
            provider_reference: Some(provider_reference.clone()),
            checkout_id: Some(FAKE_CHECKOUT_ID.to_string()),
            raw: json!({
                "success": true,
                "status": "QUEUED",
                "reference": provider_reference,
                "CheckoutRequestID": FAKE_CHECKOUT_ID,
            }),
        })
    }

    async fn query_status(&self, reference: &str) -> Result<ProviderReply, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let reply = lock(&self.status_reply).clone();
        match reply {
            Ok(status) => Ok(ProviderReply {
                status: Some(status.clone()),
                provider_reference: Some(reference.to_string()),
                checkout_id: None,
                raw: json!({ "status": status, "reference": reference }),
            }),
            Err(code) => Err(ProviderError::Status {
                status: code,
                body: "status lookup failed".to_string(),
            }),
        }
    }

    fn ready(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
