//! Client-driven status resolution: cache, then the stored record, then the
//! provider.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::settlement;
use super::{PaymentSettings, StatusCache};
use crate::domain::{PaymentRequest, PaymentStatus, ProviderUpdate};
use crate::error::AppError;
use crate::ports::{PaymentGateway, PaymentStore};
use crate::utils::decimal_json;

pub struct StatusPoller {
    store: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    cache: Arc<StatusCache>,
    settings: PaymentSettings,
}

impl StatusPoller {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        cache: Arc<StatusCache>,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            cache,
            settings,
        }
    }

    /// Drops expired status entries. Returns how many were removed.
    pub fn purge_cache(&self) -> usize {
        self.cache.purge_expired()
    }

    pub async fn status(&self, reference: &str) -> Result<Value, AppError> {
        let key = reference.to_string();
        if let Some(cached) = self.cache.get(&key) {
            debug!(reference, "Status served from cache");
            return Ok(cached);
        }

        let request = self
            .store
            .get_request(reference)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("payment {}", reference)))?;

        if request.status.is_terminal() {
            let body = render(&request);
            self.cache.insert(key, body.clone(), self.settings.status_ttl);
            return Ok(body);
        }

        let lookup = request
            .provider_reference
            .as_deref()
            .unwrap_or(&request.reference);

        match self.gateway.query_status(lookup).await {
            Ok(reply) => {
                let status = reply
                    .status
                    .as_deref()
                    .map(PaymentStatus::from_provider)
                    .unwrap_or(request.status);
                let update = ProviderUpdate {
                    provider_reference: reply.provider_reference.or_else(|| request.provider_reference.clone()),
                    checkout_id: reply.checkout_id.or_else(|| request.checkout_id.clone()),
                    provider_data: Some(reply.raw),
                };

                let transition = settlement::apply_status(
                    self.store.as_ref(),
                    &request,
                    status,
                    &update,
                    &self.settings.currency,
                )
                .await?;

                if let settlement::Transition::Settled(settled) = &transition {
                    info!(
                        reference,
                        status = %settled.status,
                        "Payment settled from status poll"
                    );
                }

                let body = render(transition.request());
                self.cache.insert(key, body.clone(), self.settings.status_ttl);
                Ok(body)
            }
            Err(err) => {
                warn!(
                    reference,
                    error = %err,
                    "Provider status query failed, serving stored status"
                );
                let body = render(&request);
                self.cache
                    .insert(key, body.clone(), self.settings.degraded_status_ttl);
                Ok(body)
            }
        }
    }

    /// Drops any cached answer and resolves the reference again.
    pub async fn refresh(&self, reference: &str) -> Result<Value, AppError> {
        self.cache.remove(&reference.to_string());
        self.status(reference).await
    }
}

pub fn render(request: &PaymentRequest) -> Value {
    json!({
        "success": true,
        "reference": request.reference,
        "status": request.status.as_str(),
        "type": request.payment_type.as_str(),
        "amount": decimal_json(&request.amount),
        "created_at": request.created_at.to_rfc3339(),
        "updated_at": request.updated_at.to_rfc3339(),
        "provider_reference": request.provider_reference,
        "checkout_id": request.checkout_id,
        "provider_data": request.provider_data,
    })
}
