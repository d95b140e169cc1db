pub mod cache;
pub mod callback;
pub mod debug_log;
pub mod initiator;
pub mod poller;
pub mod processor;
pub mod settlement;

use std::time::Duration;

pub use cache::TtlCache;
pub use callback::{CallbackAck, CallbackHandler};
pub use debug_log::DebugLog;
pub use initiator::{PaymentInitiator, ProcessPaymentRequest, ProcessPaymentResponse};
pub use poller::StatusPoller;
pub use processor::{reconcile_batch, run_reconciler};

/// Rendered status responses keyed by payment reference.
pub type StatusCache = TtlCache<String, serde_json::Value>;

pub const DEFAULT_STATUS_TTL: Duration = Duration::from_secs(5);
pub const DEFAULT_DEGRADED_STATUS_TTL: Duration = Duration::from_secs(2);

/// Settings shared by the payment services.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub currency: String,
    pub callback_url: String,
    pub status_ttl: Duration,
    pub degraded_status_ttl: Duration,
}

impl PaymentSettings {
    pub fn new(currency: impl Into<String>, public_api_base_url: &str) -> Self {
        Self {
            currency: currency.into(),
            callback_url: callback_url(public_api_base_url),
            status_ttl: DEFAULT_STATUS_TTL,
            degraded_status_ttl: DEFAULT_DEGRADED_STATUS_TTL,
        }
    }

    pub fn with_status_ttl(mut self, ttl: Duration) -> Self {
        self.status_ttl = ttl;
        self.degraded_status_ttl = DEFAULT_DEGRADED_STATUS_TTL.min(ttl);
        self
    }
}

pub fn callback_url(public_api_base_url: &str) -> String {
    format!(
        "{}/payments?action=callback",
        public_api_base_url.trim_end_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_callback_url() {
        assert_eq!(
            callback_url("https://api.example.com/"),
            "https://api.example.com/payments?action=callback"
        );
    }

    #[test]
    fn degraded_ttl_never_exceeds_status_ttl() {
        let settings = PaymentSettings::new("KES", "http://localhost")
            .with_status_ttl(Duration::from_secs(1));
        assert_eq!(settings.degraded_status_ttl, Duration::from_secs(1));

        let settings = PaymentSettings::new("KES", "http://localhost");
        assert_eq!(settings.status_ttl, Duration::from_secs(5));
        assert_eq!(settings.degraded_status_ttl, Duration::from_secs(2));
    }
}
