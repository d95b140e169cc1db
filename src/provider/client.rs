use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use super::auth::AuthTokenCache;
use super::retry::RetryPolicy;
use crate::domain::PaymentType;
use crate::ports::{PaymentGateway, PaymentInstruction, ProviderReply};
use crate::utils::decimal_json;

/// Network code the provider uses for M-Pesa payouts.
const MOBILE_NETWORK_CODE: &str = "63902";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),
    #[error("provider API credentials are not configured")]
    MissingCredentials,
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub channel_id: Option<String>,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: None,
            password: None,
            channel_id: None,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client for the mobile-money provider API
pub struct ProviderClient {
    client: Client,
    base_url: String,
    channel_id: Option<String>,
    auth: AuthTokenCache,
    retry: RetryPolicy,
}

impl ProviderClient {
    pub fn new(settings: ProviderSettings) -> Self {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .unwrap_or_default();

        ProviderClient {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            channel_id: settings.channel_id,
            auth: AuthTokenCache::new(settings.username, settings.password),
            retry: settings.retry,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a request and parses a JSON body, retrying non-2xx and
    /// empty or malformed responses with exponential backoff.
    pub async fn send_json(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, ProviderError> {
        let auth_header = self.auth.header_value()?;
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(reqwest::header::AUTHORIZATION, &auth_header)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            let outcome = match request.send().await {
                Ok(response) => read_json(response).await,
                Err(e) => Err(ProviderError::from(e)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        url = %url,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Provider call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        url = %url,
                        attempts = attempt + 1,
                        error = %e,
                        "Provider call failed, giving up"
                    );
                    return Err(e);
                }
            }
        }
    }

    fn deposit_payload(&self, instruction: &PaymentInstruction) -> Value {
        json!({
            "amount": decimal_json(&instruction.amount),
            "phone_number": instruction.phone,
            "channel_id": self.channel_id,
            "provider": "m-pesa",
            "external_reference": instruction.reference,
            "callback_url": instruction.callback_url,
        })
    }

    fn withdrawal_payload(&self, instruction: &PaymentInstruction) -> Value {
        json!({
            "amount": decimal_json(&instruction.amount),
            "phone_number": instruction.phone,
            "network_code": MOBILE_NETWORK_CODE,
            "external_reference": instruction.reference,
            "callback_url": instruction.callback_url,
            "channel": "mobile",
            "channel_id": self.channel_id,
        })
    }
}

#[async_trait]
impl PaymentGateway for ProviderClient {
    async fn initiate(&self, instruction: &PaymentInstruction) -> Result<ProviderReply, ProviderError> {
        let (path, payload) = match instruction.payment_type {
            PaymentType::Deposit => ("payments", self.deposit_payload(instruction)),
            PaymentType::Withdrawal => ("withdraw", self.withdrawal_payload(instruction)),
        };

        tracing::info!(
            reference = %instruction.reference,
            payment_type = %instruction.payment_type,
            amount = %instruction.amount,
            "Initiating provider payment"
        );

        let raw = self.send_json(Method::POST, path, &[], Some(&payload)).await?;
        Ok(parse_reply(raw))
    }

    async fn query_status(&self, reference: &str) -> Result<ProviderReply, ProviderError> {
        let raw = self
            .send_json(Method::GET, "transaction-status", &[("reference", reference)], None)
            .await?;
        Ok(parse_reply(raw))
    }

    fn ready(&self) -> Result<(), ProviderError> {
        self.auth.header_value().map(|_| ())
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, ProviderError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body,
        });
    }
    if body.trim().is_empty() {
        return Err(ProviderError::InvalidResponse("empty body".to_string()));
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// First non-empty string (or number) found under any of `keys`.
pub fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

pub fn parse_reply(raw: Value) -> ProviderReply {
    ProviderReply {
        status: string_field(&raw, &["status", "Status"]),
        provider_reference: string_field(
            &raw,
            &["reference", "provider_reference", "third_party_reference"],
        ),
        checkout_id: string_field(&raw, &["CheckoutRequestID", "checkout_request_id"]),
        raw,
    }
}
