use anyhow::Context;
use axum::http::{HeaderValue, Method};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::provider::{ProviderSettings, RetryPolicy};
use crate::services::PaymentSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub provider_base_url: String,
    pub provider_username: Option<String>,
    pub provider_password: Option<String>,
    pub provider_channel_id: Option<String>,
    pub public_api_base_url: String,
    pub allowed_origins: AllowedOrigins,
    pub country_prefix: String,
    pub fiat_currency: String,
    pub status_cache_ttl: Duration,
    pub provider_max_retries: u32,
    pub provider_retry_base: Duration,
    pub reconcile_interval: Option<Duration>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let provider_base_url = env::var("PROVIDER_BASE_URL").context("PROVIDER_BASE_URL is not set")?;
        url::Url::parse(&provider_base_url).context("PROVIDER_BASE_URL is not a valid URL")?;
        let public_api_base_url =
            env::var("PUBLIC_API_BASE_URL").context("PUBLIC_API_BASE_URL is not set")?;
        url::Url::parse(&public_api_base_url).context("PUBLIC_API_BASE_URL is not a valid URL")?;

        let country_prefix = env_or("COUNTRY_PREFIX", "254");
        if country_prefix.is_empty() || !country_prefix.chars().all(|c| c.is_ascii_digit()) {
            anyhow::bail!("COUNTRY_PREFIX must be digits only");
        }

        let reconcile_secs: u64 = env_or("RECONCILE_INTERVAL_SECS", "60")
            .parse()
            .context("RECONCILE_INTERVAL_SECS must be a number")?;

        Ok(Config {
            server_port: env_or("SERVER_PORT", "3000")
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
            provider_base_url,
            provider_username: optional_env("PROVIDER_API_USERNAME"),
            provider_password: optional_env("PROVIDER_API_PASSWORD"),
            provider_channel_id: optional_env("PROVIDER_CHANNEL_ID"),
            public_api_base_url,
            allowed_origins: parse_allowed_origins(&env_or("CORS_ALLOWED_ORIGINS", "*"))?,
            country_prefix,
            fiat_currency: env_or("FIAT_CURRENCY", "KES"),
            status_cache_ttl: Duration::from_secs(
                env_or("STATUS_CACHE_TTL_SECS", "5")
                    .parse()
                    .context("STATUS_CACHE_TTL_SECS must be a number")?,
            ),
            provider_max_retries: env_or("PROVIDER_MAX_RETRIES", "2")
                .parse()
                .context("PROVIDER_MAX_RETRIES must be a number")?,
            provider_retry_base: Duration::from_millis(
                env_or("PROVIDER_RETRY_BASE_MS", "500")
                    .parse()
                    .context("PROVIDER_RETRY_BASE_MS must be a number")?,
            ),
            reconcile_interval: (reconcile_secs > 0).then(|| Duration::from_secs(reconcile_secs)),
            log_format: parse_log_format(&env_or("LOG_FORMAT", "text"))?,
        })
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            base_url: self.provider_base_url.clone(),
            username: self.provider_username.clone(),
            password: self.provider_password.clone(),
            channel_id: self.provider_channel_id.clone(),
            retry: RetryPolicy {
                max_retries: self.provider_max_retries,
                base_delay: self.provider_retry_base,
                ..RetryPolicy::default()
            },
            ..ProviderSettings::default()
        }
    }

    pub fn payment_settings(&self) -> PaymentSettings {
        PaymentSettings::new(&self.fiat_currency, &self.public_api_base_url)
            .with_status_ttl(self.status_cache_ttl)
    }

    pub fn cors_layer(&self) -> CorsLayer {
        cors_layer(&self.allowed_origins)
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn parse_allowed_origins(raw: &str) -> anyhow::Result<AllowedOrigins> {
    let value = raw.trim();
    if value == "*" || value.is_empty() {
        return Ok(AllowedOrigins::Any);
    }

    let origins = value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parsed = url::Url::parse(entry)
                .with_context(|| format!("invalid CORS origin '{}'", entry))?;
            Ok(parsed.origin().ascii_serialization())
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    if origins.is_empty() {
        anyhow::bail!("CORS_ALLOWED_ORIGINS must be '*' or a comma-separated list of origins");
    }

    Ok(AllowedOrigins::List(origins))
}

fn parse_log_format(raw: &str) -> anyhow::Result<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "text" | "" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => anyhow::bail!("LOG_FORMAT must be 'text' or 'json', got '{}'", other),
    }
}

/// Preflight handling for the payment endpoint.
pub fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    match origins {
        AllowedOrigins::Any => layer.allow_origin(Any),
        AllowedOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect();
            layer.allow_origin(AllowOrigin::list(values))
        }
    }
}
