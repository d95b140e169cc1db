use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Mutex;
use tokio::time::{Duration, Instant};

use super::ProviderError;

pub const AUTH_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Basic-Auth header value for the provider, rebuilt once an hour.
pub struct AuthTokenCache {
    username: Option<String>,
    password: Option<String>,
    ttl: Duration,
    cached: Mutex<Option<(String, Instant)>>,
}

impl AuthTokenCache {
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        Self::with_ttl(username, password, AUTH_TOKEN_TTL)
    }

    pub fn with_ttl(username: Option<String>, password: Option<String>, ttl: Duration) -> Self {
        Self {
            username: username.filter(|v| !v.is_empty()),
            password: password.filter(|v| !v.is_empty()),
            ttl,
            cached: Mutex::new(None),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub fn header_value(&self) -> Result<String, ProviderError> {
        let mut cached = self
            .cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some((token, expires_at)) = cached.as_ref() {
            if Instant::now() < *expires_at {
                return Ok(token.clone());
            }
        }

        let (username, password) = match (&self.username, &self.password) {
            (Some(u), Some(p)) => (u, p),
            _ => return Err(ProviderError::MissingCredentials),
        };

        let token = format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)));
        *cached = Some((token.clone(), Instant::now() + self.ttl));
        tracing::debug!("Provider auth token generated");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_basic_header() {
        let cache = AuthTokenCache::new(Some("user".into()), Some("pass".into()));
        assert_eq!(cache.header_value().unwrap(), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn missing_credentials_fail_fast() {
        let cache = AuthTokenCache::new(Some("user".into()), None);
        assert!(matches!(cache.header_value(), Err(ProviderError::MissingCredentials)));

        let cache = AuthTokenCache::new(Some(String::new()), Some("pass".into()));
        assert!(!cache.has_credentials());
        assert!(matches!(cache.header_value(), Err(ProviderError::MissingCredentials)));
    }

    #[tokio::test(start_paused = true)]
    async fn token_expires_on_wall_clock() {
        let cache = AuthTokenCache::with_ttl(
            Some("user".into()),
            Some("pass".into()),
            Duration::from_secs(10),
        );
        let first = cache.header_value().unwrap();
        let first_expiry = cache.cached.lock().unwrap().as_ref().map(|(_, at)| *at);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.header_value().unwrap(), first);
        let reused_expiry = cache.cached.lock().unwrap().as_ref().map(|(_, at)| *at);
        assert_eq!(first_expiry, reused_expiry);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.header_value().unwrap(), first);
        let renewed_expiry = cache.cached.lock().unwrap().as_ref().map(|(_, at)| *at);
        assert!(renewed_expiry > first_expiry);
    }
}
