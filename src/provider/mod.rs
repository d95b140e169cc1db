pub mod auth;
pub mod client;
pub mod retry;

pub use auth::AuthTokenCache;
pub use client::{ProviderClient, ProviderError, ProviderSettings};
pub use retry::{backoff_delay, RetryPolicy};
