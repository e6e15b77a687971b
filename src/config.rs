//! Backend endpoint configuration loaded from environment.

use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Hosted-backend configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project base URL, without a trailing slash.
    pub base_url: String,
    /// Public (anonymous) API key sent as the `apikey` header.
    pub anon_key: String,
    /// Timeout applied to every backend call.
    pub http_timeout: Duration,
}

impl BackendConfig {
    /// Load from `PORTAL_BACKEND_URL` and `PORTAL_ANON_KEY`.
    /// Returns `None` if either is missing (auth will be disabled).
    /// `PORTAL_HTTP_TIMEOUT_SECS` is optional and defaults to 10.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("PORTAL_BACKEND_URL").ok()?;
        let anon_key = std::env::var("PORTAL_ANON_KEY").ok()?;
        let timeout_secs = env_parse("PORTAL_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS);
        Some(Self::new(base_url, anon_key, Duration::from_secs(timeout_secs)))
    }

    #[must_use]
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>, http_timeout: Duration) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, anon_key: anon_key.into(), http_timeout }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
