//! Environment configuration.
//!
//! SYSTEM CONTEXT
//! ==============
//! The hosted auth/database service is reached with a base URL and an
//! anonymous API key, both read once at process start. A missing key is a
//! fatal startup condition — the process must refuse to serve rather than
//! run with every backend call doomed to 401.

/// Backend service coordinates loaded from environment.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the hosted service, without a trailing slash.
    pub url: String,
    /// Anonymous (publishable) API key sent with every backend request.
    pub anon_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("BACKEND_URL is not set")]
    MissingUrl,
    #[error("BACKEND_ANON_KEY is not set")]
    MissingKey,
}

impl BackendConfig {
    /// Load from `BACKEND_URL` and `BACKEND_ANON_KEY`.
    ///
    /// # Errors
    ///
    /// Returns an error if either variable is missing or blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::var("BACKEND_URL").ok(), std::env::var("BACKEND_ANON_KEY").ok())
    }

    pub(crate) fn from_vars(url: Option<String>, anon_key: Option<String>) -> Result<Self, ConfigError> {
        let url = url
            .map(|u| u.trim().trim_end_matches('/').to_owned())
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingUrl)?;
        let anon_key = anon_key
            .map(|k| k.trim().to_owned())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingKey)?;
        Ok(Self { url, anon_key })
    }
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

/// Whether session cookies should carry the `Secure` attribute.
///
/// `COOKIE_SECURE` overrides; otherwise inferred from `PUBLIC_BASE_URL`.
#[must_use]
pub fn cookie_secure() -> bool {
    cookie_secure_from(
        env_bool("COOKIE_SECURE"),
        std::env::var("PUBLIC_BASE_URL").ok().as_deref(),
    )
}

pub(crate) fn cookie_secure_from(override_flag: Option<bool>, base_url: Option<&str>) -> bool {
    override_flag.unwrap_or_else(|| base_url.map_or(false, |uri| uri.starts_with("https://")))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
