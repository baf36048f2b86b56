//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `MARIGOLD_API_BASE_URL` - Remote service base URL (default: `http://localhost:8080/api/v1`)
//! - `MARIGOLD_API_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `MARIGOLD_API_TOKEN` - Static bearer token, used when the session holds none
//! - `MARIGOLD_CACHE_TTL_SECS` - Lifetime of cached query results (default: 300)
//! - `MARIGOLD_CACHE_CAPACITY` - Maximum cached query results (default: 1000)
//! - `MARIGOLD_SESSION_FILE` - Session store path for the CLI (default: `.marigold-session.json`)
//! - `MARIGOLD_LOG_FORMAT` - `json` for structured logs, anything else for text
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/v1";
const DEFAULT_TIMEOUT_SECS: &str = "10";
const DEFAULT_CACHE_TTL_SECS: &str = "300";
const DEFAULT_CACHE_CAPACITY: &str = "1000";
const DEFAULT_SESSION_FILE: &str = ".marigold-session.json";

const MIN_TOKEN_LENGTH: usize = 16;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &["your-", "changeme", "placeholder", "xxx", "todo", "insert"];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Log output format for the CLI subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Storefront client configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the remote catalog/cart/order service
    pub api_base_url: Url,
    /// Timeout applied to every remote call
    pub request_timeout: Duration,
    /// Static bearer token (the session token takes precedence)
    pub api_token: Option<SecretString>,
    /// How long a cached query result stays fresh
    pub cache_ttl: Duration,
    /// Maximum number of cached query results
    pub cache_capacity: u64,
    /// Path of the JSON session file used by the CLI
    pub session_file: PathBuf,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_capacity", &self.cache_capacity)
            .field("session_file", &self.session_file)
            .field("log_format", &self.log_format)
            .field("sentry_dsn", &self.sentry_dsn)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid, or if the
    /// API token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let api_base_url = parse_base_url(&env_or("MARIGOLD_API_BASE_URL", DEFAULT_API_BASE_URL))?;
        let request_timeout = Duration::from_secs(parse_var(
            "MARIGOLD_API_TIMEOUT_SECS",
            &env_or("MARIGOLD_API_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        )?);
        let cache_ttl = Duration::from_secs(parse_var(
            "MARIGOLD_CACHE_TTL_SECS",
            &env_or("MARIGOLD_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS),
        )?);
        let cache_capacity = parse_var(
            "MARIGOLD_CACHE_CAPACITY",
            &env_or("MARIGOLD_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY),
        )?;

        let api_token = match lookup("MARIGOLD_API_TOKEN") {
            Some(token) => {
                validate_token(&token, "MARIGOLD_API_TOKEN")?;
                Some(SecretString::from(token))
            }
            None => None,
        };

        let log_format = match lookup("MARIGOLD_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            api_base_url,
            request_timeout,
            api_token,
            cache_ttl,
            cache_capacity,
            session_file: PathBuf::from(env_or("MARIGOLD_SESSION_FILE", DEFAULT_SESSION_FILE)),
            log_format,
            sentry_dsn: lookup("SENTRY_DSN").filter(|dsn| !dsn.is_empty()),
        })
    }

    /// Returns the exposed token, if any.
    #[must_use]
    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_ref().map(ExposeSecret::expose_secret)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a variable into any `FromStr` type.
fn parse_var<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse the base URL, requiring http(s) and dropping any trailing slash.
fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let invalid = |msg: String| ConfigError::InvalidEnvVar("MARIGOLD_API_BASE_URL".to_string(), msg);

    let url = Url::parse(value.trim().trim_end_matches('/')).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("must be a base URL".to_string()));
    }
    Ok(url)
}

/// Reject tokens that are obviously placeholders or too short to be real.
fn validate_token(token: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = token.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }
    if token.len() < MIN_TOKEN_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {MIN_TOKEN_LENGTH} characters (got {})",
                token.len()
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.api_base_url.as_str(), DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.cache_capacity, 1000);
        assert!(config.api_token.is_none());
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_built_in_base_url_is_accepted() {
        let url = parse_base_url(DEFAULT_API_BASE_URL).unwrap();
        assert_eq!(url.as_str(), DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("MARIGOLD_API_BASE_URL", "https://shop.example.vn/api/v1/"),
            ("MARIGOLD_API_TIMEOUT_SECS", "3"),
            ("MARIGOLD_LOG_FORMAT", "json"),
            ("SENTRY_DSN", ""),
        ]))
        .unwrap();
        assert_eq!(config.api_base_url.as_str(), "https://shop.example.vn/api/v1");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_invalid_number() {
        let err = ClientConfig::from_lookup(lookup_from(&[("MARIGOLD_CACHE_TTL_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "MARIGOLD_CACHE_TTL_SECS"));
    }

    #[test]
    fn test_invalid_scheme() {
        let err = ClientConfig::from_lookup(lookup_from(&[("MARIGOLD_API_BASE_URL", "ftp://shop")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_placeholder_token_rejected() {
        let result = validate_token("your-token-goes-here", "MARIGOLD_API_TOKEN");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
        assert!(validate_token("short", "MARIGOLD_API_TOKEN").is_err());
        assert!(validate_token("eyJhbGciOiJIUzI1NiJ9.abc", "MARIGOLD_API_TOKEN").is_ok());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ClientConfig::from_lookup(lookup_from(&[(
            "MARIGOLD_API_TOKEN",
            "eyJhbGciOiJIUzI1NiJ9.abc",
        )]))
        .unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("eyJhbGci"));
        assert_eq!(config.api_token(), Some("eyJhbGciOiJIUzI1NiJ9.abc"));
    }
}
