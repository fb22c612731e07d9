//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BAZAAR_DATABASE_URL` - Realtime Database root URL
//!   (e.g., `https://my-shop-default-rtdb.firebaseio.com`). Plain `http` is
//!   accepted only for a local emulator.
//!
//! ## Optional
//! - `BAZAAR_DATABASE_SECRET` - Database auth token (high entropy)
//! - `BAZAAR_DATA_DIR` - Directory for durable local state (default: `.bazaar`)
//! - `BAZAAR_PRODUCT_LIMIT` - Products requested per subscription (default: 50)
//! - `BAZAAR_LOCALE` - Language for user-facing messages, `en` or `es` (default: `en`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::services::auth::Locale;

const DEFAULT_PRODUCT_LIMIT: usize = 50;
const DEFAULT_DATA_DIR: &str = ".bazaar";

/// Tokens weaker than this many bits per character are rejected.
const MIN_TOKEN_BITS_PER_CHAR: f64 = 3.3;

/// Fragments that mark a token copied from a template, matched lowercase.
const TEMPLATE_MARKERS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Why the environment could not be turned into a [`StorefrontConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not set")]
    MissingEnvVar { key: &'static str },

    #[error("{key} is invalid: {reason}")]
    InvalidEnvVar { key: &'static str, reason: String },

    #[error("{key} is not safe to use: {reason}")]
    InsecureSecret { key: &'static str, reason: String },
}

/// Storefront configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    pub database: DatabaseConfig,
    /// Directory for durable local state (cart, snapshot)
    pub data_dir: PathBuf,
    /// Maximum products delivered by the catalog subscription
    pub product_limit: usize,
    pub locale: Locale,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Realtime Database connection settings.
///
/// `Debug` never prints the token.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Database root URL, always ending in `/`
    pub url: Url,
    /// Auth token appended to every request
    pub secret: Option<SecretString>,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_str())
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl StorefrontConfig {
    /// Read the configuration, loading a `.env` file first if there is one.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the database URL is missing or unusable,
    /// the token looks like a template value or is too predictable, or a
    /// numeric or locale setting does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is the normal case in production.
        let _ = dotenvy::dotenv();

        let product_limit = match env_var("BAZAAR_PRODUCT_LIMIT") {
            None => DEFAULT_PRODUCT_LIMIT,
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or_else(|| ConfigError::InvalidEnvVar {
                    key: "BAZAAR_PRODUCT_LIMIT",
                    reason: format!("expected a positive integer, got {raw:?}"),
                })?,
        };
        let locale = match env_var("BAZAAR_LOCALE") {
            None => Locale::default(),
            Some(raw) => raw.parse::<Locale>().map_err(|reason| ConfigError::InvalidEnvVar {
                key: "BAZAAR_LOCALE",
                reason,
            })?,
        };

        Ok(Self {
            database: DatabaseConfig::from_env()?,
            data_dir: env_var("BAZAAR_DATA_DIR").map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from),
            product_limit,
            locale,
            sentry_dsn: env_var("SENTRY_DSN"),
            sentry_environment: env_var("SENTRY_ENVIRONMENT"),
        })
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw = env_var("BAZAAR_DATABASE_URL").ok_or(ConfigError::MissingEnvVar {
            key: "BAZAAR_DATABASE_URL",
        })?;
        let secret = match env_var("BAZAAR_DATABASE_SECRET") {
            Some(token) => {
                check_token(&token).map_err(|reason| ConfigError::InsecureSecret {
                    key: "BAZAAR_DATABASE_SECRET",
                    reason,
                })?;
                Some(SecretString::from(token))
            }
            None => None,
        };
        Ok(Self {
            url: parse_database_url(&raw)?,
            secret,
        })
    }

    /// Connection settings for a database at `url` without auth.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL is not acceptable.
    pub fn unauthenticated(url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            url: parse_database_url(url)?,
            secret: None,
        })
    }

    /// The auth token, if one is configured.
    #[must_use]
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_ref().map(ExposeSecret::expose_secret)
    }
}

/// A set, non-blank environment variable.
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse the database root URL, normalizing it to end in `/`.
fn parse_database_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar {
        key: "BAZAAR_DATABASE_URL",
        reason,
    };

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| invalid("must have a host".to_string()))?
        .to_owned();

    match url.scheme() {
        "https" => {}
        "http" if matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]") => {}
        scheme => {
            return Err(invalid(format!(
                "scheme must be https (http only for a local emulator), got {scheme}"
            )));
        }
    }

    if url.query().is_some() {
        return Err(invalid("must not carry a query string".to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Bits of Shannon entropy per character of `token`.
fn bits_per_char(token: &str) -> f64 {
    let mut counts: HashMap<char, u32> = HashMap::new();
    for c in token.chars() {
        *counts.entry(c).or_default() += 1;
    }
    let total: u32 = counts.values().sum();
    if total == 0 {
        return 0.0;
    }

    let total = f64::from(total);
    counts
        .values()
        .map(|&n| {
            let share = f64::from(n) / total;
            -share * share.log2()
        })
        .sum()
}

/// Reject tokens that look copied from a template or are too predictable.
fn check_token(token: &str) -> Result<(), String> {
    let lower = token.to_lowercase();
    if let Some(marker) = TEMPLATE_MARKERS.iter().find(|m| lower.contains(**m)) {
        return Err(format!("looks like a template value (contains {marker:?})"));
    }

    let bits = bits_per_char(token);
    if bits < MIN_TOKEN_BITS_PER_CHAR {
        return Err(format!(
            "only {bits:.2} bits of entropy per character, at least {MIN_TOKEN_BITS_PER_CHAR:.1} required"
        ));
    }
    Ok(())
}
