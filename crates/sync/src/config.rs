//! Synchronizer configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required (for `sync` and `check`)
//! - `ZOHO_CLIENT_ID` - Zoho OAuth client ID
//! - `ZOHO_CLIENT_SECRET` - Zoho OAuth client secret
//! - `ZOHO_REFRESH_TOKEN` - Long-lived OAuth refresh token
//!
//! ## Optional
//! - `ZOHO_ACCESS_TOKEN` - Current access token (refreshed on demand if absent)
//! - `ZOHO_API_HOST` - API host (default: <https://www.zohoapis.com>)
//! - `ZOHO_ACCOUNTS_HOST` - OAuth host (default: <https://accounts.zoho.com>)
//! - `SYNC_ENVIRONMENT` - `test` or `production` (default: test)
//! - `ACCOUNT_IN_HOUSE` - Distributor account for in-house orders
//! - `ACCOUNT_DROP_SHIP` - Distributor account for drop-ship orders
//! - `FIREARM_ROUTING` - `in_house` or `drop_ship_ffl` (default: drop_ship_ffl)
//! - `SYNC_MAX_RETRIES` - Retries per CRM call (default: 2)
//! - `SYNC_RETRY_BASE_MS` - First retry delay in ms (default: 1000)
//! - `SYNC_PRODUCT_CONCURRENCY` - Parallel SKU resolutions (default: 4)
//! - `SYNC_DEAL_CONCURRENCY` - Parallel deal creations (default: 3)
//! - `PRODUCT_CACHE_SCOPE` - `order` or `service` (default: order)
//! - `PRODUCT_CACHE_TTL_SECS` - TTL of the service-wide cache (default: 3600)

use std::str::FromStr;
use std::time::Duration;

use fulfillment_core::{AccountTable, FirearmRouting, PartitionConfig};
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::retry::RetryPolicy;

const DEFAULT_API_HOST: &str = "https://www.zohoapis.com";
const DEFAULT_ACCOUNTS_HOST: &str = "https://accounts.zoho.com";
const DEFAULT_PRODUCT_CONCURRENCY: usize = 4;
const DEFAULT_DEAL_CONCURRENCY: usize = 3;
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Which distributor accounts deals are written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncEnvironment {
    #[default]
    Test,
    Production,
}

impl SyncEnvironment {
    #[must_use]
    pub fn default_accounts(self) -> AccountTable {
        match self {
            Self::Test => AccountTable::test_accounts(),
            Self::Production => AccountTable::production_accounts(),
        }
    }
}

impl FromStr for SyncEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" | "sandbox" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("expected test or production, got {other:?}")),
        }
    }
}

/// Lifetime of the SKU resolution cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductCacheScope {
    /// A fresh cache for every order.
    #[default]
    PerOrder,
    /// One cache shared by every order this process handles.
    Service { ttl: Duration },
}

/// Settings for partitioning, retries and concurrency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub environment: SyncEnvironment,
    pub partition: PartitionConfig,
    pub retry: RetryPolicy,
    pub product_concurrency: usize,
    pub deal_concurrency: usize,
    pub cache_scope: ProductCacheScope,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: SyncEnvironment::Test,
            partition: PartitionConfig::default(),
            retry: RetryPolicy::default(),
            product_concurrency: DEFAULT_PRODUCT_CONCURRENCY,
            deal_concurrency: DEFAULT_DEAL_CONCURRENCY,
            cache_scope: ProductCacheScope::PerOrder,
        }
    }
}

impl EngineConfig {
    /// Load engine settings from the process environment.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(&process_env)
    }

    /// Load engine settings from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_lookup(vars: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment: SyncEnvironment =
            parse_or_default(vars, "SYNC_ENVIRONMENT", SyncEnvironment::Test)?;

        let defaults = environment.default_accounts();
        let in_house = get_optional(vars, "ACCOUNT_IN_HOUSE").unwrap_or(defaults.in_house);
        let drop_ship =
            get_optional(vars, "ACCOUNT_DROP_SHIP").unwrap_or(defaults.drop_ship_customer);
        let accounts = AccountTable::with_codes(&in_house, &drop_ship);

        let firearm_routing: FirearmRouting =
            parse_or_default(vars, "FIREARM_ROUTING", FirearmRouting::DropShipToFfl)?;

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_retries: parse_or_default(vars, "SYNC_MAX_RETRIES", defaults.max_retries)?,
            base_delay: Duration::from_millis(parse_or_default(
                vars,
                "SYNC_RETRY_BASE_MS",
                u64::try_from(defaults.base_delay.as_millis()).unwrap_or(1000),
            )?),
            ..defaults
        };

        let product_concurrency = parse_positive(
            vars,
            "SYNC_PRODUCT_CONCURRENCY",
            DEFAULT_PRODUCT_CONCURRENCY,
        )?;
        let deal_concurrency =
            parse_positive(vars, "SYNC_DEAL_CONCURRENCY", DEFAULT_DEAL_CONCURRENCY)?;

        let cache_scope = match get_optional(vars, "PRODUCT_CACHE_SCOPE")
            .as_deref()
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            None | Some("order") => ProductCacheScope::PerOrder,
            Some("service") => ProductCacheScope::Service {
                ttl: Duration::from_secs(parse_or_default(
                    vars,
                    "PRODUCT_CACHE_TTL_SECS",
                    DEFAULT_CACHE_TTL_SECS,
                )?),
            },
            Some(other) => {
                return Err(ConfigError::InvalidEnvVar(
                    "PRODUCT_CACHE_SCOPE".to_string(),
                    format!("expected order or service, got {other:?}"),
                ));
            }
        };

        Ok(Self {
            environment,
            partition: PartitionConfig {
                firearm_routing,
                accounts,
            },
            retry,
            product_concurrency,
            deal_concurrency,
            cache_scope,
        })
    }
}

/// Zoho CRM API credentials and hosts.
///
/// Implements `Debug` manually to redact the OAuth secrets.
#[derive(Clone)]
pub struct ZohoConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: SecretString,
    /// Long-lived refresh token
    pub refresh_token: SecretString,
    /// Access token to start with, if one is at hand
    pub access_token: Option<SecretString>,
    /// API host, e.g. <https://www.zohoapis.com>
    pub api_host: Url,
    /// OAuth host, e.g. <https://accounts.zoho.com>
    pub accounts_host: Url,
}

impl std::fmt::Debug for ZohoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZohoConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_host", &self.api_host.as_str())
            .field("accounts_host", &self.accounts_host.as_str())
            .finish()
    }
}

impl ZohoConfig {
    /// Load Zoho credentials from the process environment.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, a host is not
    /// a valid URL, or a secret looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(&process_env)
    }

    /// Load Zoho credentials from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`ZohoConfig::from_env`].
    pub fn from_lookup(vars: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: get_required(vars, "ZOHO_CLIENT_ID")?,
            client_secret: get_validated_secret(vars, "ZOHO_CLIENT_SECRET")?,
            refresh_token: get_validated_secret(vars, "ZOHO_REFRESH_TOKEN")?,
            access_token: get_optional(vars, "ZOHO_ACCESS_TOKEN").map(SecretString::from),
            api_host: get_url(vars, "ZOHO_API_HOST", DEFAULT_API_HOST)?,
            accounts_host: get_url(vars, "ZOHO_ACCOUNTS_HOST", DEFAULT_ACCOUNTS_HOST)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get a required variable.
fn get_required(vars: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    get_optional(vars, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional variable. Blank values count as unset.
fn get_optional(vars: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    vars(key).filter(|value| !value.trim().is_empty())
}

/// Parse a variable, falling back to `default` when unset.
fn parse_or_default<T>(
    vars: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional(vars, key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse a concurrency limit, which must be at least 1.
fn parse_positive(
    vars: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    let value = parse_or_default(vars, key, default)?;
    if value == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be at least 1".to_string(),
        ));
    }
    Ok(value)
}

/// Parse a host URL, falling back to `default` when unset.
fn get_url(
    vars: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<Url, ConfigError> {
    let raw = get_optional(vars, key).unwrap_or_else(|| default.to_string());
    let url =
        Url::parse(&raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme {}", url.scheme()),
        ));
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq = std::collections::HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0usize) += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret.
fn get_validated_secret(
    vars: &dyn Fn(&str) -> Option<String>,
    key: &str,
) -> Result<SecretString, ConfigError> {
    let value = get_required(vars, key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const CLIENT_SECRET: &str = "8f3a1c9e27b45d60a1fe93c7b28d4e5f60a7c1b3";
    const REFRESH_TOKEN: &str = "1000.4b7e2f9a1c3d5e8f0a2b4c6d8e0f1a3b.9c8d7e6f5a4b3c2d1e0f";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn zoho_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("ZOHO_CLIENT_ID", "1000.ABCDEF"),
            ("ZOHO_CLIENT_SECRET", CLIENT_SECRET),
            ("ZOHO_REFRESH_TOKEN", REFRESH_TOKEN),
        ]
    }

    #[test]
    fn test_engine_defaults() {
        let config = EngineConfig::from_lookup(&lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.partition.accounts.in_house, "99901");
        assert_eq!(config.retry.max_retries, 2);
    }

    #[test]
    fn test_engine_production_accounts() {
        let config =
            EngineConfig::from_lookup(&lookup(&[("SYNC_ENVIRONMENT", "production")])).unwrap();
        assert_eq!(config.partition.accounts.in_house, "60742");
        assert_eq!(config.partition.accounts.drop_ship_ffl, "63824");
    }

    #[test]
    fn test_engine_overrides() {
        let config = EngineConfig::from_lookup(&lookup(&[
            ("ACCOUNT_IN_HOUSE", "11111"),
            ("FIREARM_ROUTING", "in_house"),
            ("SYNC_MAX_RETRIES", "0"),
            ("SYNC_DEAL_CONCURRENCY", "2"),
            ("PRODUCT_CACHE_SCOPE", "service"),
            ("PRODUCT_CACHE_TTL_SECS", "60"),
        ]))
        .unwrap();

        assert_eq!(config.partition.accounts.in_house, "11111");
        assert_eq!(config.partition.accounts.drop_ship_customer, "99902");
        assert_eq!(config.partition.firearm_routing, FirearmRouting::InHouse);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.deal_concurrency, 2);
        assert_eq!(
            config.cache_scope,
            ProductCacheScope::Service {
                ttl: Duration::from_secs(60)
            }
        );
    }

    #[test]
    fn test_engine_rejects_bad_values() {
        let err = EngineConfig::from_lookup(&lookup(&[("SYNC_MAX_RETRIES", "two")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "SYNC_MAX_RETRIES"));

        let err =
            EngineConfig::from_lookup(&lookup(&[("SYNC_PRODUCT_CONCURRENCY", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));

        let err = EngineConfig::from_lookup(&lookup(&[("PRODUCT_CACHE_SCOPE", "global")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_zoho_config_loads() {
        let config = ZohoConfig::from_lookup(&lookup(&zoho_vars())).unwrap();
        assert_eq!(config.client_id, "1000.ABCDEF");
        assert_eq!(config.api_host.as_str(), "https://www.zohoapis.com/");
        assert!(config.access_token.is_none());
    }

    #[test]
    fn test_zoho_config_missing_refresh_token() {
        let vars: Vec<_> = zoho_vars()
            .into_iter()
            .filter(|(k, _)| *k != "ZOHO_REFRESH_TOKEN")
            .collect();
        let err = ZohoConfig::from_lookup(&lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "ZOHO_REFRESH_TOKEN"));
    }

    #[test]
    fn test_zoho_config_rejects_placeholder() {
        let mut vars = zoho_vars();
        vars[1] = ("ZOHO_CLIENT_SECRET", "your-client-secret");
        let err = ZohoConfig::from_lookup(&lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_zoho_config_rejects_bad_host() {
        let mut vars = zoho_vars();
        vars.push(("ZOHO_API_HOST", "not a url"));
        let err = ZohoConfig::from_lookup(&lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "ZOHO_API_HOST"));
    }

    #[test]
    fn test_zoho_config_debug_redacts_secrets() {
        let config = ZohoConfig::from_lookup(&lookup(&zoho_vars())).unwrap();
        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("1000.ABCDEF"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(CLIENT_SECRET));
        assert!(!debug_output.contains(REFRESH_TOKEN));
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaa") - 0.0).abs() < f64::EPSILON);
        assert!(shannon_entropy(CLIENT_SECRET) > MIN_ENTROPY_BITS_PER_CHAR);
    }
}
