//! Connector configuration
//!
//! Loaded from TOML text or environment variables, with defaults for every
//! field and validation before use.

use serde::Deserialize;
use serde::Serialize;
use warden_errors::Error;
use warden_errors::Result;

/// Default values for configuration
mod defaults {
    // Signing defaults
    pub fn sign_max_attempts() -> u32 { 10 }

    // Pagination defaults
    pub fn list_default_limit() -> u64 { 100 }
    pub fn list_max_limit() -> u64 { 1000 }
}

/// Ethereum signing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Vault sign calls made before giving up on a low-S signature
    #[serde(default = "defaults::sign_max_attempts")]
    pub max_attempts: u32,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::sign_max_attempts(),
        }
    }
}

/// List/ListDeleted page sizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size used when the caller passes `limit = 0`
    #[serde(default = "defaults::list_default_limit")]
    pub default_limit: u64,
    /// Upper bound on any requested page size
    #[serde(default = "defaults::list_max_limit")]
    pub max_limit: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: defaults::list_default_limit(),
            max_limit: defaults::list_max_limit(),
        }
    }
}

impl PaginationConfig {
    /// Page size actually sent to the database for a requested `limit`.
    pub fn effective_limit(&self, limit: u64) -> u64 {
        match limit {
            0 => self.default_limit,
            n => n.min(self.max_limit),
        }
    }
}

/// Root configuration for the connector layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorsConfig {
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
}

impl ConnectorsConfig {
    /// Parse and validate TOML text. Missing sections take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| Error::config(format!("invalid connectors configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `WARDEN_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            signing: SigningConfig {
                max_attempts: parse_var(&lookup, "WARDEN_SIGN_MAX_ATTEMPTS", defaults::sign_max_attempts)?,
            },
            pagination: PaginationConfig {
                default_limit: parse_var(&lookup, "WARDEN_LIST_DEFAULT_LIMIT", defaults::list_default_limit)?,
                max_limit: parse_var(&lookup, "WARDEN_LIST_MAX_LIMIT", defaults::list_max_limit)?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.signing.max_attempts == 0 {
            return Err(Error::config("signing.max_attempts must be at least 1"));
        }
        if self.pagination.max_limit == 0 {
            return Err(Error::config("pagination.max_limit must be at least 1"));
        }
        if self.pagination.default_limit > self.pagination.max_limit {
            return Err(Error::config(format!(
                "pagination.default_limit ({}) exceeds pagination.max_limit ({})",
                self.pagination.default_limit, self.pagination.max_limit
            )));
        }
        Ok(())
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: fn() -> T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default()),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::config(format!("{key}='{raw}' is not a valid number: {e}"))),
    }
}
