//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use catalog_auth::{JwtTokenValidator, TokenError, TokenValidator};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("token validation needs PUBLIC_KEY or JWT_SECRET")]
    MissingVerificationKey,

    #[error("invalid verification key: {0}")]
    Key(#[from] TokenError),
}

/// How consumers verify bearer tokens.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthKey {
    /// Base64-encoded RSA public key PEM (RS256).
    PublicKey(String),
    /// Shared secret (HS256).
    Secret(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub key: Option<AuthKey>,
}

impl AuthConfig {
    pub fn validator(&self) -> Result<Arc<dyn TokenValidator>, ConfigError> {
        let validator = match &self.key {
            Some(AuthKey::PublicKey(pem)) => JwtTokenValidator::rs256_base64_pem(pem, &self.issuer, &self.audience)?,
            Some(AuthKey::Secret(secret)) => JwtTokenValidator::hs256(secret.as_bytes(), &self.issuer, &self.audience),
            None => return Err(ConfigError::MissingVerificationKey),
        };
        Ok(Arc::new(validator))
    }
}

impl core::fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PublicKey(_) => f.write_str("PublicKey(..)"),
            Self::Secret(_) => f.write_str("Secret(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub bind_addr: SocketAddr,
    /// Base of every `href` in responses.
    pub host_url: String,
    /// Base the joiner reads sibling entities from.
    pub service_url: String,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub topic_partitions: u32,
    pub fetch_timeout: Duration,
    pub auth: AuthConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            host_url: String::new(),
            service_url: "http://localhost:8080".to_string(),
            database_url: None,
            redis_url: None,
            topic_partitions: 3,
            fetch_timeout: Duration::from_millis(5_000),
            auth: AuthConfig {
                issuer: String::new(),
                audience: String::new(),
                key: None,
            },
        }
    }
}

impl CatalogConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "BIND_ADDR",
                reason: e.to_string(),
            })?,
            None => defaults.bind_addr,
        };

        let topic_partitions = match get("TOPIC_PARTITIONS") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "TOPIC_PARTITIONS",
                        reason: format!("expected a positive integer, got {raw:?}"),
                    });
                }
            },
            None => defaults.topic_partitions,
        };

        let fetch_timeout = match get("FETCH_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "FETCH_TIMEOUT_MS",
                reason: e.to_string(),
            })?),
            None => defaults.fetch_timeout,
        };

        let key = match (get("PUBLIC_KEY"), get("JWT_SECRET")) {
            (Some(pem), secret) => {
                if secret.is_some() {
                    warn!("both PUBLIC_KEY and JWT_SECRET set; using PUBLIC_KEY");
                }
                Some(AuthKey::PublicKey(pem))
            }
            (None, Some(secret)) => Some(AuthKey::Secret(secret)),
            (None, None) => None,
        };

        Ok(Self {
            bind_addr,
            host_url: get("HOST_URL").unwrap_or(defaults.host_url),
            service_url: get("SERVICE_URL").unwrap_or(defaults.service_url),
            database_url: get("DATABASE_URL"),
            redis_url: get("REDIS_URL"),
            topic_partitions,
            fetch_timeout,
            auth: AuthConfig {
                issuer: get("JWT_ISSUER").unwrap_or_default(),
                audience: get("AUDIENCE").unwrap_or_default(),
                key,
            },
        })
    }
}
