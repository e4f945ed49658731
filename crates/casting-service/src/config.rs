//! Casting service configuration.
//!
//! Configuration is loaded from environment variables. The database URL is
//! held as a secret and redacted in Debug output.

use crate::auth::jwks::is_asymmetric;
use crate::auth::jwt::VerifierSettings;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use jsonwebtoken::Algorithm;
use reqwest::Url;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default accepted token algorithms.
pub const DEFAULT_ALLOWED_ALGORITHMS: &str = "RS256,EdDSA";

/// Default JWKS fetch timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Upper bound for `PAGE_SIZE`.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Casting service configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: SecretString,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// JWKS endpoint of the token issuer.
    pub jwks_url: String,

    /// Required token issuer (`iss`).
    pub jwt_issuer: String,

    /// Audience this service accepts (`aud`).
    pub jwt_audience: String,

    /// Token algorithms accepted (asymmetric only).
    pub jwt_allowed_algorithms: Vec<Algorithm>,

    /// Clock skew tolerance for `iat`.
    pub jwt_clock_skew: Duration,

    /// Timeout for each JWKS fetch.
    pub jwks_fetch_timeout: Duration,

    /// Periodic key set refresh; `None` disables it.
    pub jwks_refresh_interval: Option<Duration>,

    /// Rows per page on list endpoints.
    pub page_size: u32,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("jwks_url", &self.jwks_url)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("jwt_allowed_algorithms", &self.jwt_allowed_algorithms)
            .field("jwt_clock_skew", &self.jwt_clock_skew)
            .field("jwks_fetch_timeout", &self.jwks_fetch_timeout)
            .field("jwks_refresh_interval", &self.jwks_refresh_interval)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWKS URL: {0}")]
    InvalidJwksUrl(String),

    #[error("Invalid JWT algorithm configuration: {0}")]
    InvalidAlgorithms(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid duration configuration: {0}")]
    InvalidDuration(String),

    #[error("Invalid page size configuration: {0}")]
    InvalidPageSize(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = SecretString::from(required(vars, "DATABASE_URL")?);

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let jwks_url = required(vars, "JWKS_URL")?;
        validate_jwks_url(&jwks_url)?;

        let jwt_issuer = required(vars, "JWT_ISSUER")?;
        let jwt_audience = required(vars, "JWT_AUDIENCE")?;

        let jwt_allowed_algorithms = parse_algorithms(
            vars.get("JWT_ALLOWED_ALGORITHMS")
                .map_or(DEFAULT_ALLOWED_ALGORITHMS, String::as_str),
        )?;

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidJwtClockSkew(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got 0".to_string(),
                ));
            }

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_CLOCK_SKEW
        };

        let jwks_fetch_timeout = match parse_seconds(vars, "JWKS_FETCH_TIMEOUT_SECONDS")? {
            Some(0) => {
                return Err(ConfigError::InvalidDuration(
                    "JWKS_FETCH_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ))
            }
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_secs(DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS),
        };

        let jwks_refresh_interval = match parse_seconds(vars, "JWKS_REFRESH_INTERVAL_SECONDS")? {
            None | Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        };

        let page_size = if let Some(value_str) = vars.get("PAGE_SIZE") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidPageSize(format!(
                    "PAGE_SIZE must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 || value > MAX_PAGE_SIZE {
                return Err(ConfigError::InvalidPageSize(format!(
                    "PAGE_SIZE must be between 1 and {}, got {}",
                    MAX_PAGE_SIZE, value
                )));
            }

            value
        } else {
            DEFAULT_PAGE_SIZE
        };

        Ok(Config {
            database_url,
            bind_address,
            jwks_url,
            jwt_issuer,
            jwt_audience,
            jwt_allowed_algorithms,
            jwt_clock_skew,
            jwks_fetch_timeout,
            jwks_refresh_interval,
            page_size,
        })
    }

    /// Token trust settings derived from this configuration.
    pub fn verifier_settings(&self) -> VerifierSettings {
        VerifierSettings {
            issuer: self.jwt_issuer.clone(),
            audience: self.jwt_audience.clone(),
            allowed_algorithms: self.jwt_allowed_algorithms.clone(),
            clock_skew: self.jwt_clock_skew,
        }
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|value| !value.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_seconds(vars: &HashMap<String, String>, name: &str) -> Result<Option<u64>, ConfigError> {
    vars.get(name)
        .map(|value_str| {
            value_str.parse::<u64>().map_err(|e| {
                ConfigError::InvalidDuration(format!(
                    "{} must be a valid non-negative integer, got '{}': {}",
                    name, value_str, e
                ))
            })
        })
        .transpose()
}

/// JWKS must be fetched over HTTPS; plain HTTP is allowed for loopback only.
fn validate_jwks_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidJwksUrl(format!("'{raw}': {e}")))?;

    match url.scheme() {
        "https" => Ok(()),
        "http" if is_loopback_host(&url) => Ok(()),
        "http" => Err(ConfigError::InvalidJwksUrl(format!(
            "'{raw}': http is only allowed for loopback hosts"
        ))),
        other => Err(ConfigError::InvalidJwksUrl(format!(
            "'{raw}': unsupported scheme '{other}'"
        ))),
    }
}

fn is_loopback_host(url: &Url) -> bool {
    match url.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_loopback()),
        None => false,
    }
}

fn parse_algorithms(raw: &str) -> Result<Vec<Algorithm>, ConfigError> {
    let mut algorithms = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        let alg = Algorithm::from_str(name).map_err(|_| {
            ConfigError::InvalidAlgorithms(format!("unknown algorithm '{name}'"))
        })?;
        if !is_asymmetric(alg) {
            return Err(ConfigError::InvalidAlgorithms(format!(
                "symmetric algorithm '{name}' is not allowed"
            )));
        }
        if !algorithms.contains(&alg) {
            algorithms.push(alg);
        }
    }

    if algorithms.is_empty() {
        return Err(ConfigError::InvalidAlgorithms(
            "JWT_ALLOWED_ALGORITHMS must name at least one algorithm".to_string(),
        ));
    }

    Ok(algorithms)
}
