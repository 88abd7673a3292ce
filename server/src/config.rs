//! Server configuration module.
//!
//! Parses configuration from environment variables for the TodoLists server.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `PORT` | No | 8080 | HTTP server port |
//! | `TODOLISTS_SESSION_SECRET` | No | random | Base64-encoded 32-byte cookie signing secret |
//! | `TODOLISTS_SESSION_TTL_SECS` | No | 86400 | Idle seconds before a session expires |
//! | `TODOLISTS_MAX_SESSIONS` | No | 10000 | Maximum number of live sessions |
//! | `TODOLISTS_SECURE_COOKIE` | No | false | Mark the session cookie `Secure` |
//!
//! Without `TODOLISTS_SESSION_SECRET` a fresh secret is generated at startup,
//! so every restart invalidates existing session cookies.

use std::env;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::Rng;
use thiserror::Error;
use tracing::warn;

use crate::cookie::SECRET_LENGTH;
use crate::session::{DEFAULT_MAX_CAPACITY, DEFAULT_TTL_SECS, MAX_TTL_SECS};

/// Default HTTP server port.
const DEFAULT_PORT: u16 = 8080;

/// Errors that can occur when parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable has invalid format.
    #[error("invalid format for {var}: {message}")]
    InvalidFormat { var: String, message: String },

    /// Port number is invalid.
    #[error("invalid port number: {0}")]
    InvalidPort(#[from] std::num::ParseIntError),

    /// Configuration validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Server configuration parsed from environment variables.
#[derive(Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,

    /// Secret the session cookie signing key is derived from.
    pub session_secret: [u8; SECRET_LENGTH],

    /// Idle time after which a session expires.
    pub session_ttl: Duration,

    /// Maximum number of live sessions.
    pub max_sessions: usize,

    /// When true, the session cookie carries the `Secure` attribute.
    pub secure_cookie: bool,
}

impl Config {
    /// Parse configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The port or a numeric setting is not a valid number
    /// - The session secret is not base64 or does not decode to 32 bytes
    /// - The TTL or session capacity is zero
    /// - The TTL is longer than one year
    ///
    /// # Example
    ///
    /// ```no_run
    /// use todolists_server::config::Config;
    ///
    /// let config = Config::from_env().expect("Failed to load config");
    /// println!("Server will listen on port {}", config.port);
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            port: parse_port()?,
            session_secret: parse_session_secret()?,
            session_ttl: Duration::from_secs(parse_number_env(
                "TODOLISTS_SESSION_TTL_SECS",
                DEFAULT_TTL_SECS,
            )?),
            max_sessions: parse_number_env("TODOLISTS_MAX_SESSIONS", DEFAULT_MAX_CAPACITY)?,
            secure_cookie: parse_bool_env("TODOLISTS_SECURE_COOKIE"),
        };

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session_ttl.is_zero() {
            return Err(ConfigError::ValidationError(
                "TODOLISTS_SESSION_TTL_SECS must be greater than zero".to_string(),
            ));
        }

        if self.session_ttl > Duration::from_secs(MAX_TTL_SECS) {
            return Err(ConfigError::ValidationError(format!(
                "TODOLISTS_SESSION_TTL_SECS must be at most {MAX_TTL_SECS}"
            )));
        }

        if self.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "TODOLISTS_MAX_SESSIONS must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("session_secret", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("max_sessions", &self.max_sessions)
            .field("secure_cookie", &self.secure_cookie)
            .finish()
    }
}

/// Parse a boolean environment variable.
///
/// Returns `true` if the variable is set to "true" (case-insensitive),
/// `false` otherwise.
fn parse_bool_env(name: &str) -> bool {
    env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Parse the PORT environment variable.
///
/// Returns the default port if not set.
fn parse_port() -> Result<u16, ConfigError> {
    match env::var("PORT") {
        Ok(port_str) => Ok(port_str.parse()?),
        Err(env::VarError::NotPresent) => Ok(DEFAULT_PORT),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidFormat {
            var: "PORT".to_string(),
            message: "contains invalid unicode".to_string(),
        }),
    }
}

/// Parse an optional numeric environment variable.
fn parse_number_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|err: T::Err| ConfigError::InvalidFormat {
            var: name.to_string(),
            message: err.to_string(),
        }),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidFormat {
            var: name.to_string(),
            message: "contains invalid unicode".to_string(),
        }),
    }
}

/// Parse the TODOLISTS_SESSION_SECRET environment variable.
///
/// Generates a random secret if unset or empty.
fn parse_session_secret() -> Result<[u8; SECRET_LENGTH], ConfigError> {
    let encoded = match env::var("TODOLISTS_SESSION_SECRET") {
        Ok(s) if !s.trim().is_empty() => s,
        _ => {
            warn!(
                "TODOLISTS_SESSION_SECRET is not set - using a random secret. \
                 Sessions will not survive a restart."
            );
            return Ok(generate_secret());
        }
    };

    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|err| ConfigError::InvalidFormat {
            var: "TODOLISTS_SESSION_SECRET".to_string(),
            message: format!("invalid base64: {err}"),
        })?;

    let len = bytes.len();
    bytes.try_into().map_err(|_| ConfigError::InvalidFormat {
        var: "TODOLISTS_SESSION_SECRET".to_string(),
        message: format!("expected {SECRET_LENGTH} bytes, got {len}"),
    })
}

fn generate_secret() -> [u8; SECRET_LENGTH] {
    let mut secret = [0u8; SECRET_LENGTH];
    rand::rng().fill(&mut secret);
    secret
}
