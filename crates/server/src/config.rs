//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ETUCKSHOP_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ETUCKSHOP_BASE_URL` - Public URL of the API (decides the `Secure` cookie flag)
//! - `ETUCKSHOP_SECRET` - Server secret for QR checksums (min 32 chars, high entropy)
//!
//! ## Optional
//! - `ETUCKSHOP_HOST` - Bind address (default: 127.0.0.1)
//! - `ETUCKSHOP_PORT` - Listen port (default: 4000)
//! - `ETUCKSHOP_CORS_ORIGIN` - Storefront origin allowed to call the API with cookies
//! - `QR_TTL_SECONDS` - Lifetime of a payment QR (default: 900)
//! - `QR_SWEEP_INTERVAL_SECONDS` - How often expired QRs are swept (default: 30)
//! - `LOG_FORMAT` - `pretty` or `json` (default: pretty)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Upper bound on the QR lifetime (one day).
const MAX_QR_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
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

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the API
    pub base_url: Url,
    /// Secret used to checksum QR payloads
    pub secret: SecretString,
    /// Storefront origin allowed for credentialed CORS requests
    pub cors_origin: Option<String>,
    /// Payment QR settings
    pub qr: QrConfig,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Payment QR timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrConfig {
    /// How long an issued QR stays valid.
    pub ttl: Duration,
    /// Interval between expiry sweeps.
    pub sweep_interval: Duration,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            ttl: etuckshop_core::qr::DEFAULT_QR_TTL,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("ETUCKSHOP_DATABASE_URL")?;
        let host = get_env_or_default("ETUCKSHOP_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ETUCKSHOP_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("ETUCKSHOP_PORT", "4000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("ETUCKSHOP_PORT".to_string(), e.to_string()))?;
        let base_url = Url::parse(&get_required_env("ETUCKSHOP_BASE_URL")?).map_err(|e| {
            ConfigError::InvalidEnvVar("ETUCKSHOP_BASE_URL".to_string(), e.to_string())
        })?;

        let secret = get_validated_secret("ETUCKSHOP_SECRET")?;
        validate_secret_length(&secret, "ETUCKSHOP_SECRET")?;

        let qr = QrConfig::from_env()?;
        let log_format = match get_optional_env("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidEnvVar(
                    "LOG_FORMAT".to_string(),
                    format!("expected 'pretty' or 'json', got '{other}'"),
                ));
            }
        };

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            secret,
            cors_origin: get_optional_env("ETUCKSHOP_CORS_ORIGIN"),
            qr,
            log_format,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.scheme() == "https"
    }
}

impl QrConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let ttl = get_seconds("QR_TTL_SECONDS", defaults.ttl)?;
        if ttl.as_secs() > MAX_QR_TTL_SECONDS {
            return Err(ConfigError::InvalidEnvVar(
                "QR_TTL_SECONDS".to_string(),
                format!("must be at most {MAX_QR_TTL_SECONDS}"),
            ));
        }

        let sweep_interval = get_seconds("QR_SWEEP_INTERVAL_SECONDS", defaults.sweep_interval)?;

        Ok(Self {
            ttl,
            sweep_interval,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a positive number of seconds, or the default when unset.
fn get_seconds(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    parse_seconds(&raw).map_err(|reason| ConfigError::InvalidEnvVar(key.to_string(), reason))
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err("must be greater than zero".to_string()),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(e.to_string()),
    }
}

/// Validate that a secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config(base_url: &str) -> ServerConfig {
        ServerConfig {
            database_url: SecretString::from("postgres://localhost/etuckshop_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 4000,
            base_url: Url::parse(base_url).unwrap(),
            secret: SecretString::from("x".repeat(32)),
            cors_origin: None,
            qr: QrConfig::default(),
            log_format: LogFormat::Pretty,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("zzzzzz") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("Q7#rT0*uW4^zC6aB3$xY9!") > MIN_ENTROPY_BITS_PER_CHAR);
    }

    #[test]
    fn test_placeholder_secret_rejected() {
        let err = validate_secret_strength("changeme-tuckshop-key", "ETUCKSHOP_SECRET").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(var, _) if var == "ETUCKSHOP_SECRET"));
    }

    #[test]
    fn test_low_entropy_secret_rejected() {
        assert!(validate_secret_strength(&"ab".repeat(20), "ETUCKSHOP_SECRET").is_err());
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "ETUCKSHOP_SECRET").is_ok());
    }

    #[test]
    fn test_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "S").is_err());
        assert!(validate_secret_length(&SecretString::from("k".repeat(32)), "S").is_ok());
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("60"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_seconds(" 900 "), Ok(Duration::from_secs(900)));
        assert!(parse_seconds("0").is_err());
        assert!(parse_seconds("-5").is_err());
        assert!(parse_seconds("soon").is_err());
    }

    #[test]
    fn test_qr_defaults() {
        let qr = QrConfig::default();
        assert_eq!(qr.ttl, Duration::from_secs(900));
        assert_eq!(qr.sweep_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_socket_addr_and_secure_flag() {
        let config = test_config("http://localhost:4000");
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 4000);
        assert!(!config.is_secure());

        assert!(test_config("https://api.tuckshop.example").is_secure());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = test_config("http://localhost:4000");
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("xxxxxxxxxxxxxxxx"));
        assert!(!debug_output.contains("etuckshop_test"));
    }
}
