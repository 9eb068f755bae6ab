//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SOLARCAST_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `SOLARCAST_HOST` - Bind address (default: 127.0.0.1)
//! - `SOLARCAST_PORT` - Listen port (default: 8000)
//! - `SOLARCAST_MODEL_DIR` - Directory holding model artifacts (default: artifacts)
//! - `SOLARCAST_DATASET_PATH` - CSV used by `/api/model/train` (default: `Solar_Power_Prediction.csv`)
//! - `SOLARCAST_CORS_ORIGINS` - Comma-separated allowed origins, `*` for any (default: `*`)
//! - `MAIL_API_URL`, `MAIL_API_KEY`, `MAIL_FROM` - Transactional email API; all or none.
//!   Without them OTP codes are written to the log instead of sent.
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate, 0.0 to 1.0 (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate, 0.0 to 1.0 (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

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

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Directory holding `model.json`, `scaler.json` and `feature_columns.csv`
    pub model_dir: PathBuf,
    /// Dataset used when training is triggered over HTTP
    pub dataset_path: PathBuf,
    /// Allowed CORS origins; empty means any origin
    pub cors_origins: Vec<String>,
    /// Transactional email API, if configured
    pub mail: Option<MailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry transaction sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Transactional email API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct MailConfig {
    /// Endpoint that accepts `{from, to, subject, html, text}` as JSON
    pub api_url: Url,
    /// Bearer token for the email API
    pub api_key: SecretString,
    /// Sender address
    pub from: String,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("api_url", &self.api_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("from", &self.from)
            .finish()
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
    /// if the mail API key fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get_database_url(env, "SOLARCAST_DATABASE_URL")?;
        let host = parse_env(env, "SOLARCAST_HOST", "127.0.0.1")?;
        let port = parse_env(env, "SOLARCAST_PORT", "8000")?;
        let model_dir = PathBuf::from(get_env_or_default(env, "SOLARCAST_MODEL_DIR", "artifacts"));
        let dataset_path = PathBuf::from(get_env_or_default(
            env,
            "SOLARCAST_DATASET_PATH",
            "Solar_Power_Prediction.csv",
        ));
        let cors_origins = parse_origins(&get_env_or_default(env, "SOLARCAST_CORS_ORIGINS", "*"));
        let mail = MailConfig::from_lookup(env)?;

        Ok(Self {
            database_url,
            host,
            port,
            model_dir,
            dataset_path,
            cors_origins,
            mail,
            sentry_dsn: env("SENTRY_DSN"),
            sentry_environment: env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env(env, "SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env(env, "SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl MailConfig {
    fn from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let (url, key, from) = match (env("MAIL_API_URL"), env("MAIL_API_KEY"), env("MAIL_FROM")) {
            (None, None, None) => return Ok(None),
            (Some(url), Some(key), Some(from)) => (url, key, from),
            _ => {
                return Err(ConfigError::InvalidEnvVar(
                    "MAIL_API_URL".to_string(),
                    "MAIL_API_URL, MAIL_API_KEY and MAIL_FROM must be set together".to_string(),
                ));
            }
        };

        let api_url = Url::parse(&url)
            .map_err(|e| ConfigError::InvalidEnvVar("MAIL_API_URL".to_string(), e.to_string()))?;
        validate_secret_strength(&key, "MAIL_API_KEY")?;

        Ok(Some(Self {
            api_url,
            api_key: SecretString::from(key),
            from,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(
    env: &dyn Fn(&str) -> Option<String>,
    primary_key: &str,
) -> Result<SecretString, ConfigError> {
    env(primary_key)
        .or_else(|| env("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(env: &dyn Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(env: &dyn Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(env, key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Split a comma-separated origin list. `*` anywhere means any origin.
fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    if origins.iter().any(|o| o == "*") {
        Vec::new()
    } else {
        origins
    }
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

    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the provider."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const GOOD_KEY: &str = "mk_aB3xY9mK2nL5pQ7rT0uW4zC6";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let env = lookup(&[("DATABASE_URL", "postgres://localhost/solarcast")]);
        let config = ServerConfig::from_lookup(&env).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8000");
        assert_eq!(config.model_dir, PathBuf::from("artifacts"));
        assert_eq!(config.dataset_path, PathBuf::from("Solar_Power_Prediction.csv"));
        assert!(config.cors_origins.is_empty());
        assert!(config.mail.is_none());
        assert!((config.sentry_sample_rate - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_database_url_is_required() {
        let env = lookup(&[]);
        let err = ServerConfig::from_lookup(&env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(k) if k == "SOLARCAST_DATABASE_URL"));
    }

    #[test]
    fn test_invalid_port() {
        let env = lookup(&[
            ("DATABASE_URL", "postgres://localhost/solarcast"),
            ("SOLARCAST_PORT", "eighty"),
        ]);
        let err = ServerConfig::from_lookup(&env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(k, _) if k == "SOLARCAST_PORT"));
    }

    #[test]
    fn test_partial_mail_config_rejected() {
        let env = lookup(&[
            ("DATABASE_URL", "postgres://localhost/solarcast"),
            ("MAIL_API_URL", "https://mail.test/send"),
        ]);
        assert!(ServerConfig::from_lookup(&env).is_err());
    }

    #[test]
    fn test_full_mail_config() {
        let env = lookup(&[
            ("DATABASE_URL", "postgres://localhost/solarcast"),
            ("MAIL_API_URL", "https://mail.test/send"),
            ("MAIL_API_KEY", GOOD_KEY),
            ("MAIL_FROM", "noreply@solarcast.test"),
        ]);
        let mail = ServerConfig::from_lookup(&env).unwrap().mail.unwrap();
        assert_eq!(mail.api_url.as_str(), "https://mail.test/send");
        assert_eq!(mail.from, "noreply@solarcast.test");
    }

    #[test]
    fn test_mail_config_debug_redacts_key() {
        let config = MailConfig {
            api_url: Url::parse("https://mail.test/send").unwrap(),
            api_key: SecretString::from(GOOD_KEY),
            from: "noreply@solarcast.test".to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("noreply@solarcast.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(GOOD_KEY));
    }

    #[test]
    fn test_placeholder_key_rejected() {
        let result = validate_secret_strength("your-api-key-here", "MAIL_API_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_low_entropy_key_rejected() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "MAIL_API_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_origins() {
        assert!(parse_origins("*").is_empty());
        assert!(parse_origins("https://a.test, *").is_empty());
        assert_eq!(
            parse_origins("https://a.test, https://b.test"),
            vec!["https://a.test", "https://b.test"]
        );
    }
}
