//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use summarizer_core::options::DEFAULT_LANGUAGES;
use summarizer_core::Quotas;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Absent means the in-memory metadata store is used.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub quotas: Quotas,
    pub max_request_bytes: usize,
    pub allowed_languages: Vec<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub llm_timeout: Duration,
    pub corpus_max_chars: usize,
    pub pdf_font_path: Option<PathBuf>,
    pub ip_hash_salt: String,
    pub secret_key: String,
    pub secure_cookies: bool,
    pub cors_origin: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // --- Server, Logging and Database ---
        let bind_address = parse_or(&var, "BIND_ADDRESS", SocketAddr::from(([0, 0, 0, 0], 5000)))?;
        let database_url = var("DATABASE_URL");

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Storage and Quotas ---
        let upload_dir = var("UPLOAD_FOLDER")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./uploads"));
        let output_dir = var("OUTPUT_FOLDER")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./outputs"));

        let max_files: u32 = parse_or(&var, "MAX_FILES", 10)?;
        let max_file_mb: u64 = parse_or(&var, "MAX_FILE_MB", 50)?;
        let max_total_pages: u32 = parse_or(&var, "MAX_TOTAL_PAGES", 250)?;
        let retention_hours: u64 = parse_or(&var, "RETENTION_HOURS", 24)?;
        let max_storage_mb: u64 = parse_or(&var, "MAX_STORAGE_MB", 2048)?;
        let max_request_mb: u64 = parse_or(&var, "MAX_REQUEST_MB", 50)?;

        if max_files == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_FILES".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let quotas = Quotas {
            max_files,
            max_file_bytes: scaled("MAX_FILE_MB", max_file_mb, MIB)?,
            max_total_pages,
            retention: Duration::from_secs(scaled("RETENTION_HOURS", retention_hours, 3600)?),
            max_storage_bytes: scaled("MAX_STORAGE_MB", max_storage_mb, MIB)?,
        };
        let max_request_bytes = usize::try_from(scaled("MAX_REQUEST_MB", max_request_mb, MIB)?)
            .map_err(|e| ConfigError::InvalidValue("MAX_REQUEST_MB".to_string(), e.to_string()))?;

        let allowed_languages: Vec<String> = match var("ALLOWED_LANGUAGES") {
            Some(list) => list
                .split(',')
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
            None => DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
        };
        if allowed_languages.is_empty() {
            return Err(ConfigError::InvalidValue(
                "ALLOWED_LANGUAGES".to_string(),
                "the list must name at least one language".to_string(),
            ));
        }

        // --- Language Model ---
        let openai_api_key = var("OPENAI_API_KEY");
        let openai_model = var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let llm_timeout_secs: u64 = parse_or(&var, "LLM_TIMEOUT_SECS", 60)?;
        let corpus_max_chars: usize = parse_or(&var, "CORPUS_MAX_CHARS", 120_000)?;
        let pdf_font_path = var("PDF_FONT_PATH").map(PathBuf::from);

        // --- Privacy and Sessions ---
        let ip_hash_salt = var("IP_HASH_SALT")
            .ok_or_else(|| ConfigError::MissingVar("IP_HASH_SALT".to_string()))?;
        let secret_key = var("SECRET_KEY")
            .ok_or_else(|| ConfigError::MissingVar("SECRET_KEY".to_string()))?;
        let secure_cookies = parse_or(&var, "SECURE_COOKIES", false)?;
        let cors_origin = var("CORS_ORIGIN");

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            upload_dir,
            output_dir,
            quotas,
            max_request_bytes,
            allowed_languages,
            openai_api_key,
            openai_model,
            llm_timeout: Duration::from_secs(llm_timeout_secs),
            corpus_max_chars,
            pdf_font_path,
            ip_hash_salt,
            secret_key,
            secure_cookies,
            cors_origin,
        })
    }
}

const MIB: u64 = 1024 * 1024;

/// Converts a configured amount into base units, rejecting values that overflow.
fn scaled(key: &str, value: u64, factor: u64) -> Result<u64, ConfigError> {
    value.checked_mul(factor).ok_or_else(|| {
        ConfigError::InvalidValue(key.to_string(), format!("{} is too large", value))
    })
}

/// Parses `key` when set, otherwise returns `default`.
fn parse_or<T, V>(var: &V, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [("IP_HASH_SALT", "pepper"), ("SECRET_KEY", "s3cret")];

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_source(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.bind_address.port(), 5000);
        assert!(config.database_url.is_none());
        assert_eq!(config.quotas.max_files, 10);
        assert_eq!(config.quotas.max_file_bytes, 50 * 1024 * 1024);
        assert_eq!(config.quotas.max_total_pages, 250);
        assert_eq!(config.quotas.retention, Duration::from_secs(24 * 3600));
        assert_eq!(config.allowed_languages.len(), 16);
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.corpus_max_chars, 120_000);
        assert!(!config.secure_cookies);
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("MAX_FILES", "3"),
            ("RETENTION_HOURS", "2"),
            ("ALLOWED_LANGUAGES", "English, Polish ,"),
            ("DATABASE_URL", "postgres://localhost/summaries"),
        ]);
        let config = Config::from_source(lookup(&pairs)).unwrap();
        assert_eq!(config.quotas.max_files, 3);
        assert_eq!(config.quotas.retention, Duration::from_secs(7200));
        assert_eq!(config.allowed_languages, vec!["English", "Polish"]);
        assert!(config.database_url.is_some());
    }

    #[test]
    fn missing_secret_is_reported() {
        let err = Config::from_source(lookup(&[("IP_HASH_SALT", "pepper")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "SECRET_KEY"));
    }

    #[test]
    fn malformed_numbers_are_reported() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MAX_TOTAL_PAGES", "lots"));
        let err = Config::from_source(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "MAX_TOTAL_PAGES"));
    }

    #[test]
    fn oversized_limits_are_rejected_instead_of_overflowing() {
        for key in ["MAX_FILE_MB", "RETENTION_HOURS", "MAX_STORAGE_MB", "MAX_REQUEST_MB"] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push((key, "18446744073709551615"));
            let err = Config::from_source(lookup(&pairs)).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == key));
        }
    }
}
