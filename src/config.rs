//! Configuration types.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::finder::OracleConfig;
use crate::llm::{LlmBackend, LlmConfig, RetryConfig};

/// Origins the bundled frontend is served from during development.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:3001",
    "http://localhost:5173",
];

/// Service configuration.
#[derive(Debug, Clone)]
pub struct FinderConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Browser origins allowed by CORS.
    pub allowed_origins: Vec<String>,
    pub llm: LlmConfig,
    pub oracle: OracleConfig,
    /// Directory for daily-rotated log files. Logs go to stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl FinderConfig {
    /// Load from process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse_or(&lookup, "PORT", 8080)?;

        let backend: LlmBackend = match lookup("EXPERT_FINDER_BACKEND") {
            Some(raw) => raw.parse()?,
            None => LlmBackend::OpenAi,
        };

        let api_key = lookup(backend.api_key_var())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(backend.api_key_var().to_string()))?;

        let model = lookup("EXPERT_FINDER_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| backend.default_model().to_string());

        let allowed_origins: Vec<String> = match lookup("EXPERT_FINDER_ALLOWED_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect(),
        };

        let timeout_secs: u64 = parse_or(&lookup, "EXPERT_FINDER_ORACLE_TIMEOUT_SECS", 30)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "EXPERT_FINDER_ORACLE_TIMEOUT_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let max_retries: u32 = parse_or(&lookup, "EXPERT_FINDER_MAX_RETRIES", 0)?;

        let synthesis_temperature: f32 =
            parse_or(&lookup, "EXPERT_FINDER_SYNTHESIS_TEMPERATURE", 0.5)?;
        if !(0.0..=2.0).contains(&synthesis_temperature) {
            return Err(ConfigError::InvalidValue {
                key: "EXPERT_FINDER_SYNTHESIS_TEMPERATURE".to_string(),
                message: format!("{synthesis_temperature} is outside 0.0..=2.0"),
            });
        }

        let log_dir = lookup("EXPERT_FINDER_LOG_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            port,
            allowed_origins,
            llm: LlmConfig {
                backend,
                api_key: secrecy::SecretString::from(api_key),
                model,
                retry: RetryConfig {
                    max_retries,
                    ..RetryConfig::default()
                },
            },
            oracle: OracleConfig {
                timeout: Duration::from_secs(timeout_secs),
                synthesis_temperature,
                ..OracleConfig::default()
            },
            log_dir,
        })
    }
}

/// Parse `key` when set (and non-blank), else use `default`.
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{raw}': {e}"),
            }),
        None => Ok(default),
    }
}
