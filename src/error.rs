//! Error types for Expert Finder.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

impl LlmError {
    /// Whether a retry of the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RequestFailed { .. } | Self::RateLimited { .. })
    }
}

/// Failures of the validation/synthesis oracle.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Oracle {operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Oracle returned malformed synthesis output: {reason}")]
    MalformedSynthesis { reason: String },
}

/// Conversation engine errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The caller-supplied conversation state breaks a precondition. Raised
    /// before the oracle is consulted.
    #[error("Invalid conversation state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_llm_errors() {
        let failed = LlmError::RequestFailed {
            provider: "openai".into(),
            reason: "connection reset".into(),
        };
        let limited = LlmError::RateLimited {
            provider: "openai".into(),
            retry_after: None,
        };
        let auth = LlmError::AuthFailed {
            provider: "openai".into(),
        };
        assert!(failed.is_transient());
        assert!(limited.is_transient());
        assert!(!auth.is_transient());
    }

    #[test]
    fn engine_error_wraps_oracle_message() {
        let err = EngineError::from(OracleError::MalformedSynthesis {
            reason: "expected `[`".into(),
        });
        assert_eq!(
            err.to_string(),
            "Oracle returned malformed synthesis output: expected `[`"
        );
    }
}
