use std::fmt;

use thiserror::Error;

/// Startup configuration problems. Any of these halts the process before
/// the listener is bound.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing API key: set {var} in the environment or a .env file")]
    MissingApiKey { var: &'static str },
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Broad classification of a failed completion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionErrorKind {
    Network,
    Auth,
    RateLimit,
    Model,
    InvalidResponse,
}

impl fmt::Display for CompletionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CompletionErrorKind::Network => "network error",
            CompletionErrorKind::Auth => "authentication failed",
            CompletionErrorKind::RateLimit => "rate limited",
            CompletionErrorKind::Model => "model error",
            CompletionErrorKind::InvalidResponse => "invalid response",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}: {message}")]
pub struct CompletionError {
    pub kind: CompletionErrorKind,
    pub message: String,
}

impl CompletionError {
    pub fn new(kind: CompletionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP status returned by the provider.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => CompletionErrorKind::Auth,
            429 => CompletionErrorKind::RateLimit,
            _ => CompletionErrorKind::Model,
        };
        Self::new(kind, format!("status {}: {}", status, body.into()))
    }
}

/// Why a submission or reset on a session did not go through.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubmitError {
    #[error("message is empty")]
    EmptyInput,
    #[error("a response is still pending for this session")]
    Busy,
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(CompletionError::from_status(401, "bad key").kind, CompletionErrorKind::Auth);
        assert_eq!(CompletionError::from_status(403, "").kind, CompletionErrorKind::Auth);
        assert_eq!(CompletionError::from_status(429, "slow down").kind, CompletionErrorKind::RateLimit);
        assert_eq!(CompletionError::from_status(500, "boom").kind, CompletionErrorKind::Model);
        assert_eq!(CompletionError::from_status(404, "no model").kind, CompletionErrorKind::Model);
    }

    #[test]
    fn test_error_messages() {
        let err = CompletionError::from_status(429, "slow down");
        assert_eq!(err.to_string(), "rate limited: status 429: slow down");

        let submit: SubmitError = err.clone().into();
        assert_eq!(submit.to_string(), err.to_string());

        let missing = ConfigError::MissingApiKey { var: "GROQ_API_KEY" };
        assert!(missing.to_string().contains("GROQ_API_KEY"));
    }
}
