use crate::auth::AuthError;
use crate::cache::CacheError;
use crate::generation::GenerationError;
use crate::validation::RejectReason;
use std::fmt;
use thiserror::Error;

/// Structured error context for configuration and setup failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Configuration key that caused the error (e.g., "validation.required_patterns[0]")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., the offending value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "validation_rules")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the request pipeline.
///
/// Only [`Error::Auth`], [`Error::Generation`] and [`Error::Rejected`] are
/// produced by a request; cache store failures are absorbed by
/// [`ResponseCache`](crate::cache::ResponseCache) and only appear here when a
/// store cannot be constructed at startup.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Access denied: {0}")]
    Auth(#[from] AuthError),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// The generated text failed the acceptance rules. The text is kept for
    /// diagnostics only and must not be returned as a successful response.
    #[error("Response rejected: {reason}")]
    Rejected {
        reason: RejectReason,
        response: String,
    },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a configuration error without context
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::configuration_with_context(msg, ErrorContext::new())
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Caller-facing outcome class of this error.
    pub fn status(&self) -> OutcomeStatus {
        match self {
            Error::Auth(_) => OutcomeStatus::AccessDenied,
            Error::Rejected { .. } => OutcomeStatus::ValidationFailed,
            _ => OutcomeStatus::InternalError,
        }
    }
}

/// Outcome class reported to callers for a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeStatus {
    /// Credential missing or not in the allow-set
    AccessDenied,
    /// Generated text failed the acceptance rules
    ValidationFailed,
    /// Backend failure or any other fault
    InternalError,
}

impl OutcomeStatus {
    /// Returns the stable code string (e.g., `"access_denied"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AccessDenied => "access_denied",
            Self::ValidationFailed => "validation_failed",
            Self::InternalError => "internal_error",
        }
    }

    /// Returns the HTTP status used by the transport layer.
    #[inline]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AccessDenied => 403,
            Self::ValidationFailed => 422,
            Self::InternalError => 500,
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
