use std::time::Duration;

use thiserror::Error;

use skyrchitect_core::errors::{DomainError, ErrorKind};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("arguments for `{tool}` do not match its schema: {reason}")]
    SchemaMismatch { tool: String, reason: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTool(_) => ErrorKind::UnknownTool,
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::Domain(error) => error.kind(),
        }
    }

    pub(crate) fn schema(tool: &str, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch { tool: tool.to_owned(), reason: reason.into() }
    }
}

/// Failures reported by the model capability.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("model transport failure: {0}")]
    Transport(String),
    #[error("model rejected the request: {0}")]
    Rejected(String),
}

impl ModelError {
    /// Timeouts and transport failures are transient; rejections are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }
}

/// Typed failure returned to callers when a run does not reach TERMINAL.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}: {cause}")]
pub struct LoopFailure {
    pub kind: ErrorKind,
    pub cause: String,
}

impl LoopFailure {
    pub fn new(kind: ErrorKind, cause: impl Into<String>) -> Self {
        Self { kind, cause: cause.into() }
    }

    pub fn unsupported_mode(cause: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedMode, cause)
    }

    pub fn malformed(cause: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedOutput, cause)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use skyrchitect_core::domain::service::Category;
    use skyrchitect_core::errors::{DomainError, ErrorKind};

    use super::{LoopFailure, ModelError, ToolError};

    #[test]
    fn tool_errors_keep_the_domain_kind() {
        let error = ToolError::from(DomainError::NotFound {
            category: Category::Compute,
            name: "mainframe".to_owned(),
        });
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(ToolError::UnknownTool("x".to_owned()).kind(), ErrorKind::UnknownTool);
        assert_eq!(ToolError::schema("t", "missing `a`").kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn only_transient_model_errors_are_retryable() {
        assert!(ModelError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(ModelError::Transport("reset".to_owned()).is_retryable());
        assert!(!ModelError::Rejected("quota".to_owned()).is_retryable());
    }

    #[test]
    fn loop_failure_display_leads_with_kind() {
        let failure = LoopFailure::malformed("missing field `architecture`");
        assert_eq!(failure.to_string(), "malformed_output: missing field `architecture`");
    }
}
