use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::service::Category;

/// Closed error taxonomy shared by the deterministic tools and the orchestration loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidQuantity,
    InvariantViolation,
    UnknownTool,
    SchemaMismatch,
    UnsupportedMode,
    MalformedOutput,
    BudgetExhausted,
    ModelUnavailable,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidQuantity => "invalid_quantity",
            Self::InvariantViolation => "invariant_violation",
            Self::UnknownTool => "unknown_tool",
            Self::SchemaMismatch => "schema_mismatch",
            Self::UnsupportedMode => "unsupported_mode",
            Self::MalformedOutput => "malformed_output",
            Self::BudgetExhausted => "budget_exhausted",
            Self::ModelUnavailable => "model_unavailable",
            Self::Cancelled => "cancelled",
        }
    }

    /// Loop-level kinds terminate a run; the rest are recovered into tool results.
    pub fn is_loop_level(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMode
                | Self::MalformedOutput
                | Self::BudgetExhausted
                | Self::ModelUnavailable
                | Self::Cancelled
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("no `{name}` service in category {category}")]
    NotFound { category: Category, name: String },
    #[error("unknown service id `{0}`")]
    UnknownService(String),
    #[error("unknown service category `{0}`")]
    UnknownCategory(String),
    #[error("quantity for `{service}` must be positive, got {quantity}")]
    InvalidQuantity { service: String, quantity: i64 },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::UnknownService(_) | Self::UnknownCategory(_) => {
                ErrorKind::NotFound
            }
            Self::InvalidQuantity { .. } => ErrorKind::InvalidQuantity,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::service::Category;
    use crate::errors::{DomainError, ErrorKind};

    #[test]
    fn domain_errors_map_onto_taxonomy() {
        let not_found =
            DomainError::NotFound { category: Category::Storage, name: "tape".to_owned() };
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        assert_eq!(DomainError::UnknownService("x".to_owned()).kind(), ErrorKind::NotFound);
        assert_eq!(
            DomainError::InvalidQuantity { service: "aws-ec2".to_owned(), quantity: 0 }.kind(),
            ErrorKind::InvalidQuantity
        );
    }

    #[test]
    fn not_found_message_names_category_and_service() {
        let error = DomainError::NotFound { category: Category::Database, name: "mongo".to_owned() };
        assert_eq!(error.to_string(), "no `mongo` service in category database");
    }

    #[test]
    fn only_loop_level_kinds_terminate_runs() {
        assert!(ErrorKind::MalformedOutput.is_loop_level());
        assert!(ErrorKind::BudgetExhausted.is_loop_level());
        assert!(!ErrorKind::SchemaMismatch.is_loop_level());
        assert!(!ErrorKind::NotFound.is_loop_level());
        assert_eq!(ErrorKind::ModelUnavailable.to_string(), "model_unavailable");
    }
}
