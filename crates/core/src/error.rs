//! Error types for the TreeShell domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each stage of a line's life (parse, resolve, execute) has its own enum.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A malformed input line. Nothing is executed when parsing fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command line")]
    Empty,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("step {step}: missing target address")]
    MissingAddress { step: usize },

    #[error("step {step}: invalid address '{address}'")]
    InvalidAddress { step: usize, address: String },

    #[error("step {step}: expected 'jump', found '{found}'")]
    ExpectedJump { step: usize, found: String },

    #[error("step {step}: empty chain step")]
    EmptyStep { step: usize },

    #[error("step {step}: invalid JSON arguments: {reason}")]
    InvalidArguments { step: usize, reason: String },

    #[error("step {step}: arguments must be a JSON object")]
    ArgumentsNotObject { step: usize },

    #[error("unterminated JSON payload")]
    Unbalanced,
}

/// Errors raised while building an [`AddressSpace`](crate::address::AddressSpace).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid address '{0}'")]
    Invalid(String),

    #[error("duplicate address '{0}'")]
    Duplicate(String),

    #[error("address '{address}' has no parent node '{parent}'")]
    MissingParent { address: String, parent: String },
}

/// A substitution token referenced a prior result that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstitutionError {
    #[error("step {index} does not exist ({recorded} results recorded)")]
    UnknownStep { index: usize, recorded: usize },

    #[error("step {index} failed; its output cannot be substituted")]
    FailedStep { index: usize },
}

/// The handler adapter raised or returned an error signal.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("no handler registered for '{0}'")]
    UnknownHandler(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{handler} failed: {reason}")]
    Failed { handler: String, reason: String },

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Why a single step produced a failed [`StepResult`](crate::session::StepResult).
#[derive(Debug, Error)]
pub enum StepError {
    #[error("address not found: {0}")]
    AddressNotFound(String),

    #[error("substitution failed: {0}")]
    Substitution(#[from] SubstitutionError),

    #[error("execution failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error("cancelled before completion")]
    Cancelled,
}

/// Machine-readable classification of a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    AddressNotFound,
    UnknownStep,
    FailedStep,
    Execution,
    Cancelled,
}

impl StepError {
    pub fn kind(&self) -> StepErrorKind {
        match self {
            StepError::AddressNotFound(_) => StepErrorKind::AddressNotFound,
            StepError::Substitution(SubstitutionError::UnknownStep { .. }) => {
                StepErrorKind::UnknownStep
            }
            StepError::Substitution(SubstitutionError::FailedStep { .. }) => {
                StepErrorKind::FailedStep
            }
            StepError::Execution(_) => StepErrorKind::Execution,
            StepError::Cancelled => StepErrorKind::Cancelled,
        }
    }
}

// --- Capability errors ---

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_kinds() {
        let err = StepError::AddressNotFound("9.9.9".into());
        assert_eq!(err.kind(), StepErrorKind::AddressNotFound);
        assert!(err.to_string().contains("9.9.9"));

        let err: StepError = SubstitutionError::UnknownStep { index: 5, recorded: 1 }.into();
        assert_eq!(err.kind(), StepErrorKind::UnknownStep);

        let err: StepError = SubstitutionError::FailedStep { index: 1 }.into();
        assert_eq!(err.kind(), StepErrorKind::FailedStep);
    }

    #[test]
    fn tool_error_wraps_into_execution() {
        let err: StepError = ExecutionError::from(ToolError::PermissionDenied {
            tool_name: "bash_tool".into(),
            reason: "command not in allowlist".into(),
        })
        .into();
        assert_eq!(err.kind(), StepErrorKind::Execution);
        assert!(err.to_string().contains("allowlist"));
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&StepErrorKind::AddressNotFound).unwrap();
        assert_eq!(json, "\"address_not_found\"");
    }
}
