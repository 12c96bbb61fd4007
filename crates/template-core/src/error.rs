//! Error types for template core operations.
//!
//! Every store, repository, and service operation returns [`Result`]. Expected
//! business outcomes (lock conflicts, terminal templates, bad input) are
//! distinct variants so callers can decide between retrying and surfacing the
//! problem; [`TemplateError::Internal`] wraps anything unexpected together
//! with its original cause.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::storage::types::{TemplateStatus, TemplateType};

/// Result type alias for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Boxed cause carried by [`TemplateError::Internal`].
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse error classification shared with API consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCase {
    NotFound,
    Conflict,
    AlreadySubmitted,
    CannotSubmit,
    CannotChangeTemplateType,
    ValidationFailed,
    FeatureDisabled,
    Internal,
}

impl ErrorCase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCase::NotFound => "NOT_FOUND",
            ErrorCase::Conflict => "CONFLICT",
            ErrorCase::AlreadySubmitted => "ALREADY_SUBMITTED",
            ErrorCase::CannotSubmit => "CANNOT_SUBMIT",
            ErrorCase::CannotChangeTemplateType => "CANNOT_CHANGE_TEMPLATE_TYPE",
            ErrorCase::ValidationFailed => "VALIDATION_FAILED",
            ErrorCase::FeatureDisabled => "FEATURE_DISABLED",
            ErrorCase::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for template operations.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template is missing or has been deleted
    #[error("Template not found")]
    NotFound,

    /// Lock number mismatch
    #[error("Lock number mismatch - template has been modified since last read")]
    Conflict,

    /// Template is in a status that forbids user mutation
    #[error("Template with status {0} cannot be updated")]
    AlreadySubmitted(TemplateStatus),

    /// Submit-time preconditions are not met
    #[error("Template cannot be submitted")]
    CannotSubmit,

    /// Attempt to change the type of an existing template
    #[error("Can not change template type: expected {expected} but got {actual}")]
    CannotChangeTemplateType {
        expected: TemplateType,
        actual: TemplateType,
    },

    /// Input shape errors, with optional per-field detail
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, String>,
    },

    /// Operation is not enabled for this client
    #[error("Feature disabled: {0}")]
    FeatureDisabled(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unexpected failure, carrying the original cause for diagnostics
    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Cause>,
    },
}

impl TemplateError {
    /// Input validation failure without field detail.
    pub fn validation(message: impl Into<String>) -> Self {
        TemplateError::Validation {
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Input validation failure for a single field.
    pub fn field(field: impl Into<String>, problem: impl Into<String>) -> Self {
        let problem = problem.into();
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), problem.clone());
        TemplateError::Validation {
            message: "Request failed validation".to_string(),
            fields,
        }
    }

    /// Unexpected failure with no underlying cause.
    pub fn internal(message: impl Into<String>) -> Self {
        TemplateError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an unexpected failure, keeping the cause.
    pub fn internal_with<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        TemplateError::Internal {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Classification of this error.
    pub fn error_case(&self) -> ErrorCase {
        match self {
            TemplateError::NotFound => ErrorCase::NotFound,
            TemplateError::Conflict => ErrorCase::Conflict,
            TemplateError::AlreadySubmitted(_) => ErrorCase::AlreadySubmitted,
            TemplateError::CannotSubmit => ErrorCase::CannotSubmit,
            TemplateError::CannotChangeTemplateType { .. } => ErrorCase::CannotChangeTemplateType,
            TemplateError::Validation { .. } => ErrorCase::ValidationFailed,
            TemplateError::FeatureDisabled(_) => ErrorCase::FeatureDisabled,
            TemplateError::Storage(_) | TemplateError::Internal { .. } => ErrorCase::Internal,
        }
    }

    /// Field-level detail for validation failures.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            TemplateError::Validation { fields, .. } => Some(fields),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for TemplateError {
    fn from(err: rusqlite::Error) -> Self {
        TemplateError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for TemplateError {
    fn from(err: std::io::Error) -> Self {
        TemplateError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for TemplateError {
    fn from(err: serde_json::Error) -> Self {
        TemplateError::validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_cases() {
        assert_eq!(TemplateError::NotFound.error_case(), ErrorCase::NotFound);
        assert_eq!(
            TemplateError::AlreadySubmitted(TemplateStatus::Submitted).error_case(),
            ErrorCase::AlreadySubmitted
        );
        assert_eq!(
            TemplateError::Storage("disk".to_string()).error_case(),
            ErrorCase::Internal
        );
        assert_eq!(ErrorCase::CannotSubmit.as_str(), "CANNOT_SUBMIT");
    }

    #[test]
    fn test_internal_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = TemplateError::internal_with("Failed to update template", io);
        let source = std::error::Error::source(&err).expect("cause should be kept");
        assert_eq!(source.to_string(), "boom");
        assert_eq!(err.to_string(), "Failed to update template");
    }

    #[test]
    fn test_field_error_detail() {
        let err = TemplateError::field("subject", "Subject is required");
        let fields = err.field_errors().expect("validation has fields");
        assert_eq!(fields.get("subject").map(String::as_str), Some("Subject is required"));
    }
}
