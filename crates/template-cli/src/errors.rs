//! CLI error types for structured error handling.
//!
//! Core errors are classified by [`ErrorCase`] and mapped to exit codes here,
//! so every command reports failures the same way.

use std::collections::BTreeMap;
use std::fmt;

use template_core::{ErrorCase, TemplateError};

use crate::constants::exit_codes;

/// CLI-specific errors with associated exit codes.
#[derive(Debug, Clone)]
pub enum CliError {
    /// Template missing, deleted, or no longer editable
    NotFound { message: String, hint: String },

    /// Invalid user input, with optional per-field detail
    InvalidInput {
        message: String,
        fields: BTreeMap<String, String>,
    },

    /// Lock number mismatch
    Conflict { message: String, hint: String },

    /// Unexpected failure; the cause is logged, not printed
    Internal,

    /// Any other error, reported as-is
    Other(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::NotFound { message, hint } | CliError::Conflict { message, hint } => {
                write!(f, "{}\n{}", message, hint)
            }
            CliError::InvalidInput { message, fields } => {
                write!(f, "{}", message)?;
                for (field, problem) in fields {
                    write!(f, "\n  {}: {}", field, problem)?;
                }
                Ok(())
            }
            CliError::Internal => write!(f, "Something went wrong. Check the logs for details."),
            CliError::Other(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for CliError {}

impl From<&TemplateError> for CliError {
    fn from(err: &TemplateError) -> Self {
        match err.error_case() {
            ErrorCase::NotFound | ErrorCase::AlreadySubmitted => CliError::NotFound {
                message: err.to_string(),
                hint: "Hint: Run `tmplctl list` to see available templates.".to_string(),
            },
            ErrorCase::Conflict => CliError::Conflict {
                message: "Someone else changed this template".to_string(),
                hint: "Hint: Run `tmplctl show <ID>` to get the current lock number, then retry."
                    .to_string(),
            },
            ErrorCase::ValidationFailed
            | ErrorCase::CannotSubmit
            | ErrorCase::CannotChangeTemplateType
            | ErrorCase::FeatureDisabled => CliError::InvalidInput {
                message: err.to_string(),
                fields: err.field_errors().cloned().unwrap_or_default(),
            },
            ErrorCase::Internal => CliError::Internal,
        }
    }
}

impl CliError {
    /// Classify an error returned by a command handler.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        if let Some(core) = err.downcast_ref::<TemplateError>() {
            return CliError::from(core);
        }
        if let Some(cli) = err.downcast_ref::<CliError>() {
            return cli.clone();
        }
        CliError::Other(format!("{:#}", err))
    }

    /// Create an InvalidInput error without field detail.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::InvalidInput {
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::InvalidInput { .. } => exit_codes::INVALID_INPUT,
            CliError::Conflict { .. } => exit_codes::CONFLICT,
            CliError::Internal | CliError::Other(_) => exit_codes::INTERNAL,
        }
    }

    /// Print error message to stderr and exit with appropriate code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        std::process::exit(self.exit_code())
    }
}
