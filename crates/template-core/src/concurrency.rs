//! Rejection disambiguation for lock-guarded writes.
//!
//! When a conditional write is rejected the store hands back the prior image.
//! [`explain_rejection`] turns that image into the business error the caller
//! sees. It never touches the store.

use crate::error::TemplateError;
use crate::storage::types::{Template, TemplateStatus, TemplateType};

/// The user-facing mutation whose write was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Update { expected_type: TemplateType },
    Submit,
    Delete,
    ProofRequest,
}

impl Operation {
    fn fallback(&self) -> TemplateError {
        match self {
            Operation::Update { .. } => TemplateError::internal("Failed to update template"),
            Operation::Delete => TemplateError::internal("Failed to delete template"),
            Operation::Submit => TemplateError::CannotSubmit,
            Operation::ProofRequest => TemplateError::validation("Template cannot be proofed"),
        }
    }
}

/// Explain why a write guarded by `expected_lock` was rejected.
///
/// Checks run in priority order: missing or deleted, submitted, type change,
/// lock mismatch, then the operation's fallback. Pass `None` for writes that
/// are not lock-guarded.
pub fn explain_rejection(
    operation: Operation,
    old: Option<&Template>,
    expected_lock: Option<u64>,
) -> TemplateError {
    let Some(old) = old else {
        return TemplateError::NotFound;
    };

    match old.template_status {
        TemplateStatus::Deleted => return TemplateError::NotFound,
        TemplateStatus::Submitted => return TemplateError::AlreadySubmitted(old.template_status),
        _ => {}
    }

    if let Operation::Update { expected_type } = operation {
        if old.template_type() != expected_type {
            return TemplateError::CannotChangeTemplateType {
                expected: old.template_type(),
                actual: expected_type,
            };
        }
    }

    if let (Some(stored), Some(expected)) = (old.lock_number, expected_lock) {
        if stored != expected {
            return TemplateError::Conflict;
        }
    }

    operation.fallback()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;
    use uuid::Uuid;

    use super::*;
    use crate::error::ErrorCase;
    use crate::storage::types::{owner_key, TemplateContent};

    fn sms(status: TemplateStatus, lock: Option<u64>) -> Template {
        let now = Utc::now();
        Template {
            id: Uuid::new_v4(),
            owner: owner_key("c"),
            client_id: "c".to_string(),
            name: "sms".to_string(),
            content: TemplateContent::Sms {
                message: "hi".to_string(),
            },
            template_status: status,
            lock_number: lock,
            created_at: now,
            updated_at: now,
            created_by: "INTERNAL_USER#u".to_string(),
            updated_by: "INTERNAL_USER#u".to_string(),
            ttl: None,
        }
    }

    const UPDATE_SMS: Operation = Operation::Update {
        expected_type: TemplateType::Sms,
    };

    #[test]
    fn test_missing_and_deleted_are_not_found() {
        assert_eq!(
            explain_rejection(Operation::Submit, None, Some(0)).error_case(),
            ErrorCase::NotFound
        );
        let deleted = sms(TemplateStatus::Deleted, Some(9));
        assert_eq!(
            explain_rejection(UPDATE_SMS, Some(&deleted), Some(0)).error_case(),
            ErrorCase::NotFound
        );
    }

    #[test]
    fn test_submitted_wins_over_lock_mismatch() {
        let submitted = sms(TemplateStatus::Submitted, Some(5));
        assert_eq!(
            explain_rejection(UPDATE_SMS, Some(&submitted), Some(1)).error_case(),
            ErrorCase::AlreadySubmitted
        );
    }

    #[test]
    fn test_type_change_before_lock() {
        let template = sms(TemplateStatus::NotYetSubmitted, Some(5));
        let err = explain_rejection(
            Operation::Update {
                expected_type: TemplateType::Email,
            },
            Some(&template),
            Some(1),
        );
        assert_eq!(err.error_case(), ErrorCase::CannotChangeTemplateType);
    }

    #[test]
    fn test_lock_mismatch_is_conflict() {
        let template = sms(TemplateStatus::NotYetSubmitted, Some(5));
        assert_eq!(
            explain_rejection(UPDATE_SMS, Some(&template), Some(4)).error_case(),
            ErrorCase::Conflict
        );
    }

    #[test]
    fn test_fallbacks() {
        let template = sms(TemplateStatus::PendingValidation, Some(2));
        assert_eq!(
            explain_rejection(UPDATE_SMS, Some(&template), Some(2)).error_case(),
            ErrorCase::Internal
        );
        assert_eq!(
            explain_rejection(Operation::Submit, Some(&template), Some(2)).error_case(),
            ErrorCase::CannotSubmit
        );
        assert_eq!(
            explain_rejection(Operation::ProofRequest, Some(&template), Some(2)).error_case(),
            ErrorCase::ValidationFailed
        );
        assert_eq!(
            explain_rejection(Operation::Delete, Some(&template), Some(2)).error_case(),
            ErrorCase::Internal
        );
    }

    #[test]
    fn test_unguarded_write_skips_lock_check() {
        let template = sms(TemplateStatus::PendingValidation, Some(7));
        assert_eq!(
            explain_rejection(UPDATE_SMS, Some(&template), None).error_case(),
            ErrorCase::Internal
        );
    }

    #[test]
    fn test_legacy_row_never_conflicts() {
        let legacy = sms(TemplateStatus::PendingValidation, None);
        assert_eq!(
            explain_rejection(Operation::Submit, Some(&legacy), Some(42)).error_case(),
            ErrorCase::CannotSubmit
        );
    }

    proptest! {
        #[test]
        fn prop_live_lock_mismatch_is_conflict(stored in 0u64..1000, expected in 0u64..1000) {
            prop_assume!(stored != expected);
            let template = sms(TemplateStatus::NotYetSubmitted, Some(stored));
            for operation in [UPDATE_SMS, Operation::Submit, Operation::Delete, Operation::ProofRequest] {
                prop_assert_eq!(
                    explain_rejection(operation, Some(&template), Some(expected)).error_case(),
                    ErrorCase::Conflict
                );
            }
        }
    }
}
