//! Backend-neutral write preconditions.
//!
//! A [`Condition`] is a small predicate tree evaluated against the stored
//! image of a template immediately before a conditional write. The store
//! evaluates it inside the same transaction as the write, so a passing
//! condition and the mutation that follows are atomic.

use crate::storage::types::{FileType, Template, TemplateStatus, TemplateType, VirusScanStatus};

/// Precondition for a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The item exists.
    Exists,
    /// The item's status is one of the listed values.
    StatusIn(Vec<TemplateStatus>),
    /// `lockNumber` equals the value, or is absent on the stored item.
    LockNumberIs(u64),
    /// The item has the given template type.
    TemplateTypeIs(TemplateType),
    /// The item belongs to the given client.
    ClientIs(String),
    /// The letter has `proofingEnabled = true`.
    ProofingEnabled,
    /// The letter file's `currentVersion` equals the value.
    FileVersionIs(FileType, String),
    /// The file is absent (including on non-letters) or has passed its virus scan.
    FileScanPassedOrAbsent(FileType),
    /// No proof with this file name has been recorded.
    ProofAbsent(String),
    All(Vec<Condition>),
}

impl Condition {
    /// Status is not `DELETED` or `SUBMITTED`.
    pub fn not_terminal() -> Self {
        Condition::StatusIn(TemplateStatus::non_terminal())
    }

    pub fn status_is(status: TemplateStatus) -> Self {
        Condition::StatusIn(vec![status])
    }

    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::All(mut conditions) => {
                conditions.push(other);
                Condition::All(conditions)
            }
            first => Condition::All(vec![first, other]),
        }
    }

    /// Evaluate against the stored image. A missing item fails every predicate.
    pub fn evaluate(&self, item: Option<&Template>) -> bool {
        match self {
            Condition::Exists => item.is_some(),
            Condition::StatusIn(statuses) => {
                item.is_some_and(|template| statuses.contains(&template.template_status))
            }
            Condition::LockNumberIs(expected) => item.is_some_and(|template| {
                template.lock_number.map_or(true, |lock| lock == *expected)
            }),
            Condition::TemplateTypeIs(template_type) => {
                item.is_some_and(|template| template.template_type() == *template_type)
            }
            Condition::ClientIs(client_id) => {
                item.is_some_and(|template| template.client_id == *client_id)
            }
            Condition::ProofingEnabled => item
                .and_then(Template::letter)
                .is_some_and(|letter| letter.proofing_enabled),
            Condition::FileVersionIs(file_type, version) => item
                .and_then(|template| template.file(*file_type))
                .is_some_and(|file| file.current_version == *version),
            Condition::FileScanPassedOrAbsent(file_type) => item.is_some_and(|template| {
                template
                    .file(*file_type)
                    .map_or(true, |file| file.virus_scan_status == VirusScanStatus::Passed)
            }),
            Condition::ProofAbsent(file_name) => item
                .and_then(Template::letter)
                .is_some_and(|letter| !letter.files.proofs.contains_key(file_name)),
            Condition::All(conditions) => conditions.iter().all(|c| c.evaluate(item)),
        }
    }
}
