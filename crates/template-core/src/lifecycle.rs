//! Template status state machine.
//!
//! Every status change goes through a [`Transition`]. A transition declares
//! which actor may perform it, which statuses it may start from, and which
//! statuses it may produce. [`Transition::check`] rejects a wrong actor or
//! target before a write is built, and [`Transition::precondition`] becomes
//! part of the conditional write, so the source status is enforced by the
//! store rather than by callers reading first.

use std::fmt;

use crate::error::{Result, TemplateError};
use crate::storage::condition::Condition;
use crate::storage::types::{FileType, TemplateStatus};

/// Who performs a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User,
    ScanIngester,
    ValidationPipeline,
    ProofIngester,
}

/// A named edge (or family of edges) in the status graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Content edit; status is unchanged.
    Edit,
    FinaliseUpload,
    ScanFailed,
    RecordValidation,
    RequestProof,
    Escalate,
    Submit,
    Delete,
}

impl Transition {
    pub fn actor(&self) -> Actor {
        match self {
            Transition::Edit
            | Transition::FinaliseUpload
            | Transition::RequestProof
            | Transition::Submit
            | Transition::Delete => Actor::User,
            Transition::ScanFailed => Actor::ScanIngester,
            Transition::RecordValidation => Actor::ValidationPipeline,
            Transition::Escalate => Actor::ProofIngester,
        }
    }

    /// Statuses the transition may start from.
    pub fn from_statuses(&self) -> Vec<TemplateStatus> {
        match self {
            Transition::Edit => vec![TemplateStatus::NotYetSubmitted],
            Transition::FinaliseUpload => vec![TemplateStatus::PendingUpload],
            Transition::ScanFailed | Transition::RecordValidation | Transition::Delete => {
                TemplateStatus::non_terminal()
            }
            Transition::RequestProof => vec![TemplateStatus::PendingProofRequest],
            Transition::Escalate => vec![TemplateStatus::WaitingForProof],
            Transition::Submit => vec![
                TemplateStatus::NotYetSubmitted,
                TemplateStatus::ProofAvailable,
            ],
        }
    }

    /// Statuses the transition may produce. Empty means status is unchanged.
    pub fn to_statuses(&self) -> &'static [TemplateStatus] {
        match self {
            Transition::Edit => &[],
            Transition::FinaliseUpload => &[TemplateStatus::PendingValidation],
            Transition::ScanFailed => &[TemplateStatus::VirusScanFailed],
            Transition::RecordValidation => &[
                TemplateStatus::NotYetSubmitted,
                TemplateStatus::PendingProofRequest,
                TemplateStatus::ValidationFailed,
            ],
            Transition::RequestProof => &[TemplateStatus::WaitingForProof],
            Transition::Escalate => &[TemplateStatus::ProofAvailable],
            Transition::Submit => &[TemplateStatus::Submitted],
            Transition::Delete => &[TemplateStatus::Deleted],
        }
    }

    /// Whether this transition allows `from -> to`.
    pub fn permits(&self, from: TemplateStatus, to: TemplateStatus) -> bool {
        if !self.from_statuses().contains(&from) {
            return false;
        }
        let targets = self.to_statuses();
        if targets.is_empty() {
            from == to
        } else {
            targets.contains(&to)
        }
    }

    /// Check that `actor` may drive this transition to `to`.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::Internal` for the wrong actor, or for a target
    /// the transition cannot produce. `Edit` never changes status, so it
    /// accepts no target here.
    pub fn check(&self, actor: Actor, to: TemplateStatus) -> Result<()> {
        if actor != self.actor() {
            return Err(TemplateError::internal(format!(
                "{:?} may not perform {}",
                actor, self
            )));
        }
        if !self.to_statuses().contains(&to) {
            return Err(TemplateError::internal(format!(
                "{} cannot move a template to {}",
                self, to
            )));
        }
        Ok(())
    }

    /// Store-side guard for this transition.
    ///
    /// Submission additionally requires every uploaded file to have passed
    /// its virus scan.
    pub fn precondition(&self) -> Condition {
        let status = Condition::StatusIn(self.from_statuses());
        match self {
            Transition::Submit => status
                .and(Condition::FileScanPassedOrAbsent(FileType::PdfTemplate))
                .and(Condition::FileScanPassedOrAbsent(FileType::TestData)),
            _ => status,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transition::Edit => "edit",
            Transition::FinaliseUpload => "finalise-upload",
            Transition::ScanFailed => "scan-failed",
            Transition::RecordValidation => "record-validation",
            Transition::RequestProof => "request-proof",
            Transition::Escalate => "escalate",
            Transition::Submit => "submit",
            Transition::Delete => "delete",
        };
        f.write_str(name)
    }
}
