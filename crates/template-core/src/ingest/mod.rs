//! Event-driven ingestion: virus scan results, letter validation and proofs.
//!
//! Events arrive at least once and in any order. Handlers never retry a
//! rejected conditional write; a rejection means the event is stale or another
//! actor got there first. Malformed events are hard input errors, distinct
//! from the soft no-op for stale ones.

mod proofs;
mod scan;
mod validation;

pub use proofs::{ProofIngester, ProofScanEvent};
pub use scan::{FileScanEvent, ScanIngester, ScanOutcome, TemplateRef};
pub use validation::{SkipReason, ValidationOutcome, ValidationPipeline};

use crate::error::{Result, TemplateError};
use crate::storage::types::VirusScanStatus;

/// Scan results must be final; `PENDING` is never a valid event status.
fn require_final_status(status: VirusScanStatus) -> Result<VirusScanStatus> {
    match status {
        VirusScanStatus::Passed | VirusScanStatus::Failed => Ok(status),
        VirusScanStatus::Pending => Err(TemplateError::field(
            "virusScanStatus",
            "Scan result must be PASSED or FAILED",
        )),
    }
}
