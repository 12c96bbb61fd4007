use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, Span};
use uuid::Uuid;

use super::require_final_status;
use crate::error::{Result, TemplateError};
use crate::repository::{ProofOutcome, TemplateRepository};
use crate::storage::types::{TemplateKey, VirusScanStatus};

/// Result of scanning one archived supplier proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofScanEvent {
    pub template_id: Uuid,
    pub supplier: String,
    pub file_name: String,
    pub virus_scan_status: VirusScanStatus,
}

impl ProofScanEvent {
    /// Parse and check an event body.
    pub fn parse(body: &str) -> Result<Self> {
        let event: ProofScanEvent = serde_json::from_str(body)?;
        event.check()?;
        Ok(event)
    }

    fn check(&self) -> Result<()> {
        require_final_status(self.virus_scan_status)?;
        if self.supplier.trim().is_empty() {
            return Err(TemplateError::field("supplier", "Supplier is required"));
        }
        if self.file_name.trim().is_empty() {
            return Err(TemplateError::field("fileName", "File name is required"));
        }
        Ok(())
    }
}

/// Records supplier proofs and escalates templates once a proof is usable.
pub struct ProofIngester {
    repository: Arc<TemplateRepository>,
    span: Span,
}

impl ProofIngester {
    pub fn new(repository: Arc<TemplateRepository>, span: Span) -> Self {
        Self { repository, span }
    }

    /// Apply one proof scan result.
    ///
    /// # Errors
    ///
    /// Rejects malformed events and templates whose owner cannot be resolved.
    /// Duplicate proofs and lost escalation races are not errors.
    pub fn handle(&self, event: &ProofScanEvent) -> Result<ProofOutcome> {
        event.check()?;

        let client_id = self.repository.client_id_for(&event.template_id)?;
        let key = TemplateKey::new(event.template_id, client_id);

        let outcome = self.repository.set_proof_virus_scan_status(
            &key,
            &event.file_name,
            event.virus_scan_status,
            &event.supplier,
        )?;

        let result = match &outcome {
            ProofOutcome::Rejected => "rejected",
            ProofOutcome::Appended(_) => "appended",
            ProofOutcome::Escalated(_) => "escalated",
        };
        info!(
            parent: &self.span,
            template_key = %key,
            supplier = %event.supplier,
            file_name = %event.file_name,
            result,
            "Processed proof scan result"
        );
        Ok(outcome)
    }
}
