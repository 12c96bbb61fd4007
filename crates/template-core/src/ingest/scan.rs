use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, Span};
use uuid::Uuid;

use super::require_final_status;
use super::validation::{ValidationOutcome, ValidationPipeline};
use crate::error::Result;
use crate::repository::TemplateRepository;
use crate::storage::types::{
    FileType, Template, TemplateKey, TemplateStatus, VirusScanStatus, CLIENT_OWNER_PREFIX,
};

/// Template addressed by a scan event. `owner` is the client id; the
/// partition-key form `CLIENT#<id>` is also accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRef {
    pub id: Uuid,
    pub owner: String,
}

/// Result of scanning one uploaded letter file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileScanEvent {
    pub template: TemplateRef,
    pub file_type: FileType,
    pub version_id: String,
    pub virus_scan_status: VirusScanStatus,
}

impl FileScanEvent {
    /// Parse and check an event body.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::Validation` for missing fields, unknown file
    /// types, or a `PENDING` status.
    pub fn parse(body: &str) -> Result<Self> {
        let event: FileScanEvent = serde_json::from_str(body)?;
        require_final_status(event.virus_scan_status)?;
        Ok(event)
    }

    pub fn template_key(&self) -> TemplateKey {
        let client_id = self
            .template
            .owner
            .strip_prefix(CLIENT_OWNER_PREFIX)
            .unwrap_or(&self.template.owner);
        TemplateKey::new(self.template.id, client_id)
    }
}

/// What a scan event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Version mismatch or terminal template; nothing changed.
    Stale,
    /// The scan status was recorded.
    Recorded,
    /// The scan status was recorded and completed the upload, so validation ran.
    Validated(ValidationOutcome),
}

/// Applies virus scan results to uploaded letter files.
pub struct ScanIngester {
    repository: Arc<TemplateRepository>,
    pipeline: Arc<ValidationPipeline>,
    span: Span,
}

impl ScanIngester {
    pub fn new(
        repository: Arc<TemplateRepository>,
        pipeline: Arc<ValidationPipeline>,
        span: Span,
    ) -> Self {
        Self {
            repository,
            pipeline,
            span,
        }
    }

    /// Apply one scan result.
    ///
    /// # Errors
    ///
    /// Rejects `PENDING` results. Storage failures and validation errors
    /// (such as a missing download) are propagated so the event is retried.
    pub fn handle(&self, event: &FileScanEvent) -> Result<ScanOutcome> {
        let status = require_final_status(event.virus_scan_status)?;
        let key = event.template_key();

        let updated = self.repository.set_file_virus_scan_status(
            &key,
            event.file_type,
            &event.version_id,
            status,
        )?;

        let Some(updated) = updated else {
            return Ok(ScanOutcome::Stale);
        };

        info!(
            parent: &self.span,
            template_key = %key,
            file_type = %event.file_type,
            version_id = %event.version_id,
            %status,
            "Recorded virus scan status"
        );

        if status != VirusScanStatus::Passed || !ready_for_validation(&updated, &event.version_id) {
            return Ok(ScanOutcome::Recorded);
        }

        let outcome = self.pipeline.validate(&key, &event.version_id)?;
        Ok(ScanOutcome::Validated(outcome))
    }
}

/// Every uploaded file has passed at `version_id` and the template awaits validation.
fn ready_for_validation(template: &Template, version_id: &str) -> bool {
    if template.template_status != TemplateStatus::PendingValidation {
        return false;
    }
    let Some(letter) = template.letter() else {
        return false;
    };
    letter.files.uploads().all(|(_, file)| {
        file.current_version == version_id && file.virus_scan_status == VirusScanStatus::Passed
    })
}
