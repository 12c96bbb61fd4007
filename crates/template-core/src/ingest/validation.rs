use std::sync::Arc;

use tracing::{error, info, Span};

use crate::error::{Result, TemplateError};
use crate::files::LetterFileRepository;
use crate::letters::{validate_letter_template_files, TemplatePdf, TestDataCsv};
use crate::repository::TemplateRepository;
use crate::storage::types::{FileType, TemplateKey, TemplateStatus, VirusScanStatus};

/// Why the pipeline did not validate a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotLetter,
    StaleVersion,
    NotPendingValidation,
    ScanFailed,
    ScanPending,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Skipped(SkipReason),
    /// The result was written with the given validity.
    Recorded { valid: bool },
    /// The result write was rejected because the template moved on.
    Rejected,
}

/// Parses uploaded letter files and records whether they are usable.
pub struct ValidationPipeline {
    repository: Arc<TemplateRepository>,
    files: Arc<dyn LetterFileRepository>,
    span: Span,
}

impl ValidationPipeline {
    pub fn new(
        repository: Arc<TemplateRepository>,
        files: Arc<dyn LetterFileRepository>,
        span: Span,
    ) -> Self {
        Self {
            repository,
            files,
            span,
        }
    }

    /// Validate the files uploaded at `version_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be loaded or a scanned file is
    /// missing from storage; both are worth retrying. Parse failures are not
    /// errors: they are recorded as an invalid result.
    pub fn validate(&self, key: &TemplateKey, version_id: &str) -> Result<ValidationOutcome> {
        let template = self
            .repository
            .get(&key.template_id, &key.client_id)
            .map_err(|e| {
                error!(parent: &self.span, template_key = %key, error = %e, "Unable to load template data");
                e
            })?;

        let Some(letter) = template.letter() else {
            error!(parent: &self.span, template_key = %key, "Can't process non-letter template");
            return Ok(ValidationOutcome::Skipped(SkipReason::NotLetter));
        };

        let files: Vec<_> = letter.files.uploads().collect();

        if files.iter().any(|(_, file)| file.current_version != version_id) {
            info!(parent: &self.span, template_key = %key, version_id, "Event is for non-current file version - skipping");
            return Ok(ValidationOutcome::Skipped(SkipReason::StaleVersion));
        }

        if template.template_status != TemplateStatus::PendingValidation {
            info!(
                parent: &self.span,
                template_key = %key,
                status = %template.template_status,
                "Template is not pending validation - skipping"
            );
            return Ok(ValidationOutcome::Skipped(SkipReason::NotPendingValidation));
        }

        if files
            .iter()
            .any(|(_, file)| file.virus_scan_status == VirusScanStatus::Failed)
        {
            info!(parent: &self.span, template_key = %key, "Template file has failed virus scan - skipping");
            return Ok(ValidationOutcome::Skipped(SkipReason::ScanFailed));
        }

        if files
            .iter()
            .any(|(_, file)| file.virus_scan_status == VirusScanStatus::Pending)
        {
            info!(parent: &self.span, template_key = %key, "Not all files have been scanned");
            return Ok(ValidationOutcome::Skipped(SkipReason::ScanPending));
        }

        let pdf_bytes = self.download(key, FileType::PdfTemplate, version_id)?;
        let csv_bytes = match letter.files.test_data_csv {
            Some(_) => Some(self.download(key, FileType::TestData, version_id)?),
            None => None,
        };

        let proofing_enabled = letter.proofing_enabled;
        let right_to_left = letter.language.is_right_to_left();

        let parsed = TemplatePdf::parse(&pdf_bytes).and_then(|pdf| {
            let csv = csv_bytes.as_deref().map(TestDataCsv::parse).transpose()?;
            Ok((pdf, csv))
        });

        let (valid, parameters, headers) = match parsed {
            Ok((pdf, csv)) => {
                let invalid_renderable = &pdf.markers().invalid_renderable;
                if !invalid_renderable.is_empty() {
                    info!(
                        parent: &self.span,
                        template_key = %key,
                        markers = ?invalid_renderable,
                        "Ignoring markers that cannot be personalised"
                    );
                }
                let valid = right_to_left || validate_letter_template_files(&pdf, csv.as_ref());
                let headers = csv
                    .map(|csv| csv.parameters().to_vec())
                    .unwrap_or_default();
                (valid, pdf.personalisation_parameters().to_vec(), headers)
            }
            Err(e) => {
                error!(parent: &self.span, template_key = %key, error = %e, "File parsing error");
                (false, Vec::new(), Vec::new())
            }
        };

        let recorded = self.repository.set_letter_validation_result(
            key,
            version_id,
            valid,
            parameters,
            headers,
            proofing_enabled,
        )?;

        Ok(match recorded {
            Some(_) => {
                info!(parent: &self.span, template_key = %key, valid, "Recorded letter validation result");
                ValidationOutcome::Recorded { valid }
            }
            None => ValidationOutcome::Rejected,
        })
    }

    fn download(&self, key: &TemplateKey, file_type: FileType, version_id: &str) -> Result<Vec<u8>> {
        self.files
            .download(key, file_type, version_id)?
            .ok_or_else(|| {
                error!(parent: &self.span, template_key = %key, %file_type, "Not all files are available to download");
                TemplateError::internal("Not all files are available to download")
            })
    }
}
