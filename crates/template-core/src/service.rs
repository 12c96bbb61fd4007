//! Template service: the API-facing entry point for user operations.
//!
//! The service validates input shape, looks up per-client configuration, and
//! orchestrates the repository, letter file storage and proof request queue.
//! Every operation acts on behalf of a [`User`] and only ever touches that
//! user's client partition.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn, Span};
use uuid::Uuid;

use crate::error::{Result, TemplateError};
use crate::files::LetterFileRepository;
use crate::proofing::{supplier_reference, ProofRequestQueue, ProofingRequest};
use crate::repository::TemplateRepository;
use crate::storage::types::{
    FileType, Language, LetterFiles, LetterProperties, LetterType, NewTemplate, Template,
    TemplateContent, TemplateFilter, TemplateStatus, User, VersionedFile,
};

/// Maximum message length per channel, in characters.
pub const EMAIL_MESSAGE_LIMIT: usize = 100_000;
pub const NHS_APP_MESSAGE_LIMIT: usize = 5_000;
pub const SMS_MESSAGE_LIMIT: usize = 918;

/// Feature switches for a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFeatures {
    #[serde(default)]
    pub proofing: bool,
}

/// Per-client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfiguration {
    #[serde(default)]
    pub campaign_ids: Vec<String>,
    #[serde(default)]
    pub features: ClientFeatures,
}

/// Source of client configuration.
pub trait ClientConfigRepository: Send + Sync {
    /// Configuration for a client, or `None` if the client has none.
    fn get(&self, client_id: &str) -> Result<Option<ClientConfiguration>>;
}

/// Client configuration held in memory, typically loaded from a config file.
#[derive(Debug, Clone, Default)]
pub struct StaticClientConfig {
    clients: HashMap<String, ClientConfiguration>,
}

impl StaticClientConfig {
    pub fn new(clients: HashMap<String, ClientConfiguration>) -> Self {
        Self { clients }
    }

    pub fn with_client(mut self, client_id: impl Into<String>, config: ClientConfiguration) -> Self {
        self.clients.insert(client_id.into(), config);
        self
    }
}

impl ClientConfigRepository for StaticClientConfig {
    fn get(&self, client_id: &str) -> Result<Option<ClientConfiguration>> {
        Ok(self.clients.get(client_id).cloned())
    }
}

/// Fields a user supplies when uploading a letter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LetterUpload {
    pub name: String,
    pub letter_type: LetterType,
    pub language: Language,
    pub campaign_id: String,
}

/// An uploaded file with its original name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }
}

/// Collects per-field problems into one validation error.
#[derive(Default)]
struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    fn check(&mut self, ok: bool, field: &str, problem: impl Into<String>) {
        if !ok {
            self.0.entry(field.to_string()).or_insert_with(|| problem.into());
        }
    }

    fn finish(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(TemplateError::Validation {
                message: "Request failed validation".to_string(),
                fields: self.0,
            })
        }
    }
}

fn validate_digital_template(template: &NewTemplate) -> Result<()> {
    let mut errors = FieldErrors::default();
    errors.check(!template.name.trim().is_empty(), "name", "Name is required");

    let (message, limit) = match &template.content {
        TemplateContent::Email { subject, message } => {
            errors.check(!subject.trim().is_empty(), "subject", "Subject is required");
            (message, EMAIL_MESSAGE_LIMIT)
        }
        TemplateContent::NhsApp { message } => (message, NHS_APP_MESSAGE_LIMIT),
        TemplateContent::Sms { message } => (message, SMS_MESSAGE_LIMIT),
        TemplateContent::Letter(_) => {
            return Err(TemplateError::field(
                "templateType",
                "Letter templates must be uploaded with their files",
            ))
        }
    };

    errors.check(!message.trim().is_empty(), "message", "Message is required");
    errors.check(
        message.chars().count() <= limit,
        "message",
        format!("Message must be at most {} characters", limit),
    );
    errors.finish()
}

fn has_extension(file_name: &str, extension: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case(extension))
}

/// User-facing template operations.
pub struct TemplateService {
    repository: Arc<TemplateRepository>,
    files: Arc<dyn LetterFileRepository>,
    clients: Arc<dyn ClientConfigRepository>,
    proof_requests: Arc<ProofRequestQueue>,
    default_supplier: String,
    span: Span,
}

impl TemplateService {
    pub fn new(
        repository: Arc<TemplateRepository>,
        files: Arc<dyn LetterFileRepository>,
        clients: Arc<dyn ClientConfigRepository>,
        proof_requests: Arc<ProofRequestQueue>,
        default_supplier: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            repository,
            files,
            clients,
            proof_requests,
            default_supplier: default_supplier.into(),
            span,
        }
    }

    /// Create an EMAIL, SMS or NHS_APP template in `NOT_YET_SUBMITTED`.
    pub fn create_template(&self, template: &NewTemplate, user: &User) -> Result<Template> {
        validate_digital_template(template)?;
        self.repository
            .create(template, user, TemplateStatus::NotYetSubmitted)
    }

    /// Create a letter from uploaded files and queue it for scanning.
    ///
    /// The template is created in `PENDING_UPLOAD`, its files are stored under a
    /// freshly minted version id, and it then moves to `PENDING_VALIDATION`.
    pub fn upload_letter_template(
        &self,
        letter: &LetterUpload,
        pdf: &UploadedFile,
        csv: Option<&UploadedFile>,
        user: &User,
    ) -> Result<Template> {
        let mut errors = FieldErrors::default();
        errors.check(!letter.name.trim().is_empty(), "name", "Name is required");
        errors.check(
            has_extension(&pdf.file_name, "pdf") && !pdf.data.is_empty(),
            "files.pdfTemplate",
            "Letter template must be a non-empty PDF file",
        );
        if let Some(csv) = csv {
            errors.check(
                has_extension(&csv.file_name, "csv") && !csv.data.is_empty(),
                "files.testDataCsv",
                "Test data must be a non-empty CSV file",
            );
        }

        let client = self.clients.get(&user.client_id)?.unwrap_or_default();
        errors.check(
            client.campaign_ids.contains(&letter.campaign_id),
            "campaignId",
            "Invalid campaign ID",
        );
        errors.finish()?;

        let version_id = Uuid::new_v4().to_string();
        let proofing_enabled = !letter.language.is_right_to_left() && client.features.proofing;

        let content = TemplateContent::Letter(LetterProperties {
            letter_type: letter.letter_type,
            language: letter.language,
            files: LetterFiles {
                pdf_template: VersionedFile::pending(&pdf.file_name, &version_id),
                test_data_csv: csv.map(|csv| VersionedFile::pending(&csv.file_name, &version_id)),
                proofs: BTreeMap::new(),
            },
            campaign_id: Some(letter.campaign_id.clone()),
            proofing_enabled,
            personalisation_parameters: None,
            test_data_csv_headers: None,
            supplier_references: None,
        });

        let created = self.repository.create(
            &NewTemplate::new(letter.name.clone(), content),
            user,
            TemplateStatus::PendingUpload,
        )?;
        let key = created.key();

        self.files
            .upload(&key, FileType::PdfTemplate, &version_id, &pdf.data)?;
        if let Some(csv) = csv {
            self.files
                .upload(&key, FileType::TestData, &version_id, &csv.data)?;
        }

        let template = self.repository.finalise_letter_upload(&created.id, user)?;
        info!(
            parent: &self.span,
            template_key = %key,
            version_id = %version_id,
            proofing_enabled,
            "Uploaded letter template"
        );
        Ok(template)
    }

    /// Replace the content of a `NOT_YET_SUBMITTED` template.
    pub fn update_template(
        &self,
        template_id: &Uuid,
        template: &NewTemplate,
        user: &User,
        lock_number: u64,
    ) -> Result<Template> {
        validate_digital_template(template)?;
        self.repository.update(
            template_id,
            template,
            user,
            TemplateStatus::NotYetSubmitted,
            lock_number,
        )
    }

    pub fn submit_template(&self, template_id: &Uuid, user: &User, lock_number: u64) -> Result<Template> {
        self.repository.submit(template_id, user, lock_number)
    }

    pub fn delete_template(&self, template_id: &Uuid, user: &User, lock_number: u64) -> Result<()> {
        self.repository.delete(template_id, user, lock_number)
    }

    pub fn get_template(&self, template_id: &Uuid, user: &User) -> Result<Template> {
        self.repository.get(template_id, &user.client_id)
    }

    pub fn list_templates(&self, user: &User, filter: &TemplateFilter) -> Result<Vec<Template>> {
        self.repository.list(&user.client_id, filter)
    }

    /// Ask the default supplier for proofs of a validated letter.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::FeatureDisabled` if the client does not have
    /// proofing enabled, and the usual lock errors if the template has moved on.
    /// If the template changes before the supplier reference is recorded, no
    /// request is queued and `TemplateError::Conflict` is returned.
    pub fn request_proof(&self, template_id: &Uuid, user: &User, lock_number: u64) -> Result<Template> {
        let client = self.clients.get(&user.client_id)?.unwrap_or_default();
        if !client.features.proofing {
            return Err(TemplateError::FeatureDisabled(
                "Proofing is not enabled for this client".to_string(),
            ));
        }

        let template = self
            .repository
            .proof_request_update(template_id, user, lock_number)?;
        let key = template.key();

        let Some(letter) = template.letter() else {
            return Err(TemplateError::internal("Proofed template is not a letter"));
        };
        let campaign_id = letter.campaign_id.clone().unwrap_or_default();
        let reference = supplier_reference(
            &user.client_id,
            &campaign_id,
            template_id,
            letter.language,
            letter.letter_type,
        );

        let request = ProofingRequest {
            campaign_id,
            language: letter.language,
            letter_type: letter.letter_type,
            pdf_version_id: letter.files.pdf_template.current_version.clone(),
            personalisation_parameters: letter.personalisation_parameters.clone().unwrap_or_default(),
            supplier: self.default_supplier.clone(),
            template_id: *template_id,
            template_name: template.name.clone(),
            test_data_version_id: letter
                .files
                .test_data_csv
                .as_ref()
                .map(|csv| csv.current_version.clone()),
            user: user.clone(),
        };

        let Some(updated) = self
            .repository
            .set_supplier_reference(&key, &self.default_supplier, &reference)?
        else {
            warn!(
                parent: &self.span,
                template_key = %key,
                supplier = %self.default_supplier,
                "Template changed before the supplier reference was recorded; request not queued"
            );
            return Err(TemplateError::Conflict);
        };

        self.proof_requests.enqueue(&request).map_err(|e| {
            error!(parent: &self.span, template_key = %key, error = %e, "Failed to queue proofing request");
            e
        })?;

        info!(
            parent: &self.span,
            template_key = %key,
            supplier = %self.default_supplier,
            supplier_reference = %reference,
            "Requested proof"
        );
        Ok(updated)
    }
}
