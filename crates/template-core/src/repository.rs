//! Template repository: every mutation the system performs on a template.
//!
//! User-facing operations (`update`, `submit`, `delete`, `proof_request_update`)
//! are lock-guarded and translate a rejected write into a business error via
//! [`explain_rejection`]. Event-driven operations (scan results, validation
//! results, proofs) are best-effort: a rejected write means another actor
//! already moved the template on, so it is logged and swallowed.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{error, info, Span};
use uuid::Uuid;

use crate::concurrency::{explain_rejection, Operation};
use crate::error::{Result, TemplateError};
use crate::lifecycle::{Actor, Transition};
use crate::storage::condition::Condition;
use crate::storage::traits::{TemplateStore, WriteOutcome};
use crate::storage::types::{
    client_id_from_owner, owner_key, FileType, NewTemplate, ProofFile, Template, TemplateContent,
    TemplateFilter, TemplateKey, TemplateStatus, TemplateType, User, VirusScanStatus,
};
use crate::storage::update::{Mutation, UpdateBuilder, UpdateCommand};

/// Default retention of `DELETED` templates before purge.
pub const DEFAULT_DELETED_TTL_DAYS: i64 = 90;

/// Result of ingesting one proof scan result.
#[derive(Debug, Clone, PartialEq)]
pub enum ProofOutcome {
    /// The proof was already recorded or the template is terminal.
    Rejected,
    /// The proof was recorded; status was left alone.
    Appended(Template),
    /// The proof was recorded and the template moved to `PROOF_AVAILABLE`.
    Escalated(Template),
}

/// Lock-aware access to templates.
pub struct TemplateRepository {
    store: Arc<dyn TemplateStore>,
    deleted_ttl: Duration,
    span: Span,
}

impl TemplateRepository {
    pub fn new(store: Arc<dyn TemplateStore>, span: Span) -> Self {
        Self {
            store,
            deleted_ttl: Duration::days(DEFAULT_DELETED_TTL_DAYS),
            span,
        }
    }

    /// Override how long deleted templates are retained.
    pub fn with_deleted_ttl(mut self, ttl: Duration) -> Self {
        self.deleted_ttl = ttl;
        self
    }

    pub fn store(&self) -> &Arc<dyn TemplateStore> {
        &self.store
    }

    /// Fetch a live template. `DELETED` templates are reported as not found.
    pub fn get(&self, template_id: &Uuid, client_id: &str) -> Result<Template> {
        let key = TemplateKey::new(*template_id, client_id);
        match self.store.get_item(&key)? {
            Some(template) if template.template_status != TemplateStatus::Deleted => Ok(template),
            _ => Err(TemplateError::NotFound),
        }
    }

    /// Insert a new template with lock number 0.
    pub fn create(
        &self,
        new_template: &NewTemplate,
        user: &User,
        initial_status: TemplateStatus,
    ) -> Result<Template> {
        let now = Utc::now();
        let actor = user.actor_key();
        let key = user.template_key(Uuid::new_v4());
        let template = Template {
            id: key.template_id,
            owner: key.owner(),
            client_id: key.client_id.clone(),
            name: new_template.name.clone(),
            content: new_template.content.clone(),
            template_status: initial_status,
            lock_number: Some(0),
            created_at: now,
            updated_at: now,
            created_by: actor.clone(),
            updated_by: actor,
            ttl: None,
        };

        self.store.put_new(&template).map_err(|e| {
            error!(parent: &self.span, template_id = %template.id, error = %e, "Failed to create template");
            TemplateError::internal_with("Failed to create template", e)
        })?;

        info!(
            parent: &self.span,
            template_id = %template.id,
            template_type = %template.template_type(),
            status = %template.template_status,
            "Created template"
        );
        Ok(template)
    }

    /// Replace the content of a template in `expected_status`.
    ///
    /// `expected_status` must be one the edit transition starts from.
    pub fn update(
        &self,
        template_id: &Uuid,
        new_content: &NewTemplate,
        user: &User,
        expected_status: TemplateStatus,
        lock_number: u64,
    ) -> Result<Template> {
        if !Transition::Edit.permits(expected_status, expected_status) {
            return Err(TemplateError::internal(format!(
                "Templates cannot be edited in status {}",
                expected_status
            )));
        }

        let expected_type = new_content.template_type();
        let mut builder = UpdateBuilder::new(user.template_key(*template_id))
            .expect(Transition::Edit.precondition())
            .expect_status(expected_status)
            .expect_template_type(expected_type)
            .expect_lock_number(lock_number)
            .set_name(new_content.name.clone());

        builder = match &new_content.content {
            TemplateContent::Email { subject, message } => builder
                .set(Mutation::SetSubject(subject.clone()))
                .set(Mutation::SetMessage(message.clone())),
            TemplateContent::Sms { message } | TemplateContent::NhsApp { message } => {
                builder.set(Mutation::SetMessage(message.clone()))
            }
            TemplateContent::Letter(_) => builder,
        };

        let command = builder
            .touch(Some(&user.actor_key()))
            .increment_lock_number()
            .build();

        self.user_write(
            &command,
            Operation::Update { expected_type },
            Some(lock_number),
        )
    }

    /// Move a template to `SUBMITTED`.
    pub fn submit(&self, template_id: &Uuid, user: &User, lock_number: u64) -> Result<Template> {
        let command = UpdateBuilder::new(user.template_key(*template_id))
            .transition(Transition::Submit, Actor::User, TemplateStatus::Submitted)?
            .expect_lock_number(lock_number)
            .touch(Some(&user.actor_key()))
            .increment_lock_number()
            .build();

        self.user_write(&command, Operation::Submit, Some(lock_number))
    }

    /// Soft-delete a template, scheduling it for purge.
    pub fn delete(&self, template_id: &Uuid, user: &User, lock_number: u64) -> Result<()> {
        let ttl = (Utc::now() + self.deleted_ttl).timestamp();
        let command = UpdateBuilder::new(user.template_key(*template_id))
            .transition(Transition::Delete, Actor::User, TemplateStatus::Deleted)?
            .expect_lock_number(lock_number)
            .set_ttl(ttl)
            .touch(Some(&user.actor_key()))
            .increment_lock_number()
            .build();

        self.user_write(&command, Operation::Delete, Some(lock_number))?;
        Ok(())
    }

    /// Mark a letter's files as stored: `PENDING_UPLOAD -> PENDING_VALIDATION`.
    pub fn finalise_letter_upload(&self, template_id: &Uuid, user: &User) -> Result<Template> {
        let command = UpdateBuilder::new(user.template_key(*template_id))
            .transition(
                Transition::FinaliseUpload,
                Actor::User,
                TemplateStatus::PendingValidation,
            )?
            .expect_template_type(TemplateType::Letter)
            .touch(Some(&user.actor_key()))
            .increment_lock_number()
            .build();

        self.user_write(
            &command,
            Operation::Update {
                expected_type: TemplateType::Letter,
            },
            None,
        )
    }

    /// `PENDING_PROOF_REQUEST -> WAITING_FOR_PROOF` for a proofing-enabled letter.
    pub fn proof_request_update(
        &self,
        template_id: &Uuid,
        user: &User,
        lock_number: u64,
    ) -> Result<Template> {
        let command = UpdateBuilder::new(user.template_key(*template_id))
            .transition(Transition::RequestProof, Actor::User, TemplateStatus::WaitingForProof)?
            .expect_template_type(TemplateType::Letter)
            .expect(Condition::ClientIs(user.client_id.clone()))
            .expect(Condition::ProofingEnabled)
            .expect_lock_number(lock_number)
            .touch(Some(&user.actor_key()))
            .set(Mutation::InitialiseSupplierReferences)
            .increment_lock_number()
            .build();

        self.user_write(&command, Operation::ProofRequest, Some(lock_number))
    }

    /// Record the reference a supplier will use for a template's proofs.
    pub fn set_supplier_reference(
        &self,
        key: &TemplateKey,
        supplier: &str,
        reference: &str,
    ) -> Result<Option<Template>> {
        let command = UpdateBuilder::new(key.clone())
            .expect_template_type(TemplateType::Letter)
            .expect_not_terminal()
            .set(Mutation::SetSupplierReference {
                supplier: supplier.to_string(),
                reference: reference.to_string(),
            })
            .touch(None)
            .increment_lock_number()
            .build();

        self.system_write(&command, key, "Conditional check failed when setting supplier reference")
    }

    /// Record the outcome of letter validation for `version_id`.
    ///
    /// Parameters and headers are stored only when `valid`. Rejections
    /// (stale version, terminal template) are logged and return `Ok(None)`.
    pub fn set_letter_validation_result(
        &self,
        key: &TemplateKey,
        version_id: &str,
        valid: bool,
        personalisation_parameters: Vec<String>,
        test_data_csv_headers: Vec<String>,
        proofing_enabled: bool,
    ) -> Result<Option<Template>> {
        let status = match (valid, proofing_enabled) {
            (false, _) => TemplateStatus::ValidationFailed,
            (true, true) => TemplateStatus::PendingProofRequest,
            (true, false) => TemplateStatus::NotYetSubmitted,
        };

        let mut builder = UpdateBuilder::new(key.clone())
            .expect_file_version(FileType::PdfTemplate, version_id)
            .transition(Transition::RecordValidation, Actor::ValidationPipeline, status)?;
        if valid {
            builder = builder.set(Mutation::SetPersonalisation {
                parameters: personalisation_parameters,
                csv_headers: test_data_csv_headers,
            });
        }
        let command = builder.touch(None).increment_lock_number().build();

        self.system_write(&command, key, "Conditional check failed when setting letter validation status")
    }

    /// Record a virus scan result for the uploaded file at `version_id`.
    ///
    /// A failed scan also moves the template to `VIRUS_SCAN_FAILED`.
    /// Rejections (stale version, terminal template) are logged and return
    /// `Ok(None)`.
    pub fn set_file_virus_scan_status(
        &self,
        key: &TemplateKey,
        file_type: FileType,
        version_id: &str,
        status: VirusScanStatus,
    ) -> Result<Option<Template>> {
        let mut builder = UpdateBuilder::new(key.clone())
            .expect_file_version(file_type, version_id)
            .expect_not_terminal()
            .set(Mutation::SetFileScanStatus(file_type, status));
        if status == VirusScanStatus::Failed {
            builder = builder.transition(
                Transition::ScanFailed,
                Actor::ScanIngester,
                TemplateStatus::VirusScanFailed,
            )?;
        }
        let command = builder.touch(None).increment_lock_number().build();

        self.system_write(&command, key, "Conditional check failed when setting file virus scan status")
    }

    /// Phase one of proof ingestion: record a proof that is not yet present.
    pub fn append_proof(
        &self,
        key: &TemplateKey,
        file_name: &str,
        status: VirusScanStatus,
        supplier: &str,
    ) -> Result<WriteOutcome> {
        let command = UpdateBuilder::new(key.clone())
            .expect_template_type(TemplateType::Letter)
            .expect_proof_absent(file_name)
            .expect_not_terminal()
            .set(Mutation::PutProof(ProofFile {
                file_name: file_name.to_string(),
                supplier: supplier.to_string(),
                virus_scan_status: status,
            }))
            .touch(None)
            .increment_lock_number()
            .build();

        self.store.conditional_update(&command)
    }

    /// Phase two of proof ingestion: `WAITING_FOR_PROOF -> PROOF_AVAILABLE`.
    pub fn escalate_to_proof_available(&self, key: &TemplateKey) -> Result<WriteOutcome> {
        let command = UpdateBuilder::new(key.clone())
            .transition(Transition::Escalate, Actor::ProofIngester, TemplateStatus::ProofAvailable)?
            .touch(None)
            .increment_lock_number()
            .build();

        self.store.conditional_update(&command)
    }

    /// Ingest a proof scan result in two guarded phases.
    ///
    /// Escalation is attempted only if the append succeeded, the scan passed,
    /// and the appended image is still `WAITING_FOR_PROOF`.
    pub fn set_proof_virus_scan_status(
        &self,
        key: &TemplateKey,
        file_name: &str,
        status: VirusScanStatus,
        supplier: &str,
    ) -> Result<ProofOutcome> {
        let appended = match self.append_proof(key, file_name, status, supplier)? {
            WriteOutcome::Updated(template) => template,
            WriteOutcome::ConditionFailed { .. } => {
                info!(
                    parent: &self.span,
                    template_key = %key,
                    file_name,
                    "Conditional check failed when adding proof details to template"
                );
                return Ok(ProofOutcome::Rejected);
            }
        };

        if status != VirusScanStatus::Passed
            || appended.template_status != TemplateStatus::WaitingForProof
        {
            return Ok(ProofOutcome::Appended(appended));
        }

        match self.escalate_to_proof_available(key)? {
            WriteOutcome::Updated(template) => {
                info!(parent: &self.span, template_key = %key, "Proof available");
                Ok(ProofOutcome::Escalated(template))
            }
            WriteOutcome::ConditionFailed { .. } => {
                info!(
                    parent: &self.span,
                    template_key = %key,
                    "Conditional check failed when setting template status"
                );
                Ok(ProofOutcome::Appended(appended))
            }
        }
    }

    /// Resolve a template's client through the id index.
    pub fn client_id_for(&self, template_id: &Uuid) -> Result<String> {
        let owner = self
            .store
            .owner_for_id(template_id)?
            .ok_or_else(|| {
                TemplateError::internal(format!("Could not identify item by id {}", template_id))
            })?;
        client_id_from_owner(&owner)
    }

    /// Live templates for a client matching `filter`.
    pub fn list(&self, client_id: &str, filter: &TemplateFilter) -> Result<Vec<Template>> {
        let owner = owner_key(client_id);
        let templates = self.store.list_owner(&owner)?;
        Ok(templates
            .into_iter()
            .filter(|template| filter.matches(template))
            .collect())
    }

    /// Remove deleted templates whose retention has expired.
    pub fn purge_expired(&self) -> Result<usize> {
        let removed = self.store.purge_expired(Utc::now().timestamp())?;
        info!(parent: &self.span, removed, "Purged expired templates");
        Ok(removed)
    }

    fn user_write(
        &self,
        command: &UpdateCommand,
        operation: Operation,
        lock_number: Option<u64>,
    ) -> Result<Template> {
        let outcome = self.store.conditional_update(command).map_err(|e| {
            error!(parent: &self.span, template_key = %command.key, error = %e, "Failed to update template");
            TemplateError::internal_with("Failed to update template", e)
        })?;

        match outcome {
            WriteOutcome::Updated(template) => Ok(template),
            WriteOutcome::ConditionFailed { old } => {
                let err = explain_rejection(operation, old.as_ref(), lock_number);
                info!(
                    parent: &self.span,
                    template_key = %command.key,
                    error_case = %err.error_case(),
                    "Template write rejected"
                );
                Err(err)
            }
        }
    }

    fn system_write(
        &self,
        command: &UpdateCommand,
        key: &TemplateKey,
        rejection: &str,
    ) -> Result<Option<Template>> {
        match self.store.conditional_update(command)? {
            WriteOutcome::Updated(template) => Ok(Some(template)),
            WriteOutcome::ConditionFailed { .. } => {
                info!(parent: &self.span, template_key = %key, "{}", rejection);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCase;
    use crate::storage::SqliteTemplateStore;

    fn repository() -> TemplateRepository {
        let store = SqliteTemplateStore::open_in_memory().unwrap();
        TemplateRepository::new(Arc::new(store), Span::none())
    }

    fn user() -> User {
        User::new("client-1", "user-1")
    }

    #[test]
    fn test_create_starts_at_lock_zero() {
        let repo = repository();
        let template = repo
            .create(
                &NewTemplate::sms("reminder", "hello"),
                &user(),
                TemplateStatus::NotYetSubmitted,
            )
            .unwrap();

        assert_eq!(template.lock_number, Some(0));
        assert_eq!(template.owner, "CLIENT#client-1");
        assert_eq!(template.created_by, "INTERNAL_USER#user-1");
        assert_eq!(repo.get(&template.id, "client-1").unwrap(), template);
    }

    #[test]
    fn test_get_hides_other_clients_and_deleted() {
        let repo = repository();
        let template = repo
            .create(&NewTemplate::sms("a", "b"), &user(), TemplateStatus::NotYetSubmitted)
            .unwrap();

        assert!(matches!(
            repo.get(&template.id, "client-2"),
            Err(TemplateError::NotFound)
        ));

        repo.delete(&template.id, &user(), 0).unwrap();
        assert!(matches!(
            repo.get(&template.id, "client-1"),
            Err(TemplateError::NotFound)
        ));
    }

    #[test]
    fn test_delete_sets_ttl() {
        let repo = repository().with_deleted_ttl(Duration::days(1));
        let template = repo
            .create(&NewTemplate::sms("a", "b"), &user(), TemplateStatus::NotYetSubmitted)
            .unwrap();
        repo.delete(&template.id, &user(), 0).unwrap();

        let stored = repo.store().get_item(&template.key()).unwrap().unwrap();
        assert_eq!(stored.template_status, TemplateStatus::Deleted);
        assert_eq!(stored.lock_number, Some(1));
        let ttl = stored.ttl.unwrap();
        let expected = (Utc::now() + Duration::days(1)).timestamp();
        assert!((expected - ttl).abs() < 60);
    }

    #[test]
    fn test_update_changes_type_fields() {
        let repo = repository();
        let template = repo
            .create(
                &NewTemplate::email("welcome", "Hi", "Body"),
                &user(),
                TemplateStatus::NotYetSubmitted,
            )
            .unwrap();

        let updated = repo
            .update(
                &template.id,
                &NewTemplate::email("welcome v2", "Hello", "New body"),
                &User::new("client-1", "user-2"),
                TemplateStatus::NotYetSubmitted,
                0,
            )
            .unwrap();

        assert_eq!(updated.name, "welcome v2");
        assert_eq!(
            updated.content,
            TemplateContent::Email {
                subject: "Hello".to_string(),
                message: "New body".to_string()
            }
        );
        assert_eq!(updated.updated_by, "INTERNAL_USER#user-2");
        assert_eq!(updated.created_by, "INTERNAL_USER#user-1");
        assert_eq!(updated.lock_number, Some(1));
    }

    #[test]
    fn test_update_cannot_change_type() {
        let repo = repository();
        let template = repo
            .create(&NewTemplate::sms("a", "b"), &user(), TemplateStatus::NotYetSubmitted)
            .unwrap();

        let err = repo
            .update(
                &template.id,
                &NewTemplate::nhs_app("a", "b"),
                &user(),
                TemplateStatus::NotYetSubmitted,
                0,
            )
            .unwrap_err();
        assert_eq!(err.error_case(), ErrorCase::CannotChangeTemplateType);
    }

    #[test]
    fn test_update_outside_edit_status_is_refused_before_writing() {
        let repo = repository();
        let template = repo
            .create(&NewTemplate::sms("a", "b"), &user(), TemplateStatus::WaitingForProof)
            .unwrap();

        let err = repo
            .update(
                &template.id,
                &NewTemplate::sms("changed", "b"),
                &user(),
                TemplateStatus::WaitingForProof,
                0,
            )
            .unwrap_err();
        assert_eq!(err.error_case(), ErrorCase::Internal);
        assert_eq!(repo.get(&template.id, "client-1").unwrap(), template);
    }

    #[test]
    fn test_update_missing_template() {
        let repo = repository();
        let err = repo
            .update(
                &Uuid::new_v4(),
                &NewTemplate::sms("a", "b"),
                &user(),
                TemplateStatus::NotYetSubmitted,
                0,
            )
            .unwrap_err();
        assert_eq!(err.error_case(), ErrorCase::NotFound);
    }

    #[test]
    fn test_submit_from_wrong_status_is_cannot_submit() {
        let repo = repository();
        let template = repo
            .create(&NewTemplate::sms("a", "b"), &user(), TemplateStatus::PendingValidation)
            .unwrap();

        let err = repo.submit(&template.id, &user(), 0).unwrap_err();
        assert_eq!(err.error_case(), ErrorCase::CannotSubmit);
    }

    #[test]
    fn test_client_id_lookup() {
        let repo = repository();
        let template = repo
            .create(&NewTemplate::sms("a", "b"), &user(), TemplateStatus::NotYetSubmitted)
            .unwrap();

        assert_eq!(repo.client_id_for(&template.id).unwrap(), "client-1");
        assert!(repo.client_id_for(&Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_list_filters() {
        let repo = repository();
        repo.create(&NewTemplate::sms("a", "b"), &user(), TemplateStatus::NotYetSubmitted)
            .unwrap();
        let email = repo
            .create(
                &NewTemplate::email("e", "s", "m"),
                &user(),
                TemplateStatus::NotYetSubmitted,
            )
            .unwrap();
        let deleted = repo
            .create(&NewTemplate::sms("gone", "b"), &user(), TemplateStatus::NotYetSubmitted)
            .unwrap();
        repo.delete(&deleted.id, &user(), 0).unwrap();

        let all = repo.list("client-1", &TemplateFilter::new()).unwrap();
        assert_eq!(all.len(), 2);

        let emails = repo
            .list(
                "client-1",
                &TemplateFilter::new().template_type(TemplateType::Email),
            )
            .unwrap();
        assert_eq!(emails, vec![email]);

        assert!(repo.list("client-2", &TemplateFilter::new()).unwrap().is_empty());
    }
}
