//! Conditional update commands.
//!
//! An [`UpdateCommand`] pairs a key with a precondition and an ordered list of
//! attribute mutations. Commands are assembled with [`UpdateBuilder`] and
//! executed by [`TemplateStore::conditional_update`], which applies every
//! mutation or none of them.
//!
//! [`TemplateStore::conditional_update`]: crate::storage::TemplateStore::conditional_update

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::{Result, TemplateError};
use crate::lifecycle::{Actor, Transition};
use crate::storage::condition::Condition;
use crate::storage::types::{
    FileType, ProofFile, Template, TemplateContent, TemplateKey, TemplateStatus, TemplateType,
    VirusScanStatus,
};

/// A single attribute-level change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SetName(String),
    SetSubject(String),
    SetMessage(String),
    SetStatus(TemplateStatus),
    SetTtl(i64),
    SetUpdatedBy(String),
    SetUpdatedAt(DateTime<Utc>),
    /// `lockNumber = lockNumber + 1`, treating an absent value as zero.
    IncrementLockNumber,
    SetFileScanStatus(FileType, VirusScanStatus),
    SetPersonalisation {
        parameters: Vec<String>,
        csv_headers: Vec<String>,
    },
    PutProof(ProofFile),
    /// Set `supplierReferences` to an empty map if it is absent.
    InitialiseSupplierReferences,
    SetSupplierReference {
        supplier: String,
        reference: String,
    },
}

impl Mutation {
    fn apply(&self, template: &mut Template) -> Result<()> {
        match self {
            Mutation::SetName(name) => template.name = name.clone(),
            Mutation::SetSubject(value) => match &mut template.content {
                TemplateContent::Email { subject, .. } => *subject = value.clone(),
                _ => return Err(unsupported("subject", template.template_type())),
            },
            Mutation::SetMessage(value) => match &mut template.content {
                TemplateContent::Email { message, .. }
                | TemplateContent::Sms { message }
                | TemplateContent::NhsApp { message } => *message = value.clone(),
                TemplateContent::Letter(_) => {
                    return Err(unsupported("message", template.template_type()))
                }
            },
            Mutation::SetStatus(status) => template.template_status = *status,
            Mutation::SetTtl(ttl) => template.ttl = Some(*ttl),
            Mutation::SetUpdatedBy(actor) => template.updated_by = actor.clone(),
            Mutation::SetUpdatedAt(at) => template.updated_at = *at,
            Mutation::IncrementLockNumber => {
                template.lock_number = Some(template.lock_number.unwrap_or(0) + 1)
            }
            Mutation::SetFileScanStatus(file_type, status) => {
                let template_type = template.template_type();
                let file = template
                    .letter_mut()
                    .and_then(|letter| letter.files.file_mut(*file_type))
                    .ok_or_else(|| unsupported(file_type.field_name(), template_type))?;
                file.virus_scan_status = *status;
            }
            Mutation::SetPersonalisation {
                parameters,
                csv_headers,
            } => {
                let template_type = template.template_type();
                let letter = template
                    .letter_mut()
                    .ok_or_else(|| unsupported("personalisationParameters", template_type))?;
                letter.personalisation_parameters = Some(parameters.clone());
                letter.test_data_csv_headers = Some(csv_headers.clone());
            }
            Mutation::PutProof(proof) => {
                let template_type = template.template_type();
                let letter = template
                    .letter_mut()
                    .ok_or_else(|| unsupported("proofs", template_type))?;
                letter
                    .files
                    .proofs
                    .insert(proof.file_name.clone(), proof.clone());
            }
            Mutation::InitialiseSupplierReferences => {
                let template_type = template.template_type();
                let letter = template
                    .letter_mut()
                    .ok_or_else(|| unsupported("supplierReferences", template_type))?;
                letter.supplier_references.get_or_insert_with(BTreeMap::new);
            }
            Mutation::SetSupplierReference {
                supplier,
                reference,
            } => {
                let template_type = template.template_type();
                let letter = template
                    .letter_mut()
                    .ok_or_else(|| unsupported("supplierReferences", template_type))?;
                letter
                    .supplier_references
                    .get_or_insert_with(BTreeMap::new)
                    .insert(supplier.clone(), reference.clone());
            }
        }
        Ok(())
    }
}

fn unsupported(attribute: &str, template_type: TemplateType) -> TemplateError {
    TemplateError::internal(format!(
        "Attribute {} is not defined for {} templates",
        attribute, template_type
    ))
}

/// An atomic conditional write against one template.
#[derive(Debug, Clone)]
pub struct UpdateCommand {
    pub key: TemplateKey,
    pub condition: Condition,
    pub mutations: Vec<Mutation>,
}

impl UpdateCommand {
    /// Apply every mutation to a copy of `current`.
    pub fn apply(&self, current: &Template) -> Result<Template> {
        let mut next = current.clone();
        for mutation in &self.mutations {
            mutation.apply(&mut next)?;
        }
        Ok(next)
    }
}

/// Builder for [`UpdateCommand`].
///
/// `expect_*` methods add preconditions (combined with AND); `set_*` methods
/// add mutations in call order.
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    key: TemplateKey,
    conditions: Vec<Condition>,
    mutations: Vec<Mutation>,
}

impl UpdateBuilder {
    /// Start a command for `key`. The item must exist.
    pub fn new(key: TemplateKey) -> Self {
        Self {
            key,
            conditions: vec![Condition::Exists],
            mutations: Vec::new(),
        }
    }

    pub fn expect(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn expect_status(self, status: TemplateStatus) -> Self {
        self.expect(Condition::status_is(status))
    }

    pub fn expect_not_terminal(self) -> Self {
        self.expect(Condition::not_terminal())
    }

    pub fn expect_lock_number(self, lock_number: u64) -> Self {
        self.expect(Condition::LockNumberIs(lock_number))
    }

    pub fn expect_template_type(self, template_type: TemplateType) -> Self {
        self.expect(Condition::TemplateTypeIs(template_type))
    }

    pub fn expect_file_version(self, file_type: FileType, version: impl Into<String>) -> Self {
        self.expect(Condition::FileVersionIs(file_type, version.into()))
    }

    pub fn expect_proof_absent(self, file_name: impl Into<String>) -> Self {
        self.expect(Condition::ProofAbsent(file_name.into()))
    }

    pub fn set(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    pub fn set_status(self, status: TemplateStatus) -> Self {
        self.set(Mutation::SetStatus(status))
    }

    /// Guard and apply a status change through `transition`.
    ///
    /// # Errors
    ///
    /// Fails when [`Transition::check`] rejects `actor` or `to`.
    pub fn transition(self, transition: Transition, actor: Actor, to: TemplateStatus) -> Result<Self> {
        transition.check(actor, to)?;
        Ok(self.expect(transition.precondition()).set_status(to))
    }

    pub fn set_name(self, name: impl Into<String>) -> Self {
        self.set(Mutation::SetName(name.into()))
    }

    pub fn set_ttl(self, ttl: i64) -> Self {
        self.set(Mutation::SetTtl(ttl))
    }

    /// Refresh `updatedAt`, and `updatedBy` when a user actor is given.
    pub fn touch(self, actor: Option<&str>) -> Self {
        let builder = self.set(Mutation::SetUpdatedAt(Utc::now()));
        match actor {
            Some(actor) => builder.set(Mutation::SetUpdatedBy(actor.to_string())),
            None => builder,
        }
    }

    pub fn increment_lock_number(self) -> Self {
        self.set(Mutation::IncrementLockNumber)
    }

    pub fn build(self) -> UpdateCommand {
        let condition = match self.conditions.len() {
            1 => self.conditions.into_iter().next().unwrap_or(Condition::Exists),
            _ => Condition::All(self.conditions),
        };
        UpdateCommand {
            key: self.key,
            condition,
            mutations: self.mutations,
        }
    }
}
