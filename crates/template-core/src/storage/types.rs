//! Core data types for the template store.
//!
//! A [`Template`] is persisted as a single JSON document per
//! `(owner, id)` key. Field names on the wire are camelCase; enumerations use
//! the SCREAMING_SNAKE_CASE names shared with API consumers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TemplateError};

/// Prefix for the tenant partition key.
pub const CLIENT_OWNER_PREFIX: &str = "CLIENT#";

/// Prefix for user actor references.
pub const INTERNAL_USER_PREFIX: &str = "INTERNAL_USER#";

/// Lifecycle status of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateStatus {
    PendingUpload,
    PendingValidation,
    ValidationFailed,
    VirusScanFailed,
    NotYetSubmitted,
    PendingProofRequest,
    WaitingForProof,
    ProofAvailable,
    Submitted,
    Deleted,
}

impl TemplateStatus {
    pub const ALL: [TemplateStatus; 10] = [
        TemplateStatus::PendingUpload,
        TemplateStatus::PendingValidation,
        TemplateStatus::ValidationFailed,
        TemplateStatus::VirusScanFailed,
        TemplateStatus::NotYetSubmitted,
        TemplateStatus::PendingProofRequest,
        TemplateStatus::WaitingForProof,
        TemplateStatus::ProofAvailable,
        TemplateStatus::Submitted,
        TemplateStatus::Deleted,
    ];

    /// Statuses that end the user-facing lifecycle.
    pub const TERMINAL: [TemplateStatus; 2] = [TemplateStatus::Deleted, TemplateStatus::Submitted];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateStatus::PendingUpload => "PENDING_UPLOAD",
            TemplateStatus::PendingValidation => "PENDING_VALIDATION",
            TemplateStatus::ValidationFailed => "VALIDATION_FAILED",
            TemplateStatus::VirusScanFailed => "VIRUS_SCAN_FAILED",
            TemplateStatus::NotYetSubmitted => "NOT_YET_SUBMITTED",
            TemplateStatus::PendingProofRequest => "PENDING_PROOF_REQUEST",
            TemplateStatus::WaitingForProof => "WAITING_FOR_PROOF",
            TemplateStatus::ProofAvailable => "PROOF_AVAILABLE",
            TemplateStatus::Submitted => "SUBMITTED",
            TemplateStatus::Deleted => "DELETED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    /// All statuses from which user and event mutations are still accepted.
    pub fn non_terminal() -> Vec<TemplateStatus> {
        Self::ALL
            .iter()
            .copied()
            .filter(|status| !status.is_terminal())
            .collect()
    }
}

impl fmt::Display for TemplateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateStatus {
    type Err = TemplateError;

    fn from_str(value: &str) -> Result<Self> {
        TemplateStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| TemplateError::field("templateStatus", format!("Unknown status: {}", value)))
    }
}

/// Message channel of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateType {
    Email,
    Sms,
    NhsApp,
    Letter,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Email => "EMAIL",
            TemplateType::Sms => "SMS",
            TemplateType::NhsApp => "NHS_APP",
            TemplateType::Letter => "LETTER",
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateType {
    type Err = TemplateError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().replace('-', "_").as_str() {
            "EMAIL" => Ok(TemplateType::Email),
            "SMS" => Ok(TemplateType::Sms),
            "NHS_APP" | "APP" => Ok(TemplateType::NhsApp),
            "LETTER" => Ok(TemplateType::Letter),
            _ => Err(TemplateError::field(
                "templateType",
                format!("Unknown template type: {}", value),
            )),
        }
    }
}

/// Outcome of a virus scan for an uploaded file or proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VirusScanStatus {
    Pending,
    Passed,
    Failed,
}

impl VirusScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VirusScanStatus::Pending => "PENDING",
            VirusScanStatus::Passed => "PASSED",
            VirusScanStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for VirusScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VirusScanStatus {
    type Err = TemplateError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(VirusScanStatus::Pending),
            "PASSED" => Ok(VirusScanStatus::Passed),
            "FAILED" => Ok(VirusScanStatus::Failed),
            _ => Err(TemplateError::field(
                "virusScanStatus",
                format!("Unknown virus scan status: {}", value),
            )),
        }
    }
}

/// Role of an uploaded letter file.
///
/// Serialized with the event wire names (`pdf-template`, `test-data`);
/// [`FileType::field_name`] gives the key used inside the stored `files` map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    #[serde(rename = "pdf-template")]
    PdfTemplate,
    #[serde(rename = "test-data")]
    TestData,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::PdfTemplate => "pdf-template",
            FileType::TestData => "test-data",
        }
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            FileType::PdfTemplate => "pdfTemplate",
            FileType::TestData => "testDataCsv",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileType::PdfTemplate => "pdf",
            FileType::TestData => "csv",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Letter accessibility format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LetterType {
    Q1,
    Q4,
    X0,
    X1,
    X3,
}

impl LetterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LetterType::Q1 => "q1",
            LetterType::Q4 => "q4",
            LetterType::X0 => "x0",
            LetterType::X1 => "x1",
            LetterType::X3 => "x3",
        }
    }
}

impl FromStr for LetterType {
    type Err = TemplateError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "q1" => Ok(LetterType::Q1),
            "q4" => Ok(LetterType::Q4),
            "x0" => Ok(LetterType::X0),
            "x1" => Ok(LetterType::X1),
            "x3" => Ok(LetterType::X3),
            _ => Err(TemplateError::field(
                "letterType",
                format!("Unknown letter type: {}", value),
            )),
        }
    }
}

/// Letter language, identified by its ISO 639-1 code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ar,
    Bg,
    Bn,
    De,
    El,
    En,
    Es,
    Fa,
    Fr,
    Gu,
    Hi,
    Hu,
    It,
    Ku,
    Lt,
    Lv,
    Ne,
    Pa,
    Pl,
    Pt,
    Ro,
    Ru,
    Sk,
    So,
    Sq,
    Ta,
    Tr,
    Ur,
    Zh,
}

impl Language {
    pub const ALL: [Language; 29] = [
        Language::Ar,
        Language::Bg,
        Language::Bn,
        Language::De,
        Language::El,
        Language::En,
        Language::Es,
        Language::Fa,
        Language::Fr,
        Language::Gu,
        Language::Hi,
        Language::Hu,
        Language::It,
        Language::Ku,
        Language::Lt,
        Language::Lv,
        Language::Ne,
        Language::Pa,
        Language::Pl,
        Language::Pt,
        Language::Ro,
        Language::Ru,
        Language::Sk,
        Language::So,
        Language::Sq,
        Language::Ta,
        Language::Tr,
        Language::Ur,
        Language::Zh,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Language::Ar => "ar",
            Language::Bg => "bg",
            Language::Bn => "bn",
            Language::De => "de",
            Language::El => "el",
            Language::En => "en",
            Language::Es => "es",
            Language::Fa => "fa",
            Language::Fr => "fr",
            Language::Gu => "gu",
            Language::Hi => "hi",
            Language::Hu => "hu",
            Language::It => "it",
            Language::Ku => "ku",
            Language::Lt => "lt",
            Language::Lv => "lv",
            Language::Ne => "ne",
            Language::Pa => "pa",
            Language::Pl => "pl",
            Language::Pt => "pt",
            Language::Ro => "ro",
            Language::Ru => "ru",
            Language::Sk => "sk",
            Language::So => "so",
            Language::Sq => "sq",
            Language::Ta => "ta",
            Language::Tr => "tr",
            Language::Ur => "ur",
            Language::Zh => "zh",
        }
    }

    /// Whether the language is usually written in a right-to-left script.
    pub fn is_right_to_left(&self) -> bool {
        matches!(self, Language::Ar | Language::Fa | Language::Ku | Language::Ur)
    }
}

impl FromStr for Language {
    type Err = TemplateError;

    fn from_str(value: &str) -> Result<Self> {
        let code = value.to_ascii_lowercase();
        Language::ALL
            .iter()
            .copied()
            .find(|language| language.code() == code)
            .ok_or_else(|| TemplateError::field("language", format!("Unknown language: {}", value)))
    }
}

/// An uploaded letter file at its current version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedFile {
    pub file_name: String,
    pub current_version: String,
    pub virus_scan_status: VirusScanStatus,
}

impl VersionedFile {
    pub fn pending(file_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            current_version: version.into(),
            virus_scan_status: VirusScanStatus::Pending,
        }
    }
}

/// A proof file returned by a print supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofFile {
    pub file_name: String,
    pub supplier: String,
    pub virus_scan_status: VirusScanStatus,
}

/// Files attached to a letter template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterFiles {
    pub pdf_template: VersionedFile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_data_csv: Option<VersionedFile>,
    #[serde(default)]
    pub proofs: BTreeMap<String, ProofFile>,
}

impl LetterFiles {
    pub fn file(&self, file_type: FileType) -> Option<&VersionedFile> {
        match file_type {
            FileType::PdfTemplate => Some(&self.pdf_template),
            FileType::TestData => self.test_data_csv.as_ref(),
        }
    }

    pub fn file_mut(&mut self, file_type: FileType) -> Option<&mut VersionedFile> {
        match file_type {
            FileType::PdfTemplate => Some(&mut self.pdf_template),
            FileType::TestData => self.test_data_csv.as_mut(),
        }
    }

    /// Uploaded files, pdf first.
    pub fn uploads(&self) -> impl Iterator<Item = (FileType, &VersionedFile)> {
        std::iter::once((FileType::PdfTemplate, &self.pdf_template))
            .chain(self.test_data_csv.iter().map(|csv| (FileType::TestData, csv)))
    }
}

/// Letter-specific template fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterProperties {
    pub letter_type: LetterType,
    pub language: Language,
    pub files: LetterFiles,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub proofing_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personalisation_parameters: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_data_csv_headers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_references: Option<BTreeMap<String, String>>,
}

/// Type-specific template content, tagged by `templateType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "templateType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateContent {
    Email { subject: String, message: String },
    Sms { message: String },
    NhsApp { message: String },
    Letter(LetterProperties),
}

impl TemplateContent {
    pub fn template_type(&self) -> TemplateType {
        match self {
            TemplateContent::Email { .. } => TemplateType::Email,
            TemplateContent::Sms { .. } => TemplateType::Sms,
            TemplateContent::NhsApp { .. } => TemplateType::NhsApp,
            TemplateContent::Letter(_) => TemplateType::Letter,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            TemplateContent::Email { message, .. }
            | TemplateContent::Sms { message }
            | TemplateContent::NhsApp { message } => Some(message),
            TemplateContent::Letter(_) => None,
        }
    }
}

/// A persisted template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Unique identifier, immutable after creation
    pub id: Uuid,

    /// Tenant partition key (`CLIENT#<clientId>`)
    pub owner: String,

    /// Bare client identifier
    pub client_id: String,

    /// Display name
    pub name: String,

    /// Type-specific fields
    #[serde(flatten)]
    pub content: TemplateContent,

    /// Lifecycle status
    pub template_status: TemplateStatus,

    /// Optimistic concurrency token; absent on legacy rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_number: Option<u64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,

    /// Purge deadline (epoch seconds), set on deletion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

impl Template {
    pub fn key(&self) -> TemplateKey {
        TemplateKey::new(self.id, self.client_id.clone())
    }

    pub fn template_type(&self) -> TemplateType {
        self.content.template_type()
    }

    pub fn is_terminal(&self) -> bool {
        self.template_status.is_terminal()
    }

    /// Lock number as seen by callers; legacy rows read as zero.
    pub fn current_lock(&self) -> u64 {
        self.lock_number.unwrap_or(0)
    }

    pub fn letter(&self) -> Option<&LetterProperties> {
        match &self.content {
            TemplateContent::Letter(letter) => Some(letter),
            _ => None,
        }
    }

    pub fn letter_mut(&mut self) -> Option<&mut LetterProperties> {
        match &mut self.content {
            TemplateContent::Letter(letter) => Some(letter),
            _ => None,
        }
    }

    pub fn file(&self, file_type: FileType) -> Option<&VersionedFile> {
        self.letter().and_then(|letter| letter.files.file(file_type))
    }
}

/// Primary key of a template: id plus owning client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateKey {
    pub template_id: Uuid,
    pub client_id: String,
}

impl TemplateKey {
    pub fn new(template_id: Uuid, client_id: impl Into<String>) -> Self {
        Self {
            template_id,
            client_id: client_id.into(),
        }
    }

    /// Partition key for this template's client.
    pub fn owner(&self) -> String {
        owner_key(&self.client_id)
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.client_id, self.template_id)
    }
}

/// Build the partition key for a client.
pub fn owner_key(client_id: &str) -> String {
    format!("{}{}", CLIENT_OWNER_PREFIX, client_id)
}

/// Extract the client id from a partition key.
pub fn client_id_from_owner(owner: &str) -> Result<String> {
    owner
        .strip_prefix(CLIENT_OWNER_PREFIX)
        .map(String::from)
        .ok_or_else(|| TemplateError::internal(format!("Unexpected owner format {}", owner)))
}

/// The acting user of a user-facing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub client_id: String,
    pub internal_user_id: String,
}

impl User {
    pub fn new(client_id: impl Into<String>, internal_user_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            internal_user_id: internal_user_id.into(),
        }
    }

    /// Actor reference written to `createdBy`/`updatedBy`.
    pub fn actor_key(&self) -> String {
        format!("{}{}", INTERNAL_USER_PREFIX, self.internal_user_id)
    }

    pub fn template_key(&self, template_id: Uuid) -> TemplateKey {
        TemplateKey::new(template_id, self.client_id.clone())
    }
}

/// Builder for creating new templates.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    /// Display name
    pub name: String,

    /// Type-specific fields
    pub content: TemplateContent,
}

impl NewTemplate {
    pub fn new(name: impl Into<String>, content: TemplateContent) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    pub fn email(name: impl Into<String>, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            name,
            TemplateContent::Email {
                subject: subject.into(),
                message: message.into(),
            },
        )
    }

    pub fn sms(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, TemplateContent::Sms { message: message.into() })
    }

    pub fn nhs_app(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, TemplateContent::NhsApp { message: message.into() })
    }

    pub fn template_type(&self) -> TemplateType {
        self.content.template_type()
    }
}

/// Filter for listing templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    pub template_status: Option<TemplateStatus>,
    pub template_type: Option<TemplateType>,
    pub language: Option<Language>,
    pub letter_type: Option<LetterType>,
}

impl TemplateFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: TemplateStatus) -> Self {
        self.template_status = Some(status);
        self
    }

    pub fn template_type(mut self, template_type: TemplateType) -> Self {
        self.template_type = Some(template_type);
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn letter_type(mut self, letter_type: LetterType) -> Self {
        self.letter_type = Some(letter_type);
        self
    }

    /// Whether a template passes this filter. Deleted templates never do.
    pub fn matches(&self, template: &Template) -> bool {
        if template.template_status == TemplateStatus::Deleted {
            return false;
        }
        if self
            .template_status
            .is_some_and(|status| status != template.template_status)
        {
            return false;
        }
        if self
            .template_type
            .is_some_and(|template_type| template_type != template.template_type())
        {
            return false;
        }
        if self.language.is_some() || self.letter_type.is_some() {
            let Some(letter) = template.letter() else {
                return false;
            };
            if self.language.is_some_and(|language| language != letter.language) {
                return false;
            }
            if self
                .letter_type
                .is_some_and(|letter_type| letter_type != letter.letter_type)
            {
                return false;
            }
        }
        true
    }
}
