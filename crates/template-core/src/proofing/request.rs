use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, Span};
use uuid::Uuid;

use crate::error::{Result, TemplateError};
use crate::fs::write_atomic;
use crate::storage::types::{Language, LetterType, User};

/// Correlation string a supplier uses to return proofs for a template:
/// `clientId_campaignId_templateId_language_letterType`.
pub fn supplier_reference(
    client_id: &str,
    campaign_id: &str,
    template_id: &Uuid,
    language: Language,
    letter_type: LetterType,
) -> String {
    [
        client_id,
        campaign_id,
        template_id.to_string().as_str(),
        language.code(),
        letter_type.as_str(),
    ]
    .join("_")
}

/// Template id embedded in a supplier reference (its third segment). Only a
/// well-formed UUID is returned, so the id is safe to use as a path component.
pub fn template_id_from_reference(reference: &str) -> Option<&str> {
    reference
        .split('_')
        .nth(2)
        .filter(|segment| Uuid::parse_str(segment).is_ok())
}

/// A request for a supplier to produce proofs of a letter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofingRequest {
    pub campaign_id: String,
    pub language: Language,
    pub letter_type: LetterType,
    pub pdf_version_id: String,
    pub personalisation_parameters: Vec<String>,
    pub supplier: String,
    pub template_id: Uuid,
    pub template_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_data_version_id: Option<String>,
    pub user: User,
}

/// Outbox of proofing requests, one JSON file per request.
pub struct ProofRequestQueue {
    dir: PathBuf,
    span: Span,
}

impl ProofRequestQueue {
    pub fn new(dir: impl Into<PathBuf>, span: Span) -> Self {
        Self {
            dir: dir.into(),
            span,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a request to the outbox, returning its path.
    pub fn enqueue(&self, request: &ProofingRequest) -> Result<PathBuf> {
        let body = serde_json::to_vec_pretty(request)
            .map_err(|e| TemplateError::internal_with("Failed to serialise proofing request", e))?;
        let file_name = format!(
            "{}-{}-{}.json",
            Utc::now().format("%Y%m%dT%H%M%S%.6fZ"),
            request.template_id,
            request.supplier
        );
        let path = self.dir.join(file_name);
        write_atomic(&path, &body)
            .map_err(|e| TemplateError::internal_with("Failed to enqueue proofing request", e))?;

        info!(
            parent: &self.span,
            template_id = %request.template_id,
            supplier = %request.supplier,
            path = %path.display(),
            "Queued proofing request"
        );
        Ok(path)
    }

    /// Queued requests, oldest first.
    pub fn pending(&self) -> Result<Vec<ProofingRequest>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut requests = Vec::with_capacity(paths.len());
        for path in paths {
            let body = std::fs::read(&path)?;
            let request = serde_json::from_slice(&body).map_err(|e| {
                TemplateError::Storage(format!("Invalid proofing request {}: {}", path.display(), e))
            })?;
            requests.push(request);
        }
        Ok(requests)
    }
}
