//! # Template Core
//!
//! Core library for the template store: message templates (email, SMS, NHS App
//! and letters) owned by clients, with optimistic concurrency and a status
//! lifecycle driven by both users and background ingestion.
//!
//! This crate provides the domain model, storage abstraction, and the
//! pipelines that move letters through scanning, validation and proofing,
//! independent of the CLI interface.
//!
//! ## Architecture
//!
//! - **storage**: Store trait, conditional updates, and the SQLite backend
//! - **lifecycle**: Status transitions and who may trigger them
//! - **concurrency**: Explaining why a conditional write was rejected
//! - **repository**: Template operations expressed as conditional writes
//! - **service**: User-facing operations with input validation
//! - **letters**: PDF and test-data CSV parsing and validation
//! - **markers**: Personalisation marker classification
//! - **files**: Versioned letter file storage
//! - **ingest**: Virus scan, validation and proof scan handlers
//! - **proofing**: Proof requests and the supplier inbox poller

pub mod concurrency;
pub mod error;
pub mod files;
pub mod fs;
pub mod ingest;
pub mod letters;
pub mod lifecycle;
pub mod markers;
pub mod proofing;
pub mod repository;
pub mod service;
pub mod storage;

pub use error::{ErrorCase, Result, TemplateError};
pub use files::{LetterFileRepository, LocalLetterFiles};
pub use repository::{ProofOutcome, TemplateRepository};
pub use service::{
    ClientConfigRepository, ClientConfiguration, ClientFeatures, LetterUpload, StaticClientConfig,
    TemplateService, UploadedFile,
};
pub use storage::types::{
    FileType, Language, LetterType, NewTemplate, Template, TemplateContent, TemplateFilter,
    TemplateKey, TemplateStatus, TemplateType, User, VirusScanStatus,
};
pub use storage::{SqliteTemplateStore, TemplateStore, WriteOutcome};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
