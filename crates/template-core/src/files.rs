//! Versioned storage for uploaded letter files.
//!
//! Files are addressed by `(fileType, clientId, templateId, versionId)`. A new
//! upload mints a new version id rather than overwriting, so scan results and
//! validation for an old version can never be confused with the current one.

use std::path::PathBuf;

use tracing::{debug, Span};

use crate::error::{Result, TemplateError};
use crate::fs::write_atomic;
use crate::storage::types::{FileType, TemplateKey};

/// Storage for uploaded letter files.
pub trait LetterFileRepository: Send + Sync {
    /// Store one file at `version_id`.
    fn upload(&self, key: &TemplateKey, file_type: FileType, version_id: &str, data: &[u8])
        -> Result<()>;

    /// Fetch one file, or `None` if it has not been stored.
    fn download(
        &self,
        key: &TemplateKey,
        file_type: FileType,
        version_id: &str,
    ) -> Result<Option<Vec<u8>>>;
}

/// Letter files on the local filesystem:
/// `<root>/<fileType>/<clientId>/<templateId>/<versionId>.<ext>`.
pub struct LocalLetterFiles {
    root: PathBuf,
    span: Span,
}

impl LocalLetterFiles {
    pub fn new(root: impl Into<PathBuf>, span: Span) -> Self {
        Self {
            root: root.into(),
            span,
        }
    }

    /// Location of a stored file.
    pub fn path_for(&self, key: &TemplateKey, file_type: FileType, version_id: &str) -> Result<PathBuf> {
        check_segment("clientId", &key.client_id)?;
        check_segment("versionId", version_id)?;
        Ok(self
            .root
            .join(file_type.as_str())
            .join(&key.client_id)
            .join(key.template_id.to_string())
            .join(format!("{}.{}", version_id, file_type.extension())))
    }
}

fn check_segment(name: &str, value: &str) -> Result<()> {
    let safe = !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\']);
    if safe {
        Ok(())
    } else {
        Err(TemplateError::field(name, format!("Invalid path segment: {}", value)))
    }
}

impl LetterFileRepository for LocalLetterFiles {
    fn upload(&self, key: &TemplateKey, file_type: FileType, version_id: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(key, file_type, version_id)?;
        write_atomic(&path, data).map_err(|e| {
            TemplateError::internal_with("Failed to upload letter files", e)
        })?;
        debug!(parent: &self.span, template_key = %key, %file_type, version_id, bytes = data.len(), "Stored letter file");
        Ok(())
    }

    fn download(&self, key: &TemplateKey, file_type: FileType, version_id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key, file_type, version_id)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_upload_then_download() {
        let dir = tempfile::tempdir().unwrap();
        let files = LocalLetterFiles::new(dir.path(), Span::none());
        let key = TemplateKey::new(Uuid::new_v4(), "client-a");

        files.upload(&key, FileType::PdfTemplate, "v1", b"%PDF-1.4").unwrap();

        assert_eq!(
            files.download(&key, FileType::PdfTemplate, "v1").unwrap(),
            Some(b"%PDF-1.4".to_vec())
        );
        assert_eq!(files.download(&key, FileType::PdfTemplate, "v2").unwrap(), None);
        assert_eq!(files.download(&key, FileType::TestData, "v1").unwrap(), None);

        let expected = dir
            .path()
            .join("pdf-template")
            .join("client-a")
            .join(key.template_id.to_string())
            .join("v1.pdf");
        assert!(expected.exists());
    }

    #[test]
    fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let files = LocalLetterFiles::new(dir.path(), Span::none());
        let key = TemplateKey::new(Uuid::new_v4(), "../escape");

        assert!(files.upload(&key, FileType::TestData, "v1", b"a\n").is_err());
    }
}
