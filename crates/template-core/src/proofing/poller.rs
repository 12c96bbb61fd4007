use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{error, info, warn, Span};

use super::request::template_id_from_reference;
use crate::fs::write_atomic;

/// Largest proof accepted from a supplier.
pub const MAX_PROOF_BYTES: u64 = 100 * 1024 * 1024;

const PDF_MAGIC: &[u8] = b"%PDF";

/// A proof copied into the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedProof {
    pub supplier: String,
    pub template_id: String,
    pub file_name: String,
    pub path: PathBuf,
}

/// Summary of one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub archived: Vec<ArchivedProof>,
    /// Files removed from the inbox without archiving (not a usable PDF).
    pub rejected: usize,
    /// Files left in the inbox after an error, retried next poll.
    pub failed: usize,
    /// Unexpected inbox entries that were ignored.
    pub skipped: usize,
}

impl PollReport {
    fn merge(&mut self, other: PollReport) {
        self.archived.extend(other.archived);
        self.rejected += other.rejected;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// Drains supplier inboxes into the proof archive.
///
/// Inbox layout: `<inbox>/<supplier>/proofs/<supplierReference>/<file>`.
/// Archive layout: `<archive>/<supplier>/<templateId>/<file>`.
pub struct ProofPoller {
    inbox: PathBuf,
    archive: PathBuf,
    suppliers: Vec<String>,
    span: Span,
}

impl ProofPoller {
    pub fn new(
        inbox: impl Into<PathBuf>,
        archive: impl Into<PathBuf>,
        suppliers: Vec<String>,
        span: Span,
    ) -> Self {
        Self {
            inbox: inbox.into(),
            archive: archive.into(),
            suppliers,
            span,
        }
    }

    /// Poll every configured supplier concurrently.
    pub fn poll(&self) -> PollReport {
        self.suppliers
            .par_iter()
            .map(|supplier| self.poll_supplier(supplier))
            .reduce(PollReport::default, |mut report, other| {
                report.merge(other);
                report
            })
    }

    /// Poll one supplier's inbox.
    pub fn poll_supplier(&self, supplier: &str) -> PollReport {
        let base = self.inbox.join(supplier).join("proofs");
        let mut report = PollReport::default();

        info!(parent: &self.span, supplier, path = %base.display(), "Polling supplier inbox");

        if !base.is_dir() {
            info!(parent: &self.span, supplier, "Supplier inbox does not exist");
            return report;
        }

        let entries = match fs::read_dir(&base) {
            Ok(entries) => entries,
            Err(e) => {
                error!(parent: &self.span, supplier, error = %e, "Failed to list supplier inbox");
                report.failed += 1;
                return report;
            }
        };

        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    error!(parent: &self.span, supplier, error = %e, "Failed to read inbox entry");
                    report.failed += 1;
                    continue;
                }
            };
            if path.is_dir() {
                report.merge(self.poll_reference_dir(supplier, &path));
            } else {
                info!(parent: &self.span, supplier, path = %path.display(), "Unexpected non-directory item found");
                report.skipped += 1;
            }
        }

        info!(
            parent: &self.span,
            supplier,
            archived = report.archived.len(),
            rejected = report.rejected,
            failed = report.failed,
            "Finished polling supplier inbox"
        );
        report
    }

    fn poll_reference_dir(&self, supplier: &str, dir: &Path) -> PollReport {
        let mut report = PollReport::default();
        let reference = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let template_id = template_id_from_reference(&reference);

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!(parent: &self.span, supplier, reference = %reference, error = %e, "Failed to list proof folder");
                report.failed += 1;
                return report;
            }
        };

        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().into_owned();
            match template_id {
                Some(template_id) if path.is_file() => {
                    self.process_file(supplier, template_id, &file_name, &path, &mut report)
                }
                _ => {
                    info!(parent: &self.span, supplier, reference = %reference, file_name = %file_name, "Unexpected item found");
                    report.skipped += 1;
                }
            }
        }
        report
    }

    fn process_file(
        &self,
        supplier: &str,
        template_id: &str,
        file_name: &str,
        path: &Path,
        report: &mut PollReport,
    ) {
        let size = match fs::metadata(path) {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                error!(parent: &self.span, supplier, template_id, file_name, error = %e, "Failed to process file");
                report.failed += 1;
                return;
            }
        };

        let data = if is_acceptable_size(size) {
            match fs::read(path) {
                Ok(data) => Some(data),
                Err(e) => {
                    error!(parent: &self.span, supplier, template_id, file_name, error = %e, "Failed to process file");
                    report.failed += 1;
                    return;
                }
            }
        } else {
            None
        };

        match data.filter(|data| data.starts_with(PDF_MAGIC)) {
            Some(data) => {
                let destination = self.archive.join(supplier).join(template_id).join(file_name);
                if let Err(e) = write_atomic(&destination, &data) {
                    error!(parent: &self.span, supplier, template_id, file_name, error = %e, "Failed to process file");
                    report.failed += 1;
                    return;
                }
                info!(parent: &self.span, supplier, template_id, file_name, "Archived proof");
                report.archived.push(ArchivedProof {
                    supplier: supplier.to_string(),
                    template_id: template_id.to_string(),
                    file_name: file_name.to_string(),
                    path: destination,
                });
            }
            None => {
                warn!(parent: &self.span, supplier, template_id, file_name, bytes = size, "PDF file failed validation");
                report.rejected += 1;
            }
        }

        if let Err(e) = fs::remove_file(path) {
            error!(parent: &self.span, supplier, template_id, file_name, error = %e, "Failed to remove file from inbox");
        }
    }
}

fn is_acceptable_size(size: u64) -> bool {
    size > 0 && size < MAX_PROOF_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = "client_campaign_3f2b8c1e-5d4a-4e1b-9c7d-2a6f0e8b1c3d_en_x0";

    fn poller(dir: &Path) -> ProofPoller {
        ProofPoller::new(
            dir.join("inbox"),
            dir.join("archive"),
            vec!["WTMMOCK".to_string(), "OTHER".to_string()],
            Span::none(),
        )
    }

    fn drop_proof(dir: &Path, supplier: &str, reference: &str, name: &str) -> PathBuf {
        let folder = dir.join("inbox").join(supplier).join("proofs").join(reference);
        fs::create_dir_all(&folder).unwrap();
        folder.join(name)
    }

    #[test]
    fn test_acceptance_rules() {
        assert!(is_acceptable_size(1));
        assert!(!is_acceptable_size(0));
        assert!(!is_acceptable_size(MAX_PROOF_BYTES));
    }

    #[test]
    fn test_oversized_and_non_pdf_files_are_rejected_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let oversized = drop_proof(dir.path(), "WTMMOCK", REFERENCE, "big.pdf");
        let file = fs::File::create(&oversized).unwrap();
        file.set_len(MAX_PROOF_BYTES).unwrap();
        drop(file);
        let zip = drop_proof(dir.path(), "WTMMOCK", REFERENCE, "proof.zip");
        fs::write(&zip, b"PK\x03\x04").unwrap();
        let empty = drop_proof(dir.path(), "OTHER", REFERENCE, "empty.pdf");
        fs::write(&empty, b"").unwrap();

        let report = poller(dir.path()).poll();

        assert_eq!(report.rejected, 3);
        assert!(report.archived.is_empty());
        assert!(!oversized.exists());
        assert!(!zip.exists());
        assert!(!empty.exists());
    }

    #[test]
    fn test_suppliers_are_merged_into_one_report() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(drop_proof(dir.path(), "WTMMOCK", REFERENCE, "a.pdf"), b"%PDF-1.4 a").unwrap();
        fs::write(drop_proof(dir.path(), "OTHER", REFERENCE, "b.pdf"), b"%PDF-1.4 b").unwrap();

        let report = poller(dir.path()).poll();

        let mut archived: Vec<_> = report
            .archived
            .iter()
            .map(|proof| (proof.supplier.as_str(), proof.file_name.as_str()))
            .collect();
        archived.sort();
        assert_eq!(archived, vec![("OTHER", "b.pdf"), ("WTMMOCK", "a.pdf")]);
        assert!(dir
            .path()
            .join("archive/OTHER/3f2b8c1e-5d4a-4e1b-9c7d-2a6f0e8b1c3d/b.pdf")
            .exists());
    }

    #[test]
    fn test_reference_without_template_id_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let escaping = drop_proof(dir.path(), "WTMMOCK", "a_b_.._x_y", "proof.pdf");
        fs::write(&escaping, b"%PDF-1.4 sneaky").unwrap();

        let report = poller(dir.path()).poll();

        assert_eq!(report.skipped, 1);
        assert!(report.archived.is_empty());
        assert!(escaping.exists());
        assert!(!dir.path().join("archive/proof.pdf").exists());
        assert!(!dir.path().join("archive/WTMMOCK/proof.pdf").exists());
    }

    #[test]
    fn test_missing_inbox_is_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let poller = ProofPoller::new(
            dir.path().join("inbox"),
            dir.path().join("archive"),
            vec!["WTMMOCK".to_string()],
            Span::none(),
        );
        assert_eq!(poller.poll(), PollReport::default());
    }
}
