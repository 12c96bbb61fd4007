#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tracing::Span;

use template_core::ingest::{
    FileScanEvent, ProofIngester, ScanIngester, ScanOutcome, TemplateRef, ValidationPipeline,
};
use template_core::proofing::ProofRequestQueue;
use template_core::service::{LetterUpload, UploadedFile};
use template_core::{
    ClientConfiguration, ClientFeatures, FileType, Language, LetterType, LocalLetterFiles,
    SqliteTemplateStore, StaticClientConfig, Template, TemplateRepository, TemplateService,
    TemplateStatus, User, VirusScanStatus,
};

pub const CLIENT: &str = "client-a";
pub const NO_PROOFING_CLIENT: &str = "client-b";
pub const CAMPAIGN: &str = "campaign-1";
pub const SUPPLIER: &str = "WTMMOCK";

/// Everything wired together over a temporary directory.
pub struct Harness {
    pub dir: TempDir,
    pub repository: Arc<TemplateRepository>,
    pub service: TemplateService,
    pub scans: ScanIngester,
    pub proofs: ProofIngester,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir should be available");
        let store = SqliteTemplateStore::open(&dir.path().join("templates.db"))
            .expect("open should succeed");
        let repository = Arc::new(TemplateRepository::new(Arc::new(store), Span::none()));
        let files = Arc::new(LocalLetterFiles::new(dir.path().join("files"), Span::none()));

        let clients = StaticClientConfig::default()
            .with_client(
                CLIENT,
                ClientConfiguration {
                    campaign_ids: vec![CAMPAIGN.to_string()],
                    features: ClientFeatures { proofing: true },
                },
            )
            .with_client(
                NO_PROOFING_CLIENT,
                ClientConfiguration {
                    campaign_ids: vec![CAMPAIGN.to_string()],
                    features: ClientFeatures { proofing: false },
                },
            );

        let queue = Arc::new(ProofRequestQueue::new(dir.path().join("outbox"), Span::none()));
        let service = TemplateService::new(
            repository.clone(),
            files.clone(),
            Arc::new(clients),
            queue,
            SUPPLIER,
            Span::none(),
        );

        let pipeline = Arc::new(ValidationPipeline::new(
            repository.clone(),
            files,
            Span::none(),
        ));
        let scans = ScanIngester::new(repository.clone(), pipeline, Span::none());
        let proofs = ProofIngester::new(repository.clone(), Span::none());

        Self {
            dir,
            repository,
            service,
            scans,
            proofs,
        }
    }

    pub fn outbox(&self) -> PathBuf {
        self.dir.path().join("outbox")
    }

    pub fn upload(&self, user: &User, language: Language, pdf: Vec<u8>, csv: Option<&str>) -> Template {
        let letter = LetterUpload {
            name: "Appointment letter".to_string(),
            letter_type: LetterType::X0,
            language,
            campaign_id: CAMPAIGN.to_string(),
        };
        let pdf = UploadedFile::new("letter.pdf", pdf);
        let csv = csv.map(|body| UploadedFile::new("test-data.csv", body.as_bytes().to_vec()));
        self.service
            .upload_letter_template(&letter, &pdf, csv.as_ref(), user)
            .expect("upload should succeed")
    }

    pub fn scan(
        &self,
        template: &Template,
        file_type: FileType,
        version_id: &str,
        status: VirusScanStatus,
    ) -> ScanOutcome {
        let event = FileScanEvent {
            template: TemplateRef {
                id: template.id,
                owner: template.owner.clone(),
            },
            file_type,
            version_id: version_id.to_string(),
            virus_scan_status: status,
        };
        self.scans.handle(&event).expect("scan should be handled")
    }

    /// Upload a valid letter and pass both scans.
    pub fn validated_letter(&self, user: &User) -> Template {
        let uploaded = self.upload(user, Language::En, letter_pdf(&["d.clinic"]), Some("clinic\nLeeds\n"));
        let version = version_of(&uploaded);
        self.scan(&uploaded, FileType::PdfTemplate, &version, VirusScanStatus::Passed);
        self.scan(&uploaded, FileType::TestData, &version, VirusScanStatus::Passed);
        self.current(&uploaded)
    }

    /// A validated letter with a proof requested from the default supplier.
    pub fn waiting_for_proof(&self, user: &User) -> Template {
        let validated = self.validated_letter(user);
        assert_eq!(validated.template_status, TemplateStatus::PendingProofRequest);
        self.service
            .request_proof(&validated.id, user, validated.current_lock())
            .expect("proof request should succeed")
    }

    pub fn current(&self, template: &Template) -> Template {
        self.repository
            .get(&template.id, &template.client_id)
            .expect("template should exist")
    }
}

/// A well-formed letter PDF carrying all address lines plus `extra` markers.
pub fn letter_pdf(extra: &[&str]) -> Vec<u8> {
    let mut body = String::from("%PDF-1.7\n1 0 obj\n(");
    for line in 1..=7 {
        body.push_str(&format!("{{d.address_line_{}}} ", line));
    }
    for marker in extra {
        body.push_str(&format!("{{{}}} ", marker));
    }
    body.push_str(")\nendobj\n%%EOF\n");
    body.into_bytes()
}

pub fn version_of(template: &Template) -> String {
    template
        .letter()
        .expect("template should be a letter")
        .files
        .pdf_template
        .current_version
        .clone()
}
