mod common;

use std::fs;

use tracing::Span;
use uuid::Uuid;

use common::{letter_pdf, version_of, Harness, CLIENT, NO_PROOFING_CLIENT, SUPPLIER};
use template_core::ingest::{ProofScanEvent, ScanOutcome, SkipReason, ValidationOutcome};
use template_core::proofing::{ProofPoller, ProofingRequest};
use template_core::{
    ErrorCase, FileType, Language, ProofOutcome, TemplateStatus, User, VirusScanStatus,
};

#[test]
fn test_letter_from_upload_to_submit() {
    let harness = Harness::new();
    let user = User::new(CLIENT, "user-1");

    let uploaded = harness.upload(
        &user,
        Language::En,
        letter_pdf(&["d.firstName", "d.clinic"]),
        Some("clinic\nLeeds\n"),
    );
    assert_eq!(uploaded.template_status, TemplateStatus::PendingValidation);
    let version = version_of(&uploaded);

    // Test data is scanned first; validation waits for the PDF.
    let outcome = harness.scan(&uploaded, FileType::TestData, &version, VirusScanStatus::Passed);
    assert_eq!(outcome, ScanOutcome::Recorded);

    let before_stale = harness.current(&uploaded);
    let outcome = harness.scan(&uploaded, FileType::PdfTemplate, "old-version", VirusScanStatus::Passed);
    assert_eq!(outcome, ScanOutcome::Stale);
    assert_eq!(harness.current(&uploaded), before_stale);

    let outcome = harness.scan(&uploaded, FileType::PdfTemplate, &version, VirusScanStatus::Passed);
    assert_eq!(
        outcome,
        ScanOutcome::Validated(ValidationOutcome::Recorded { valid: true })
    );

    let validated = harness.current(&uploaded);
    assert_eq!(validated.template_status, TemplateStatus::PendingProofRequest);
    let letter = validated.letter().expect("letter");
    assert!(letter.proofing_enabled);
    assert_eq!(
        letter.test_data_csv_headers.as_deref(),
        Some(&["clinic".to_string()][..])
    );
    assert!(letter
        .personalisation_parameters
        .as_ref()
        .expect("parameters recorded")
        .contains(&"firstName".to_string()));

    // A redelivered scan no longer triggers validation.
    let outcome = harness.scan(&uploaded, FileType::PdfTemplate, &version, VirusScanStatus::Passed);
    assert_eq!(outcome, ScanOutcome::Recorded);

    let early = harness
        .service
        .submit_template(&validated.id, &user, harness.current(&uploaded).current_lock())
        .expect_err("cannot submit before proofing");
    assert_eq!(early.error_case(), ErrorCase::CannotSubmit);

    let current = harness.current(&uploaded);
    let waiting = harness
        .service
        .request_proof(&current.id, &user, current.current_lock())
        .expect("proof request should succeed");
    assert_eq!(waiting.template_status, TemplateStatus::WaitingForProof);

    let references = waiting
        .letter()
        .and_then(|letter| letter.supplier_references.clone())
        .expect("supplier references initialised");
    let reference = references.get(SUPPLIER).expect("default supplier reference");
    assert!(reference.contains(&waiting.id.to_string()));

    let queued: Vec<ProofingRequest> = fs::read_dir(harness.outbox())
        .expect("outbox exists")
        .map(|entry| {
            let body = fs::read(entry.expect("entry").path()).expect("read request");
            serde_json::from_slice(&body).expect("request is JSON")
        })
        .collect();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].template_id, waiting.id);
    assert_eq!(queued[0].pdf_version_id, version);
    assert_eq!(queued[0].test_data_version_id.as_deref(), Some(version.as_str()));

    let proof = ProofScanEvent {
        template_id: waiting.id,
        supplier: SUPPLIER.to_string(),
        file_name: "proof-1.pdf".to_string(),
        virus_scan_status: VirusScanStatus::Passed,
    };
    let outcome = harness.proofs.handle(&proof).expect("proof should be handled");
    let ProofOutcome::Escalated(available) = outcome else {
        panic!("expected escalation, got {:?}", outcome);
    };
    assert_eq!(available.template_status, TemplateStatus::ProofAvailable);

    let duplicate = harness.proofs.handle(&proof).expect("duplicate is not an error");
    assert_eq!(duplicate, ProofOutcome::Rejected);

    let submitted = harness
        .service
        .submit_template(&available.id, &user, available.current_lock())
        .expect("submit should succeed");
    assert_eq!(submitted.template_status, TemplateStatus::Submitted);

    // Scan results for a submitted letter are ignored, even at the current version.
    let outcome = harness.scan(&uploaded, FileType::PdfTemplate, &version, VirusScanStatus::Failed);
    assert_eq!(outcome, ScanOutcome::Stale);
    assert_eq!(harness.current(&uploaded), submitted);

    let late = ProofScanEvent {
        file_name: "proof-2.pdf".to_string(),
        ..proof
    };
    assert_eq!(
        harness.proofs.handle(&late).expect("late proof is not an error"),
        ProofOutcome::Rejected
    );
}

#[test]
fn test_failed_scan_blocks_letter() {
    let harness = Harness::new();
    let user = User::new(CLIENT, "user-1");

    let uploaded = harness.upload(&user, Language::En, letter_pdf(&[]), Some("clinic\n"));
    let version = version_of(&uploaded);

    let outcome = harness.scan(&uploaded, FileType::PdfTemplate, &version, VirusScanStatus::Failed);
    assert_eq!(outcome, ScanOutcome::Recorded);
    assert_eq!(
        harness.current(&uploaded).template_status,
        TemplateStatus::VirusScanFailed
    );

    let outcome = harness.scan(&uploaded, FileType::TestData, &version, VirusScanStatus::Passed);
    assert_eq!(outcome, ScanOutcome::Recorded);

    let current = harness.current(&uploaded);
    assert_eq!(current.template_status, TemplateStatus::VirusScanFailed);

    let err = harness
        .service
        .submit_template(&current.id, &user, current.current_lock())
        .expect_err("scan failure blocks submit");
    assert_eq!(err.error_case(), ErrorCase::CannotSubmit);
}

#[test]
fn test_unparseable_pdf_fails_validation() {
    let harness = Harness::new();
    let user = User::new(CLIENT, "user-1");

    let truncated = b"%PDF-1.7\n1 0 obj\n({d.address_line_1}".to_vec();
    let uploaded = harness.upload(&user, Language::En, truncated, None);
    let version = version_of(&uploaded);

    let outcome = harness.scan(&uploaded, FileType::PdfTemplate, &version, VirusScanStatus::Passed);
    assert_eq!(
        outcome,
        ScanOutcome::Validated(ValidationOutcome::Recorded { valid: false })
    );

    let current = harness.current(&uploaded);
    assert_eq!(current.template_status, TemplateStatus::ValidationFailed);
    assert!(current
        .letter()
        .expect("letter")
        .personalisation_parameters
        .is_none());
}

#[test]
fn test_custom_parameters_without_test_data_fail_validation() {
    let harness = Harness::new();
    let user = User::new(CLIENT, "user-1");

    let uploaded = harness.upload(&user, Language::En, letter_pdf(&["d.clinic"]), None);
    let version = version_of(&uploaded);

    let outcome = harness.scan(&uploaded, FileType::PdfTemplate, &version, VirusScanStatus::Passed);
    assert_eq!(
        outcome,
        ScanOutcome::Validated(ValidationOutcome::Recorded { valid: false })
    );
}

#[test]
fn test_right_to_left_letter_skips_checks_and_proofing() {
    let harness = Harness::new();
    let user = User::new(CLIENT, "user-1");

    // No address lines at all; right-to-left letters are accepted as uploaded.
    let pdf = b"%PDF-1.7\n({d.something})\n%%EOF".to_vec();
    let uploaded = harness.upload(&user, Language::Ar, pdf, None);
    assert!(!uploaded.letter().expect("letter").proofing_enabled);

    let version = version_of(&uploaded);
    harness.scan(&uploaded, FileType::PdfTemplate, &version, VirusScanStatus::Passed);

    let current = harness.current(&uploaded);
    assert_eq!(current.template_status, TemplateStatus::NotYetSubmitted);

    harness
        .service
        .submit_template(&current.id, &user, current.current_lock())
        .expect("submit should succeed");
}

#[test]
fn test_proofing_disabled_client() {
    let harness = Harness::new();
    let user = User::new(NO_PROOFING_CLIENT, "user-2");

    let validated = harness.validated_letter(&user);
    assert_eq!(validated.template_status, TemplateStatus::NotYetSubmitted);

    let err = harness
        .service
        .request_proof(&validated.id, &user, validated.current_lock())
        .expect_err("proofing is disabled");
    assert_eq!(err.error_case(), ErrorCase::FeatureDisabled);
}

#[test]
fn test_upload_rejects_unknown_campaign_and_bad_files() {
    let harness = Harness::new();
    let user = User::new(CLIENT, "user-1");

    let letter = template_core::LetterUpload {
        name: "Letter".to_string(),
        letter_type: template_core::LetterType::Q4,
        language: Language::En,
        campaign_id: "unknown".to_string(),
    };
    let pdf = template_core::UploadedFile::new("letter.docx", letter_pdf(&[]));

    let err = harness
        .service
        .upload_letter_template(&letter, &pdf, None, &user)
        .expect_err("upload should be rejected");
    let fields = err.field_errors().expect("field errors");
    assert!(fields.contains_key("campaignId"));
    assert!(fields.contains_key("files.pdfTemplate"));

    assert!(harness
        .service
        .list_templates(&user, &template_core::TemplateFilter::new())
        .expect("list should succeed")
        .is_empty());
}

#[test]
fn test_proof_for_unknown_template_is_internal_error() {
    let harness = Harness::new();
    let event = ProofScanEvent {
        template_id: Uuid::new_v4(),
        supplier: SUPPLIER.to_string(),
        file_name: "proof.pdf".to_string(),
        virus_scan_status: VirusScanStatus::Passed,
    };
    let err = harness.proofs.handle(&event).expect_err("owner cannot be resolved");
    assert_eq!(err.error_case(), ErrorCase::Internal);
}

#[test]
fn test_failed_proof_is_recorded_without_escalation() {
    let harness = Harness::new();
    let user = User::new(CLIENT, "user-1");
    let waiting = harness.waiting_for_proof(&user);

    let event = ProofScanEvent {
        template_id: waiting.id,
        supplier: SUPPLIER.to_string(),
        file_name: "infected.pdf".to_string(),
        virus_scan_status: VirusScanStatus::Failed,
    };
    let outcome = harness.proofs.handle(&event).expect("proof should be handled");
    let ProofOutcome::Appended(template) = outcome else {
        panic!("expected append only, got {:?}", outcome);
    };
    assert_eq!(template.template_status, TemplateStatus::WaitingForProof);
    assert!(template
        .letter()
        .expect("letter")
        .files
        .proofs
        .contains_key("infected.pdf"));
}

#[test]
fn test_poller_archives_supplier_proofs() {
    let harness = Harness::new();
    let user = User::new(CLIENT, "user-1");
    let waiting = harness.waiting_for_proof(&user);
    let reference = waiting
        .letter()
        .and_then(|letter| letter.supplier_references.as_ref())
        .and_then(|references| references.get(SUPPLIER).cloned())
        .expect("reference recorded");

    let inbox = harness.dir.path().join("inbox");
    let folder = inbox.join(SUPPLIER).join("proofs").join(&reference);
    fs::create_dir_all(&folder).expect("create inbox");
    fs::write(folder.join("proof-1.pdf"), b"%PDF-1.4 proof").expect("write proof");
    fs::write(folder.join("notes.txt"), b"not a pdf").expect("write junk");
    fs::write(inbox.join(SUPPLIER).join("proofs").join("stray.pdf"), b"%PDF").expect("write stray");

    let archive = harness.dir.path().join("archive");
    let poller = ProofPoller::new(&inbox, &archive, vec![SUPPLIER.to_string()], Span::none());
    let report = poller.poll();

    assert_eq!(report.archived.len(), 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.archived[0].template_id, waiting.id.to_string());

    let archived = archive
        .join(SUPPLIER)
        .join(waiting.id.to_string())
        .join("proof-1.pdf");
    assert_eq!(fs::read(&archived).expect("archived proof"), b"%PDF-1.4 proof");
    assert!(!folder.join("proof-1.pdf").exists());
    assert!(!folder.join("notes.txt").exists());

    let again = poller.poll();
    assert!(again.archived.is_empty());
}
