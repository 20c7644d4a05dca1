//! Document signing scenarios against an in-memory database and blob store

mod common;

use captable_server::db::{signatures, DocumentStatus, SignatureStatus};
use captable_server::ledger::DEFAULT_DECLINE_REASON;
use captable_server::services::members::REVOKED_REASON;
use captable_server::services::{FileVariant, RepairStatus};
use captable_server::DocumentStore;
use common::*;

fn contains(haystack: &[u8], needle: &str) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle.as_bytes())
}

#[tokio::test]
async fn test_partial_then_full_signing_appends_signature_page() {
    let fx = Fixture::new();
    let doc = fx.upload_pdf("Option plan consent", &[ALICE, BOB]).await;
    assert_eq!(doc.status, DocumentStatus::Pending);

    let first = fx
        .services
        .documents
        .sign(&principal(ALICE), &fx.request_of(&doc.id, ALICE), &signature_png())
        .await
        .unwrap();
    assert_eq!(first.document_status, DocumentStatus::PartiallySigned);
    assert_eq!(first.request.status, SignatureStatus::Signed);
    assert!(first.signed_file_path.is_none());
    assert!(fx.document(&doc.id).signed_file_path.is_none());

    let last = fx
        .services
        .documents
        .sign(&principal(BOB), &fx.request_of(&doc.id, BOB), &signature_png())
        .await
        .unwrap();
    assert_eq!(last.document_status, DocumentStatus::FullySigned);
    let signed_path = last.signed_file_path.unwrap();
    assert!(signed_path.ends_with("-signed.pdf"));
    assert!(signed_path.starts_with(&format!("{}/", COMPANY)));

    let stored = fx.document(&doc.id);
    assert_eq!(stored.status, DocumentStatus::FullySigned);
    assert_eq!(stored.signed_file_path.as_deref(), Some(signed_path.as_str()));

    let signed = fx.store.get(&signed_path).await.unwrap();
    assert_eq!(page_count(&signed), 2);
    assert!(contains(&signed, "Alice Adams"));
    // No full name on file
    assert!(contains(&signed, "bob@acme.test"));
    assert_eq!(fx.store.content_type(&signed_path).as_deref(), Some("application/pdf"));

    assert_eq!(
        fx.audit_actions(&doc.id),
        vec!["uploaded", "signed", "signed", "signed_pdf_generated"]
    );
}

#[tokio::test]
async fn test_decline_blocks_completion() {
    let fx = Fixture::new();
    let doc = fx.upload_pdf("Board minutes", &[ALICE, BOB]).await;

    let declined = fx
        .services
        .documents
        .decline(&principal(ALICE), &fx.request_of(&doc.id, ALICE), None)
        .unwrap();
    assert_eq!(declined.status, SignatureStatus::Declined);
    assert_eq!(declined.decline_reason.as_deref(), Some(DEFAULT_DECLINE_REASON));
    assert!(declined.declined_at.is_some());

    let outcome = fx
        .services
        .documents
        .sign(&principal(BOB), &fx.request_of(&doc.id, BOB), &signature_png())
        .await
        .unwrap();
    assert_eq!(outcome.document_status, DocumentStatus::PartiallySigned);
    assert!(outcome.signed_file_path.is_none());
    assert_eq!(fx.store.paths().len(), 1);

    let err = fx
        .services
        .documents
        .sign(&principal(ALICE), &fx.request_of(&doc.id, ALICE), &signature_png())
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_second_sign_conflicts_and_keeps_first_signature() {
    let fx = Fixture::new();
    let doc = fx.upload_pdf("Consent", &[ALICE, BOB]).await;
    let request_id = fx.request_of(&doc.id, ALICE);

    fx.services
        .documents
        .sign(&principal(ALICE), &request_id, "data:image/png;base64,first")
        .await
        .unwrap();
    let before = fx
        .db
        .with_conn(|conn| signatures::get_request(conn, &request_id))
        .unwrap()
        .unwrap();

    let err = fx
        .services
        .documents
        .sign(&principal(ALICE), &request_id, "data:image/png;base64,second")
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    let err = fx
        .services
        .documents
        .decline(&principal(ALICE), &request_id, Some("changed my mind"))
        .unwrap_err();
    assert!(err.is_conflict());

    let after = fx
        .db
        .with_conn(|conn| signatures::get_request(conn, &request_id))
        .unwrap()
        .unwrap();
    assert_eq!(after.signature_data.as_deref(), Some("data:image/png;base64,first"));
    assert_eq!(after.signed_at, before.signed_at);
    assert_eq!(after.status, SignatureStatus::Signed);
    assert!(after.decline_reason.is_none());
}

#[tokio::test]
async fn test_wrong_signer_is_forbidden_not_conflict() {
    let fx = Fixture::new();
    let doc = fx.upload_pdf("Consent", &[ALICE, BOB]).await;
    let alice_request = fx.request_of(&doc.id, ALICE);

    let err = fx
        .services
        .documents
        .sign(&principal(BOB), &alice_request, &signature_png())
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    fx.services
        .documents
        .sign(&principal(ALICE), &alice_request, &signature_png())
        .await
        .unwrap();

    // Already signed, but still someone else's request
    let err = fx
        .services
        .documents
        .decline(&principal(BOB), &alice_request, None)
        .unwrap_err();
    assert!(err.is_forbidden());

    let err = fx
        .services
        .documents
        .sign(&principal(ALICE), "no-such-request", &signature_png())
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = fx
        .services
        .documents
        .sign(&principal(ALICE), &alice_request, "   ")
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_generation_failure_keeps_signature_and_repair_recovers() {
    let fx = Fixture::new();
    let doc = fx.upload_pdf("Consent", &[ALICE]).await;

    fx.store.set_fail_puts(true);
    let outcome = fx
        .services
        .documents
        .sign(&principal(ALICE), &fx.request_of(&doc.id, ALICE), &signature_png())
        .await
        .unwrap();
    assert_eq!(outcome.document_status, DocumentStatus::FullySigned);
    assert!(outcome.signed_file_path.is_none());
    assert!(fx.document(&doc.id).signed_file_path.is_none());

    fx.store.set_fail_puts(false);
    let report = fx.services.artifacts.repair_owned(&principal(OWNER)).await.unwrap();
    assert_eq!(report.success_count, 1);
    assert_eq!(report.error_count, 0);
    assert_eq!(report.results[0].document_id, doc.id);
    assert_eq!(report.results[0].status, RepairStatus::Success);

    let signed_path = fx.document(&doc.id).signed_file_path.unwrap();
    assert!(fx.store.contains(&signed_path));
    assert!(fx
        .audit_actions(&doc.id)
        .contains(&"signed_pdf_regenerated".to_string()));

    // Nothing left to repair
    let again = fx.services.artifacts.repair_all("system").await.unwrap();
    assert!(again.results.is_empty());

    // Explicit regeneration overwrites the same path
    let path = fx.services.artifacts.regenerate(&principal(OWNER), &doc.id).await.unwrap();
    assert_eq!(path, signed_path);
    assert_eq!(page_count(&fx.store.get(&signed_path).await.unwrap()), 2);
}

#[tokio::test]
async fn test_repair_reports_errors_and_skips() {
    let fx = Fixture::new();

    // Completed while the original could not be downloaded
    let broken = fx.upload_pdf("Broken", &[ALICE]).await;
    fx.store.set_fail_gets(true);
    fx.services
        .documents
        .sign(&principal(ALICE), &fx.request_of(&broken.id, ALICE), &signature_png())
        .await
        .unwrap();

    // Marked complete with a request still pending
    let inconsistent = fx.upload_pdf("Inconsistent", &[ALICE, BOB]).await;
    fx.db
        .with_conn(|conn| {
            conn.execute(
                "UPDATE documents SET status = 'fully_signed' WHERE id = ?1",
                [&inconsistent.id],
            )?;
            Ok(())
        })
        .unwrap();

    let report = fx.services.artifacts.repair_owned(&principal(OWNER)).await.unwrap();
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.error_count, 1);
    assert_eq!(report.skipped_count, 1);
    assert_eq!(report.success_count, 0);

    let broken_outcome = report.results.iter().find(|r| r.document_id == broken.id).unwrap();
    assert_eq!(broken_outcome.status, RepairStatus::Error);
    assert!(broken_outcome.reason.as_deref().unwrap().contains("download failed"));

    let skipped = report.results.iter().find(|r| r.document_id == inconsistent.id).unwrap();
    assert_eq!(skipped.status, RepairStatus::Skipped);
    assert!(skipped.reason.as_deref().unwrap().contains("incomplete signatures"));

    // Board members do not own the company, so nothing is repaired for them
    let none = fx.services.artifacts.repair_owned(&principal(ALICE)).await.unwrap();
    assert!(none.results.is_empty());
}

#[tokio::test]
async fn test_delete_tolerates_blob_failures() {
    let fx = Fixture::new();
    let doc = fx.upload_pdf("Consent", &[ALICE]).await;
    let signed_path = fx
        .services
        .documents
        .sign(&principal(ALICE), &fx.request_of(&doc.id, ALICE), &signature_png())
        .await
        .unwrap()
        .signed_file_path
        .unwrap();

    let err = fx.services.documents.delete(&principal(ALICE), &doc.id).await.unwrap_err();
    assert!(err.is_forbidden());
    let err = fx.services.documents.delete(&principal(CAROL), &doc.id).await.unwrap_err();
    assert!(err.is_not_found());

    fx.store.fail_delete_of(signed_path.clone());
    let report = fx.services.documents.delete(&principal(OWNER), &doc.id).await.unwrap();
    assert_eq!(report.orphaned_paths, vec![signed_path.clone()]);

    assert!(!fx.store.contains(&doc.file_path));
    assert!(fx.store.contains(&signed_path));
    assert!(fx
        .db
        .with_conn(|conn| captable_server::db::documents::get_document(conn, &doc.id))
        .unwrap()
        .is_none());
    assert!(fx.request_ids(&doc.id).is_empty());
    assert!(fx.audit_actions(&doc.id).is_empty());
}

#[tokio::test]
async fn test_delete_with_blob_already_gone_leaves_no_orphans() {
    let fx = Fixture::new();
    let doc = fx.upload_pdf("Consent", &[ALICE]).await;
    let signed_path = fx
        .services
        .documents
        .sign(&principal(ALICE), &fx.request_of(&doc.id, ALICE), &signature_png())
        .await
        .unwrap()
        .signed_file_path
        .unwrap();

    let outcomes = fx.store.delete(&[signed_path.clone()]).await;
    assert!(outcomes[0].result.is_ok());
    let report = fx.services.documents.delete(&principal(OWNER), &doc.id).await.unwrap();
    assert!(report.orphaned_paths.is_empty());
    assert!(!fx.store.contains(&doc.file_path));
}

#[tokio::test]
async fn test_non_pdf_completes_without_signed_variant() {
    let fx = Fixture::new();
    let mut upload = pdf_upload("Bylaws", &[ALICE]);
    upload.file_name = "bylaws.docx".into();
    upload.file_type = "application/vnd.openxmlformats-officedocument.wordprocessingml.document".into();
    upload.file_bytes = b"PK\x03\x04 not really a docx".to_vec();
    let doc = fx.services.documents.upload(&principal(OWNER), upload).await.unwrap();
    assert!(doc.file_path.ends_with(".docx"));

    let outcome = fx
        .services
        .documents
        .sign(&principal(ALICE), &fx.request_of(&doc.id, ALICE), &signature_png())
        .await
        .unwrap();
    assert_eq!(outcome.document_status, DocumentStatus::FullySigned);
    assert!(outcome.signed_file_path.is_none());
    assert_eq!(fx.store.put_count(), 1);
    assert_eq!(fx.store.get_count(), 0);

    // Not a repair candidate either
    let report = fx.services.artifacts.repair_all("system").await.unwrap();
    assert!(report.results.is_empty());

    let err = fx.services.artifacts.regenerate(&principal(OWNER), &doc.id).await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_document_without_signers_is_complete_on_upload() {
    let fx = Fixture::new();
    let doc = fx.upload_pdf("Annual report", &[]).await;
    assert_eq!(doc.status, DocumentStatus::FullySigned);
    assert!(fx.request_ids(&doc.id).is_empty());

    let report = fx.services.artifacts.repair_all("system").await.unwrap();
    assert!(report.results.is_empty());
}

#[tokio::test]
async fn test_upload_validation() {
    let fx = Fixture::new();
    let owner = principal(OWNER);

    let err = fx
        .services
        .documents
        .upload(&owner, pdf_upload("Consent", &[ALICE, CAROL]))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let mut no_signers = pdf_upload("Consent", &[]);
    no_signers.requires_signature = true;
    let err = fx.services.documents.upload(&owner, no_signers).await.unwrap_err();
    assert!(err.is_validation());

    let err = fx
        .services
        .documents
        .upload(&owner, pdf_upload("   ", &[ALICE]))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let mut empty = pdf_upload("Consent", &[ALICE]);
    empty.file_bytes.clear();
    let err = fx.services.documents.upload(&owner, empty).await.unwrap_err();
    assert!(err.is_validation());

    let err = fx
        .services
        .documents
        .upload(&principal(ALICE), pdf_upload("Consent", &[BOB]))
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    let err = fx
        .services
        .documents
        .upload(&principal(CAROL), pdf_upload("Consent", &[BOB]))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // Nothing was stored by the rejected uploads
    assert!(fx.store.paths().is_empty());

    fx.store.set_fail_puts(true);
    let err = fx
        .services
        .documents
        .upload(&owner, pdf_upload("Consent", &[ALICE]))
        .await
        .unwrap_err();
    assert!(err.is_dependency());
    assert_eq!(fx.db.stats().unwrap().document_count, 0);
}

#[tokio::test]
async fn test_duplicate_signers_collapse() {
    let fx = Fixture::new();
    let doc = fx.upload_pdf("Consent", &[BOB, ALICE, BOB]).await;
    let signers: Vec<String> = fx.request_ids(&doc.id).into_iter().map(|(s, _)| s).collect();
    assert_eq!(signers, vec![BOB.to_string(), ALICE.to_string()]);
}

#[tokio::test]
async fn test_listings_and_download_urls() {
    let fx = Fixture::new();
    let doc = fx.upload_pdf("Consent", &[ALICE, BOB]).await;

    let pending = fx.services.documents.pending_signatures(&principal(ALICE)).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].company_name, "Acme Robotics");
    assert_eq!(pending[0].document_title, "Consent");
    assert!(fx.services.documents.pending_signatures(&principal(CAROL)).unwrap().is_empty());

    let listed = fx.services.documents.company_documents(&principal(BOB), COMPANY).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].signatures.len(), 2);
    assert_eq!(listed[0].signatures[0].signer_name, "Alice Adams");
    assert_eq!(listed[0].signatures[1].signer_name, "bob@acme.test");

    let err = fx.services.documents.company_documents(&principal(CAROL), COMPANY).unwrap_err();
    assert!(err.is_not_found());

    let url = fx
        .services
        .documents
        .document_url(&principal(ALICE), &doc.id, FileVariant::Original)
        .unwrap();
    assert!(url.url.contains(&doc.file_path));
    assert!(url.url.contains("token="));

    let err = fx
        .services
        .documents
        .document_url(&principal(ALICE), &doc.id, FileVariant::Signed)
        .unwrap_err();
    assert!(err.is_not_found());
    let err = fx
        .services
        .documents
        .document_url(&principal(CAROL), &doc.id, FileVariant::Original)
        .unwrap_err();
    assert!(err.is_not_found());

    for signer in [ALICE, BOB] {
        fx.services
            .documents
            .sign(&principal(signer), &fx.request_of(&doc.id, signer), &signature_png())
            .await
            .unwrap();
    }
    let signed = fx
        .services
        .documents
        .document_url(&principal(OWNER), &doc.id, FileVariant::Signed)
        .unwrap();
    assert!(signed.url.contains("-signed.pdf"));
}

#[tokio::test]
async fn test_revoked_member_requests_are_declined() {
    let fx = Fixture::new();
    let doc = fx.upload_pdf("Consent", &[ALICE, BOB]).await;
    let bob_request = fx.request_of(&doc.id, BOB);

    let report = fx
        .services
        .members
        .remove_board_member(&principal(OWNER), COMPANY, BOB)
        .unwrap();
    assert_eq!(report.declined_request_ids, vec![bob_request.clone()]);

    let request = fx
        .db
        .with_conn(|conn| signatures::get_request(conn, &bob_request))
        .unwrap()
        .unwrap();
    assert_eq!(request.status, SignatureStatus::Declined);
    assert_eq!(request.decline_reason.as_deref(), Some(REVOKED_REASON));

    let entries = fx
        .db
        .with_conn(|conn| captable_server::db::audit::list_for_document(conn, &doc.id))
        .unwrap();
    let automatic = entries.last().unwrap();
    assert_eq!(automatic.action.as_str(), "declined");
    assert_eq!(automatic.details["automatic"], serde_json::json!(true));
    assert_eq!(automatic.details["signature_id"], serde_json::json!(bob_request));

    let err = fx
        .services
        .documents
        .sign(&principal(BOB), &bob_request, &signature_png())
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let outcome = fx
        .services
        .documents
        .sign(&principal(ALICE), &fx.request_of(&doc.id, ALICE), &signature_png())
        .await
        .unwrap();
    assert_eq!(outcome.document_status, DocumentStatus::PartiallySigned);

    // A removed member cannot be asked to sign new documents
    let err = fx
        .services
        .documents
        .upload(&principal(OWNER), pdf_upload("Next", &[BOB]))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}
