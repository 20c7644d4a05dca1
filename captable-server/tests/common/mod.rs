//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use captable_server::db::{companies, Company, MemberRole, Profile};
use captable_server::services::UploadRequest;
use captable_server::{ActingPrincipal, CapTableDb, MemoryDocumentStore, ServiceSettings, Services};
use chrono::Utc;
use equity::ShareCalculationMethod;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

pub const OWNER: &str = "user-owner";
pub const ALICE: &str = "user-alice";
pub const BOB: &str = "user-bob";
/// Registered, but not a member of the company.
pub const CAROL: &str = "user-carol";
pub const COMPANY: &str = "company-acme";

pub struct Fixture {
    pub services: Arc<Services>,
    pub db: Arc<CapTableDb>,
    pub store: Arc<MemoryDocumentStore>,
}

impl Fixture {
    pub fn new() -> Self {
        let db = Arc::new(CapTableDb::open_in_memory().unwrap());
        let store = Arc::new(MemoryDocumentStore::new());
        let services = Arc::new(Services::new(db.clone(), store.clone(), ServiceSettings::default()));

        db.with_conn(|conn| {
            for (id, email, name) in [
                (OWNER, "olivia@acme.test", Some("Olivia Owner")),
                (ALICE, "alice@acme.test", Some("Alice Adams")),
                (BOB, "bob@acme.test", None),
                (CAROL, "carol@acme.test", Some("Carol Chen")),
            ] {
                companies::insert_profile(
                    conn,
                    &Profile {
                        id: id.to_string(),
                        email: email.to_string(),
                        full_name: name.map(str::to_string),
                    },
                )?;
            }

            companies::insert_company(
                conn,
                &Company {
                    id: COMPANY.to_string(),
                    name: "Acme Robotics".to_string(),
                    owner_id: OWNER.to_string(),
                    authorized_shares: Some(10_000_000),
                    share_calculation_method: ShareCalculationMethod::FullyDiluted,
                    created_at: Utc::now(),
                },
            )?;

            let now = Utc::now();
            companies::insert_member(conn, &companies::new_member(COMPANY, OWNER, MemberRole::Owner, None, now))?;
            for member in [ALICE, BOB] {
                companies::insert_member(
                    conn,
                    &companies::new_member(COMPANY, member, MemberRole::BoardMember, Some(OWNER), now),
                )?;
            }
            Ok(())
        })
        .unwrap();

        Self { services, db, store }
    }

    /// Upload a PDF requiring signatures from `signers`.
    pub async fn upload_pdf(&self, title: &str, signers: &[&str]) -> captable_server::db::Document {
        self.services
            .documents
            .upload(&principal(OWNER), pdf_upload(title, signers))
            .await
            .unwrap()
    }

    /// Request ids of a document in signer order.
    pub fn request_ids(&self, document_id: &str) -> Vec<(String, String)> {
        self.db
            .with_conn(|conn| captable_server::db::signatures::list_for_document(conn, document_id))
            .unwrap()
            .into_iter()
            .map(|r| (r.signer_id, r.id))
            .collect()
    }

    pub fn request_of(&self, document_id: &str, signer: &str) -> String {
        self.request_ids(document_id)
            .into_iter()
            .find(|(s, _)| s == signer)
            .map(|(_, id)| id)
            .unwrap()
    }

    pub fn document(&self, document_id: &str) -> captable_server::db::Document {
        self.db
            .with_conn(|conn| captable_server::db::documents::get_document(conn, document_id))
            .unwrap()
            .unwrap()
    }

    pub fn audit_actions(&self, document_id: &str) -> Vec<String> {
        self.db
            .with_conn(|conn| captable_server::db::audit::list_for_document(conn, document_id))
            .unwrap()
            .into_iter()
            .map(|e| e.action.to_string())
            .collect()
    }
}

pub fn principal(user_id: &str) -> ActingPrincipal {
    ActingPrincipal::new(user_id)
}

pub fn pdf_upload(title: &str, signers: &[&str]) -> UploadRequest {
    UploadRequest {
        company_id: COMPANY.to_string(),
        title: title.to_string(),
        description: Some("Approval of the 2025 option plan".to_string()),
        file_name: "resolution.pdf".to_string(),
        file_type: "application/pdf".to_string(),
        file_bytes: sample_pdf(),
        requires_signature: !signers.is_empty(),
        signer_ids: signers.iter().map(|s| s.to_string()).collect(),
    }
}

/// One-page PDF.
pub fn sample_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![100.into(), 600.into()]),
            Operation::new("Tj", vec![Object::string_literal("Written consent of the board")]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

pub fn page_count(pdf: &[u8]) -> usize {
    Document::load_mem(pdf).unwrap().get_pages().len()
}

/// Small opaque PNG as a data URL.
pub fn signature_png() -> String {
    let (width, height) = (8u32, 4u32);
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        let pixels: Vec<u8> = (0..width * height).flat_map(|_| [0u8, 0, 80]).collect();
        writer.write_image_data(&pixels).unwrap();
    }
    format!("data:image/png;base64,{}", STANDARD.encode(out))
}
