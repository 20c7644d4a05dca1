//! Cap table and board e-signature daemon
//!
//! Owners upload documents and request signatures from active board
//! members. Once every requested signer has signed, the document becomes
//! `fully_signed` and PDFs get a signature page appended, stored next to
//! the original as the signed variant. The same daemon serves cap table
//! snapshots and converts SAFEs and notes into shares.
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/captable-server/
//! ├── captable.db            # SQLite relational store
//! ├── documents/             # Document blobs
//! │   └── {company_id}/
//! │       ├── 1700000000000-3f2a9c1b7d4e.pdf
//! │       └── 1700000000000-3f2a9c1b7d4e-signed.pdf
//! └── config.toml            # Configuration
//! ```
//!
//! ## Failure model
//!
//! A recorded signature is authoritative. Audit entries, events and signed
//! PDF generation follow it and may fail without undoing it; documents left
//! without a signed variant are picked up by the repair sweep.

pub mod config;
pub mod db;
pub mod document_store;
pub mod error;
pub mod http;
pub mod ledger;
pub mod principal;
pub mod services;

pub use config::Config;
pub use db::CapTableDb;
pub use document_store::{DocumentStore, FsDocumentStore, MemoryDocumentStore, UrlSigner};
pub use error::CapTableError;
pub use http::HttpServer;
pub use principal::ActingPrincipal;
pub use services::{ServiceSettings, Services};
