//! Signature page compositor
//!
//! Appends one or more pages to an existing PDF listing every electronic
//! signature collected for it: signer name, email, the captured signature
//! image and the signing time.
//!
//! ## Pipeline
//!
//! ```text
//! SignatureInfo[] ──decode──▶ DecodedSignature (PNG → RGB + alpha)
//!        │                            │
//!        └────────layout──────────────┤   pure, deterministic placement
//!                                     ▼
//!                              SignatureLayout ──render──▶ PDF bytes (lopdf)
//! ```
//!
//! A signature whose image cannot be decoded is rendered as a text
//! placeholder; it never aborts the page.

pub mod error;
pub mod image;
pub mod layout;
pub mod render;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use error::CompositorError;
pub use image::{decode_signature, fit_within, DecodedSignature};
pub use layout::{Element, FontStyle, PageLayout, SignatureLayout};

/// MIME type the compositor can extend.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Whether documents of this MIME type can receive a signature page.
pub fn supports_mime_type(mime_type: &str) -> bool {
    mime_type.eq_ignore_ascii_case(PDF_MIME_TYPE)
}

/// One signer's entry on the signature page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signer_name: String,
    pub signer_email: String,
    /// Base64 PNG, optionally as a `data:image/png;base64,` URL.
    pub signature_data: String,
    pub signed_at: DateTime<Utc>,
}

/// Append a signature page to `original`, stamped with the current time.
pub fn add_signature_page(
    original: &[u8],
    document_title: &str,
    signatures: &[SignatureInfo],
) -> Result<Vec<u8>, CompositorError> {
    compose(original, document_title, signatures, Utc::now())
}

/// Append a signature page stamped with `generated_at`.
///
/// Page structure depends only on the inputs.
pub fn compose(
    original: &[u8],
    document_title: &str,
    signatures: &[SignatureInfo],
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, CompositorError> {
    let images: Vec<Option<DecodedSignature>> = signatures
        .iter()
        .map(|sig| match decode_signature(&sig.signature_data) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(signer = %sig.signer_email, error = %e, "Signature image unusable, using placeholder");
                None
            }
        })
        .collect();

    let layout = SignatureLayout::build(document_title, generated_at, signatures, &images);

    debug!(
        signatures = signatures.len(),
        pages = layout.pages.len(),
        "Laid out signature pages"
    );

    render::render(original, &layout, &images)
}
