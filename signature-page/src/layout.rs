//! Signature page layout
//!
//! Placement is computed up front as plain data so the renderer only has
//! to translate elements into content stream operators. Coordinates use
//! PDF user space: origin at the bottom-left corner, y grows upward.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::image::{fit_within, DecodedSignature};
use crate::SignatureInfo;

/// A4 in points.
pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;

pub const MARGIN_X: f32 = 50.0;
pub const TOP_OFFSET: f32 = 60.0;
/// Below this cursor position the next entry starts on a fresh page.
pub const NEW_PAGE_THRESHOLD: f32 = 150.0;
/// Entries never extend below this line; the footer lives underneath.
pub const CONTENT_FLOOR: f32 = 45.0;
pub const FOOTER_Y: f32 = 30.0;

pub const TITLE_SIZE: f32 = 18.0;
pub const SECTION_SIZE: f32 = 14.0;
pub const TEXT_SIZE: f32 = 10.0;
pub const FOOTER_SIZE: f32 = 8.0;

pub const IMAGE_MAX_WIDTH: f32 = 200.0;
pub const IMAGE_MAX_HEIGHT: f32 = 60.0;

pub const HEADING: &str = "Document Signatures";
pub const SECTION_HEADING: &str = "Electronic Signatures:";
pub const IMAGE_PLACEHOLDER: &str = "[Signature image unavailable]";
pub const FOOTER_TEXT: &str = "This document has been electronically signed and is legally binding.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FontStyle {
    Regular,
    Bold,
}

/// A positioned drawing instruction. `gray` is the fill/stroke level,
/// 0.0 black to 1.0 white.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Element {
    Text {
        x: f32,
        y: f32,
        size: f32,
        font: FontStyle,
        gray: f32,
        text: String,
    },
    Rule {
        x1: f32,
        x2: f32,
        y: f32,
        thickness: f32,
        gray: f32,
    },
    /// Signature image for `signature` (index into the input list),
    /// with `(x, y)` at its lower-left corner.
    Image {
        signature: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageLayout {
    pub elements: Vec<Element>,
}

/// All pages to append, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureLayout {
    pub pages: Vec<PageLayout>,
}

fn text(x: f32, y: f32, size: f32, font: FontStyle, gray: f32, text: impl Into<String>) -> Element {
    Element::Text { x, y, size, font, gray, text: text.into() }
}

fn rule(y: f32, thickness: f32, gray: f32) -> Element {
    Element::Rule {
        x1: MARGIN_X,
        x2: PAGE_WIDTH - MARGIN_X,
        y,
        thickness,
        gray,
    }
}

/// Header timestamp, e.g. `March 4, 2024 at 02:05 PM UTC`.
pub fn format_completed(at: DateTime<Utc>) -> String {
    at.format("%B %-d, %Y at %I:%M %p UTC").to_string()
}

/// Per-signer timestamp, e.g. `March 4, 2024 at 02:05 PM`.
pub fn format_signed(at: DateTime<Utc>) -> String {
    at.format("%B %-d, %Y at %I:%M %p").to_string()
}

/// Vertical space one entry consumes, including its trailing separator.
fn entry_height(image_height: Option<f32>, separated: bool) -> f32 {
    let image_block = match image_height {
        Some(h) => h + 10.0,
        None => 20.0,
    };
    let separator = if separated { 25.0 } else { 0.0 };
    15.0 + 20.0 + image_block + 35.0 + separator
}

impl SignatureLayout {
    /// Lay out the signature pages.
    ///
    /// `images[i]` is the decoded image for `signatures[i]`, or `None` when
    /// it could not be decoded.
    pub fn build(
        document_title: &str,
        generated_at: DateTime<Utc>,
        signatures: &[SignatureInfo],
        images: &[Option<DecodedSignature>],
    ) -> Self {
        let mut pages = Vec::new();
        let mut page = PageLayout::default();
        let mut y = PAGE_HEIGHT - TOP_OFFSET;

        page.elements.push(text(MARGIN_X, y, TITLE_SIZE, FontStyle::Bold, 0.0, HEADING));
        y -= 30.0;
        page.elements.push(text(
            MARGIN_X,
            y,
            TEXT_SIZE,
            FontStyle::Regular,
            0.3,
            format!("Document: {}", document_title),
        ));
        y -= 20.0;
        page.elements.push(text(
            MARGIN_X,
            y,
            TEXT_SIZE,
            FontStyle::Regular,
            0.3,
            format!("Completed: {}", format_completed(generated_at)),
        ));
        y -= 40.0;
        page.elements.push(rule(y, 1.0, 0.7));
        y -= 30.0;
        page.elements.push(text(MARGIN_X, y, SECTION_SIZE, FontStyle::Bold, 0.0, SECTION_HEADING));
        y -= 30.0;

        for (index, signature) in signatures.iter().enumerate() {
            let image_size = images
                .get(index)
                .and_then(|i| i.as_ref())
                .map(|i| fit_within(i.width as f32, i.height as f32, IMAGE_MAX_WIDTH, IMAGE_MAX_HEIGHT));
            let separated = index + 1 < signatures.len();
            let needed = entry_height(image_size.map(|(_, h)| h), false);

            if y < NEW_PAGE_THRESHOLD || y - needed < CONTENT_FLOOR {
                pages.push(std::mem::take(&mut page));
                y = PAGE_HEIGHT - TOP_OFFSET;
            }

            page.elements.push(text(
                MARGIN_X,
                y,
                TEXT_SIZE,
                FontStyle::Bold,
                0.0,
                signature.signer_name.as_str(),
            ));
            y -= 15.0;
            page.elements.push(text(
                MARGIN_X,
                y,
                TEXT_SIZE,
                FontStyle::Regular,
                0.4,
                signature.signer_email.as_str(),
            ));
            y -= 20.0;

            match image_size {
                Some((width, height)) => {
                    page.elements.push(Element::Image {
                        signature: index,
                        x: MARGIN_X,
                        y: y - height,
                        width,
                        height,
                    });
                    y -= height + 10.0;
                }
                None => {
                    page.elements.push(text(
                        MARGIN_X,
                        y,
                        TEXT_SIZE,
                        FontStyle::Regular,
                        0.5,
                        IMAGE_PLACEHOLDER,
                    ));
                    y -= 20.0;
                }
            }

            page.elements.push(text(
                MARGIN_X,
                y,
                TEXT_SIZE,
                FontStyle::Regular,
                0.4,
                format!("Signed on: {}", format_signed(signature.signed_at)),
            ));
            y -= 35.0;

            if separated {
                page.elements.push(rule(y, 0.5, 0.8));
                y -= 25.0;
            }
        }

        pages.push(page);

        for page in &mut pages {
            page.elements.push(text(
                MARGIN_X,
                FOOTER_Y,
                FOOTER_SIZE,
                FontStyle::Regular,
                0.5,
                FOOTER_TEXT,
            ));
        }

        Self { pages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
    }

    fn signer(n: usize) -> SignatureInfo {
        SignatureInfo {
            signer_name: format!("Director {}", n),
            signer_email: format!("director{}@example.com", n),
            signature_data: String::new(),
            signed_at: at(9, n as u32),
        }
    }

    fn image(width: u32, height: u32) -> Option<DecodedSignature> {
        Some(DecodedSignature {
            width,
            height,
            rgb: vec![0; (width * height * 3) as usize],
            alpha: None,
        })
    }

    fn texts(page: &PageLayout) -> Vec<&str> {
        page.elements
            .iter()
            .filter_map(|e| match e {
                Element::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(format_completed(at(14, 5)), "March 4, 2024 at 02:05 PM UTC");
        assert_eq!(format_signed(at(9, 30)), "March 4, 2024 at 09:30 AM");
    }

    #[test]
    fn test_single_signer_page() {
        let sigs = vec![signer(1)];
        let layout = SignatureLayout::build("Board Consent", at(12, 0), &sigs, &[image(400, 100)]);

        assert_eq!(layout.pages.len(), 1);
        let page = &layout.pages[0];
        let t = texts(page);
        assert_eq!(t[0], HEADING);
        assert_eq!(t[1], "Document: Board Consent");
        assert!(t.contains(&"Director 1"));
        assert!(t.contains(&"director1@example.com"));
        assert_eq!(*t.last().unwrap(), FOOTER_TEXT);

        let img = page
            .elements
            .iter()
            .find_map(|e| match e {
                Element::Image { width, height, .. } => Some((*width, *height)),
                _ => None,
            })
            .unwrap();
        assert_eq!(img, (200.0, 50.0));

        // One signer has no separator; only the header rule is drawn
        let rules = page.elements.iter().filter(|e| matches!(e, Element::Rule { .. })).count();
        assert_eq!(rules, 1);
    }

    #[test]
    fn test_undecodable_image_uses_placeholder() {
        let sigs = vec![signer(1), signer(2)];
        let layout = SignatureLayout::build("Doc", at(12, 0), &sigs, &[None, image(50, 20)]);
        let page = &layout.pages[0];

        assert_eq!(texts(page).iter().filter(|t| **t == IMAGE_PLACEHOLDER).count(), 1);
        assert!(page
            .elements
            .iter()
            .any(|e| matches!(e, Element::Image { signature: 1, width, height, .. } if *width == 50.0 && *height == 20.0)));
    }

    #[test]
    fn test_many_signers_paginate() {
        let sigs: Vec<_> = (0..12).map(signer).collect();
        let images: Vec<_> = (0..12).map(|_| image(300, 120)).collect();
        let layout = SignatureLayout::build("Doc", at(12, 0), &sigs, &images);

        assert!(layout.pages.len() > 1);

        // Every signer appears exactly once, in order, and every page has a footer
        let names: Vec<String> = layout
            .pages
            .iter()
            .flat_map(|p| texts(p).into_iter().filter(|t| t.starts_with("Director ")).map(String::from))
            .collect();
        let expected: Vec<String> = (0..12).map(|n| format!("Director {}", n)).collect();
        assert_eq!(names, expected);

        for page in &layout.pages {
            assert_eq!(*texts(page).last().unwrap(), FOOTER_TEXT);
            for element in &page.elements {
                let bottom = match element {
                    Element::Text { y, .. } | Element::Rule { y, .. } | Element::Image { y, .. } => *y,
                };
                assert!(bottom >= FOOTER_Y);
                assert!(bottom <= PAGE_HEIGHT);
            }
        }

        // Continuation pages start at the top margin
        let first = layout.pages[1].elements.first().unwrap();
        assert!(matches!(first, Element::Text { y, .. } if *y == PAGE_HEIGHT - TOP_OFFSET));
    }

    #[test]
    fn test_layout_is_deterministic() {
        let sigs: Vec<_> = (0..5).map(signer).collect();
        let images: Vec<_> = (0..5).map(|n| if n % 2 == 0 { image(120, 40) } else { None }).collect();
        let a = SignatureLayout::build("Doc", at(8, 0), &sigs, &images);
        let b = SignatureLayout::build("Doc", at(8, 0), &sigs, &images);
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_signers_still_renders_header() {
        let layout = SignatureLayout::build("Doc", at(8, 0), &[], &[]);
        assert_eq!(layout.pages.len(), 1);
        assert_eq!(texts(&layout.pages[0]).len(), 5);
    }
}
