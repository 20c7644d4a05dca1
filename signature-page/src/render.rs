//! PDF rendering of a [`SignatureLayout`]
//!
//! The original document is loaded with lopdf, new page objects are built
//! from the layout and appended to the root page tree. Existing pages are
//! left untouched.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::error::CompositorError;
use crate::image::DecodedSignature;
use crate::layout::{Element, FontStyle, SignatureLayout, PAGE_HEIGHT, PAGE_WIDTH};

const REGULAR_FONT: &str = "F1";
const BOLD_FONT: &str = "F2";

/// Append the pages of `layout` to `original` and serialize the result.
pub fn render(
    original: &[u8],
    layout: &SignatureLayout,
    images: &[Option<DecodedSignature>],
) -> Result<Vec<u8>, CompositorError> {
    let mut doc = Document::load_mem(original)?;
    let pages_id = page_tree_root(&doc)?;

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut new_pages = Vec::with_capacity(layout.pages.len());

    for page in &layout.pages {
        let mut operations = Vec::new();
        let mut xobjects: BTreeMap<String, ObjectId> = BTreeMap::new();

        for element in &page.elements {
            match element {
                Element::Text { x, y, size, font, gray, text } => {
                    let font_name = match font {
                        FontStyle::Regular => REGULAR_FONT,
                        FontStyle::Bold => BOLD_FONT,
                    };
                    operations.extend([
                        Operation::new("BT", vec![]),
                        Operation::new("Tf", vec![Object::Name(font_name.as_bytes().to_vec()), Object::Real(*size)]),
                        Operation::new("g", vec![Object::Real(*gray)]),
                        Operation::new("Td", vec![Object::Real(*x), Object::Real(*y)]),
                        Operation::new("Tj", vec![Object::string_literal(win_ansi(text))]),
                        Operation::new("ET", vec![]),
                    ]);
                }
                Element::Rule { x1, x2, y, thickness, gray } => {
                    operations.extend([
                        Operation::new("q", vec![]),
                        Operation::new("G", vec![Object::Real(*gray)]),
                        Operation::new("w", vec![Object::Real(*thickness)]),
                        Operation::new("m", vec![Object::Real(*x1), Object::Real(*y)]),
                        Operation::new("l", vec![Object::Real(*x2), Object::Real(*y)]),
                        Operation::new("S", vec![]),
                        Operation::new("Q", vec![]),
                    ]);
                }
                Element::Image { signature, x, y, width, height } => {
                    let Some(image) = images.get(*signature).and_then(|i| i.as_ref()) else {
                        return Err(CompositorError::Structure(format!(
                            "layout references missing image {}",
                            signature
                        )));
                    };
                    let name = format!("Sig{}", signature);
                    if !xobjects.contains_key(&name) {
                        let id = add_image(&mut doc, image);
                        xobjects.insert(name.clone(), id);
                    }
                    operations.extend([
                        Operation::new("q", vec![]),
                        Operation::new(
                            "cm",
                            vec![
                                Object::Real(*width),
                                Object::Integer(0),
                                Object::Integer(0),
                                Object::Real(*height),
                                Object::Real(*x),
                                Object::Real(*y),
                            ],
                        ),
                        Operation::new("Do", vec![Object::Name(name.into_bytes())]),
                        Operation::new("Q", vec![]),
                    ]);
                }
            }
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let mut xobject_dict = Dictionary::new();
        for (name, id) in xobjects {
            xobject_dict.set(name, id);
        }

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(PAGE_WIDTH), Object::Real(PAGE_HEIGHT)],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    REGULAR_FONT => regular_id,
                    BOLD_FONT => bold_id,
                },
                "XObject" => xobject_dict,
            },
        });
        new_pages.push(page_id);
    }

    append_pages(&mut doc, pages_id, &new_pages)?;

    let mut out = Vec::new();
    doc.save_to(&mut out)?;

    debug!(appended = new_pages.len(), bytes = out.len(), "Rendered signature pages");
    Ok(out)
}

fn page_tree_root(doc: &Document) -> Result<ObjectId, CompositorError> {
    let root_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| CompositorError::Structure("trailer has no Root reference".into()))?;
    let catalog = doc.get_dictionary(root_id)?;
    catalog
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|_| CompositorError::Structure("catalog has no Pages reference".into()))
}

fn append_pages(doc: &mut Document, pages_id: ObjectId, new_pages: &[ObjectId]) -> Result<(), CompositorError> {
    let pages = doc.get_object_mut(pages_id)?.as_dict_mut()?;

    let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    {
        let kids = pages
            .get_mut(b"Kids")
            .and_then(Object::as_array_mut)
            .map_err(|_| CompositorError::Structure("page tree root has no inline Kids array".into()))?;
        kids.extend(new_pages.iter().map(|id| Object::Reference(*id)));
    }
    pages.set("Count", count + new_pages.len() as i64);
    Ok(())
}

fn add_image(doc: &mut Document, image: &DecodedSignature) -> ObjectId {
    let width = i64::from(image.width);
    let height = i64::from(image.height);

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };

    if let Some(alpha) = &image.alpha {
        let mask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha.clone(),
        ));
        dict.set("SMask", mask_id);
    }

    doc.add_object(Stream::new(dict, image.rgb.clone()))
}

/// Encode text for a WinAnsi simple font. Characters outside Latin-1 become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7e | 0xa0..=0xff => c as u32 as u8,
            0x09 | 0x0a | 0x0d => b' ',
            _ => b'?',
        })
        .collect()
}
