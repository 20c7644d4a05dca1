//! Signature image decoding
//!
//! Signature pads deliver PNGs as base64, usually wrapped in a data URL.
//! Images are normalized to 8-bit RGB with a separate alpha plane so they
//! can be embedded as a PDF image XObject with a soft mask.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::CompositorError;

/// A decoded signature ready for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSignature {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB triples.
    pub rgb: Vec<u8>,
    /// Row-major alpha samples, when the source had transparency.
    pub alpha: Option<Vec<u8>>,
}

/// Decode a base64 (or data URL) PNG signature.
pub fn decode_signature(data: &str) -> Result<DecodedSignature, CompositorError> {
    let payload = match data.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if payload.is_empty() {
        return Err(CompositorError::Image("empty signature payload".into()));
    }

    let bytes = STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| CompositorError::Image(format!("invalid base64: {}", e)))?;

    decode_png(&bytes)
}

fn decode_png(bytes: &[u8]) -> Result<DecodedSignature, CompositorError> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);

    let mut reader = decoder
        .read_info()
        .map_err(|e| CompositorError::Image(format!("invalid PNG: {}", e)))?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| CompositorError::Image(format!("invalid PNG frame: {}", e)))?;
    buf.truncate(info.buffer_size());

    if info.width == 0 || info.height == 0 {
        return Err(CompositorError::Image("zero-sized image".into()));
    }

    let (rgb, alpha) = match info.color_type {
        png::ColorType::Rgb => (buf, None),
        png::ColorType::Rgba => {
            let mut rgb = Vec::with_capacity(buf.len() / 4 * 3);
            let mut alpha = Vec::with_capacity(buf.len() / 4);
            for px in buf.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
                alpha.push(px[3]);
            }
            (rgb, Some(alpha))
        }
        png::ColorType::Grayscale => {
            let rgb = buf.iter().flat_map(|&g| [g, g, g]).collect();
            (rgb, None)
        }
        png::ColorType::GrayscaleAlpha => {
            let mut rgb = Vec::with_capacity(buf.len() / 2 * 3);
            let mut alpha = Vec::with_capacity(buf.len() / 2);
            for px in buf.chunks_exact(2) {
                rgb.extend_from_slice(&[px[0], px[0], px[0]]);
                alpha.push(px[1]);
            }
            (rgb, Some(alpha))
        }
        png::ColorType::Indexed => {
            return Err(CompositorError::Image("palette image was not expanded".into()));
        }
    };

    Ok(DecodedSignature {
        width: info.width,
        height: info.height,
        rgb,
        alpha,
    })
}

/// Scale `(width, height)` down to fit `max_width × max_height`.
///
/// Aspect ratio is preserved and images are never enlarged.
pub fn fit_within(width: f32, height: f32, max_width: f32, max_height: f32) -> (f32, f32) {
    let (mut w, mut h) = (width, height);
    if w > max_width {
        h *= max_width / w;
        w = max_width;
    }
    if h > max_height {
        w *= max_height / h;
        h = max_height;
    }
    (w, h)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encode a solid RGBA PNG for fixtures.
    pub(crate) fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            let pixels: Vec<u8> = (0..width * height).flat_map(|_| [10u8, 20, 30, 200]).collect();
            writer.write_image_data(&pixels).unwrap();
        }
        out
    }

    pub(crate) fn data_url(width: u32, height: u32) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(png_fixture(width, height)))
    }

    #[test]
    fn test_decode_data_url() {
        let decoded = decode_signature(&data_url(4, 2)).unwrap();
        assert_eq!((decoded.width, decoded.height), (4, 2));
        assert_eq!(decoded.rgb.len(), 4 * 2 * 3);
        assert_eq!(decoded.alpha.as_ref().map(|a| a.len()), Some(8));
        assert_eq!(&decoded.rgb[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_decode_bare_base64() {
        let bare = STANDARD.encode(png_fixture(3, 3));
        assert!(decode_signature(&bare).is_ok());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_signature("").is_err());
        assert!(decode_signature("data:image/png;base64,!!!").is_err());
        assert!(decode_signature(&STANDARD.encode(b"not a png")).is_err());
    }

    #[test]
    fn test_fit_never_upscales() {
        assert_eq!(fit_within(100.0, 30.0, 200.0, 60.0), (100.0, 30.0));
    }

    #[test]
    fn test_fit_preserves_aspect() {
        let (w, h) = fit_within(400.0, 100.0, 200.0, 60.0);
        assert_eq!((w, h), (200.0, 50.0));

        let (w, h) = fit_within(300.0, 300.0, 200.0, 60.0);
        assert!((w - 60.0).abs() < 1e-4);
        assert!((h - 60.0).abs() < 1e-4);
    }
}
