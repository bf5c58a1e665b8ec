//! Sheet encoding: [`DecodedPage`] → base64 PNG wrapped in `ImageData`.
//!
//! PNG keeps pen strokes crisp; JPEG ringing around thin handwriting costs
//! more recognition accuracy than it saves in upload size. Transparent
//! pixels (phone screenshots, cropped scans) are flattened onto white paper
//! first, since some providers composite them onto black and the ink
//! disappears.

use crate::error::FileError;
use crate::pipeline::render::DecodedPage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// Encode one sheet as a base64 PNG ready for the vision API.
///
/// `detail: "high"` asks OpenAI-style models for full-resolution tiles; small
/// digits in the quantity boxes are lost at low detail.
pub fn encode_sheet(page: &DecodedPage) -> Result<ImageData, FileError> {
    let flattened;
    let img = if page.image.color().has_alpha() {
        flattened = flatten_on_paper(&page.image);
        &flattened
    } else {
        &page.image
    };

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| FileError::EncodeFailed {
            file: page.label.clone(),
            detail: e.to_string(),
        })?;

    let b64 = STANDARD.encode(&buf);
    debug!("{}: {} bytes base64", page.label, b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Alpha-blend onto white.
fn flatten_on_paper(img: &DynamicImage) -> DynamicImage {
    let rgba = img.to_rgba8();
    let out = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = a as u16;
        let blend = |c: u8| ((c as u16 * a + 255 * (255 - a)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    });
    DynamicImage::ImageRgb8(out)
}
