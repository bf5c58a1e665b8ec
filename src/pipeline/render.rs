//! Decoding: turn a [`SourceDocument`] into one or more page bitmaps.
//!
//! Photos are decoded with `image`; PDF scans are rasterised with pdfium.
//! Both run inside `spawn_blocking`: decoding a 12-megapixel JPEG or
//! rendering a page is CPU-bound, and pdfium keeps thread-local state that
//! must stay off the async workers.

use crate::config::{ExtractionConfig, PdfPageMode};
use crate::error::{ExtractError, FileError};
use crate::pipeline::input::{DocumentKind, SourceDocument};
use image::{DynamicImage, GenericImageView};
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// One bitmap ready for the model, with the label used in reports.
#[derive(Debug, Clone)]
pub struct DecodedPage {
    pub label: String,
    pub image: DynamicImage,
}

/// Decode a document into the pages that will each become one record.
pub async fn decode_document(
    doc: &SourceDocument,
    config: &ExtractionConfig,
) -> Result<Vec<DecodedPage>, FileError> {
    let name = doc.name.clone();
    let bytes = doc.bytes.clone();
    let kind = doc.kind;
    let mode = config.pdf_pages;
    let max_pixels = config.max_image_pixels;

    tokio::task::spawn_blocking(move || decode_blocking(&name, &bytes, kind, mode, max_pixels))
        .await
        .map_err(|e| FileError::DecodeFailed {
            file: doc.name.clone(),
            detail: format!("decode task panicked: {e}"),
        })?
}

fn decode_blocking(
    name: &str,
    bytes: &[u8],
    kind: DocumentKind,
    mode: PdfPageMode,
    max_pixels: u32,
) -> Result<Vec<DecodedPage>, FileError> {
    let pages = match kind {
        DocumentKind::Image(format) => {
            let image = image::load_from_memory_with_format(bytes, format).map_err(|e| {
                FileError::DecodeFailed {
                    file: name.to_string(),
                    detail: e.to_string(),
                }
            })?;
            vec![DecodedPage {
                label: name.to_string(),
                image,
            }]
        }
        DocumentKind::Pdf => render_pdf(name, bytes, mode, max_pixels)?,
    };

    Ok(pages
        .into_iter()
        .map(|p| DecodedPage {
            image: fit_within(p.image, max_pixels),
            label: p.label,
        })
        .collect())
}

/// Downscale so the longest edge is at most `max_pixels`, keeping aspect ratio.
pub fn fit_within(image: DynamicImage, max_pixels: u32) -> DynamicImage {
    let (w, h) = image.dimensions();
    if w.max(h) <= max_pixels {
        return image;
    }
    debug!("Downscaling {}x{} to fit {} px", w, h, max_pixels);
    image.resize(max_pixels, max_pixels, image::imageops::FilterType::Lanczos3)
}

/// Label for page `idx` (0-based) of a PDF with `selected` pages to extract.
///
/// A PDF that yields a single document keeps the plain file name.
pub fn page_label(name: &str, idx: usize, selected: usize) -> String {
    if selected <= 1 {
        name.to_string()
    } else {
        format!("{} (page {})", name, idx + 1)
    }
}

fn render_pdf(
    name: &str,
    bytes: &[u8],
    mode: PdfPageMode,
    max_pixels: u32,
) -> Result<Vec<DecodedPage>, FileError> {
    let render_failed = |detail: String| FileError::RenderFailed {
        file: name.to_string(),
        detail,
    };

    let pdfium = bind_pdfium().map_err(|e| render_failed(e.to_string()))?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| render_failed(format!("{:?}", e)))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let indices = mode.to_indices(total_pages);
    info!("{}: {} pages, extracting {}", name, total_pages, indices.len());
    if indices.is_empty() {
        return Err(render_failed("PDF has no pages".into()));
    }

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(indices.len());
    for &idx in &indices {
        let page = pages
            .get(idx as u16)
            .map_err(|e| render_failed(format!("page {}: {:?}", idx + 1, e)))?;
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| render_failed(format!("page {}: {:?}", idx + 1, e)))?;
        let image = bitmap.as_image();
        debug!(
            "Rendered {} page {} → {}x{} px",
            name,
            idx + 1,
            image.width(),
            image.height()
        );
        results.push(DecodedPage {
            label: page_label(name, idx, indices.len()),
            image,
        });
    }
    Ok(results)
}

/// Bind pdfium from `PDFIUM_LIB_PATH` (a directory) or the system library.
pub fn bind_pdfium() -> Result<Pdfium, ExtractError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(dir) if !dir.trim().is_empty() => {
            let lib = Pdfium::pdfium_platform_library_name_at_path(dir.trim());
            Pdfium::bind_to_library(&lib)
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}
