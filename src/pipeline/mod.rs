//! Pipeline stages for sheet-to-spreadsheet extraction.
//!
//! Each submodule implements one step and is tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm ──▶ parse ──▶ aggregate ──▶ export
//! (path/URL) (decode)  (base64)  (VLM)   (JSON)    (columns)     (XLSX)
//! ```
//!
//! 1. [`input`]     — read a local file or download a URL; detect PDF/PNG/JPEG
//! 2. [`render`]    — decode photos, rasterise PDF pages with pdfium
//!    (`spawn_blocking`), downscale oversized scans
//! 3. [`encode`]    — PNG-encode and base64-wrap for the request body
//! 4. [`llm`]       — one vision-model call per document; the only stage with
//!    network I/O besides URL download
//! 5. [`parse`]     — strip code fences, decode one JSON object
//! 6. [`aggregate`] — map records onto the canonical columns, in upload order
//! 7. [`export`]    — write the table as a single-sheet workbook

pub mod aggregate;
pub mod encode;
pub mod export;
pub mod input;
pub mod llm;
pub mod parse;
pub mod render;
