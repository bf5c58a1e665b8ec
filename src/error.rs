//! Error types for the appropriation-extract library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal** for the call: the batch cannot produce a
//!   table at all (no credentials, nothing uploaded, every file failed, the
//!   workbook could not be written). Returned as `Err(ExtractError)` from the
//!   top-level `extract_*` functions.
//!
//! * [`FileError`] — **Non-fatal**: a single uploaded file failed (unreadable,
//!   model call failed, response was not JSON) but the rest of the batch is
//!   fine. Stored inside [`crate::output::DocumentOutcome`] and reported with
//!   the file name.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the appropriation-extract library.
///
/// File-level failures use [`FileError`] and are collected in
/// [`crate::output::BatchOutput::failures`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Credential errors ─────────────────────────────────────────────────
    /// No API key could be found for the provider.
    #[error("No API key found for provider '{provider}'.\nSet {var} in the environment or in a .env file.")]
    MissingCredential { provider: String, var: String },

    /// An API key was found but is malformed.
    #[error("API key in {var} is invalid: {reason}")]
    InvalidCredential { var: String, reason: String },

    /// The configured provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Batch outcomes ────────────────────────────────────────────────────
    /// Processing was triggered without any uploaded file.
    #[error("No files to process. Provide at least one image or PDF.")]
    EmptyInput,

    /// Every file failed; there is no table to export.
    #[error("No data extracted: all {total} documents failed.\nFirst error: {first_error}")]
    NoRecords {
        total: usize,
        first_error: String,
        failures: Vec<FileError>,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// rust_xlsxwriter refused to build the workbook.
    #[error("Failed to build spreadsheet: {0}")]
    ExportFailed(#[from] rust_xlsxwriter::XlsxError),

    /// Could not create or write the output workbook.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF scans need the pdfium shared library.\n\
  • Install pdfium system-wide, or\n\
  • Set PDFIUM_LIB_PATH=/path/to/dir/containing/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single uploaded file.
///
/// Every variant names the file (or `file (page N)` label) it belongs to so
/// the shell can tell the user which sheet needs another look.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// Local path does not exist.
    #[error("{file}: file not found")]
    NotFound { file: String },

    /// Path exists but could not be read.
    #[error("{file}: could not read file: {detail}")]
    ReadFailed { file: String, detail: String },

    /// URL input could not be downloaded.
    #[error("{file}: download failed: {detail}")]
    DownloadFailed { file: String, detail: String },

    /// Neither a PDF nor a supported image format.
    #[error("{file}: unsupported file type (expected PDF, PNG or JPEG)")]
    UnsupportedFormat { file: String },

    /// Image bytes could not be decoded into a bitmap.
    #[error("{file}: could not decode image: {detail}")]
    DecodeFailed { file: String, detail: String },

    /// pdfium could not open or rasterise the document.
    #[error("{file}: could not render PDF: {detail}")]
    RenderFailed { file: String, detail: String },

    /// Bitmap could not be PNG-encoded for the request body.
    #[error("{file}: image encoding failed: {detail}")]
    EncodeFailed { file: String, detail: String },

    /// The vision model call failed (network, quota, auth, bad request).
    #[error("{file}: extraction call failed: {detail}")]
    ExtractionCall { file: String, detail: String },

    /// The model answered, but not with a JSON object.
    #[error("{file}: response is not valid JSON: {cause}")]
    Parse { file: String, cause: String },
}

impl FileError {
    /// The file (or page label) this error refers to.
    pub fn file(&self) -> &str {
        match self {
            FileError::NotFound { file }
            | FileError::ReadFailed { file, .. }
            | FileError::DownloadFailed { file, .. }
            | FileError::UnsupportedFormat { file }
            | FileError::DecodeFailed { file, .. }
            | FileError::RenderFailed { file, .. }
            | FileError::EncodeFailed { file, .. }
            | FileError::ExtractionCall { file, .. }
            | FileError::Parse { file, .. } => file,
        }
    }
}

/// Failure reported by a [`crate::pipeline::llm::VisionExtractor`].
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The cleaned response text did not decode to a JSON object.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("{0}")]
    InvalidJson(String),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}
