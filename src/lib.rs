//! # appropriation-extract
//!
//! Turn photos and scans of handwritten appropriation sheets ("Fichas de
//! Apropriação") into a spreadsheet using a vision LLM.
//!
//! Each uploaded sheet is sent to the model with an instruction listing the
//! fourteen form fields. The JSON it returns is normalized onto a fixed set of
//! canonical columns and the rows are exported as an XLSX workbook, one row
//! per sheet, in upload order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files / URLs
//!  │
//!  ├─ 1. Input      read local file or download; detect PDF / PNG / JPEG
//!  ├─ 2. Decode     photo → bitmap, PDF → page bitmap(s) via pdfium
//!  ├─ 3. Encode     PNG → base64 ImageData
//!  ├─ 4. Extract    one vision-model call per sheet, sequential
//!  ├─ 5. Parse      strip fences, decode a JSON object
//!  ├─ 6. Aggregate  canonical columns, missing → empty
//!  └─ 7. Export     single-sheet XLSX
//! ```
//!
//! A sheet that fails at any step is reported by name and skipped; the rest
//! of the batch still produces rows.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use appropriation_extract::{
//!     extract_to_xlsx, load_credentials, ExtractionConfig, LlmExtractionClient,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let credentials = load_credentials(&config.provider_name)?;
//!     // Touches the process environment: do it before the runtime starts.
//!     credentials.export_to_env();
//!     let client = LlmExtractionClient::from_credentials(&credentials, &config)?;
//!
//!     let inputs = ["ficha_01.jpg", "ficha_02.pdf"];
//!     let rt = tokio::runtime::Runtime::new()?;
//!     let output = rt.block_on(extract_to_xlsx(
//!         &inputs,
//!         "appropriation_sheets.xlsx",
//!         &client,
//!         &config,
//!     ))?;
//!     for failure in &output.failures {
//!         eprintln!("skipped {}", failure);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `sheet2xlsx` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, PdfPageMode};
pub use credentials::{load_credentials, Credentials};
pub use error::{ExtractError, FileError, ParseError, ServiceError};
pub use extract::{extract_documents, extract_files, extract_to_xlsx};
pub use output::{BatchOutput, BatchStats, DocumentOutcome};
pub use pipeline::export::{export, write_xlsx, DEFAULT_OUTPUT_FILENAME, XLSX_MIME};
pub use pipeline::input::SourceDocument;
pub use pipeline::llm::{ExtractionResponse, LlmExtractionClient, VisionExtractor};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{FieldRecord, FieldValue, ResultRow, ResultTable};
pub use schema::Column;
