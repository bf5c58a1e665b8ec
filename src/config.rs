//! Configuration types for sheet extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Every knob lives in one struct so a
//! run can be logged and reproduced from its config alone.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Provider used when none is configured.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Worksheet name used when none is configured.
pub const DEFAULT_SHEET_NAME: &str = "Appropriation";

/// Configuration for one extraction batch.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use appropriation_extract::{ExtractionConfig, PdfPageMode};
///
/// let config = ExtractionConfig::builder()
///     .model("gemini-2.0-flash")
///     .pdf_pages(PdfPageMode::EachPage)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// LLM provider name (e.g. "gemini", "openai", "anthropic", "ollama"). Default: "gemini".
    pub provider_name: String,

    /// Model identifier. If None, uses [`default_model`] for the provider.
    pub model: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Transcription wants the model faithful to the ink on the page.
    pub temperature: f32,

    /// Maximum tokens the model may generate per sheet. Default: 2048.
    ///
    /// A filled sheet is one small JSON object; 2048 leaves room for long
    /// free-text notes.
    pub max_tokens: usize,

    /// Custom extraction instruction. If None, uses
    /// [`crate::prompts::default_instruction`].
    pub instruction: Option<String>,

    /// How multi-page PDFs are split into documents. Default: [`PdfPageMode::FirstPage`].
    pub pdf_pages: PdfPageMode,

    /// Longest edge, in pixels, of the image sent to the model. Default: 2000.
    ///
    /// Phone photos of sheets are often 4000 px or more; larger images are
    /// downscaled preserving aspect ratio.
    pub max_image_pixels: u32,

    /// Worksheet name in the exported workbook. Default: "Appropriation".
    pub sheet_name: String,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress callback for per-file events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider_name: DEFAULT_PROVIDER.to_string(),
            model: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 2048,
            instruction: None,
            pdf_pages: PdfPageMode::default(),
            max_image_pixels: 2000,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("instruction", &self.instruction.as_ref().map(|s| s.len()))
            .field("pdf_pages", &self.pdf_pages)
            .field("max_image_pixels", &self.max_image_pixels)
            .field("sheet_name", &self.sheet_name)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model to request: the configured one, else the provider's default.
    pub fn resolved_model(&self) -> Option<&str> {
        self.model
            .as_deref()
            .or_else(|| default_model(&self.provider_name))
    }
}

/// Vision-capable default model for a provider, if one is known.
pub fn default_model(provider: &str) -> Option<&'static str> {
    match provider.to_ascii_lowercase().as_str() {
        "gemini" | "google" => Some(DEFAULT_MODEL),
        "openai" => Some("gpt-4.1-mini"),
        "anthropic" => Some("claude-sonnet-4-20250514"),
        "mistral" => Some("pixtral-12b-2409"),
        "ollama" | "lmstudio" => Some("llava"),
        _ => None,
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.instruction = Some(instruction.into());
        self
    }

    pub fn pdf_pages(mut self, mode: PdfPageMode) -> Self {
        self.config.pdf_pages = mode;
        self
    }

    pub fn max_image_pixels(mut self, px: u32) -> Self {
        self.config.max_image_pixels = px.max(100);
        self
    }

    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.config.sheet_name = name.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.provider_name.trim().is_empty() && c.provider.is_none() {
            return Err(ExtractError::InvalidConfig(
                "Provider name must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if let Some(ref instruction) = c.instruction {
            if instruction.trim().is_empty() {
                return Err(ExtractError::InvalidConfig(
                    "Instruction must not be empty".into(),
                ));
            }
        }
        validate_sheet_name(&c.sheet_name)?;
        Ok(self.config)
    }
}

/// Excel's own worksheet-name rules, checked up front so a long batch does not
/// fail at export time.
fn validate_sheet_name(name: &str) -> Result<(), ExtractError> {
    if name.is_empty() {
        return Err(ExtractError::InvalidConfig(
            "Sheet name must not be empty".into(),
        ));
    }
    if name.chars().count() > 31 {
        return Err(ExtractError::InvalidConfig(format!(
            "Sheet name must be at most 31 characters, got {}",
            name.chars().count()
        )));
    }
    if let Some(bad) = name.chars().find(|c| "[]:*?/\\".contains(*c)) {
        return Err(ExtractError::InvalidConfig(format!(
            "Sheet name must not contain '{bad}'"
        )));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(ExtractError::InvalidConfig(
            "Sheet name must not start or end with an apostrophe".into(),
        ));
    }
    Ok(())
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How an uploaded PDF maps onto extraction documents.
///
/// | Mode | Documents per PDF | Use case |
/// |------|-------------------|----------|
/// | `FirstPage` | 1 | One sheet per upload (default) |
/// | `EachPage`  | page count | A batch of sheets scanned into one PDF |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PdfPageMode {
    /// Every uploaded file is exactly one document; only page 1 is read. (default)
    #[default]
    FirstPage,
    /// Every PDF page is extracted as its own document, labelled `name (page N)`.
    EachPage,
}

impl PdfPageMode {
    /// 0-indexed pages to render for a PDF with `total_pages` pages.
    pub fn to_indices(self, total_pages: usize) -> Vec<usize> {
        match self {
            PdfPageMode::FirstPage => (0..total_pages.min(1)).collect(),
            PdfPageMode::EachPage => (0..total_pages).collect(),
        }
    }
}
