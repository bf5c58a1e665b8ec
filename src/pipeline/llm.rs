//! Extraction client: send one sheet image plus the instruction to a vision
//! model and return its raw text.
//!
//! [`VisionExtractor`] is the seam between the batch and the network. The
//! production implementation, [`LlmExtractionClient`], wraps an
//! `edgequake-llm` provider; tests substitute a scripted extractor.
//!
//! One call per document. No retry, no timeout: a failed call becomes a
//! per-file error and the batch moves on.

use crate::config::ExtractionConfig;
use crate::credentials::Credentials;
use crate::error::{ExtractError, ServiceError};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// User-turn text accompanying the sheet image.
const USER_TEXT: &str = "Extract the fields from this appropriation sheet.";

/// Raw model output for one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResponse {
    /// Free-form text, expected (not guaranteed) to hold a JSON object.
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl ExtractionResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Anything that can read a sheet image given an instruction.
pub trait VisionExtractor: Send + Sync {
    /// Send `image` with `instruction`; return the model's raw text.
    fn extract(
        &self,
        image: ImageData,
        instruction: &str,
    ) -> impl Future<Output = Result<ExtractionResponse, ServiceError>> + Send;
}

/// [`VisionExtractor`] backed by an `edgequake-llm` provider.
///
/// Built once per session and shared by reference; it holds no mutable state.
#[derive(Clone)]
pub struct LlmExtractionClient {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl std::fmt::Debug for LlmExtractionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmExtractionClient")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl LlmExtractionClient {
    /// Wrap an already-configured provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Build the client for `config`, authenticated by `credentials`.
    ///
    /// A pre-built `config.provider` is used as-is. Otherwise the provider is
    /// created by name through [`ProviderFactory`], which reads the key from
    /// the environment. This never writes the environment: a key found under
    /// an alias must be published with [`Credentials::export_to_env`] first,
    /// or this returns `ProviderNotConfigured`.
    pub fn from_credentials(
        credentials: &Credentials,
        config: &ExtractionConfig,
    ) -> Result<Self, ExtractError> {
        if let Some(ref provider) = config.provider {
            return Ok(Self::new(Arc::clone(provider), config));
        }

        let name = config.provider_name.trim().to_ascii_lowercase();
        if credentials.provider() != name {
            return Err(ExtractError::InvalidConfig(format!(
                "credentials were loaded for '{}' but the provider is '{}'",
                credentials.provider(),
                name
            )));
        }

        let model = config
            .resolved_model()
            .ok_or_else(|| ExtractError::ProviderNotConfigured {
                provider: name.clone(),
                hint: "No default vision model is known for this provider; set a model explicitly."
                    .into(),
            })?;

        if let Some(var) = credentials.pending_export() {
            return Err(ExtractError::ProviderNotConfigured {
                provider: name,
                hint: format!(
                    "The key was read from {} but the provider reads {}. \
                     Call Credentials::export_to_env() before starting the async runtime.",
                    credentials.source_var().unwrap_or("an alias"),
                    var
                ),
            });
        }

        let provider = ProviderFactory::create_llm_provider(&name, model).map_err(|e| {
            ExtractError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("{e}"),
            }
        })?;
        debug!("Created provider {} with model {}", name, model);

        Ok(Self::new(provider, config))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

impl VisionExtractor for LlmExtractionClient {
    async fn extract(
        &self,
        image: ImageData,
        instruction: &str,
    ) -> Result<ExtractionResponse, ServiceError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(instruction),
            ChatMessage::user_with_images(USER_TEXT, vec![image]),
        ];
        let options = self.options();

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ServiceError::new(format!("{e}")))?;

        debug!(
            "{} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(ExtractionResponse {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::credentials_from_lookup;

    #[test]
    fn provider_mismatch_rejected() {
        let creds = credentials_from_lookup("ollama", |_: &str| None).unwrap();
        let config = ExtractionConfig::default();
        let err = LlmExtractionClient::from_credentials(&creds, &config).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn unknown_provider_without_model_rejected() {
        let creds = credentials_from_lookup("vllm", |_: &str| None).unwrap();
        let config = ExtractionConfig::builder()
            .provider_name("vllm")
            .build()
            .unwrap();
        let err = LlmExtractionClient::from_credentials(&creds, &config).unwrap_err();
        assert!(matches!(err, ExtractError::ProviderNotConfigured { .. }));
    }

    #[test]
    fn alias_key_must_be_exported_first() {
        let key = "AIzaSyAliasOnly-9d3b20";
        let creds = credentials_from_lookup("gemini", |var: &str| {
            (var == "GOOGLE_API_KEY").then(|| key.to_string())
        })
        .unwrap();
        let config = ExtractionConfig::default();

        let err = LlmExtractionClient::from_credentials(&creds, &config).unwrap_err();
        match err {
            ExtractError::ProviderNotConfigured { provider, hint } => {
                assert_eq!(provider, "gemini");
                assert!(hint.contains("export_to_env"), "got: {hint}");
                assert!(hint.contains("GEMINI_API_KEY"), "got: {hint}");
            }
            other => panic!("expected ProviderNotConfigured, got {other:?}"),
        }
        // the environment was left alone
        assert_ne!(std::env::var("GEMINI_API_KEY").ok().as_deref(), Some(key));
    }

    #[test]
    fn response_from_text() {
        let r = ExtractionResponse::from_text("{}");
        assert_eq!(r.text, "{}");
        assert_eq!(r.input_tokens, 0);
    }
}
