//! Credential loading: find the provider's API key once, at startup.
//!
//! The configuration store is the process environment, optionally seeded from
//! a `.env` file in the working directory. Variables already set in the
//! environment always win over the file.
//!
//! Loading happens before any file is processed. The extraction client can
//! only be built from a [`Credentials`] value, so a session without a usable
//! key never reaches the model.

use crate::error::ExtractError;
use std::fmt;
use tracing::{debug, info, warn};

/// Minimum plausible key length. Real keys are far longer; this only catches
/// placeholders like `xxx` or a stray quote.
const MIN_KEY_LEN: usize = 8;

/// Environment variables holding the key for `provider`, canonical first.
///
/// `None` means the provider is unknown to this table; `Some(&[])` means the
/// provider runs locally and needs no key.
pub fn key_vars(provider: &str) -> Option<&'static [&'static str]> {
    match provider.to_ascii_lowercase().as_str() {
        "gemini" | "google" => Some(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]),
        "openai" => Some(&["OPENAI_API_KEY"]),
        "anthropic" => Some(&["ANTHROPIC_API_KEY"]),
        "mistral" => Some(&["MISTRAL_API_KEY"]),
        "azure" => Some(&["AZURE_OPENAI_API_KEY"]),
        "openrouter" => Some(&["OPENROUTER_API_KEY"]),
        "ollama" | "lmstudio" | "mock" => Some(&[]),
        _ => None,
    }
}

/// A validated API key for one provider.
///
/// The key itself is never printed: `Debug` and [`Credentials::masked`] show
/// only its first and last four characters.
#[derive(Clone)]
pub struct Credentials {
    provider: String,
    key: Option<ApiKey>,
}

#[derive(Clone)]
struct ApiKey {
    value: String,
    /// Variable the key was read from.
    source_var: &'static str,
    /// Variable the provider factory reads.
    canonical_var: &'static str,
}

impl Credentials {
    /// Provider these credentials belong to.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Whether an API key was required and found.
    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Variable the key was read from, if any.
    pub fn source_var(&self) -> Option<&'static str> {
        self.key.as_ref().map(|k| k.source_var)
    }

    /// The key, for clients that take it directly.
    pub fn api_key(&self) -> Option<&str> {
        self.key.as_ref().map(|k| k.value.as_str())
    }

    /// Redacted key for display, e.g. `AIza…x9Qk`.
    pub fn masked(&self) -> String {
        match self.key {
            Some(ref k) => mask(&k.value),
            None => "<none>".to_string(),
        }
    }

    /// Publish the key under the variable the provider factory reads.
    ///
    /// Only does anything when the key was found under an alias
    /// (`GOOGLE_API_KEY` for gemini).
    ///
    /// The environment is process-global: call this from `main` before the
    /// async runtime or any other thread starts.
    /// [`LlmExtractionClient::from_credentials`](crate::LlmExtractionClient::from_credentials)
    /// never writes the environment itself; it fails when this call was
    /// needed and skipped.
    pub fn export_to_env(&self) {
        if let (Some(var), Some(k)) = (self.pending_export(), self.key.as_ref()) {
            debug!("Exporting {} as {}", k.source_var, var);
            std::env::set_var(var, &k.value);
        }
    }

    /// Canonical variable the provider factory will read, when it does not
    /// currently hold this key.
    ///
    /// `None` for keys read from the canonical variable and for providers
    /// without a key.
    pub fn pending_export(&self) -> Option<&'static str> {
        let k = self.key.as_ref()?;
        if k.source_var == k.canonical_var {
            return None;
        }
        match std::env::var(k.canonical_var) {
            Ok(v) if v.trim() == k.value => None,
            _ => Some(k.canonical_var),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("provider", &self.provider)
            .field("source_var", &self.source_var())
            .field("key", &self.masked())
            .finish()
    }
}

/// Load credentials for `provider` from the environment and `.env`.
pub fn load_credentials(provider: &str) -> Result<Credentials, ExtractError> {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }
    let creds = credentials_from_lookup(provider, |var| std::env::var(var).ok())?;
    if let Some(var) = creds.source_var() {
        info!("Using {} key from {} ({})", creds.provider(), var, creds.masked());
    }
    Ok(creds)
}

/// Resolve credentials through an arbitrary variable lookup.
///
/// [`load_credentials`] passes the process environment; tests pass a map.
pub fn credentials_from_lookup<F>(provider: &str, lookup: F) -> Result<Credentials, ExtractError>
where
    F: Fn(&str) -> Option<String>,
{
    let provider = provider.trim().to_ascii_lowercase();
    let Some(vars) = key_vars(&provider) else {
        warn!(
            "Unknown provider '{}'; leaving key lookup to the provider factory",
            provider
        );
        return Ok(Credentials {
            provider,
            key: None,
        });
    };
    let Some(&canonical_var) = vars.first() else {
        return Ok(Credentials {
            provider,
            key: None,
        });
    };

    let found = vars.iter().find_map(|&var| {
        lookup(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|v| (var, v))
    });

    let Some((source_var, value)) = found else {
        return Err(ExtractError::MissingCredential {
            provider,
            var: vars.join(" or "),
        });
    };

    validate_key(source_var, &value)?;

    Ok(Credentials {
        provider,
        key: Some(ApiKey {
            value,
            source_var,
            canonical_var,
        }),
    })
}

fn validate_key(var: &str, value: &str) -> Result<(), ExtractError> {
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ExtractError::InvalidCredential {
            var: var.to_string(),
            reason: "contains whitespace or control characters".into(),
        });
    }
    if value.starts_with('"') || value.starts_with('\'') {
        return Err(ExtractError::InvalidCredential {
            var: var.to_string(),
            reason: "looks quoted; remove the surrounding quotes".into(),
        });
    }
    if value.chars().count() < MIN_KEY_LEN {
        return Err(ExtractError::InvalidCredential {
            var: var.to_string(),
            reason: format!("too short ({} characters)", value.chars().count()),
        });
    }
    Ok(())
}

fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}\u{2026}{tail}")
}
