//! Generation provider implementations.
//!
//! `build(config, api_key)` is the factory; `select(config)` is what
//! startup calls. Adding a new backend = new module + new match arm.

pub mod gemini;
pub mod mock;

use tracing::{info, warn};

use crate::config::{Config, LlmConfig};
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config and an optional API key.
///
/// `api_key` is sourced from `GEMINI_API_KEY` env (never TOML).
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "mock" => Ok(LlmProvider::Mock(mock::MockProvider)),
        "gemini" => {
            let Some(key) = api_key else {
                return Err(ProviderError::MissingCredential("GEMINI_API_KEY not set".into()));
            };
            let g = &config.gemini;
            let p = gemini::GeminiProvider::new(
                g.api_base_url.clone(),
                g.model.clone(),
                g.temperature,
                g.timeout_seconds,
                key,
            )?;
            Ok(LlmProvider::Gemini(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}

/// Select the generation backend for this process. Mock mode, a missing
/// key or an unknown provider name all land on the mock provider.
pub fn select(config: &Config) -> LlmProvider {
    if config.server.mock_mode {
        info!("mock mode: using mock generation provider");
        return LlmProvider::Mock(mock::MockProvider);
    }
    match build(&config.llm, config.credentials.gemini_api_key.clone()) {
        Ok(p) => {
            info!(provider = p.name(), model = %config.llm.gemini.model, "generation provider ready");
            p
        }
        Err(e) => {
            warn!(error = %e, "falling back to mock generation provider");
            LlmProvider::Mock(mock::MockProvider)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn llm_config(provider: &str) -> LlmConfig {
        let mut c = Config::offline(Path::new("unused.json")).llm;
        c.provider = provider.to_string();
        c
    }

    #[test]
    fn mock_needs_no_key() {
        assert_eq!(build(&llm_config("mock"), None).unwrap().name(), "mock");
    }

    #[test]
    fn gemini_without_key_is_missing_credential() {
        let err = build(&llm_config("gemini"), None).unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredential(_)));
    }

    #[test]
    fn gemini_with_key() {
        let p = build(&llm_config("gemini"), Some("k".into())).unwrap();
        assert_eq!(p.name(), "gemini");
    }

    #[test]
    fn unknown_provider() {
        let err = build(&llm_config("openai"), None).unwrap_err();
        assert!(matches!(err, ProviderError::UnknownProvider(ref n) if n == "openai"));
    }

    #[test]
    fn select_falls_back_to_mock() {
        let mut config = Config::offline(Path::new("unused.json"));
        config.server.mock_mode = false;
        config.llm.provider = "gemini".into();
        config.credentials.gemini_api_key = None;
        assert_eq!(select(&config).name(), "mock");

        config.credentials.gemini_api_key = Some("k".into());
        assert_eq!(select(&config).name(), "gemini");

        config.server.mock_mode = true;
        assert_eq!(select(&config).name(), "mock");
    }
}
