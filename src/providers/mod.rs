pub mod gemini;
pub mod openai;

use std::env;
use std::time::Duration;

use log::info;

use crate::config::{ProviderKind, RemoteConfig};
use crate::error::InterpretError;
use crate::llm_manager::LLMProvider;

use gemini::GeminiProvider;
use openai::OpenAIProvider;

/// Build the provider named by the remote configuration.
///
/// Fails with `ClientUnavailable` before any request when the credential is
/// missing or the HTTP client cannot be built.
pub fn from_config(config: &RemoteConfig) -> Result<Box<dyn LLMProvider>, InterpretError> {
    let timeout = config.request_timeout_secs.map(Duration::from_secs);

    let provider: Box<dyn LLMProvider> = match config.provider {
        ProviderKind::Gemini => {
            let key_env = config.api_key_env.as_deref().unwrap_or(gemini::API_KEY_ENV);
            let model = config
                .model
                .clone()
                .unwrap_or_else(|| crate::llm_manager::DEFAULT_MODEL.to_string());
            let mut provider = GeminiProvider::with_config(read_api_key(key_env)?, model)?;
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            if let Some(temperature) = config.temperature {
                provider = provider.with_temperature(temperature);
            }
            if let Some(timeout) = timeout {
                provider = provider.with_timeout(timeout)?;
            }
            Box::new(provider)
        }
        ProviderKind::OpenAI => {
            let key_env = config.api_key_env.as_deref().unwrap_or(openai::API_KEY_ENV);
            let model = config
                .model
                .clone()
                .unwrap_or_else(|| openai::DEFAULT_MODEL.to_string());
            let mut provider = OpenAIProvider::with_config(read_api_key(key_env)?, model)?;
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            if let Some(temperature) = config.temperature {
                provider = provider.with_temperature(temperature);
            }
            if let Some(timeout) = timeout {
                provider = provider.with_timeout(timeout)?;
            }
            Box::new(provider)
        }
    };

    info!("Using {} provider with model {}", provider.name(), provider.model_name());
    Ok(provider)
}

fn read_api_key(var: &str) -> Result<String, InterpretError> {
    match env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        Ok(_) => Err(InterpretError::ClientUnavailable(format!("{} is empty", var))),
        Err(_) => Err(InterpretError::ClientUnavailable(format!(
            "{} environment variable not set",
            var
        ))),
    }
}

fn build_client(timeout: Option<Duration>) -> Result<reqwest::Client, InterpretError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| InterpretError::ClientUnavailable(format!("Failed to build HTTP client: {}", e)))
}
