use async_trait::async_trait;
use log::debug;
use std::time::Duration;

use crate::error::InterpretError;
use crate::llm_manager::{Generation, LLMProvider, StructuredRequest};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat completions provider with `json_schema` response format.
///
/// Any server speaking the same protocol (OpenRouter, a local Ollama) works
/// through `with_base_url`.
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    pub model: String,
    pub temperature: f32,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn with_config(api_key: String, model: String) -> Result<Self, InterpretError> {
        if api_key.trim().is_empty() {
            return Err(InterpretError::ClientUnavailable(
                "OpenAI API key is empty".to_string(),
            ));
        }
        Ok(Self {
            model,
            temperature: 0.0,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: super::build_client(None)?,
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, InterpretError> {
        self.client = super::build_client(Some(timeout))?;
        Ok(self)
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str { "openai" }
    fn model_name(&self) -> &str { &self.model }

    async fn generate_structured(
        &self,
        request: &StructuredRequest,
    ) -> Result<Generation, InterpretError> {
        let url = format!("{}/chat/completions", self.base_url);
        let req_body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system_instruction},
                {"role": "user", "content": request.prompt},
            ],
            "temperature": self.temperature,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "voice_command",
                    "schema": request.schema,
                    "strict": false,
                },
            },
        });
        let resp = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&req_body)
            .send()
            .await
            .map_err(|e| InterpretError::Transport(format!("Failed to send request to {}: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(InterpretError::Transport(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| InterpretError::Transport(format!("Failed to parse OpenAI response: {}", e)))?;
        debug!("Raw OpenAI response: {}", json);

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| InterpretError::Transport("No content in OpenAI response".to_string()))?;
        let total_tokens = json["usage"]["total_tokens"].as_u64().map(|t| t as usize);

        Ok(Generation {
            text: content.to_string(),
            total_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::llm_manager::SYSTEM_INSTRUCTION;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_chat_completion_with_schema() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test_key"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": SYSTEM_INSTRUCTION},
                    {"role": "user", "content": "Распознанная команда пользователя: 'заверши продажу'"}
                ],
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {"name": "voice_command", "schema": Command::json_schema()}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"command\":\"complete_sale\"}"}}],
                "usage": {"total_tokens": 77}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAIProvider::with_config("test_key".to_string(), DEFAULT_MODEL.to_string())
            .unwrap()
            .with_base_url(format!("{}/", server.uri()));
        let generation = provider
            .generate_structured(&StructuredRequest::for_utterance("заверши продажу"))
            .await
            .unwrap();
        assert_eq!(generation.text, r#"{"command":"complete_sale"}"#);
        assert_eq!(generation.total_tokens, Some(77));
    }

    #[tokio::test]
    async fn test_unauthorized_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::with_config("bad".to_string(), DEFAULT_MODEL.to_string())
            .unwrap()
            .with_base_url(server.uri());
        match provider
            .generate_structured(&StructuredRequest::for_utterance("добавь хлеб"))
            .await
        {
            Err(InterpretError::Transport(message)) => assert!(message.contains("401")),
            other => panic!("unexpected result {:?}", other.map(|g| g.text)),
        }
    }
}
