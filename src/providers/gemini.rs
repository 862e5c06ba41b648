use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::InterpretError;
use crate::llm_manager::{Generation, LLMProvider, StructuredRequest};

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini API provider using native structured output
pub struct GeminiProvider {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_json_schema: Value,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<usize>,
    candidates_token_count: Option<usize>,
    total_token_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetails,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetails {
    message: String,
    status: Option<String>,
    code: Option<u16>,
}

impl GeminiProvider {
    /// Create a provider with an explicit key and model.
    pub fn with_config(api_key: String, model: String) -> Result<Self, InterpretError> {
        if api_key.trim().is_empty() {
            return Err(InterpretError::ClientUnavailable(
                "Gemini API key is empty".to_string(),
            ));
        }
        Ok(Self {
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.0,
            client: super::build_client(None)?,
        })
    }

    /// Set custom base URL
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Set temperature for response generation
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Rebuild the HTTP client with a request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, InterpretError> {
        self.client = super::build_client(Some(timeout))?;
        Ok(self)
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_structured(
        &self,
        request: &StructuredRequest,
    ) -> Result<Generation, InterpretError> {
        let body = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: request.system_instruction.clone(),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_json_schema: request.schema.clone(),
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| InterpretError::Transport(format!("Failed to send request to Gemini: {}", e)))?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<GeminiError>(&response_text) {
                Ok(error_response) => InterpretError::Transport(format!(
                    "Gemini API error: {} (status: {:?}, code: {:?})",
                    error_response.error.message,
                    error_response.error.status,
                    error_response.error.code
                )),
                Err(_) => InterpretError::Transport(format!(
                    "Gemini API error (status {}): {}",
                    status, response_text
                )),
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&response_text)
            .map_err(|e| InterpretError::Transport(format!("Failed to parse Gemini response: {}", e)))?;

        let candidate = parsed
            .candidates
            .first()
            .ok_or_else(|| InterpretError::Transport("No candidates in Gemini response".to_string()))?;

        if let Some(reason) = &candidate.finish_reason {
            if reason != "STOP" {
                warn!("Gemini finished with reason {}; reply may be incomplete", reason);
            }
        }

        let text: String = candidate
            .content
            .as_ref()
            .map(|content| content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        let total_tokens = parsed.usage_metadata.as_ref().and_then(|usage| {
            info!(
                "Gemini token usage - Prompt: {:?}, Completion: {:?}, Total: {:?}",
                usage.prompt_token_count, usage.candidates_token_count, usage.total_token_count
            );
            usage.total_token_count
        });

        Ok(Generation { text, total_tokens })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::llm_manager::{DEFAULT_MODEL, SYSTEM_INSTRUCTION};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> GeminiProvider {
        GeminiProvider::with_config("test_key".to_string(), DEFAULT_MODEL.to_string())
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_structured_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test_key"))
            .and(body_partial_json(json!({
                "systemInstruction": {"parts": [{"text": SYSTEM_INSTRUCTION}]},
                "contents": [{"role": "user", "parts": [{"text": "Распознанная команда пользователя: 'очисти корзину'"}]}],
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseJsonSchema": Command::json_schema()
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "{\"command\": \"clear_cart\"}"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 8, "totalTokenCount": 128}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generation = provider_for(&server)
            .generate_structured(&StructuredRequest::for_utterance("очисти корзину"))
            .await
            .unwrap();
        assert_eq!(generation.text, r#"{"command": "clear_cart"}"#);
        assert_eq!(generation.total_tokens, Some(128));
    }

    #[tokio::test]
    async fn test_api_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": {"code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE"}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate_structured(&StructuredRequest::for_utterance("добавь хлеб"))
            .await
            .unwrap_err();
        match err {
            InterpretError::Transport(message) => assert!(message.contains("overloaded")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_candidates_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let result = provider_for(&server)
            .generate_structured(&StructuredRequest::for_utterance("добавь хлеб"))
            .await;
        assert!(matches!(result, Err(InterpretError::Transport(_))));
    }

    #[test]
    fn test_empty_key_is_unavailable() {
        assert!(matches!(
            GeminiProvider::with_config("  ".to_string(), DEFAULT_MODEL.to_string()),
            Err(InterpretError::ClientUnavailable(_))
        ));
    }
}
