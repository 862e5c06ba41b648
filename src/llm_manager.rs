use crate::command::Command;
use crate::error::InterpretError;
use crate::event_bus::{Event, EventBus, EventEmitter};
use crate::impl_event_emitter;
use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use std::sync::Arc;

/// Instruction sent with every extraction request.
pub const SYSTEM_INSTRUCTION: &str = "Ты — AI-помощник для POS-терминала. \
Проанализируй голосовую команду пользователя и преобразуй ее в JSON-объект, \
строго соответствующий предоставленной схеме. \
Всегда выбирай наиболее подходящий тип команды (command): \
'add_item', 'clear_cart', 'complete_sale' или 'open_management'. \
Если пользователь просит добавить товар, извлеки название или SKU и количество. \
Если количество не указано, используй 1.0. \
Если команда явно не указана, выбери наиболее вероятную команду.";

/// Gemini model used when the configuration names none.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// One schema-constrained generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    pub system_instruction: String,
    pub prompt: String,
    pub schema: Value,
}

impl StructuredRequest {
    /// Request asking the model to turn `text` into a `Command`.
    pub fn for_utterance(text: &str) -> Self {
        Self {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            prompt: format!("Распознанная команда пользователя: '{}'", text),
            schema: Command::json_schema(),
        }
    }
}

/// Raw model output.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub total_tokens: Option<usize>,
}

/// Trait representing an LLM provider able to answer in a fixed JSON schema.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Name of the provider.
    fn name(&self) -> &str;

    /// Model name of the provider.
    fn model_name(&self) -> &str {
        "Unknown"
    }

    /// Send one request and return the model's JSON text unparsed.
    async fn generate_structured(
        &self,
        request: &StructuredRequest,
    ) -> Result<Generation, InterpretError>;
}

/// Remote interpreter: utterance in, validated `Command` out.
///
/// Holds no state between calls; every call is one request and may be
/// retried by the caller.
pub struct LLMManager {
    provider: Box<dyn LLMProvider>,
    event_bus: Option<Arc<EventBus>>,
}

impl LLMManager {
    pub fn new(provider: Box<dyn LLMProvider>) -> Self {
        Self {
            provider,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Get the active provider.
    pub fn provider(&self) -> &dyn LLMProvider {
        &*self.provider
    }

    /// Ask the model for the command spoken in `text`.
    pub async fn extract_command(&self, text: &str) -> Result<Command, InterpretError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(InterpretError::BadInput);
        }

        let request = StructuredRequest::for_utterance(text);
        let provider = &self.provider;

        let _ = self
            .emit_event(Event::APICallStarted {
                provider: provider.name().to_string(),
                model: provider.model_name().to_string(),
            })
            .await;

        let result = provider.generate_structured(&request).await;

        match &result {
            Ok(generation) => {
                // Rough estimate when the provider reports no usage: 1 token ≈ 4 characters
                let tokens = generation.total_tokens.unwrap_or(
                    (request.system_instruction.len() + request.prompt.len() + generation.text.len())
                        / 4,
                );
                let _ = self
                    .emit_event(Event::APICallCompleted {
                        provider: provider.name().to_string(),
                        tokens,
                    })
                    .await;
            }
            Err(e) => {
                let _ = self
                    .emit_event(Event::APIError {
                        provider: provider.name().to_string(),
                        error: e.to_string(),
                    })
                    .await;
            }
        }

        let generation = result?;
        debug!("{} replied: {}", provider.name(), generation.text);
        let command = Command::from_json(&generation.text)?;
        info!("Extracted command {} from '{}'", command.kind(), text);
        Ok(command)
    }
}

impl_event_emitter!(LLMManager);


#[cfg(test)]
mod tests {
    use super::testing::ScriptedProvider;
    use super::*;

    #[test]
    fn test_request_embeds_utterance_and_schema() {
        let request = StructuredRequest::for_utterance("добавь два молока");
        assert_eq!(
            request.prompt,
            "Распознанная команда пользователя: 'добавь два молока'"
        );
        assert!(request.system_instruction.contains("1.0"));
        assert_eq!(request.schema, Command::json_schema());
    }

    #[tokio::test]
    async fn test_extract_defaults_quantity() {
        let manager = LLMManager::new(Box::new(ScriptedProvider::replying(
            r#"{"command": "add_item", "product_name_or_sku": "молоко"}"#,
        )));
        let command = manager.extract_command("добавь молоко").await.unwrap();
        assert_eq!(command, Command::add_item("молоко"));
        assert_eq!(command.quantity(), Some(1.0));
    }

    #[tokio::test]
    async fn test_blank_text_is_bad_input_without_request() {
        let provider = ScriptedProvider::replying(r#"{"command": "clear_cart"}"#);
        let manager = LLMManager::new(Box::new(provider));
        assert!(matches!(
            manager.extract_command("   ").await,
            Err(InterpretError::BadInput)
        ));
        // The scripted reply is still there: no request was sent.
        assert_eq!(
            manager.extract_command("очисти").await.unwrap(),
            Command::ClearCart
        );
    }

    #[tokio::test]
    async fn test_malformed_reply_is_schema_violation() {
        let manager = LLMManager::new(Box::new(ScriptedProvider::replying(
            r#"{"command": "add_item", "quantity": "#,
        )));
        assert!(matches!(
            manager.extract_command("добавь хлеб").await,
            Err(InterpretError::SchemaViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_transport_error_propagates_and_is_counted() {
        let bus = Arc::new(EventBus::new(16));
        let manager = LLMManager::new(Box::new(ScriptedProvider::new(vec![Err(
            InterpretError::Transport("connection reset".to_string()),
        )])))
        .with_event_bus(bus.clone());

        let err = manager.extract_command("заверши продажу").await.unwrap_err();
        assert!(err.is_retryable());

        let metrics = bus.get_metrics().await;
        assert_eq!(metrics.api_errors, 1);
        assert_eq!(metrics.total_tokens, 0);
    }

    #[tokio::test]
    async fn test_usage_reported_to_bus() {
        let bus = Arc::new(EventBus::new(16));
        let manager = LLMManager::new(Box::new(ScriptedProvider::replying(
            r#"{"command": "open_management"}"#,
        )))
        .with_event_bus(bus.clone());

        manager.extract_command("открой управление").await.unwrap();
        let metrics = bus.get_metrics().await;
        assert_eq!(metrics.total_api_calls, 1);
        assert_eq!(metrics.total_tokens, 42);
    }
}
