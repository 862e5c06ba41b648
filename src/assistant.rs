use std::sync::Arc;

use chrono::Local;
use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::command::Command;
use crate::config::{Config, Mode};
use crate::error::InterpretError;
use crate::event_bus::{Event, EventBus, EventEmitter};
use crate::impl_event_emitter;
use crate::interpreter::{Intent, Interpreter};
use crate::llm_manager::LLMManager;
use crate::providers;

/// Which interpreter produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Rules,
    Remote,
    /// Rules answered because the remote call failed.
    Fallback,
}

/// Reply for the user plus the command for the terminal, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
    pub source: Source,
}

/// Dispatches utterances to the rule-based and remote interpreters
/// according to `Mode`.
pub struct Assistant {
    rules: Interpreter,
    remote: Option<LLMManager>,
    mode: Mode,
    event_bus: Option<Arc<EventBus>>,
}

impl Assistant {
    /// Fails with `ClientUnavailable` when `mode` is remote and no remote interpreter is given.
    pub fn new(
        rules: Interpreter,
        remote: Option<LLMManager>,
        mode: Mode,
    ) -> Result<Self, InterpretError> {
        if mode == Mode::Remote && remote.is_none() {
            return Err(InterpretError::ClientUnavailable(
                "remote mode requires a configured provider".to_string(),
            ));
        }
        Ok(Self {
            rules,
            remote,
            mode,
            event_bus: None,
        })
    }

    /// Build from configuration. In auto mode a provider that cannot be
    /// built leaves the assistant on rules only.
    pub fn from_config(config: &Config, event_bus: Arc<EventBus>) -> Result<Self, InterpretError> {
        let rules = Interpreter::new().with_sentinel(&config.assistant.unintelligible_sentinel);
        let mode = config.processing.mode;

        let provider = match mode {
            Mode::Rules => None,
            Mode::Remote => Some(providers::from_config(&config.remote)?),
            Mode::Auto => match providers::from_config(&config.remote) {
                Ok(provider) => Some(provider),
                Err(e) => {
                    warn!("Remote interpreter unavailable, answering with rules only: {}", e);
                    None
                }
            },
        };
        let remote = provider.map(|p| LLMManager::new(p).with_event_bus(event_bus.clone()));

        let mut assistant = Self::new(rules, remote, mode)?;
        assistant.set_event_bus(event_bus);
        Ok(assistant)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn rules(&self) -> &Interpreter {
        &self.rules
    }

    /// Interpret one normalized utterance.
    pub async fn handle(&self, text: &str) -> Result<Outcome, InterpretError> {
        let id = Uuid::new_v4();
        let _ = self
            .emit_event(Event::UtteranceReceived {
                id,
                text: text.to_string(),
            })
            .await;

        let result = match self.mode {
            Mode::Rules => Ok(self.answer_with_rules(id, text).await),
            Mode::Remote => self.answer_remotely(text).await,
            Mode::Auto => self.answer_auto(id, text).await,
        };

        if let Ok(outcome) = &result {
            if let Some(command) = &outcome.command {
                let _ = self
                    .emit_event(Event::CommandExtracted {
                        id,
                        command: command.clone(),
                    })
                    .await;
            }
            let _ = self
                .emit_event(Event::ReplyProduced {
                    id,
                    reply: outcome.reply.clone(),
                })
                .await;
        }
        result
    }

    async fn answer_with_rules(&self, id: Uuid, text: &str) -> Outcome {
        let intent = self.rules.classify(text);
        self.rule_outcome(id, &intent, Source::Rules).await
    }

    async fn rule_outcome(&self, id: Uuid, intent: &Intent, source: Source) -> Outcome {
        let _ = self
            .emit_event(Event::IntentMatched {
                id,
                rule: intent.label().to_string(),
            })
            .await;
        Outcome {
            reply: self.rules.render(intent, Local::now().naive_local()),
            command: intent.to_command(),
            source,
        }
    }

    async fn answer_remotely(&self, text: &str) -> Result<Outcome, InterpretError> {
        let remote = self.remote.as_ref().ok_or_else(|| {
            InterpretError::ClientUnavailable("no remote interpreter configured".to_string())
        })?;
        let command = remote.extract_command(text).await?;
        Ok(Outcome {
            reply: command.confirmation(),
            command: Some(command),
            source: Source::Remote,
        })
    }

    async fn answer_auto(&self, id: Uuid, text: &str) -> Result<Outcome, InterpretError> {
        if self.rules.is_unintelligible(text) || self.remote.is_none() {
            return Ok(self.answer_with_rules(id, text).await);
        }

        let intent = self.rules.classify(text);
        let fallback = intent.to_command();
        // Small talk and cashier actions the terminal has no command for stay with the rules.
        if intent != Intent::Unknown && fallback.is_none() {
            return Ok(self.rule_outcome(id, &intent, Source::Rules).await);
        }

        match self.answer_remotely(text).await {
            Err(InterpretError::Transport(reason)) if fallback.is_some() => {
                warn!("Remote interpreter failed ({}); using keyword rules", reason);
                let _ = self.emit_event(Event::FallbackUsed { id, reason }).await;
                Ok(self.rule_outcome(id, &intent, Source::Fallback).await)
            }
            Ok(outcome) => {
                info!("Remote interpreter answered '{}'", text);
                Ok(outcome)
            }
            Err(e) => Err(e),
        }
    }
}

impl_event_emitter!(Assistant);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::ResponseCategory;
    use crate::llm_manager::testing::ScriptedProvider;

    fn remote(replies: Vec<Result<String, InterpretError>>) -> Option<LLMManager> {
        Some(LLMManager::new(Box::new(ScriptedProvider::new(replies))))
    }

    #[tokio::test]
    async fn test_rules_mode_never_fails() {
        let assistant = Assistant::new(Interpreter::new(), None, Mode::Rules).unwrap();
        let outcome = assistant.handle("добавить телефон").await.unwrap();
        assert_eq!(outcome.reply, "Добавляю товар телефон в корзину");
        assert_eq!(outcome.command, Some(Command::add_item("телефон")));
        assert_eq!(outcome.source, Source::Rules);

        let outcome = assistant.handle("").await.unwrap();
        assert!(assistant
            .rules()
            .responses()
            .candidates(ResponseCategory::Unknown)
            .contains(&outcome.reply));
        assert_eq!(outcome.command, None);
    }

    #[tokio::test]
    async fn test_remote_mode_requires_provider() {
        assert!(matches!(
            Assistant::new(Interpreter::new(), None, Mode::Remote),
            Err(InterpretError::ClientUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_mode() {
        let assistant = Assistant::new(
            Interpreter::new(),
            remote(vec![Ok(
                r#"{"command": "add_item", "product_name_or_sku": "кока-кола", "quantity": 2}"#
                    .to_string(),
            )]),
            Mode::Remote,
        )
        .unwrap();

        let outcome = assistant.handle("добавь две кока-колы").await.unwrap();
        assert_eq!(
            outcome.command,
            Some(Command::add_items(Some("кока-кола"), 2.0).unwrap())
        );
        assert_eq!(outcome.source, Source::Remote);
        assert!(matches!(assistant.handle("  ").await, Err(InterpretError::BadInput)));
    }

    #[tokio::test]
    async fn test_auto_keeps_small_talk_local() {
        // No scripted replies: any remote call would fail.
        let assistant =
            Assistant::new(Interpreter::new(), remote(vec![]), Mode::Auto).unwrap();
        for text in ["привет", "помощь", "распечатай чек", "какая гарантия", "неразборчиво"] {
            let outcome = assistant.handle(text).await.unwrap();
            assert_eq!(outcome.source, Source::Rules, "{}", text);
        }
    }

    #[tokio::test]
    async fn test_auto_sends_commands_to_remote() {
        let assistant = Assistant::new(
            Interpreter::new(),
            remote(vec![
                Ok(r#"{"command": "clear_cart"}"#.to_string()),
                Ok(r#"{"command": "open_management"}"#.to_string()),
            ]),
            Mode::Auto,
        )
        .unwrap();

        let outcome = assistant.handle("очисти корзину").await.unwrap();
        assert_eq!(outcome.command, Some(Command::ClearCart));
        assert_eq!(outcome.source, Source::Remote);

        let outcome = assistant.handle("открой панель управления").await.unwrap();
        assert_eq!(outcome.command, Some(Command::OpenManagement));
    }

    #[tokio::test]
    async fn test_auto_falls_back_on_transport_error() {
        let bus = Arc::new(EventBus::new(16));
        let mut assistant = Assistant::new(
            Interpreter::new(),
            remote(vec![Err(InterpretError::Transport("timeout".to_string()))]),
            Mode::Auto,
        )
        .unwrap();
        assistant.set_event_bus(bus.clone());

        let outcome = assistant.handle("добавить хлеб").await.unwrap();
        assert_eq!(outcome.source, Source::Fallback);
        assert_eq!(outcome.command, Some(Command::add_item("хлеб")));

        let metrics = bus.get_metrics().await;
        assert_eq!(metrics.fallbacks, 1);
        assert_eq!(metrics.commands, 1);
        assert_eq!(metrics.utterances, 1);
    }

    #[tokio::test]
    async fn test_auto_propagates_errors_without_fallback() {
        let assistant = Assistant::new(
            Interpreter::new(),
            remote(vec![
                Err(InterpretError::Transport("timeout".to_string())),
                Ok("nonsense".to_string()),
            ]),
            Mode::Auto,
        )
        .unwrap();

        // Unmatched text has no rule-based command to fall back to.
        assert!(matches!(
            assistant.handle("абракадабра").await,
            Err(InterpretError::Transport(_))
        ));
        // Schema violations are never papered over.
        assert!(matches!(
            assistant.handle("добавить хлеб").await,
            Err(InterpretError::SchemaViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_auto_without_provider_uses_rules() {
        let assistant = Assistant::new(Interpreter::new(), None, Mode::Auto).unwrap();
        assert!(!assistant.has_remote());
        let outcome = assistant.handle("заверши продажу").await.unwrap();
        assert_eq!(outcome.command, Some(Command::CompleteSale));
        assert_eq!(outcome.source, Source::Rules);
    }

    #[test]
    fn test_outcome_json() {
        let outcome = Outcome {
            reply: "Очищаю корзину покупок".to_string(),
            command: Some(Command::ClearCart),
            source: Source::Remote,
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({
                "reply": "Очищаю корзину покупок",
                "command": {"command": "clear_cart"},
                "source": "remote"
            })
        );
    }
}
