use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::command::Command;

/// Events that can be emitted by components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Utterance events
    UtteranceReceived {
        id: Uuid,
        text: String,
    },
    IntentMatched {
        id: Uuid,
        rule: String,
    },
    CommandExtracted {
        id: Uuid,
        command: Command,
    },
    ReplyProduced {
        id: Uuid,
        reply: String,
    },
    FallbackUsed {
        id: Uuid,
        reason: String,
    },

    // API events
    APICallStarted {
        provider: String,
        model: String,
    },
    APICallCompleted {
        provider: String,
        tokens: usize,
    },
    APIError {
        provider: String,
        error: String,
    },

    // System events
    ConfigLoaded {
        path: Option<String>,
    },
    ShutdownRequested,
}

/// Event bus for component communication
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    metrics: Arc<RwLock<Metrics>>,
}

/// Accumulated metrics from events
#[derive(Debug, Default, Clone)]
pub struct Metrics {
    pub utterances: usize,
    pub replies: usize,
    pub commands: usize,
    pub fallbacks: usize,
    pub total_api_calls: usize,
    pub api_errors: usize,
    pub total_tokens: usize,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            metrics: Arc::new(RwLock::new(Metrics::default())),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers
    pub async fn emit(&self, event: Event) -> Result<()> {
        self.update_metrics(&event).await;

        // No receivers is not an error
        let _ = self.sender.send(event);
        Ok(())
    }

    /// Get current metrics
    pub async fn get_metrics(&self) -> Metrics {
        self.metrics.read().await.clone()
    }

    async fn update_metrics(&self, event: &Event) {
        let mut metrics = self.metrics.write().await;

        match event {
            Event::UtteranceReceived { .. } => metrics.utterances += 1,
            Event::ReplyProduced { .. } => metrics.replies += 1,
            Event::CommandExtracted { .. } => metrics.commands += 1,
            Event::FallbackUsed { .. } => metrics.fallbacks += 1,
            Event::APICallCompleted { tokens, .. } => {
                metrics.total_api_calls += 1;
                metrics.total_tokens += tokens;
            }
            Event::APIError { .. } => {
                metrics.total_api_calls += 1;
                metrics.api_errors += 1;
            }
            _ => {}
        }
    }
}

/// Trait for components that can emit events
#[async_trait::async_trait]
pub trait EventEmitter {
    fn set_event_bus(&mut self, bus: Arc<EventBus>);

    async fn emit_event(&self, event: Event) -> Result<()>;
}

/// Helper macro to implement EventEmitter trait
#[macro_export]
macro_rules! impl_event_emitter {
    ($type:ty) => {
        #[async_trait::async_trait]
        impl EventEmitter for $type {
            fn set_event_bus(&mut self, bus: Arc<EventBus>) {
                self.event_bus = Some(bus);
            }

            async fn emit_event(&self, event: Event) -> anyhow::Result<()> {
                if let Some(bus) = &self.event_bus {
                    bus.emit(event).await
                } else {
                    Ok(())
                }
            }
        }
    };
}
