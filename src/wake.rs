//! Wake-phrase gating for continuous listening.
//!
//! In a session the recognizer hears everything said near the terminal. Only
//! utterances addressed to the assistant ("джарвис, очисти корзину") are
//! passed on. Saying the phrase alone arms the gate, and the next utterance
//! is taken as the command.

/// What to do with one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Not addressed to the assistant.
    Ignore,
    /// Wake phrase with nothing after it; answer and wait for the command.
    Acknowledge,
    /// Command text with the wake phrase removed.
    Forward(String),
}

#[derive(Debug, Clone)]
pub struct WakeGate {
    phrase: String,
    armed: bool,
}

impl WakeGate {
    pub fn new(phrase: &str) -> Self {
        Self {
            phrase: phrase.trim().to_lowercase(),
            armed: false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Feed one lower-cased utterance through the gate.
    pub fn filter(&mut self, text: &str) -> Gate {
        let text = text.trim();
        if text.is_empty() {
            return Gate::Ignore;
        }

        // A blank phrase addresses nothing, so the gate stays open.
        if self.phrase.is_empty() {
            return Gate::Forward(text.to_string());
        }

        let Some(index) = text.find(&self.phrase) else {
            if self.armed {
                self.armed = false;
                return Gate::Forward(text.to_string());
            }
            return Gate::Ignore;
        };

        let after = &text[index + self.phrase.len()..];
        let command = strip_separators(&after.replace(&self.phrase, " "));
        if command.is_empty() {
            self.armed = true;
            Gate::Acknowledge
        } else {
            self.armed = false;
            Gate::Forward(command)
        }
    }
}

fn strip_separators(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == ',' || c == '.' || c == '!' || c.is_whitespace())
        .to_string()
}
