use anyhow::Result;
use colored::*;
use log::info;

use crate::assistant::Outcome;
use crate::config::Mode;
use crate::error::InterpretError;
use crate::event_bus::Metrics;

/// Terminal output for replies and commands.
pub struct UIHandler {
    pub headless: bool,
    pub json: bool,
}

impl UIHandler {
    pub fn new(headless: bool, json: bool) -> Self { Self { headless, json } }

    pub fn start(&self, mode: Mode, has_remote: bool) -> Result<()> {
        info!("Starting in {:?} mode (remote interpreter: {})", mode, has_remote);
        if self.headless || self.json {
            return Ok(());
        }
        println!("{}", "=".repeat(60).bright_blue());
        println!("{}", "POS Voice Assistant".bright_white().bold());
        println!(
            "{} {:?}{}",
            "mode:".dimmed(),
            mode,
            if has_remote { "" } else { " (rules only)" }
        );
        println!("{}", "=".repeat(60).bright_blue());
        Ok(())
    }

    pub fn format_outcome(&self, outcome: &Outcome) -> Result<String> {
        if self.json {
            return Ok(serde_json::to_string(outcome)?);
        }
        let mut line = if self.headless {
            outcome.reply.clone()
        } else {
            outcome.reply.bright_white().to_string()
        };
        if let Some(command) = &outcome.command {
            let json = command.to_json()?;
            if self.headless {
                line.push_str(&format!("\n{}", json));
            } else {
                line.push_str(&format!("\n  {} {}", "→".cyan(), json.cyan()));
            }
        }
        Ok(line)
    }

    pub fn show_outcome(&self, outcome: &Outcome) -> Result<()> {
        println!("{}", self.format_outcome(outcome)?);
        Ok(())
    }

    pub fn show_acknowledgement(&self, reply: &str) {
        if self.json {
            println!("{}", serde_json::json!({ "reply": reply, "source": "wake" }));
        } else if self.headless {
            println!("{}", reply);
        } else {
            println!("{}", reply.green());
        }
    }

    pub fn show_error(&self, error: &InterpretError) {
        if self.json {
            println!("{}", serde_json::json!({ "error": error.to_string() }));
        } else if self.headless {
            eprintln!("error: {}", error);
        } else {
            eprintln!("{} {}", "error:".red().bold(), error);
        }
    }

    /// Print an outcome or its error once. Returns whether it succeeded.
    pub fn show_result(&self, result: &Result<Outcome, InterpretError>) -> Result<bool> {
        match result {
            Ok(outcome) => {
                self.show_outcome(outcome)?;
                Ok(true)
            }
            Err(e) => {
                self.show_error(e);
                Ok(false)
            }
        }
    }

    pub fn format_metrics(&self, metrics: &Metrics) -> String {
        format!(
            "utterances: {}, replies: {}, commands: {}, fallbacks: {}, api calls: {} ({} failed), tokens: {}",
            metrics.utterances,
            metrics.replies,
            metrics.commands,
            metrics.fallbacks,
            metrics.total_api_calls,
            metrics.api_errors,
            metrics.total_tokens
        )
    }

    pub fn show_metrics(&self, metrics: &Metrics) {
        let summary = self.format_metrics(metrics);
        if self.headless || self.json {
            eprintln!("{}", summary);
        } else {
            eprintln!("{}", summary.dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::Source;
    use crate::command::Command;

    fn outcome() -> Outcome {
        Outcome {
            reply: "Добавляю товар хлеб в корзину".to_string(),
            command: Some(Command::add_item("хлеб")),
            source: Source::Rules,
        }
    }

    #[test]
    fn test_headless_format() {
        let ui = UIHandler::new(true, false);
        assert_eq!(
            ui.format_outcome(&outcome()).unwrap(),
            "Добавляю товар хлеб в корзину\n{\"command\":\"add_item\",\"product_name_or_sku\":\"хлеб\",\"quantity\":1.0}"
        );
    }

    #[test]
    fn test_json_format() {
        let ui = UIHandler::new(false, true);
        let line = ui.format_outcome(&outcome()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["source"], "rules");
        assert_eq!(value["command"]["product_name_or_sku"], "хлеб");
    }

    #[test]
    fn test_show_result_reports_failure() {
        let ui = UIHandler::new(true, false);
        assert!(ui.show_result(&Ok(outcome())).unwrap());
        let failed = Err(InterpretError::Transport("timeout".to_string()));
        assert!(!ui.show_result(&failed).unwrap());
    }

    #[test]
    fn test_metrics_summary_lists_replies() {
        let ui = UIHandler::new(true, false);
        let metrics = Metrics {
            utterances: 3,
            replies: 2,
            ..Metrics::default()
        };
        let summary = ui.format_metrics(&metrics);
        assert!(summary.starts_with("utterances: 3, replies: 2,"), "{}", summary);
    }
}
