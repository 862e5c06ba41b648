use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use anyhow::{Result, Context};

use crate::interpreter::UNINTELLIGIBLE;

/// How the two interpreters are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Keyword rules only
    Rules,
    /// Remote model only
    Remote,
    /// Rules for small talk, remote model for cashier commands
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Gemini,
    /// Any OpenAI-compatible chat completions endpoint
    #[serde(rename = "openai")]
    OpenAI,
}

/// Main configuration structure for pos_voice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Rule-based assistant settings
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Remote model settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Dispatch settings
    #[serde(default)]
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Text the recognizer produces for speech it could not transcribe
    #[serde(default = "default_sentinel")]
    pub unintelligible_sentinel: String,

    /// Phrase that addresses the assistant in a session
    #[serde(default = "default_wake_phrase")]
    pub wake_phrase: String,

    /// Require the wake phrase before every command
    #[serde(default)]
    pub require_wake_phrase: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Which API flavour to talk to
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    /// Model to use; provider default when unset
    pub model: Option<String>,

    /// Override of the provider's base URL
    pub base_url: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Temperature setting
    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,

    /// Client-side request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_mode")]
    pub mode: Mode,
}

// Default value functions
fn default_sentinel() -> String { UNINTELLIGIBLE.to_string() }
fn default_wake_phrase() -> String { "джарвис".to_string() }
fn default_provider() -> ProviderKind { ProviderKind::Gemini }
fn default_mode() -> Mode { Mode::Auto }
fn default_temperature() -> Option<f32> { Some(0.0) }
fn default_request_timeout_secs() -> Option<u64> { Some(30) }

impl Default for AssistantConfig {
    fn default() -> Self {
        AssistantConfig {
            unintelligible_sentinel: default_sentinel(),
            wake_phrase: default_wake_phrase(),
            require_wake_phrase: false,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            provider: default_provider(),
            model: None,
            base_url: None,
            api_key_env: None,
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        ProcessingConfig { mode: default_mode() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            assistant: AssistantConfig::default(),
            remote: RemoteConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        Ok(config)
    }

    /// Reject values that parse but cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.assistant.wake_phrase.trim().is_empty() {
            anyhow::bail!("assistant.wake_phrase must not be blank");
        }
        Ok(())
    }

    /// Load configuration from command line argument or default locations.
    /// Returns the config and the path it came from, if any.
    pub fn load(config_path: &Option<String>) -> Result<(Self, Option<String>)> {
        if let Some(path) = config_path {
            let expanded = shellexpand::tilde(path);
            return Ok((Self::from_file(expanded.as_ref())?, Some(path.clone())));
        }

        let default_paths = [
            "pos_voice.toml",
            ".pos_voice.toml",
            "~/.config/pos_voice/config.toml",
        ];

        for path in default_paths {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                match Self::from_file(expanded_path.as_ref()) {
                    Ok(config) => return Ok((config, Some(path.to_string()))),
                    Err(e) => log::warn!("Failed to load config from {}: {:#}", path, e),
                }
            }
        }

        Ok((Self::default(), None))
    }

    /// Save configuration to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        fs::write(path.as_ref(), contents)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Merge with command-line arguments (CLI args take precedence)
    pub fn merge_with_args(&mut self, mode: Option<Mode>, wake: bool) {
        if let Some(mode) = mode {
            self.processing.mode = mode;
        }
        if wake {
            self.assistant.require_wake_phrase = true;
        }
    }
}
