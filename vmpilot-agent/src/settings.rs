//! Settings read from the environment.
//!
//! - `SCRAPYBARA_API_KEY` - Required. Key for the instance service.
//! - `ANTHROPIC_API_KEY` - Optional. Needed for `claude*` models.
//! - `OPENAI_API_KEY` - Optional. Needed for every other model.
//! - `SCRAPYBARA_BASE_URL` - Optional. Overrides the instance service endpoint.
//! - `VMPILOT_OUTPUT_DIR` - Optional. Report directory. Defaults to `output`.
//! - `VMPILOT_MAX_ROUNDS` - Optional. Round bound per session. Defaults to `100`.

use crate::agent::AgentConfig;
use std::path::PathBuf;
use thiserror::Error;
use vmpilot_runtime::{ModelChoice, ScrapybaraClient};

pub const SCRAPYBARA_API_KEY: &str = "SCRAPYBARA_API_KEY";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const SCRAPYBARA_BASE_URL: &str = "SCRAPYBARA_BASE_URL";
pub const OUTPUT_DIR: &str = "VMPILOT_OUTPUT_DIR";
pub const MAX_ROUNDS: &str = "VMPILOT_MAX_ROUNDS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub scrapybara_api_key: String,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Instance service endpoint, `None` for the public one
    pub scrapybara_base_url: Option<String>,
    pub output_dir: PathBuf,
    pub max_rounds: usize,
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::MissingEnvVar` if `SCRAPYBARA_API_KEY` is not set.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup`, which maps a variable name to its value
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let present = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let scrapybara_api_key =
            present(SCRAPYBARA_API_KEY).ok_or_else(|| SettingsError::MissingEnvVar(SCRAPYBARA_API_KEY.to_string()))?;

        let max_rounds = match present(MAX_ROUNDS) {
            Some(raw) => parse_rounds(&raw)?,
            None => AgentConfig::default().max_rounds,
        };

        Ok(Self {
            scrapybara_api_key,
            anthropic_api_key: present(ANTHROPIC_API_KEY),
            openai_api_key: present(OPENAI_API_KEY),
            scrapybara_base_url: present(SCRAPYBARA_BASE_URL),
            output_dir: present(OUTPUT_DIR).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("output")),
            max_rounds,
        })
    }

    pub fn instance_client(&self) -> vmpilot_error::Result<ScrapybaraClient> {
        let client = ScrapybaraClient::new(&self.scrapybara_api_key)?;
        Ok(match &self.scrapybara_base_url {
            Some(url) => client.with_base_url(url),
            None => client,
        })
    }

    /// Provider for `model`, using whichever vendor key it needs
    pub fn provider(&self, model: &str) -> vmpilot_error::Result<ModelChoice> {
        ModelChoice::for_model(model, self.anthropic_api_key.as_deref(), self.openai_api_key.as_deref())
    }

    pub fn agent_config(&self, model: &str) -> AgentConfig {
        AgentConfig::default().with_model(model).with_max_rounds(self.max_rounds)
    }
}

fn parse_rounds(raw: &str) -> Result<usize, SettingsError> {
    match raw.parse::<usize>() {
        Ok(0) => Err(SettingsError::InvalidValue(MAX_ROUNDS.to_string(), "must be at least 1".to_string())),
        Ok(n) => Ok(n),
        Err(e) => Err(SettingsError::InvalidValue(MAX_ROUNDS.to_string(), e.to_string())),
    }
}
