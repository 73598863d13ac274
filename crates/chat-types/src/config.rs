use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::Result;

/// LLM endpoint configuration as exchanged with the backend.
///
/// Every field is optional: `set-api-config` sends only what changed and
/// `api-config` may report a partial view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, alias = "maxTokens", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ApiConfig {
    /// The values the backend starts with before any `set-api-config`.
    pub fn backend_defaults() -> Self {
        Self {
            url: Some(DEFAULT_API_URL.to_string()),
            token: Some(String::new()),
            model: Some(DEFAULT_MODEL.to_string()),
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.token.is_none()
            && self.model.is_none()
            && self.temperature.is_none()
            && self.max_tokens.is_none()
    }

    /// Overlay the fields present in `update`.
    pub fn merge(&mut self, update: &ApiConfig) {
        if let Some(url) = &update.url {
            self.url = Some(url.clone());
        }
        if let Some(token) = &update.token {
            self.token = Some(token.clone());
        }
        if let Some(model) = &update.model {
            self.model = Some(model.clone());
        }
        if let Some(t) = update.temperature {
            self.temperature = Some(t);
        }
        if let Some(n) = update.max_tokens {
            self.max_tokens = Some(n);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.url {
            if url.trim().is_empty() {
                return Err(ChatError::Config("url must not be empty".to_string()));
            }
        }
        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err(ChatError::Config("model must not be empty".to_string()));
            }
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ChatError::Config(format!(
                    "temperature {} outside [0, 2]",
                    t
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(ChatError::Config("max_tokens must be positive".to_string()));
        }
        Ok(())
    }
}

/// Client-side behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Request the conversation list as soon as the channel becomes ready
    pub refresh_catalog_on_ready: bool,
    /// Drop the playback highlight once its sentence is acknowledged
    pub clear_highlight_on_sentence_done: bool,
    /// Prefix for locally generated prompt ids
    pub prompt_id_prefix: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            refresh_catalog_on_ready: true,
            clear_highlight_on_sentence_done: true,
            prompt_id_prefix: "user".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if config.prompt_id_prefix.is_empty() {
            return Err(ChatError::Config(
                "prompt_id_prefix must not be empty".to_string(),
            ));
        }
        Ok(config)
    }
}

const DEFAULT_API_URL: &str = "http://localhost:5000/v1/chat/completions";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_TEMPERATURE: f32 = 0.7;
