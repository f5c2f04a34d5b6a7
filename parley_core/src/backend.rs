//! Contract between the conversation flow and a text-generation service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::ConversationTurn;

/// Sampling parameters and system instruction sent with every request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    #[serde(default = "GenerationConfig::default_temperature")]
    pub temperature: f32,
    #[serde(default = "GenerationConfig::default_top_p")]
    pub top_p: f32,
    #[serde(default = "GenerationConfig::default_top_k")]
    pub top_k: u32,
    #[serde(default = "GenerationConfig::default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default)]
    pub system_instruction: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: Self::default_temperature(),
            top_p: Self::default_top_p(),
            top_k: Self::default_top_k(),
            max_output_tokens: Self::default_max_output_tokens(),
            system_instruction: String::new(),
        }
    }
}

impl GenerationConfig {
    const fn default_temperature() -> f32 {
        0.7
    }

    const fn default_top_p() -> f32 {
        0.95
    }

    const fn default_top_k() -> u32 {
        40
    }

    const fn default_max_output_tokens() -> u32 {
        8192
    }

    /// Check every parameter against the range the generation API accepts.
    pub fn validate(&self) -> Result<(), InvalidGenerationConfig> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(InvalidGenerationConfig::Temperature(self.temperature));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(InvalidGenerationConfig::TopP(self.top_p));
        }
        if self.top_k == 0 {
            return Err(InvalidGenerationConfig::TopK);
        }
        if self.max_output_tokens == 0 {
            return Err(InvalidGenerationConfig::MaxOutputTokens);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvalidGenerationConfig {
    #[error("temperature must be within [0, 2], got {0}")]
    Temperature(f32),

    #[error("top_p must be within [0, 1], got {0}")]
    TopP(f32),

    #[error("top_k must be a positive integer")]
    TopK,

    #[error("max_output_tokens must be a positive integer")]
    MaxOutputTokens,
}

/// What a backend produced for one request.
///
/// Callers match on this exhaustively; only `Text` carries a usable reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Text(String),
    /// The first candidate part was not text (or there was no candidate).
    Other { kind: String },
}

impl Completion {
    /// Extract reply text, treating blank text and non-text parts as no content.
    pub fn into_text(self) -> Result<String, BackendError> {
        match self {
            Self::Text(text) if !text.trim().is_empty() => Ok(text),
            Self::Text(_) => Err(BackendError::NoContent("empty text".to_string())),
            Self::Other { kind } => Err(BackendError::NoContent(kind)),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("completion backend request failed: {0}")]
    Upstream(String),

    #[error("completion backend returned no usable content ({0})")]
    NoContent(String),

    #[error("completion backend timed out after {0:?}")]
    Timeout(Duration),
}

/// A stateless text-generation service.
///
/// Implementations receive the full prior history on every call and keep
/// no conversation state of their own.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn generate(
        &self,
        prior_turns: &[ConversationTurn],
        query: &str,
        config: &GenerationConfig,
    ) -> Result<Completion, BackendError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: CompletionBackend + ?Sized> CompletionBackend for std::sync::Arc<T> {
    async fn generate(
        &self,
        prior_turns: &[ConversationTurn],
        query: &str,
        config: &GenerationConfig,
    ) -> Result<Completion, BackendError> {
        (**self).generate(prior_turns, query, config).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GenerationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.top_k, 40);
        assert_eq!(config.max_output_tokens, 8192);
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let config = GenerationConfig {
            temperature: 2.5,
            ..GenerationConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(InvalidGenerationConfig::Temperature(2.5))
        );

        let config = GenerationConfig {
            top_p: -0.1,
            ..GenerationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(InvalidGenerationConfig::TopP(_))
        ));

        let config = GenerationConfig {
            top_k: 0,
            ..GenerationConfig::default()
        };
        assert_eq!(config.validate(), Err(InvalidGenerationConfig::TopK));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: GenerationConfig = serde_json::from_str(r#"{"temperature": 1.0}"#).unwrap();
        assert!((config.temperature - 1.0).abs() < f32::EPSILON);
        assert_eq!(config.top_k, 40);
        assert!(config.system_instruction.is_empty());
    }

    #[test]
    fn completion_text_extraction() {
        assert_eq!(
            Completion::Text("hello".into()).into_text(),
            Ok("hello".to_string())
        );
        assert!(matches!(
            Completion::Text("  ".into()).into_text(),
            Err(BackendError::NoContent(_))
        ));
        assert_eq!(
            Completion::Other {
                kind: "functionCall".into()
            }
            .into_text(),
            Err(BackendError::NoContent("functionCall".into()))
        );
    }
}
