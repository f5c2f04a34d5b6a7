use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use parley_core::GenerationConfig;
use parley_session::EvictionPolicy;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    /// Deadline for a single completion request, in seconds.
    #[serde(default = "Config::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub token: String,
    /// User ids allowed to talk to the bot. Empty allows everyone.
    #[serde(default)]
    pub allow_from: Vec<String>,
    /// Prefix each reply with the question it answers.
    #[serde(default)]
    pub echo_query: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Canned,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackendConfig {
    pub provider: ProviderKind,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub canned: CannedConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "GeminiConfig::default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: Self::default_model(),
            base_url: None,
        }
    }
}

impl GeminiConfig {
    fn default_model() -> String {
        "gemini-1.5-flash".to_string()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CannedConfig {
    #[serde(default = "CannedConfig::default_reply")]
    pub reply: String,
}

impl Default for CannedConfig {
    fn default() -> Self {
        Self {
            reply: Self::default_reply(),
        }
    }
}

impl CannedConfig {
    fn default_reply() -> String {
        "Hello! You said: {query}".to_string()
    }
}

/// Session eviction settings. Leaving both unset keeps every session for
/// the lifetime of the process.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SessionsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sessions: Option<usize>,
}

impl SessionsConfig {
    #[must_use]
    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy {
            ttl: self.ttl_secs.map(Duration::from_secs),
            max_sessions: self.max_sessions.and_then(NonZeroUsize::new),
        }
    }
}

impl Config {
    const fn default_request_timeout_secs() -> u64 {
        60
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("parley"))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load and validate `~/parley/config.json`.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'parley init' to create config.",
                config_path.display()
            );
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.generation
            .validate()
            .context("Invalid \"generation\" section")?;

        if self.request_timeout_secs == 0 {
            anyhow::bail!("\"request_timeout_secs\" must be greater than zero");
        }
        if self.sessions.ttl_secs == Some(0) {
            anyhow::bail!("\"sessions.ttl_secs\" must be greater than zero when set");
        }
        if self.sessions.max_sessions == Some(0) {
            anyhow::bail!("\"sessions.max_sessions\" must be greater than zero when set");
        }
        if self.backend.provider == ProviderKind::Gemini
            && self.backend.gemini.api_key.trim().is_empty()
        {
            anyhow::bail!("Gemini API key not configured. Set \"backend.gemini.api_key\" in config");
        }
        if self.backend.provider == ProviderKind::Canned
            && self.backend.canned.reply.trim().is_empty()
        {
            anyhow::bail!("\"backend.canned.reply\" must not be empty");
        }

        Ok(())
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join("config.json");

        Self::create_config_at(&config_path)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Edit the config file and add your Gemini API key and Telegram bot token");
        println!("   2. Run 'parley ask -m \"hello\"' to try the backend locally");
        println!("   3. Run 'parley serve' to start the Telegram bot");
        println!();
        println!("🔧 Configuration options:");
        println!("   - backend.provider: \"gemini\" or \"canned\" (fixed reply, no API key needed)");
        println!("   - generation: sampling parameters and system instruction");
        println!("   - sessions.ttl_secs / sessions.max_sessions: optional session eviction");
        println!();
        Ok(())
    }

    /// Write the config template to `path`, refusing to overwrite.
    pub fn create_config_at(path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                path.display()
            );
        }

        std::fs::write(path, Self::TEMPLATE)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    const TEMPLATE: &str = r#"{
  "telegram": {
    "enabled": true,
    "token": "your-telegram-bot-token-here",
    "allow_from": [],
    "echo_query": false
  },
  "backend": {
    "provider": "gemini",
    "gemini": {
      "api_key": "your-gemini-api-key-here",
      "model": "gemini-1.5-flash"
    },
    "canned": {
      "reply": "Hello! You said: {query}"
    }
  },
  "generation": {
    "temperature": 0.7,
    "top_p": 0.95,
    "top_k": 40,
    "max_output_tokens": 8192,
    "system_instruction": ""
  },
  "sessions": {},
  "request_timeout_secs": 60
}"#;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn template_parses_and_validates() {
        let config: Config = serde_json::from_str(Config::TEMPLATE).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.backend.provider, ProviderKind::Gemini);
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.sessions.eviction_policy(), EvictionPolicy::never());
    }

    #[test]
    fn minimal_canned_config_uses_defaults() {
        let file = write_config(r#"{ "backend": { "provider": "canned" } }"#);
        let config = Config::load_from(file.path()).unwrap();

        assert!(!config.telegram.enabled);
        assert_eq!(config.backend.canned.reply, "Hello! You said: {query}");
        assert_eq!(config.backend.gemini.model, "gemini-1.5-flash");
        assert_eq!(config.generation, GenerationConfig::default());
    }

    #[test]
    fn gemini_without_key_is_rejected() {
        let file = write_config(r#"{ "backend": { "provider": "gemini" } }"#);
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn blank_canned_reply_is_rejected() {
        let file = write_config(
            r#"{ "backend": { "provider": "canned", "canned": { "reply": "  " } } }"#,
        );
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("backend.canned.reply"));
    }

    #[test]
    fn out_of_range_generation_is_rejected() {
        let file = write_config(
            r#"{ "backend": { "provider": "canned" }, "generation": { "top_p": 1.5 } }"#,
        );
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("top_p"));
    }

    #[test]
    fn zero_limits_are_rejected() {
        let file = write_config(
            r#"{ "backend": { "provider": "canned" }, "sessions": { "max_sessions": 0 } }"#,
        );
        assert!(Config::load_from(file.path()).is_err());

        let file = write_config(
            r#"{ "backend": { "provider": "canned" }, "request_timeout_secs": 0 }"#,
        );
        assert!(Config::load_from(file.path()).is_err());
    }

    #[test]
    fn sessions_map_to_eviction_policy() {
        let sessions = SessionsConfig {
            ttl_secs: Some(3600),
            max_sessions: Some(500),
        };
        let policy = sessions.eviction_policy();
        assert_eq!(policy.ttl, Some(Duration::from_secs(3600)));
        assert_eq!(policy.max_sessions.map(NonZeroUsize::get), Some(500));
    }

    #[test]
    fn create_config_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        Config::create_config_at(&path).unwrap();
        assert!(path.exists());
        assert!(Config::create_config_at(&path).is_err());
    }
}
