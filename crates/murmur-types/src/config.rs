//! Server configuration types for Murmur.
//!
//! `ServerConfig` represents the top-level `config.toml` controlling the
//! HTTP listener, conversation windowing, generation parameters, and the
//! engine endpoint. All fields have sensible defaults.

use serde::{Deserialize, Serialize};

use crate::engine::GenerationConfig;

/// Top-level configuration for the Murmur backend.
///
/// Loaded from `{data_dir}/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface the HTTP listener binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTP listener binds to.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7860
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            chat: ChatConfig::default(),
            generation: GenerationConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

/// Conversation windowing and prompt settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Maximum user/assistant pairs kept in the prompting window.
    #[serde(default = "default_max_pairs")]
    pub max_pairs: usize,

    /// System prompt prepended to every windowed prompt.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_max_pairs() -> usize {
    5
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_pairs: default_max_pairs(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Connection settings for the generation engine endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of an OpenAI-compatible completions server.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier passed through to the engine.
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key, if any.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/v1".to_string()
}

fn default_model() -> String {
    "llama-3.2-3b-instruct".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default_values() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 7860);
        assert_eq!(config.chat.max_pairs, 5);
        assert_eq!(config.chat.system_prompt, "You are a helpful assistant.");
        assert_eq!(config.generation.max_tokens, 1024);
    }

    #[test]
    fn test_server_config_deserialize_empty_toml() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, 7860);
        assert_eq!(config.chat.max_pairs, 5);
    }

    #[test]
    fn test_server_config_deserialize_with_values() {
        let config: ServerConfig = toml::from_str(
            r#"
port = 9000

[chat]
max_pairs = 12
system_prompt = "Be terse."

[generation]
max_tokens = 512
temperature = 0.3

[engine]
base_url = "http://gpu-box:8080/v1"
model = "qwen2.5-7b-instruct"
api_key_env = "ENGINE_API_KEY"
"#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.chat.max_pairs, 12);
        assert_eq!(config.chat.system_prompt, "Be terse.");
        assert_eq!(config.generation.max_tokens, 512);
        assert_eq!(config.engine.model, "qwen2.5-7b-instruct");
        assert_eq!(config.engine.api_key_env.as_deref(), Some("ENGINE_API_KEY"));
    }

    #[test]
    fn test_generation_section_rejects_unknown_keys() {
        let result = toml::from_str::<ServerConfig>(
            r#"
[generation]
beam_width = 4
"#,
        );
        assert!(result.is_err());
    }
}
