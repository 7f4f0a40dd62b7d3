//! Blocking OpenAI-compatible streaming engine client.
//!
//! Implements `GenerationEngine` against a `/chat/completions` endpoint
//! with `stream: true`. The port is a blocking collaborator driven from a
//! dedicated blocking task, so this client uses reqwest's blocking mode
//! and parses the SSE `data:` lines straight off the response body.
//!
//! Stream shape:
//! - each event is a line `data: {json}` with `choices[0].delta.content`
//! - the sentinel `data: [DONE]` ends the stream
//! - other lines (comments, blank keep-alives) are skipped

use std::io::{BufRead, BufReader, Lines};
use std::sync::OnceLock;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use murmur_core::engine::{FragmentIter, GenerationEngine};
use murmur_types::config::EngineConfig;
use murmur_types::engine::{EngineError, GenerationConfig, PromptMessage};

/// Engine client for OpenAI-compatible completions servers.
pub struct OpenAiCompatEngine {
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    // Built lazily on the first generate call: the blocking client must
    // not be constructed on an async runtime thread.
    client: OnceLock<reqwest::blocking::Client>,
}

impl OpenAiCompatEngine {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            client: OnceLock::new(),
        }
    }

    /// Build from config, resolving the API key from the named env var.
    pub fn from_config(config: &EngineConfig) -> Self {
        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .map(SecretString::from);
        Self {
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, EngineError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let built = reqwest::blocking::Client::builder()
            // Generation can stream for minutes; only bound the connect.
            .timeout(None)
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| EngineError::Request(format!("failed to build http client: {e}")))?;
        Ok(self.client.get_or_init(|| built))
    }
}

impl GenerationEngine for OpenAiCompatEngine {
    fn generate<'a>(
        &'a self,
        prompt: &[PromptMessage],
        config: &GenerationConfig,
    ) -> Result<FragmentIter<'a>, EngineError> {
        let client = self.client()?;
        let body = ChatRequest::build(&self.model, prompt, config);

        let mut request = client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .map_err(|e| EngineError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(EngineError::Request(format!(
                "engine returned {status}: {detail}"
            )));
        }

        Ok(Box::new(SseFragments {
            lines: BufReader::new(response).lines(),
            done: false,
        }))
    }
}

/// Wire request for `/chat/completions`.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
    top_k: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

impl<'a> ChatRequest<'a> {
    fn build(model: &'a str, prompt: &'a [PromptMessage], config: &GenerationConfig) -> Self {
        let messages = prompt
            .iter()
            .map(|message| WireMessage {
                role: match message.role {
                    murmur_types::engine::MessageRole::System => "system",
                    murmur_types::engine::MessageRole::User => "user",
                    murmur_types::engine::MessageRole::Assistant => "assistant",
                },
                content: &message.content,
            })
            .collect();
        Self {
            model,
            messages,
            stream: true,
            max_tokens: config.max_tokens,
            // Greedy decoding when sampling is off.
            temperature: if config.sampling_enabled {
                config.temperature
            } else {
                0.0
            },
            top_p: config.top_p,
            top_k: config.top_k,
        }
    }
}

/// Streaming fragment iterator over the response body's SSE lines.
struct SseFragments<R: BufRead + Send> {
    lines: Lines<R>,
    done: bool,
}

impl<R: BufRead + Send> Iterator for SseFragments<R> {
    type Item = Result<String, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.lines.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(EngineError::Stream(e.to_string())));
                }
                Some(Ok(line)) => {
                    let Some(payload) = parse_data_line(&line) else {
                        continue;
                    };
                    if payload == "[DONE]" {
                        self.done = true;
                        return None;
                    }
                    match delta_text(payload) {
                        Ok(Some(text)) if !text.is_empty() => return Some(Ok(text)),
                        Ok(_) => continue,
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                    }
                }
            }
        }
    }
}

/// Strip the SSE `data:` prefix, if present.
fn parse_data_line(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Extract the text delta from one chunk payload.
fn delta_text(payload: &str) -> Result<Option<String>, EngineError> {
    let chunk: StreamChunk = serde_json::from_str(payload)
        .map_err(|e| EngineError::Malformed(format!("bad stream chunk: {e}")))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content))
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_types::engine::MessageRole;

    #[test]
    fn parse_data_line_strips_prefix() {
        assert_eq!(parse_data_line("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(parse_data_line("data:[DONE]"), Some("[DONE]"));
        assert_eq!(parse_data_line(": keep-alive"), None);
        assert_eq!(parse_data_line(""), None);
    }

    #[test]
    fn delta_text_extracts_content() {
        let payload = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(delta_text(payload).unwrap(), Some("Hel".to_string()));
    }

    #[test]
    fn delta_text_tolerates_role_only_chunks() {
        let payload = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(delta_text(payload).unwrap(), None);
    }

    #[test]
    fn delta_text_rejects_malformed_payloads() {
        assert!(delta_text("not json").is_err());
    }

    #[test]
    fn sse_fragments_yields_deltas_until_done() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
            "\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
            "data: [DONE]\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"after\"}}]}\n",
        );
        let fragments: Vec<String> = SseFragments {
            lines: BufReader::new(body.as_bytes()).lines(),
            done: false,
        }
        .map(|fragment| fragment.unwrap())
        .collect();
        assert_eq!(fragments, vec!["Hel", "lo"]);
    }

    #[test]
    fn sse_fragments_surfaces_malformed_chunk_as_error() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\ndata: {broken\n";
        let mut iter = SseFragments {
            lines: BufReader::new(body.as_bytes()).lines(),
            done: false,
        };
        assert_eq!(iter.next().unwrap().unwrap(), "ok");
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }

    #[test]
    fn chat_request_maps_roles_and_sampling() {
        let prompt = vec![
            PromptMessage::new(MessageRole::System, "be brief"),
            PromptMessage::new(MessageRole::User, "hi"),
        ];
        let config = GenerationConfig {
            sampling_enabled: false,
            ..GenerationConfig::default()
        };

        let request = ChatRequest::build("test-model", &prompt, &config);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "test-model");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        // Sampling off means greedy decoding.
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn from_config_without_key_env() {
        let engine = OpenAiCompatEngine::from_config(&EngineConfig::default());
        assert!(engine.api_key.is_none());
        assert_eq!(engine.model, "llama-3.2-3b-instruct");
    }
}
