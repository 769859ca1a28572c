//! Chat-completion client.
//!
//! One blocking request per call, no retry, no streaming. Failure payloads
//! are surfaced to the caller rather than handled here, so the batch layer
//! can apply its per-task fallback and keep going.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, ScribeError};

/// One entry in a chat-completion conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Running total of completion tokens over one batch run.
///
/// Owned by the batch layer and threaded by `&mut` into each call site;
/// calls are strictly sequential so no synchronization is involved.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenCounter {
    total: u64,
}

impl TokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, delta: u64) {
        self.total += delta;
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Decoded outcome of a single chat-completion call.
#[derive(Debug, Clone)]
pub struct ChatReply {
    /// First choice's message content, trimmed. `None` when the payload has
    /// no usable choices (error payload, empty list); the raw payload is
    /// kept for logging in that case.
    pub content: Option<String>,
    /// Completion tokens reported under `usage`, zero when absent. Counted
    /// regardless of whether the payload carried usable choices.
    pub completion_tokens: u64,
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    n: u32,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url,
            model,
            temperature: 0.1,
            max_tokens: 500,
            n: 1,
        }
    }

    /// Override the request sampling parameters. All three are passed
    /// through to the endpoint unchanged.
    pub fn with_sampling(mut self, temperature: f64, max_tokens: u32, n: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self.n = n;
        self
    }

    /// Issue one chat-completion request.
    ///
    /// `Err` means the request never produced a decodable payload (transport
    /// failure, non-JSON body). Anything the endpoint actually returned,
    /// including error payloads, comes back as an `Ok` [`ChatReply`] for the
    /// caller to inspect.
    pub async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<ChatReply> {
        // Offline dummy mode for tests and dry runs.
        if self.api_key == "dummy-api-key" {
            debug!("dummy-api-key set, skipping live LLM call");
            return Ok(dummy_reply());
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "n": self.n,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ScribeError::Llm(format!("LLM API call failed: {}", e)))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ScribeError::Llm(format!("Failed to decode LLM response: {}", e)))?;

        Ok(parse_reply(payload))
    }
}

/// Pull content and token usage out of a raw response payload. Usage is read
/// before the choices shape check so error payloads still contribute their
/// (typically zero) token count.
fn parse_reply(payload: Value) -> ChatReply {
    let completion_tokens = payload
        .get("usage")
        .and_then(|u| u.get("completion_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let content = payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string());

    ChatReply {
        content,
        completion_tokens,
        raw: payload,
    }
}

fn dummy_reply() -> ChatReply {
    ChatReply {
        content: Some("```sql\nSELECT 1;\n```".to_string()),
        completion_tokens: 0,
        raw: Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_reply_success() {
        let payload = json!({
            "choices": [{"message": {"content": "  SELECT 1;  "}}],
            "usage": {"completion_tokens": 42, "prompt_tokens": 100}
        });

        let reply = parse_reply(payload);
        assert_eq!(reply.content.as_deref(), Some("SELECT 1;"));
        assert_eq!(reply.completion_tokens, 42);
    }

    #[test]
    fn test_parse_reply_error_payload() {
        let payload = json!({"error": {"message": "invalid api key", "code": 401}});

        let reply = parse_reply(payload);
        assert!(reply.content.is_none());
        assert_eq!(reply.completion_tokens, 0);
        assert!(reply.raw.get("error").is_some());
    }

    #[test]
    fn test_parse_reply_empty_choices() {
        let payload = json!({"choices": [], "usage": {"completion_tokens": 3}});

        let reply = parse_reply(payload);
        assert!(reply.content.is_none());
        assert_eq!(reply.completion_tokens, 3);
    }

    #[test]
    fn test_parse_reply_missing_usage_counts_zero() {
        let payload = json!({"choices": [{"message": {"content": "SELECT 2;"}}]});

        let reply = parse_reply(payload);
        assert_eq!(reply.content.as_deref(), Some("SELECT 2;"));
        assert_eq!(reply.completion_tokens, 0);
    }

    #[test]
    fn test_token_counter_accumulates() {
        let mut counter = TokenCounter::new();
        for delta in [10, 0, 32] {
            counter.add(delta);
        }
        assert_eq!(counter.total(), 42);
    }
}
