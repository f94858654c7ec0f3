//! LLM Client: the single point of entry for all inference-service calls.
//!
//! ARCHITECTURAL RULE: No other module may call the Ollama HTTP API directly.
//! All LLM interactions MUST go through the `InferenceClient` trait.
//!
//! Transport failures are surfaced as-is. There is no retry loop here: the
//! only in-core retry (minimal-response retry) lives in the extraction
//! orchestrator, and any other retry policy belongs to the caller.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod prompts;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Inference service unreachable at {base_url}: {reason}")]
    Unavailable { base_url: String, reason: String },

    #[error("Inference service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Inference service returned an unreadable envelope: {0}")]
    Envelope(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// The shape of the prompt sent to the inference service.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    /// Role-tagged system + user messages for the chat endpoint.
    Chat { system: String, user: String },
    /// A single prompt string for the legacy completion endpoint.
    Completion(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub prompt: Prompt,
    /// Structured-output mode: asks the service to constrain output to JSON.
    pub json_mode: bool,
}

impl InferenceRequest {
    /// Same request with structured-output mode switched off.
    pub fn without_json_mode(&self) -> Self {
        Self {
            prompt: self.prompt.clone(),
            json_mode: false,
        }
    }
}

/// Anything that can turn a prompt into generated text.
///
/// Carried in the extractor as `Arc<dyn InferenceClient>` so tests can swap in
/// a scripted client.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn complete(&self, request: &InferenceRequest) -> Result<String, InferenceError>;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// HTTP client for a local Ollama instance.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> InferenceError {
        if e.is_connect() || e.is_timeout() {
            InferenceError::Unavailable {
                base_url: self.base_url.clone(),
                reason: e.to_string(),
            }
        } else {
            InferenceError::Client(e.to_string())
        }
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<String, InferenceError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.text().await.map_err(|e| self.transport_error(e))
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn complete(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        let format = request.json_mode.then_some("json");

        let text = match &request.prompt {
            Prompt::Chat { system, user } => {
                let body = ChatRequest {
                    model: &self.model,
                    messages: vec![
                        ChatMessage {
                            role: "system",
                            content: system,
                        },
                        ChatMessage {
                            role: "user",
                            content: user,
                        },
                    ],
                    stream: false,
                    format,
                };
                let raw = self.post("/api/chat", &body).await?;
                parse_chat_envelope(&raw)?
            }
            Prompt::Completion(prompt) => {
                let body = GenerateRequest {
                    model: &self.model,
                    prompt,
                    stream: false,
                    format,
                };
                let raw = self.post("/api/generate", &body).await?;
                parse_generate_envelope(&raw)?
            }
        };

        debug!(
            "Inference call succeeded: model={}, json_mode={}, response_chars={}",
            self.model,
            request.json_mode,
            text.chars().count()
        );

        Ok(text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Pulls the generated text out of a `/api/chat` envelope.
/// A missing `message` is read as empty output, not as a protocol failure.
fn parse_chat_envelope(raw: &str) -> Result<String, InferenceError> {
    let envelope: ChatResponse =
        serde_json::from_str(raw).map_err(|e| InferenceError::Envelope(e.to_string()))?;
    Ok(envelope.message.map(|m| m.content).unwrap_or_default())
}

/// Pulls the generated text out of a `/api/generate` envelope.
fn parse_generate_envelope(raw: &str) -> Result<String, InferenceError> {
    let envelope: GenerateResponse =
        serde_json::from_str(raw).map_err(|e| InferenceError::Envelope(e.to_string()))?;
    Ok(envelope.response)
}

/// Scripted inference client for tests: replays queued replies in order and
/// records every request it receives.
#[cfg(test)]
pub struct MockInferenceClient {
    replies: std::sync::Mutex<std::collections::VecDeque<Result<String, InferenceError>>>,
    requests: std::sync::Mutex<Vec<InferenceRequest>>,
}

#[cfg(test)]
impl MockInferenceClient {
    pub fn new(replies: Vec<Result<String, InferenceError>>) -> Self {
        Self {
            replies: std::sync::Mutex::new(replies.into()),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn replying(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl InferenceClient for MockInferenceClient {
    async fn complete(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }

    fn model(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_envelope_extracts_message_content() {
        let raw = r#"{"model":"llama3.1","message":{"role":"assistant","content":"{\"assignments\":[]}"},"done":true}"#;
        assert_eq!(parse_chat_envelope(raw).unwrap(), r#"{"assignments":[]}"#);
    }

    #[test]
    fn test_chat_envelope_without_message_is_empty() {
        assert_eq!(parse_chat_envelope(r#"{"done":true}"#).unwrap(), "");
    }

    #[test]
    fn test_generate_envelope_extracts_response() {
        let raw = r#"{"model":"llama3.1","response":"hello","done":true}"#;
        assert_eq!(parse_generate_envelope(raw).unwrap(), "hello");
    }

    #[test]
    fn test_non_json_envelope_is_an_error() {
        let err = parse_generate_envelope("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, InferenceError::Envelope(_)));
    }

    #[test]
    fn test_chat_request_omits_format_when_json_mode_off() {
        let body = ChatRequest {
            model: "llama3.1",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            stream: false,
            format: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("format").is_none());
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn test_generate_request_sets_json_format() {
        let body = GenerateRequest {
            model: "llama3.1",
            prompt: "extract",
            stream: false,
            format: Some("json"),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["format"], "json");
        assert_eq!(value["prompt"], "extract");
    }

    #[test]
    fn test_without_json_mode_keeps_prompt() {
        let request = InferenceRequest {
            prompt: Prompt::Completion("p".to_string()),
            json_mode: true,
        };
        let relaxed = request.without_json_mode();
        assert!(!relaxed.json_mode);
        assert_eq!(relaxed.prompt, request.prompt);
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client =
            OllamaClient::new("http://localhost:11434/", "llama3.1", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.model(), "llama3.1");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let client =
            OllamaClient::new("http://127.0.0.1:9", "llama3.1", Duration::from_secs(2)).unwrap();
        let request = InferenceRequest {
            prompt: Prompt::Completion("p".to_string()),
            json_mode: true,
        };
        let err = client.complete(&request).await.unwrap_err();
        assert!(matches!(err, InferenceError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_mock_replays_in_order_and_records_requests() {
        let mock = MockInferenceClient::replying(&["first", "second"]);
        let request = InferenceRequest {
            prompt: Prompt::Completion("p".to_string()),
            json_mode: true,
        };
        assert_eq!(mock.complete(&request).await.unwrap(), "first");
        assert_eq!(mock.complete(&request).await.unwrap(), "second");
        assert_eq!(mock.complete(&request).await.unwrap(), "");
        assert_eq!(mock.requests().len(), 3);
    }
}
