//! OpenAI-compatible streaming completion client
//!
//! One shared client per process. Tokens stream over SSE; the first
//! complete sentence fires a hook so TTS can start while the rest of the
//! completion is still arriving. A deadline miss salvages whatever prefix
//! was emitted rather than surfacing an error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use salesline_core::{RetryPolicy, UpstreamBreakers};

use crate::sentence::first_boundary;
use crate::LlmError;

/// Hook invoked exactly once with the first complete sentence
pub type FirstSentenceHook = Box<dyn FnOnce(String) + Send + 'static>;

/// One completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: usize,
    /// Per-call deadline; state-dependent
    pub timeout: Duration,
}

/// Completion result
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub time_to_first_token_ms: Option<u64>,
    pub total_ms: u64,
    /// The deadline fired and `text` is the salvaged prefix
    pub timed_out: bool,
}

/// Streaming completion backend
#[async_trait]
pub trait StreamingLlm: Send + Sync {
    /// Stream a completion, firing `on_first_sentence` at the first
    /// sentence boundary. Returns the full text, or the emitted prefix
    /// (flagged `timed_out`) when the deadline fires mid-stream.
    async fn complete_streaming(
        &self,
        request: CompletionRequest,
        on_first_sentence: Option<FirstSentenceHook>,
    ) -> Result<Completion, LlmError>;

    /// Minimal completion to warm the endpoint and connection pool
    async fn warmup(&self) -> Result<(), LlmError>;
}

/// HTTP client against an OpenAI-compatible chat completions API
pub struct HttpLlmClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
    breakers: Arc<UpstreamBreakers>,
}

impl HttpLlmClient {
    pub fn new(
        settings: &salesline_config::LlmSettings,
        breakers: Arc<UpstreamBreakers>,
    ) -> Result<Self, LlmError> {
        // No request-level timeout on the client; deadlines are enforced
        // per call so streaming reads aren't cut short by a blanket value.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| LlmError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            retry: RetryPolicy::default(),
            breakers,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// Open the SSE response, retrying transient connection failures while
    /// the deadline still has room for the backoff.
    async fn open_stream(
        &self,
        request: &CompletionRequest,
        deadline: Instant,
    ) -> Result<reqwest::Response, LlmError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            max_tokens: request.max_tokens,
            temperature: self.temperature,
            stream: true,
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = self
                .client
                .post(self.completions_url())
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            let err = match result {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    if status.is_server_error() {
                        LlmError::Api(format!("HTTP {status}: {text}"))
                    } else {
                        // 4xx is not transient; surface immediately.
                        return Err(LlmError::Api(format!("HTTP {status}: {text}")));
                    }
                }
                Err(e) => LlmError::Network(e.to_string()),
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.retry.backoff(attempt) {
                Some(delay) if delay < remaining => {
                    tracing::warn!(
                        target: "llm",
                        attempt,
                        error = %err,
                        backoff_ms = delay.as_millis() as u64,
                        "retrying completion request"
                    );
                    tokio::time::sleep(delay).await;
                }
                _ => return Err(err),
            }
        }
    }
}

#[async_trait]
impl StreamingLlm for HttpLlmClient {
    async fn complete_streaming(
        &self,
        request: CompletionRequest,
        on_first_sentence: Option<FirstSentenceHook>,
    ) -> Result<Completion, LlmError> {
        if !self.breakers.llm().should_attempt() {
            return Err(LlmError::Api("llm circuit open".to_string()));
        }

        let start = Instant::now();
        let deadline = start + request.timeout;

        let response = match self.open_stream(&request, deadline).await {
            Ok(r) => r,
            Err(e) => {
                self.breakers.llm().record_failure();
                return Err(e);
            }
        };

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut text = String::new();
        let mut first_token_ms: Option<u64> = None;
        let mut hook = on_first_sentence;
        let mut timed_out = false;

        'stream: loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                timed_out = true;
                break;
            }

            let chunk = match tokio::time::timeout(remaining, stream.next()).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => {
                    // Mid-stream failure: keep the prefix if there is one.
                    if text.is_empty() {
                        self.breakers.llm().record_failure();
                        return Err(LlmError::Network(e.to_string()));
                    }
                    timed_out = true;
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    // Dropping the stream cancels the in-flight request.
                    timed_out = true;
                    break;
                }
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer.drain(..=line_end);

                if line.is_empty() {
                    continue;
                }
                let Some(json_str) = line.strip_prefix("data: ") else {
                    continue;
                };
                if json_str == "[DONE]" {
                    break 'stream;
                }

                if let Ok(event) = serde_json::from_str::<ChatStreamChunk>(json_str) {
                    if let Some(delta) = event
                        .choices
                        .first()
                        .and_then(|c| c.delta.content.as_deref())
                    {
                        if first_token_ms.is_none() && !delta.is_empty() {
                            first_token_ms = Some(start.elapsed().as_millis() as u64);
                        }
                        text.push_str(delta);

                        if hook.is_some() {
                            if let Some(end) = first_boundary(&text) {
                                let sentence = text[..end].trim().to_string();
                                if let Some(h) = hook.take() {
                                    h(sentence);
                                }
                            }
                        }
                    }
                }
            }
        }

        let total_ms = start.elapsed().as_millis() as u64;

        if text.is_empty() {
            if timed_out {
                self.breakers.llm().record_failure();
                return Err(LlmError::Timeout);
            }
            self.breakers.llm().record_failure();
            return Err(LlmError::InvalidResponse("empty completion".to_string()));
        }

        self.breakers.llm().record_success();

        // The stream ended without a sentence terminator; the whole text is
        // the first sentence.
        if let Some(h) = hook.take() {
            h(text.trim().to_string());
        }

        tracing::info!(
            target: "llm",
            model = %self.model,
            ttft_ms = first_token_ms,
            total_ms,
            timed_out,
            chars = text.len(),
            "completion finished"
        );

        Ok(Completion {
            text,
            time_to_first_token_ms: first_token_ms,
            total_ms,
            timed_out,
        })
    }

    async fn warmup(&self) -> Result<(), LlmError> {
        let request = CompletionRequest {
            prompt: "Say ready.".to_string(),
            max_tokens: 4,
            timeout: Duration::from_secs(10),
        };
        self.complete_streaming(request, None).await.map(|_| ())
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    choices: Vec<ChatStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChoice {
    delta: ChatStreamDelta,
}

#[derive(Debug, Deserialize)]
struct ChatStreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let body = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "Hello".to_string(),
            }],
            max_tokens: 150,
            temperature: 0.7,
            stream: true,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"stream\":true"));
        assert!(json.contains("\"max_tokens\":150"));
    }

    #[test]
    fn test_stream_chunk_parsing() {
        let json = r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hi"}}]}"#;
        let chunk: ChatStreamChunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_stream_chunk_without_content() {
        let json = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        let chunk: ChatStreamChunk = serde_json::from_str(json).unwrap();
        assert!(chunk.choices[0].delta.content.is_none());
    }
}
