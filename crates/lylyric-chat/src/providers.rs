//! External LLM provider streaming implementations.
//!
//! Each provider streams tokens via SSE. OpenAI, Groq and Cortex share the
//! `choices[0].delta` shape; Anthropic uses typed events.

use std::pin::Pin;

use futures::Stream;
use lylyric_snowflake::SnowflakeClient;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use tracing::{debug, error};

use crate::types::{ChatMessage, LLMProvider};

pub const CORTEX_COMPLETE_PATH: &str = "/api/v2/cortex/inference:complete";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";

/// Boxed stream type for returning different stream implementations.
pub type BoxedStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// A single streamed token or error.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Token(String),
    Done { tokens_used: usize },
    Error(String),
}

/// Sampling settings for one call.
#[derive(Debug, Clone, Copy)]
pub struct Sampling {
    pub temperature: f64,
    pub max_tokens: usize,
}

/// Stream tokens from the appropriate provider.
pub fn stream_llm(
    client: &Client,
    snowflake: Option<&SnowflakeClient>,
    provider: LLMProvider,
    messages: Vec<ChatMessage>,
    model: &str,
    api_key: &str,
    sampling: Sampling,
) -> BoxedStream {
    match provider {
        LLMProvider::OpenAI | LLMProvider::Groq => {
            let url = if provider == LLMProvider::OpenAI {
                OPENAI_URL
            } else {
                GROQ_URL
            };
            let body = openai_body(&messages, model, sampling);
            let request = client
                .post(url)
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body);
            Box::pin(stream_sse(request, model.to_string(), parse_delta_line))
        }
        LLMProvider::Cortex => match snowflake {
            Some(sf) => {
                let body = cortex_body(&messages, model, sampling);
                let request = sf.post(CORTEX_COMPLETE_PATH, &body);
                Box::pin(stream_sse(request, model.to_string(), parse_delta_line))
            }
            None => Box::pin(futures::stream::once(async {
                StreamChunk::Error("Cortex is not configured".into())
            })),
        },
        LLMProvider::Anthropic => {
            let body = anthropic_body(&messages, model, sampling);
            let request = client
                .post(ANTHROPIC_URL)
                .header("x-api-key", api_key)
                .header("anthropic-version", "2023-06-01")
                .header("Content-Type", "application/json")
                .json(&body);
            Box::pin(stream_sse(request, model.to_string(), parse_anthropic_line))
        }
    }
}

/// OpenAI-compatible request body.
pub fn openai_body(messages: &[ChatMessage], model: &str, sampling: Sampling) -> Value {
    let msgs: Vec<Value> = messages
        .iter()
        .map(|m| json!({"role": m.role, "content": m.content}))
        .collect();
    json!({
        "model": model,
        "messages": msgs,
        "temperature": sampling.temperature,
        "max_tokens": sampling.max_tokens,
        "stream": true,
    })
}

/// Cortex `inference:complete` body. The endpoint always streams.
pub fn cortex_body(messages: &[ChatMessage], model: &str, sampling: Sampling) -> Value {
    let msgs: Vec<Value> = messages
        .iter()
        .map(|m| json!({"role": m.role, "content": m.content}))
        .collect();
    json!({
        "model": model,
        "messages": msgs,
        "temperature": sampling.temperature,
        "max_tokens": sampling.max_tokens,
    })
}

/// Anthropic Messages body; the system message moves to the top-level field.
pub fn anthropic_body(messages: &[ChatMessage], model: &str, sampling: Sampling) -> Value {
    let system_msg = messages
        .iter()
        .find(|m| m.role == "system")
        .map(|m| m.content.clone());

    let conv_msgs: Vec<Value> = messages
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| json!({"role": m.role, "content": m.content}))
        .collect();

    let mut body = json!({
        "model": model,
        "messages": conv_msgs,
        "temperature": sampling.temperature,
        "max_tokens": sampling.max_tokens,
        "stream": true,
    });

    if let Some(sys) = system_msg {
        body["system"] = json!(sys);
    }
    body
}

/// What one SSE `data:` payload means.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    Token(String),
    Done,
    Error(String),
    Skip,
}

/// `choices[0].delta.content` (Cortex may send `delta.text` instead).
pub fn parse_delta_line(data: &str) -> LineEvent {
    if data.trim() == "[DONE]" {
        return LineEvent::Done;
    }
    let Ok(parsed) = serde_json::from_str::<Value>(data) else {
        return LineEvent::Skip;
    };
    if let Some(msg) = parsed["error"]["message"].as_str() {
        return LineEvent::Error(msg.to_string());
    }
    let delta = &parsed["choices"][0]["delta"];
    match delta["content"].as_str().or_else(|| delta["text"].as_str()) {
        Some(content) if !content.is_empty() => LineEvent::Token(content.to_string()),
        _ => LineEvent::Skip,
    }
}

/// Anthropic event payloads.
pub fn parse_anthropic_line(data: &str) -> LineEvent {
    let Ok(parsed) = serde_json::from_str::<Value>(data) else {
        return LineEvent::Skip;
    };
    match parsed["type"].as_str() {
        Some("content_block_delta") => match parsed["delta"]["text"].as_str() {
            Some(text) if !text.is_empty() => LineEvent::Token(text.to_string()),
            _ => LineEvent::Skip,
        },
        Some("message_stop") => LineEvent::Done,
        Some("error") => LineEvent::Error(
            parsed["error"]["message"]
                .as_str()
                .unwrap_or("Unknown error")
                .to_string(),
        ),
        _ => LineEvent::Skip,
    }
}

/// Splits a byte stream into complete lines. Bytes are decoded only once a
/// line is complete, so a character split across chunks stays intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete, trimmed line, if any.
    pub fn next_line(&mut self) -> Option<String> {
        let line_end = self.buffer.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
        Some(String::from_utf8_lossy(&line[..line_end]).trim().to_string())
    }
}

/// Send `request` and turn its SSE body into chunks using `parse`.
fn stream_sse(
    request: RequestBuilder,
    model: String,
    parse: fn(&str) -> LineEvent,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    async_stream::stream! {
        debug!("Streaming completion with model {}", model);

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                yield StreamChunk::Error(format!("Request failed: {}", e));
                return;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            yield StreamChunk::Error(format!("API error {}: {}", status, body));
            return;
        }

        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::default();
        let mut token_count = 0usize;

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield StreamChunk::Error(format!("Stream read error: {}", e));
                    return;
                }
            };

            lines.push(&bytes);

            while let Some(line) = lines.next_line() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                match parse(data.trim_start()) {
                    LineEvent::Token(text) => {
                        token_count += 1;
                        yield StreamChunk::Token(text);
                    }
                    LineEvent::Done => {
                        yield StreamChunk::Done { tokens_used: token_count };
                        return;
                    }
                    LineEvent::Error(msg) => {
                        error!("Provider error: {}", msg);
                        yield StreamChunk::Error(msg);
                        return;
                    }
                    LineEvent::Skip => {}
                }
            }
        }

        yield StreamChunk::Done { tokens_used: token_count };
    }
}

/// Drain a stream into the full response text. Any error chunk fails the
/// whole completion; partial output is discarded.
pub async fn collect_stream<S>(stream: S) -> Result<String, String>
where
    S: Stream<Item = StreamChunk>,
{
    tokio::pin!(stream);
    let mut full = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Token(text) => full.push_str(&text),
            StreamChunk::Done { .. } => break,
            StreamChunk::Error(e) => return Err(e),
        }
    }
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLING: Sampling = Sampling {
        temperature: 0.5,
        max_tokens: 100,
    };

    #[test]
    fn test_parse_delta_line() {
        assert_eq!(
            parse_delta_line(r#"{"choices":[{"delta":{"content":"Hello"}}]}"#),
            LineEvent::Token("Hello".into())
        );
        assert_eq!(
            parse_delta_line(r#"{"choices":[{"delta":{"type":"text","text":"Hi"}}]}"#),
            LineEvent::Token("Hi".into())
        );
        assert_eq!(parse_delta_line("[DONE]"), LineEvent::Done);
        assert_eq!(parse_delta_line("not json"), LineEvent::Skip);
        assert_eq!(
            parse_delta_line(r#"{"choices":[{"delta":{"content":""}}]}"#),
            LineEvent::Skip
        );
        assert_eq!(
            parse_delta_line(r#"{"error":{"message":"model not found"}}"#),
            LineEvent::Error("model not found".into())
        );
    }

    #[test]
    fn test_parse_anthropic_line() {
        assert_eq!(
            parse_anthropic_line(
                r#"{"type":"content_block_delta","delta":{"type":"text_delta","text":"La"}}"#
            ),
            LineEvent::Token("La".into())
        );
        assert_eq!(parse_anthropic_line(r#"{"type":"message_stop"}"#), LineEvent::Done);
        assert_eq!(
            parse_anthropic_line(r#"{"type":"error","error":{"message":"overloaded"}}"#),
            LineEvent::Error("overloaded".into())
        );
        assert_eq!(parse_anthropic_line(r#"{"type":"ping"}"#), LineEvent::Skip);
    }

    #[test]
    fn test_line_buffer_split_across_chunks() {
        let mut lines = LineBuffer::default();
        lines.push(b"data: {\"a\"");
        assert!(lines.next_line().is_none());
        lines.push(b":1}\r\n\ndata: [DONE]\n");
        assert_eq!(lines.next_line().as_deref(), Some("data: {\"a\":1}"));
        assert_eq!(lines.next_line().as_deref(), Some(""));
        assert_eq!(lines.next_line().as_deref(), Some("data: [DONE]"));
        assert!(lines.next_line().is_none());
    }

    #[test]
    fn test_line_buffer_keeps_multibyte_char_split_across_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"canción\"}}]}\n";
        let bytes = line.as_bytes();
        // Split between the two bytes of 'ó'.
        let split = line.find('ó').unwrap() + 1;

        let mut lines = LineBuffer::default();
        lines.push(&bytes[..split]);
        assert!(lines.next_line().is_none());
        lines.push(&bytes[split..]);

        let decoded = lines.next_line().unwrap();
        assert!(decoded.contains("canción"));
        assert!(!decoded.contains('\u{FFFD}'));
        assert_eq!(
            parse_delta_line(decoded.strip_prefix("data: ").unwrap()),
            LineEvent::Token("canción".into())
        );
    }

    #[test]
    fn test_anthropic_body_moves_system() {
        let body = anthropic_body(
            &[ChatMessage::system("be brief"), ChatMessage::user("hi")],
            "claude",
            SAMPLING,
        );
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_cortex_body() {
        let body = cortex_body(&[ChatMessage::user("hi")], "mistral-large2", SAMPLING);
        assert_eq!(body["model"], "mistral-large2");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(body["max_tokens"], 100);
    }

    #[tokio::test]
    async fn test_collect_stream() {
        let ok = futures::stream::iter(vec![
            StreamChunk::Token("Here ".into()),
            StreamChunk::Token("comes".into()),
            StreamChunk::Done { tokens_used: 2 },
            StreamChunk::Token("ignored".into()),
        ]);
        assert_eq!(collect_stream(ok).await.unwrap(), "Here comes");

        let failed = futures::stream::iter(vec![
            StreamChunk::Token("partial".into()),
            StreamChunk::Error("API error 500".into()),
        ]);
        assert_eq!(collect_stream(failed).await.unwrap_err(), "API error 500");
    }

    #[tokio::test]
    async fn test_cortex_without_client_errors() {
        let stream = stream_llm(
            &Client::new(),
            None,
            LLMProvider::Cortex,
            vec![ChatMessage::user("hi")],
            "mistral-large2",
            "",
            SAMPLING,
        );
        assert_eq!(
            collect_stream(stream).await.unwrap_err(),
            "Cortex is not configured"
        );
    }
}
