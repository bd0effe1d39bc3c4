//! Chat completions against Ollama (`/api/chat`, NDJSON streaming) and
//! OpenAI-compatible endpoints (`/v1/chat/completions`, SSE streaming).

use anyhow::{Context, Result};
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ChatStream;
use crate::config::LlmConfig;
use crate::models::ChatMessage;

const GENERATION_TIMEOUT_SECS: u64 = 300;

/// Whole assistant reply in one response.
pub async fn complete(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: &[ChatMessage],
    max_tokens: u32,
) -> Result<String> {
    let resp = send(client, config, messages, max_tokens, false).await?;
    match config.provider.as_str() {
        "ollama" => {
            let body: OllamaReply = resp.json().await.context("Failed to parse Ollama chat response")?;
            Ok(body.message.content)
        }
        _ => {
            let body: OpenAiReply = resp.json().await.context("Failed to parse OpenAI chat response")?;
            Ok(body
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default())
        }
    }
}

/// Reply as a stream of non-empty text deltas. Completion markers and
/// role-only frames are skipped; a malformed frame yields an error item.
pub async fn stream_chat(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
) -> Result<ChatStream> {
    let resp = send(client, config, &messages, max_tokens, true).await?;
    let parse: fn(&str) -> Option<Result<String>> = match config.provider.as_str() {
        "ollama" => parse_ollama_line,
        _ => parse_openai_line,
    };

    let fragments = stream_lines(resp.bytes_stream()).filter_map(move |line| async move {
        match line {
            Ok(line) => parse(&line),
            Err(e) => Some(Err(e)),
        }
    });
    Ok(Box::pin(fragments.map(|r| r.map_err(to_crate_error))))
}

/// Provider-specific request body. Ollama caps output through
/// `options.num_predict`; OpenAI through `max_completion_tokens`, since newer
/// models reject `max_tokens`.
#[derive(Serialize)]
#[serde(untagged)]
enum ChatBody<'a> {
    Ollama {
        model: &'a str,
        messages: &'a [ChatMessage],
        stream: bool,
        options: OllamaOptions,
    },
    OpenAi {
        model: &'a str,
        messages: &'a [ChatMessage],
        max_completion_tokens: u32,
        stream: bool,
    },
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

async fn send(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: &[ChatMessage],
    max_tokens: u32,
    stream: bool,
) -> Result<reqwest::Response> {
    let base = config.base_url.trim_end_matches('/');
    let model = config.chat_model.as_str();

    let (api, request, body) = match config.provider.as_str() {
        "ollama" => (
            "Ollama",
            client.post(format!("{base}/api/chat")),
            ChatBody::Ollama {
                model,
                messages,
                stream,
                options: OllamaOptions { num_predict: max_tokens },
            },
        ),
        "openai" => (
            "OpenAI",
            client
                .post(format!("{base}/v1/chat/completions"))
                .bearer_auth(config.api_key.as_deref().unwrap_or_default()),
            ChatBody::OpenAi {
                model,
                messages,
                max_completion_tokens: max_tokens,
                stream,
            },
        ),
        other => anyhow::bail!("Unsupported LLM provider for chat: {other}"),
    };

    let resp = request
        .timeout(Duration::from_secs(GENERATION_TIMEOUT_SECS))
        .json(&body)
        .send()
        .await
        .with_context(|| format!("Failed to connect to {api} chat API"))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("{api} chat API returned {status}: {text}");
    }
    Ok(resp)
}

// ─── Ollama frames ───────────────────────────────────────

#[derive(Deserialize)]
struct OllamaReply {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct OllamaFrame {
    message: ChatMessage,
    #[serde(default)]
    done: bool,
}

/// One NDJSON line. `None` for blank lines, empty deltas and the final
/// `done` frame.
fn parse_ollama_line(line: &str) -> Option<Result<String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<OllamaFrame>(line) {
        Ok(frame) if frame.done || frame.message.content.is_empty() => None,
        Ok(frame) => Some(Ok(frame.message.content)),
        Err(e) => Some(Err(anyhow::anyhow!("Malformed Ollama frame: {e}"))),
    }
}

// ─── OpenAI frames ───────────────────────────────────────

#[derive(Deserialize)]
struct OpenAiReply {
    choices: Vec<OpenAiReplyChoice>,
}

#[derive(Deserialize)]
struct OpenAiReplyChoice {
    message: OpenAiText,
}

#[derive(Deserialize)]
struct OpenAiFrame {
    #[serde(default)]
    choices: Vec<OpenAiFrameChoice>,
}

#[derive(Deserialize)]
struct OpenAiFrameChoice {
    delta: OpenAiText,
}

#[derive(Deserialize)]
struct OpenAiText {
    #[serde(default)]
    content: Option<String>,
}

/// One SSE line. Only `data:` lines carry deltas; `[DONE]` and role-only
/// frames give `None`.
fn parse_openai_line(line: &str) -> Option<Result<String>> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<OpenAiFrame>(data) {
        Ok(frame) => frame
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|text| !text.is_empty())
            .map(Ok),
        Err(e) => Some(Err(anyhow::anyhow!("Malformed OpenAI frame: {e}"))),
    }
}

fn to_crate_error(e: anyhow::Error) -> crate::error::Error {
    crate::error::Error::Generation(format!("{e:#}"))
}

// ─── Line buffering ──────────────────────────────────────

/// Convert a byte stream into a stream of complete lines.
fn stream_lines(
    byte_stream: impl Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<String>> + Send {
    futures_util::stream::unfold(
        (Box::pin(byte_stream), Vec::<u8>::new()),
        |(mut stream, mut buffer)| async move {
            loop {
                // Split on raw bytes so multi-byte chars spanning chunks survive
                if let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
                    let rest = buffer.split_off(newline_pos + 1);
                    let line = String::from_utf8_lossy(&buffer).trim_end().to_string();
                    buffer = rest;
                    if !line.trim().is_empty() {
                        return Some((Ok(line), (stream, buffer)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        return Some((
                            Err(anyhow::anyhow!("Stream read error: {e}")),
                            (stream, buffer),
                        ));
                    }
                    None => {
                        if buffer.iter().any(|b| !b.is_ascii_whitespace()) {
                            let remaining = String::from_utf8_lossy(&std::mem::take(&mut buffer))
                                .to_string();
                            return Some((Ok(remaining), (stream, buffer)));
                        }
                        return None;
                    }
                }
            }
        },
    )
}
