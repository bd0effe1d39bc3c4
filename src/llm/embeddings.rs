//! Embedding HTTP calls for Ollama (`/api/embed`) and OpenAI-compatible
//! (`/v1/embeddings`) endpoints. Batching across the catalog happens in
//! [`crate::catalog::embeddings`]; one call here is one request.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

/// Per-text character cap. Product renderings stay far below it.
const MAX_EMBED_CHARS: usize = 8_000;

fn clip(text: &str) -> String {
    if text.len() <= MAX_EMBED_CHARS {
        return text.to_string();
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
    /// Ollama only: clip over-long inputs server-side
    #[serde(skip_serializing_if = "Option::is_none")]
    truncate: Option<bool>,
}

#[derive(Deserialize)]
struct OllamaEmbeddings {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddings {
    data: Vec<OpenAiVector>,
}

#[derive(Deserialize)]
struct OpenAiVector {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Vectors for `texts`, in input order.
pub async fn embed_batch(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let input: Vec<String> = texts.iter().map(|t| clip(t)).collect();
    let base = config.base_url.trim_end_matches('/');
    let model = config.embedding_model.as_str();

    let vectors = match config.provider.as_str() {
        "ollama" => {
            let request = client.post(format!("{base}/api/embed"));
            let body = EmbedRequest { model, input, truncate: Some(true) };
            post_json::<_, OllamaEmbeddings>(request, &body, "Ollama")
                .await?
                .embeddings
        }
        "openai" => {
            let api_key = config.api_key.as_deref().unwrap_or_default();
            let request = client
                .post(format!("{base}/v1/embeddings"))
                .bearer_auth(api_key);
            let body = EmbedRequest { model, input, truncate: None };
            in_input_order(post_json::<_, OpenAiEmbeddings>(request, &body, "OpenAI").await?.data)
        }
        other => anyhow::bail!("Unknown LLM provider: {other}"),
    };

    if vectors.len() != texts.len() {
        anyhow::bail!(
            "Embedding API returned {} vectors for {} inputs",
            vectors.len(),
            texts.len()
        );
    }
    Ok(vectors)
}

async fn post_json<B: Serialize, R: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    body: &B,
    api: &str,
) -> Result<R> {
    let resp = request
        .json(body)
        .send()
        .await
        .with_context(|| format!("Failed to call {api} embed API"))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("{api} embed API returned {status}: {text}");
    }

    resp.json()
        .await
        .with_context(|| format!("Failed to parse {api} embed response"))
}

/// OpenAI tags each vector with its input index.
fn in_input_order(mut data: Vec<OpenAiVector>) -> Vec<Vec<f32>> {
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
    }
    data.into_iter().map(|d| d.embedding).collect()
}
