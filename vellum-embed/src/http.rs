//! Live providers speaking the OpenAI-compatible REST surface.
//!
//! Both providers POST JSON to a configurable API base (`/embeddings` and
//! `/chat/completions` respectively) with bearer authentication, which covers
//! OpenAI itself as well as the self-hosted servers that mimic its wire
//! format. Requests carry one client-side timeout; there is no retry loop
//! here. Transient failures surface as [`EmbedError::Transport`] and the
//! caller decides whether trying again is worth it.

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, GenerationProvider};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Embedding provider backed by a `POST {api_base}/embeddings` endpoint.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dimension: usize,
    timeout_seconds: u64,
}

impl std::fmt::Debug for HttpEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbeddingProvider")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl HttpEmbeddingProvider {
    /// Create a provider for the given API base and model.
    ///
    /// # Arguments
    /// * `api_base` - Root URL of the API, e.g. `https://api.openai.com/v1`
    /// * `api_key` - Bearer token sent with every request
    /// * `model` - Embedding model identifier
    /// * `dimension` - Vector width the model is known to produce
    /// * `timeout_seconds` - Per-request client timeout
    pub fn new(
        api_base: &str,
        api_key: &str,
        model: &str,
        dimension: usize,
        timeout_seconds: u64,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_seconds)?,
            url: endpoint_url(api_base, "embeddings"),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimension,
            timeout_seconds,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = [text.to_string()];
        let mut vectors = self.embed_batch(&input).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbedError::response("embedding response contained no data"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!("Embedding {} texts with model {}", texts.len(), self.model);

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let response: EmbeddingResponse = post_json(
            &self.client,
            &self.url,
            &self.api_key,
            self.timeout_seconds,
            &request,
        )
        .await?;

        if response.data.len() != texts.len() {
            return Err(EmbedError::response(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }

        // The API is allowed to return entries out of order; `index` is
        // authoritative.
        let mut data = response.data;
        data.sort_by_key(|entry| entry.index);
        Ok(data.into_iter().map(|entry| entry.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "http-embedding"
    }
}

/// Generation provider backed by a `POST {api_base}/chat/completions` endpoint.
pub struct HttpGenerationProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    timeout_seconds: u64,
}

impl std::fmt::Debug for HttpGenerationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGenerationProvider")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl HttpGenerationProvider {
    /// Create a provider for the given API base and chat model.
    pub fn new(api_base: &str, api_key: &str, model: &str, timeout_seconds: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_seconds)?,
            url: endpoint_url(api_base, "chat/completions"),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_seconds,
        })
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerationProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::debug!(
            "Generating completion with model {} ({} prompt bytes)",
            self.model,
            prompt.len()
        );

        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let response: ChatResponse = post_json(
            &self.client,
            &self.url,
            &self.api_key,
            self.timeout_seconds,
            &request,
        )
        .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| EmbedError::response("chat response contained no choices"))
    }

    fn provider_name(&self) -> &str {
        "http-generation"
    }
}

fn build_client(timeout_seconds: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|source| EmbedError::Transport { source })
}

fn endpoint_url(api_base: &str, path: &str) -> String {
    format!("{}/{}", api_base.trim_end_matches('/'), path)
}

async fn post_json<B, R>(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    timeout_seconds: u64,
    body: &B,
) -> Result<R>
where
    B: Serialize,
    R: serde::de::DeserializeOwned,
{
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .map_err(|source| EmbedError::request(source, timeout_seconds))?;

    let status = response.status();
    if matches!(
        status,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
    ) {
        let body = response.text().await.unwrap_or_default();
        return Err(EmbedError::Auth {
            status: status.as_u16(),
            message: api_message(&body),
        });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(EmbedError::Api {
            status: status.as_u16(),
            message: api_message(&body),
        });
    }

    response
        .json::<R>()
        .await
        .map_err(|e| EmbedError::response(format!("could not decode body: {e}")))
}

/// Pull the human-readable message out of an OpenAI-style error body, falling
/// back to a bounded excerpt of the raw text.
fn api_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.pointer("/error/message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    body.trim().chars().take(200).collect()
}
