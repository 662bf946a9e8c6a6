use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use pulse_core::{EmbeddingOracle, PhraseHasher, PhraseHasherConfig};

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

#[derive(Clone)]
pub enum EmbeddingBackend {
    Local(PhraseHasher),
    Remote(RemoteEmbeddingClient),
}

/// Embedding oracle selected from the environment.
///
/// `EMBEDDING_PROVIDER` picks the backend: `local` (default, in-process and
/// deterministic), `openai` (needs `OPENAI_API_KEY`) or `http`, which posts
/// an OpenAI-shaped request to `EMBEDDING_URL` with an optional key.
#[derive(Clone)]
pub struct EmbeddingClient {
    backend: EmbeddingBackend,
}

impl EmbeddingClient {
    pub fn from_env() -> Result<Self> {
        let model = env::var("EMBEDDING_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let client = match env::var("EMBEDDING_PROVIDER")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "openai" => {
                let api_key = env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow!("OPENAI_API_KEY is required for openai embeddings"))?;
                Self::remote(RemoteEmbeddingClient::new(
                    OPENAI_EMBEDDINGS_URL,
                    &model,
                    Some(api_key),
                )?)
            }
            "http" => {
                let url = env::var("EMBEDDING_URL")
                    .map_err(|_| anyhow!("EMBEDDING_URL is required for http embeddings"))?;
                Self::remote(RemoteEmbeddingClient::new(
                    &url,
                    &model,
                    env::var("OPENAI_API_KEY").ok(),
                )?)
            }
            _ => {
                let defaults = PhraseHasherConfig::default();
                let dimensions = env::var("LOCAL_EMBED_DIMENSIONS")
                    .ok()
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(defaults.dimensions);
                Self {
                    backend: EmbeddingBackend::Local(PhraseHasher::new(PhraseHasherConfig {
                        dimensions,
                        ..defaults
                    })),
                }
            }
        };
        info!(backend = client.backend_name(), "embedding oracle ready");
        Ok(client)
    }

    pub fn local() -> Self {
        Self {
            backend: EmbeddingBackend::Local(PhraseHasher::default()),
        }
    }

    pub fn remote(client: RemoteEmbeddingClient) -> Self {
        Self {
            backend: EmbeddingBackend::Remote(client),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match &self.backend {
            EmbeddingBackend::Local(_) => "local",
            EmbeddingBackend::Remote(_) => "remote",
        }
    }

    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        match &self.backend {
            EmbeddingBackend::Local(hasher) => Ok(hasher.vector_for(text)),
            EmbeddingBackend::Remote(client) => client.embed(text).await,
        }
    }
}

#[async_trait]
impl EmbeddingOracle for EmbeddingClient {
    async fn embed(&self, text: &str) -> pulse_core::Result<Vec<f32>> {
        Ok(self.embed_text(text).await?)
    }

    fn name(&self) -> &str {
        self.backend_name()
    }
}

#[derive(Clone)]
pub struct RemoteEmbeddingClient {
    http: Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl RemoteEmbeddingClient {
    pub fn new(url: &str, model: &str, api_key: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .build()
            .context("building embeddings http client")?;
        Ok(Self {
            http,
            url: url.to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let payload = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let mut request = self.http.post(&self.url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("embeddings request failed: {}", response.status()));
        }
        let parsed: EmbeddingResponse = response.json().await?;
        first_embedding(parsed)
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

fn first_embedding(response: EmbeddingResponse) -> Result<Vec<f32>> {
    response
        .data
        .into_iter()
        .next()
        .map(|data| data.embedding)
        .filter(|vector| !vector.is_empty())
        .ok_or_else(|| anyhow!("embeddings response carried no vector"))
}
