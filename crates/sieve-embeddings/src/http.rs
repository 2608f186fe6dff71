use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use sieve_core::SieveError;

use crate::Embeddings;

/// Configuration for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingsConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Whole-request timeout for one `/embeddings` call (default 60s).
    pub timeout: Duration,
}

impl HttpEmbeddingsConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Embedding provider that calls an OpenAI-compatible HTTP service.
pub struct HttpEmbeddings {
    config: HttpEmbeddingsConfig,
    client: reqwest::Client,
}

impl HttpEmbeddings {
    pub fn new(config: HttpEmbeddingsConfig) -> Result<Self, SieveError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SieveError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpEmbeddingsConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
    }
}

/// Extract vectors from an `{"data": [{"index": i, "embedding": [...]}, ...]}` body.
pub(crate) fn parse_response(body: &Value, expected: usize) -> Result<Vec<Vec<f32>>, SieveError> {
    let data = body
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| SieveError::Embedding("missing 'data' field in response".to_string()))?;

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| SieveError::Embedding("missing 'embedding' field".to_string()))?
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| SieveError::Embedding("non-numeric embedding value".to_string()))
            })
            .collect::<Result<Vec<f32>, _>>()?;
        let slot = slots.get_mut(index).ok_or_else(|| {
            SieveError::Embedding(format!("embedding index {index} out of range"))
        })?;
        *slot = Some(embedding);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| SieveError::Embedding(format!("no embedding for input {i}"))))
        .collect()
}

#[async_trait]
impl Embeddings for HttpEmbeddings {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, SieveError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(self.endpoint()).json(&json!({
            "model": self.config.model,
            "input": texts,
        }));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SieveError::Timeout(format!(
                        "embedding request exceeded {:?}: {e}",
                        self.config.timeout
                    ))
                } else {
                    SieveError::Embedding(format!("HTTP request failed: {e}"))
                }
            })?;
        let status = response.status().as_u16();
        let body: Value = response
            .json()
            .await
            .map_err(|e| SieveError::Parsing(format!("failed to parse response JSON: {e}")))?;

        if status != 200 {
            return Err(SieveError::Embedding(format!(
                "embedding API error ({status}): {body}"
            )));
        }
        tracing::debug!(inputs = texts.len(), "embedding batch received");
        parse_response(&body, texts.len())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SieveError> {
        let mut results = self.embed_documents(&[text]).await?;
        results
            .pop()
            .ok_or_else(|| SieveError::Embedding("empty response".to_string()))
    }
}
