use crate::error::EmbeddingError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Dimension of the reference embedding model.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 3072;

/// Seam for the embedding model provider: one text in, one fixed-length
/// vector out.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dimensions(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Throttle parameters for batch embedding.
#[derive(Debug, Clone, Copy)]
pub struct GatewayConfig {
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            inter_batch_delay: Duration::from_millis(100),
        }
    }
}

/// Wraps a provider with fixed-window batching: items of one sub-batch are
/// issued concurrently and awaited together, then a fixed delay runs before
/// the next sub-batch starts.
///
/// TODO: replace the fixed inter-batch delay with exponential backoff keyed
/// off explicit rate-limit responses from the provider.
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    config: GatewayConfig,
}

impl EmbeddingGateway {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: GatewayConfig) -> Self {
        Self { provider, config }
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.provider.embed(text).await
    }

    /// Embeds every text, preserving input order and length. Any single
    /// failure fails the whole call; no partial result is returned.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        let batch_size = self.config.batch_size.max(1);

        for (batch_number, batch) in texts.chunks(batch_size).enumerate() {
            if batch_number > 0 {
                tokio::time::sleep(self.config.inter_batch_delay).await;
            }

            let handles: Vec<_> = batch
                .iter()
                .map(|text| {
                    let provider = Arc::clone(&self.provider);
                    let text = text.clone();
                    tokio::spawn(async move { provider.embed(&text).await })
                })
                .collect();

            // Awaiting handles in spawn order keeps output positional even
            // though the requests complete in arbitrary order.
            for handle in handles {
                let vector = handle
                    .await
                    .map_err(|error| EmbeddingError::Join(error.to_string()))??;
                vectors.push(vector);
            }
        }

        Ok(vectors)
    }
}

/// HTTP client for an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddingClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbeddingClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingClient {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "input": text,
                "dimensions": self.dimensions,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "embedding endpoint returned {}",
                response.status()
            )));
        }

        let parsed: Value = response.json().await?;
        let vector = parsed
            .pointer("/data/0/embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                EmbeddingError::InvalidResponse("response missing data[0].embedding".to_string())
            })?
            .iter()
            .map(|value| value.as_f64().unwrap_or(0.0) as f32)
            .collect::<Vec<f32>>();

        if vector.len() != self.dimensions {
            return Err(EmbeddingError::InvalidResponse(format!(
                "embedding dimension {} != configured {}",
                vector.len(),
                self.dimensions
            )));
        }

        Ok(vector)
    }
}

/// Deterministic local embedder hashing character trigrams into a
/// normalized vector. Used by tests and offline runs; not a semantic model.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    pub dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimensions: 128 }
    }
}

impl HashEmbedder {
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::default();
        let first = embedder.embed_sync("Hydraulic pressure and flow");
        let second = embedder.embed_sync("Hydraulic pressure and flow");
        assert_eq!(first, second);
    }

    #[test]
    fn hash_embedder_outputs_expected_length() {
        let embedder = HashEmbedder { dimensions: 32 };
        let vector = embedder.embed_sync("abc");
        assert_eq!(vector.len(), 32);
    }

    struct CountingProvider {
        calls: AtomicUsize,
        inner: HashEmbedder,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn dimensions(&self) -> usize {
            self.inner.dimensions
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.inner.embed_sync(text))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn dimensions(&self) -> usize {
            8
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text == "bad" {
                Err(EmbeddingError::InvalidResponse("boom".to_string()))
            } else {
                Ok(vec![0.0; 8])
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn batch_output_matches_single_embeds_in_order() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            inner: HashEmbedder { dimensions: 16 },
        });
        let gateway = EmbeddingGateway::new(
            provider.clone(),
            GatewayConfig {
                batch_size: 3,
                inter_batch_delay: Duration::from_millis(1),
            },
        );

        let texts: Vec<String> = (0..7).map(|n| format!("text number {n}")).collect();
        let batched = gateway.embed_batch(&texts).await.unwrap();

        assert_eq!(batched.len(), texts.len());
        assert_eq!(provider.calls.load(Ordering::SeqCst), texts.len());

        let single = HashEmbedder { dimensions: 16 };
        for (text, vector) in texts.iter().zip(&batched) {
            assert_eq!(vector, &single.embed_sync(text));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn one_failing_item_fails_the_whole_batch() {
        let gateway = EmbeddingGateway::new(Arc::new(FailingProvider), GatewayConfig::default());
        let texts = vec!["ok".to_string(), "bad".to_string(), "ok".to_string()];
        assert!(gateway.embed_batch(&texts).await.is_err());
    }
}
