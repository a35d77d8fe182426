//! Sentence-embedding similarity scoring
//!
//! Embeddings come from an OpenAI-compatible embeddings endpoint (a local
//! server hosting the sentence-transformers models); the model itself is a
//! black box behind a cosine-similarity function. Embedder handles are
//! expensive to bring up (warmup inference on first use) and are cached in a
//! process-wide registry keyed by model id, so every test case reuses the
//! same handle for the life of the run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::dataset::Language;
use crate::error::{CoreError, CoreResult};

/// Monolingual profile for English-to-English comparisons.
pub const EN_MODEL: &str = "all-MiniLM-L6-v2";

/// Multilingual profile for Arabic and cross-language comparisons.
pub const XL_MODEL: &str = "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2";

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Base URL of the embeddings API, e.g. `http://127.0.0.1:8090/v1`.
    pub base_url: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8090/v1".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

/// Client for one embedding model. Read-only after construction; safe to
/// share across sequential test cases.
pub struct Embedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl Embedder {
    /// Bring up a handle for `model`, verifying the model actually serves
    /// embeddings with a warmup request. Failure here is a fatal setup
    /// error for the run, not a per-test failure.
    async fn connect(config: &EmbeddingConfig, model: &str) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let embedder = Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: model.to_string(),
        };

        let warmup = embedder.embed(&["warmup"]).await.map_err(|e| CoreError::ModelSetup {
            model: model.to_string(),
            reason: e.to_string(),
        })?;
        if warmup.first().map(|v| v.is_empty()).unwrap_or(true) {
            return Err(CoreError::ModelSetup {
                model: model.to_string(),
                reason: "warmup returned an empty embedding".to_string(),
            });
        }

        info!("embedding model '{}' ready ({} dims)", model, warmup[0].len());
        Ok(embedder)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed a batch of texts, preserving input order.
    pub async fn embed(&self, inputs: &[&str]) -> CoreResult<Vec<Vec<f32>>> {
        let request = EmbeddingRequest { model: &self.model, input: inputs };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: EmbeddingResponse = response.json().await?;
        if body.data.len() != inputs.len() {
            return Err(CoreError::Embedding(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                body.data.len()
            )));
        }
        Ok(body.data.into_iter().map(|row| row.embedding).collect())
    }

    /// Cosine similarity of the two texts' embeddings, from one batched
    /// request. Negative values are valid and pass through unclamped.
    pub async fn similarity(&self, a: &str, b: &str) -> CoreResult<f64> {
        let vectors = self.embed(&[a, b]).await?;
        let score = cosine(&vectors[0], &vectors[1]);
        debug!("similarity({}) = {:.3}", self.model, score);
        Ok(score)
    }
}

/// Process-wide registry of embedder handles, keyed by model id. Populated
/// lazily on first use under a single initialization lock.
static REGISTRY: Lazy<Mutex<HashMap<String, Arc<Embedder>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Fetch the shared handle for `model`, constructing it on first use.
pub async fn shared_embedder(config: &EmbeddingConfig, model: &str) -> CoreResult<Arc<Embedder>> {
    let mut registry = REGISTRY.lock().await;
    if let Some(existing) = registry.get(model) {
        return Ok(existing.clone());
    }
    // Lock held across construction: concurrent first users wait rather
    // than racing duplicate warmups.
    let embedder = Arc::new(Embedder::connect(config, model).await?);
    registry.insert(model.to_string(), embedder.clone());
    Ok(embedder)
}

/// Cosine similarity between two vectors. Zero-magnitude input yields 0.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// The two model profiles behind one scoring facade.
pub struct SimilarityScorer {
    en: Arc<Embedder>,
    xl: Arc<Embedder>,
}

impl SimilarityScorer {
    /// Bring up both profiles. Errors propagate uncaught — an unavailable
    /// model aborts the run.
    pub async fn connect(config: &EmbeddingConfig) -> CoreResult<Self> {
        let en = shared_embedder(config, EN_MODEL).await?;
        let xl = shared_embedder(config, XL_MODEL).await?;
        Ok(Self { en, xl })
    }

    /// Score an answer against a golden reference in the case's language:
    /// monolingual model for English, multilingual for Arabic.
    pub async fn score(&self, answer: &str, golden: &str, lang: Language) -> CoreResult<f64> {
        match lang {
            Language::En => self.en.similarity(answer, golden).await,
            Language::Ar => self.xl.similarity(answer, golden).await,
        }
    }

    /// Cross-language similarity (always the multilingual model).
    pub async fn cross_language(&self, a: &str, b: &str) -> CoreResult<f64> {
        self.xl.similarity(a, b).await
    }
}
