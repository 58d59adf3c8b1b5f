//! # Embeddings
//!
//! Turns text into dense vectors for the vector store.
//!
//! Two providers sit behind the [`Embedder`] trait:
//!
//! - [`LocalEmbedder`]: all-MiniLM-L6-v2 run in-process with Candle. Weights are
//!   fetched once from the Hugging Face Hub and cached. Produces 384-d vectors,
//!   mean pooled and L2 normalised.
//! - [`OpenAiEmbedder`]: the `/embeddings` endpoint of the configured
//!   OpenAI-compatible API.
//!
//! Pick one at startup with [`from_config`].

use std::sync::Arc;

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{CreateEmbeddingRequestArgs, EmbeddingInput},
};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::{
    config::{ChatbotConfig, EmbeddingProvider},
    error::{ChatbotError, Result},
};

const LOCAL_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";
const LOCAL_DIMENSION: usize = 384;

/// Anything that can embed text into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed several texts, returning one vector per input in the same order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ChatbotError::Embedding("provider returned no vector".into()))
    }

    /// Length of every vector this embedder produces.
    fn dimension(&self) -> usize;
}

/// Build the embedder selected by `config.embedding.provider`.
pub fn from_config(config: &ChatbotConfig) -> Result<Arc<dyn Embedder>> {
    match config.embedding.provider {
        EmbeddingProvider::Local => {
            let dimension = config.embedding.resolved_dimension();
            if dimension != LOCAL_DIMENSION {
                return Err(ChatbotError::DimensionMismatch {
                    expected: LOCAL_DIMENSION,
                    actual: dimension,
                });
            }
            Ok(Arc::new(LocalEmbedder::load()?))
        }
        EmbeddingProvider::OpenAi => Ok(Arc::new(OpenAiEmbedder::new(
            openai_client(config),
            config.embedding.model.clone(),
            config.embedding.resolved_dimension(),
        ))),
    }
}

/// OpenAI client for the configured endpoint, shared by chat and embeddings.
pub fn openai_client(config: &ChatbotConfig) -> Client<OpenAIConfig> {
    let openai_config = OpenAIConfig::new()
        .with_api_key(config.resolved_api_key())
        .with_api_base(config.api_base.clone());
    debug!("Client created for {}", config.api_base);
    Client::with_config(openai_config)
}

fn candle_err(e: candle_core::Error) -> ChatbotError {
    ChatbotError::Embedding(e.to_string())
}

/// Sentence embeddings model using Candle (pure Rust).
pub struct SentenceEmbeddingsModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl SentenceEmbeddingsModel {
    /// Load all-MiniLM-L6-v2 from the Hugging Face Hub cache, downloading on first use.
    pub fn load() -> Result<Self> {
        let device = Device::Cpu;
        let repo = Repo::with_revision(
            LOCAL_MODEL_ID.to_string(),
            RepoType::Model,
            "main".to_string(),
        );
        let hub = |e: hf_hub::api::sync::ApiError| ChatbotError::Embedding(e.to_string());
        let api_repo = Api::new().map_err(hub)?.repo(repo);

        let config_filename = api_repo.get("config.json").map_err(hub)?;
        let tokenizer_filename = api_repo.get("tokenizer.json").map_err(hub)?;
        let weights_filename = api_repo.get("model.safetensors").map_err(hub)?;

        let config = std::fs::read_to_string(config_filename)?;
        let config: Config = serde_json::from_str(&config)
            .map_err(|e| ChatbotError::Embedding(format!("bad model config: {e}")))?;

        let tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| ChatbotError::Tokenizer(e.to_string()))?;

        // SAFETY: the safetensors file lives in the hub cache and is not modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_filename], DTYPE, &device)
                .map_err(candle_err)?
        };
        let model = BertModel::load(vb, &config).map_err(candle_err)?;

        info!("Loaded local embedding model {}", LOCAL_MODEL_ID);
        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    /// Encode one text into a normalised 384-d vector. Input past 512 tokens is truncated.
    pub fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ChatbotError::Tokenizer(e.to_string()))?;

        let token_ids = Tensor::new(tokens.get_ids(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(candle_err)?;
        let token_type_ids = Tensor::new(tokens.get_type_ids(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(candle_err)?;

        let output = self
            .model
            .forward(&token_ids, &token_type_ids, None)
            .map_err(candle_err)?;

        let pooled = self
            .mean_pooling(&output, tokens.get_attention_mask())
            .map_err(candle_err)?;
        let normalized = Self::normalize(&pooled).map_err(candle_err)?;
        normalized.to_vec1::<f32>().map_err(candle_err)
    }

    /// Mean over the sequence dimension, ignoring padding.
    fn mean_pooling(
        &self,
        embeddings: &Tensor,
        attention_mask: &[u32],
    ) -> candle_core::Result<Tensor> {
        // [1, seq_len, 1] so it broadcasts over the hidden dimension
        let mask = Tensor::new(attention_mask, &self.device)?
            .to_dtype(DType::F32)?
            .unsqueeze(0)?
            .unsqueeze(2)?;

        let sum = embeddings.broadcast_mul(&mask)?.sum(1)?;
        let count = mask.sum(1)?.clamp(1f32, f32::INFINITY)?;
        sum.broadcast_div(&count)?.squeeze(0)
    }

    fn normalize(tensor: &Tensor) -> candle_core::Result<Tensor> {
        let norm = tensor.sqr()?.sum_all()?.sqrt()?;
        tensor.broadcast_div(&norm)
    }
}

/// [`Embedder`] backed by the in-process MiniLM model.
#[derive(Clone)]
pub struct LocalEmbedder {
    model: Arc<SentenceEmbeddingsModel>,
}

impl LocalEmbedder {
    pub fn load() -> Result<Self> {
        Ok(Self {
            model: Arc::new(SentenceEmbeddingsModel::load()?),
        })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        // Inference is CPU bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            texts
                .iter()
                .map(|t| model.encode(t))
                .collect::<Result<Vec<_>>>()
        })
            .await
            .map_err(|e| ChatbotError::Embedding(e.to_string()))?
    }

    fn dimension(&self) -> usize {
        LOCAL_DIMENSION
    }
}

/// [`Embedder`] calling an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn new(client: Client<OpenAIConfig>, model: String, dimension: usize) -> Self {
        Self {
            client,
            model,
            dimension,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(self.model.clone())
            .input(EmbeddingInput::StringArray(texts.to_vec()))
            .build()?;

        debug!("Embedding {} text(s) with {}", texts.len(), self.model);
        let response = self.client.embeddings().create(request).await?;

        if response.data.len() != texts.len() {
            return Err(ChatbotError::Embedding(format!(
                "asked for {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }

        let mut data = response.data;
        data.sort_by_key(|e| e.index);

        data.into_iter()
            .map(|e| {
                if e.embedding.len() == self.dimension {
                    Ok(e.embedding)
                } else {
                    Err(ChatbotError::DimensionMismatch {
                        expected: self.dimension,
                        actual: e.embedding.len(),
                    })
                }
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
