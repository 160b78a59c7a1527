//! all-MiniLM-L6-v2 on candle.
//!
//! Weights come from a local directory holding `config.json`,
//! `tokenizer.json` and `model.safetensors`. When that directory does not
//! exist yet, the three files are fetched from the Hugging Face hub and
//! copied into it, so later processes start offline.

use crate::error::{EmbedError, Result};
use crate::{l2_normalize, TextEmbedder};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::fs;
use std::path::{Path, PathBuf};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info, warn};

pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const MINILM_DIMENSION: usize = 384;

/// Longest input the sentence-transformers config feeds the model
const MAX_SEQ_LEN: usize = 256;

const MODEL_FILES: [&str; 3] = ["config.json", "tokenizer.json", "model.safetensors"];

fn unavailable(what: &str, err: impl std::fmt::Display) -> EmbedError {
    EmbedError::ModelUnavailable(format!("{}: {}", what, err))
}

pub struct MiniLmEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
}

impl MiniLmEmbedder {
    /// Load from `local_dir`, downloading `model_id` into it first if the
    /// directory does not exist.
    pub fn load(local_dir: &Path, model_id: &str) -> Result<Self> {
        if local_dir.is_dir() {
            info!("Loading embedding model from {:?}", local_dir);
            return Self::from_dir(local_dir);
        }

        info!("Downloading embedding model {}", model_id);
        let files = Self::download(model_id)?;
        if let Err(e) = Self::save_local(&files, local_dir) {
            warn!("Could not cache embedding model in {:?}: {}", local_dir, e);
        }
        Self::from_files(&files[0], &files[1], &files[2])
    }

    /// Load from a directory that already holds the model files
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let [config, tokenizer, weights] = MODEL_FILES.map(|name| dir.join(name));
        Self::from_files(&config, &tokenizer, &weights)
    }

    fn download(model_id: &str) -> Result<Vec<PathBuf>> {
        let api = Api::new().map_err(|e| unavailable("hub client", e))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));
        MODEL_FILES
            .iter()
            .map(|name| repo.get(name).map_err(|e| unavailable(name, e)))
            .collect()
    }

    fn save_local(files: &[PathBuf], local_dir: &Path) -> std::io::Result<()> {
        fs::create_dir_all(local_dir)?;
        for (src, name) in files.iter().zip(MODEL_FILES) {
            fs::copy(src, local_dir.join(name))?;
        }
        Ok(())
    }

    fn from_files(config_path: &Path, tokenizer_path: &Path, weights_path: &Path) -> Result<Self> {
        let device = Device::Cpu;

        let config_text =
            fs::read_to_string(config_path).map_err(|e| unavailable("config.json", e))?;
        let config: Config =
            serde_json::from_str(&config_text).map_err(|e| unavailable("config.json", e))?;
        let dimension = config.hidden_size;

        let mut tokenizer =
            Tokenizer::from_file(tokenizer_path).map_err(|e| unavailable("tokenizer.json", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| unavailable("tokenizer truncation", e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DTYPE, &device)
                .map_err(|e| unavailable("model.safetensors", e))?
        };
        let model = BertModel::load(vb, &config).map_err(|e| unavailable("bert weights", e))?;

        info!("Embedding model ready ({} dims)", dimension);
        Ok(Self {
            model,
            tokenizer,
            device,
            dimension,
        })
    }

    /// Token ids, type ids and attention mask, right-padded to the longest
    /// input in the batch
    fn tokenize(&self, texts: &[&str]) -> Result<(Tensor, Tensor, Tensor)> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbedError::Tokenization(e.to_string()))?;

        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let batch = encodings.len();

        let mut ids = Vec::with_capacity(batch * max_len);
        let mut type_ids = Vec::with_capacity(batch * max_len);
        let mut mask = Vec::with_capacity(batch * max_len);
        for encoding in &encodings {
            let pad = max_len - encoding.get_ids().len();
            ids.extend_from_slice(encoding.get_ids());
            ids.extend(std::iter::repeat_n(0u32, pad));
            type_ids.extend_from_slice(encoding.get_type_ids());
            type_ids.extend(std::iter::repeat_n(0u32, pad));
            mask.extend_from_slice(encoding.get_attention_mask());
            mask.extend(std::iter::repeat_n(0u32, pad));
        }

        Ok((
            Tensor::from_vec(ids, (batch, max_len), &self.device)?,
            Tensor::from_vec(type_ids, (batch, max_len), &self.device)?,
            Tensor::from_vec(mask, (batch, max_len), &self.device)?,
        ))
    }
}

impl TextEmbedder for MiniLmEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[&str], normalize: bool) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let (input_ids, token_type_ids, attention_mask) = self.tokenize(texts)?;
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // Mean over real tokens only: (batch, seq, hidden) -> (batch, hidden)
        let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9f32, f32::MAX)?;
        let pooled = summed.broadcast_div(&counts)?;

        let mut rows = pooled.to_vec2::<f32>()?;
        if normalize {
            rows.iter_mut().for_each(|row| l2_normalize(row));
        }
        debug!("Embedded batch of {}", rows.len());
        Ok(rows)
    }
}
