//! Abstractive summarization with a pretrained T5 checkpoint.
//!
//! The model is loaded once through [`load_summarizer`] and shared by every
//! request. [`T5Summarizer::summarize`] takes `&self`: each call decodes on
//! its own clones of the loaded model (one per beam), so the key/value cache
//! never leaks between requests or beams and no lock is needed.

use std::path::PathBuf;
use std::sync::Arc;

use candle_core::{safetensors, DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::t5;
use hf_hub::{api::sync::Api, Repo, RepoType};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::config::ModelConfig;
use crate::decoding::{argmax, beam_decode, greedy_decode, BeamSettings, DecodeRules};
use crate::error::{AppError, Result};

pub(crate) const CONFIG_FILE: &str = "config.json";
pub(crate) const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// T5 was trained with 512 encoder positions.
const MAX_INPUT_TOKENS: usize = 512;
const DEFAULT_PREFIX: &str = "summarize: ";
const DEFAULT_NO_REPEAT_NGRAM_SIZE: usize = 3;
const SAMPLING_SEED: u64 = 299_792_458;

/// Decoding bounds, counted in the model's sub-word tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryParams {
    pub max_length: usize,
    pub min_length: usize,
    /// Beam search with the checkpoint's settings when set, seeded
    /// sampling otherwise.
    pub deterministic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOutput {
    pub summary_text: String,
}

pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str, params: &SummaryParams) -> Result<Vec<SummaryOutput>>;
}

static SUMMARIZER: OnceCell<Arc<T5Summarizer>> = OnceCell::new();

/// Returns the process-wide summarizer, loading it on the first call.
///
/// Only the first successful call reads `config`; later calls hand back the
/// same instance.
pub fn load_summarizer(config: &ModelConfig) -> Result<Arc<T5Summarizer>> {
    SUMMARIZER
        .get_or_try_init(|| T5Summarizer::load(config).map(Arc::new))
        .cloned()
}

pub(crate) fn model_repo(config: &ModelConfig) -> Repo {
    Repo::with_revision(config.model_id.clone(), RepoType::Model, config.revision.clone())
}

fn model_error(err: impl std::fmt::Display) -> AppError {
    AppError::ModelError(err.to_string())
}

/// The subset of a checkpoint's `config.json` that carries its summarization
/// defaults.
#[derive(Debug, Default, Deserialize)]
struct TaskParams {
    task_specific_params: Option<TaskSpecificParams>,
}

#[derive(Debug, Deserialize)]
struct TaskSpecificParams {
    summarization: Option<SummarizationDefaults>,
}

#[derive(Debug, Deserialize)]
struct SummarizationDefaults {
    prefix: Option<String>,
    no_repeat_ngram_size: Option<usize>,
    num_beams: Option<usize>,
    length_penalty: Option<f64>,
    early_stopping: Option<bool>,
}

impl TaskParams {
    fn summarization(&self) -> Option<&SummarizationDefaults> {
        self.task_specific_params.as_ref()?.summarization.as_ref()
    }

    fn prefix(&self) -> String {
        self.summarization()
            .and_then(|s| s.prefix.clone())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string())
    }

    fn no_repeat_ngram_size(&self) -> usize {
        self.summarization()
            .and_then(|s| s.no_repeat_ngram_size)
            .unwrap_or(DEFAULT_NO_REPEAT_NGRAM_SIZE)
    }

    /// Beam settings, falling back to the generation defaults of one beam.
    fn beam_settings(&self) -> BeamSettings {
        let defaults = BeamSettings::default();
        let Some(s) = self.summarization() else {
            return defaults;
        };
        BeamSettings {
            num_beams: s.num_beams.unwrap_or(defaults.num_beams).max(1),
            length_penalty: s.length_penalty.unwrap_or(defaults.length_penalty),
            early_stopping: s.early_stopping.unwrap_or(defaults.early_stopping),
        }
    }
}

struct ModelFiles {
    config: PathBuf,
    tokenizer: PathBuf,
    weights: PathBuf,
}

impl ModelFiles {
    fn fetch(config: &ModelConfig) -> Result<Self> {
        let repo = Api::new()?.repo(model_repo(config));
        Ok(Self {
            config: repo.get(CONFIG_FILE)?,
            tokenizer: repo.get(TOKENIZER_FILE)?,
            weights: repo.get(WEIGHTS_FILE)?,
        })
    }
}

pub struct T5Summarizer {
    model: t5::T5ForConditionalGeneration,
    tokenizer: Tokenizer,
    device: Device,
    decoder_start_token_id: u32,
    eos_token_id: u32,
    use_cache: bool,
    prefix: String,
    no_repeat_ngram_size: usize,
    beams: BeamSettings,
}

impl T5Summarizer {
    pub fn load(config: &ModelConfig) -> Result<Self> {
        info!(model = %config.model_id, revision = %config.revision, "loading summarization model");
        let files = ModelFiles::fetch(config)?;

        let raw_config = std::fs::read_to_string(&files.config).map_err(model_error)?;
        let mut model_config: t5::Config = serde_json::from_str(&raw_config).map_err(model_error)?;
        model_config.use_cache = true;
        let task: TaskParams = serde_json::from_str(&raw_config).map_err(model_error)?;

        let tokenizer = Tokenizer::from_file(&files.tokenizer).map_err(model_error)?;

        let device = Device::Cpu;
        let tensors = safetensors::load(&files.weights, &device).map_err(model_error)?;
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let model = t5::T5ForConditionalGeneration::load(vb, &model_config).map_err(model_error)?;

        let decoder_start_token_id = model_config
            .decoder_start_token_id
            .unwrap_or(model_config.pad_token_id) as u32;
        let beams = task.beam_settings();

        info!(model = %config.model_id, num_beams = beams.num_beams, "summarization model ready");
        Ok(Self {
            model,
            tokenizer,
            device,
            decoder_start_token_id,
            eos_token_id: model_config.eos_token_id as u32,
            use_cache: model_config.use_cache,
            prefix: task.prefix(),
            no_repeat_ngram_size: task.no_repeat_ngram_size(),
            beams,
        })
    }

    fn generate(&self, text: &str, params: &SummaryParams) -> Result<String> {
        let prompt = format!("{}{}", self.prefix, text);
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| AppError::SummarizationError(e.to_string()))?;
        let input_ids = cap_input_ids(encoding.get_ids(), MAX_INPUT_TOKENS, self.eos_token_id);

        let mut model = self.model.clone();
        let input = Tensor::new(input_ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let encoder_output = model.encode(&input)?;

        let rules = DecodeRules {
            max_length: params.max_length,
            min_length: params.min_length,
            no_repeat_ngram_size: self.no_repeat_ngram_size,
            eos_token_id: self.eos_token_id,
        };
        // each hypothesis owns a model clone, and with it its own KV cache
        let step = |model: &mut t5::T5ForConditionalGeneration, ids: &[u32]| -> Result<Vec<f32>> {
            let fed = if ids.len() == 1 || !self.use_cache { ids } else { &ids[ids.len() - 1..] };
            let decoder_input = Tensor::new(fed, &self.device)?.unsqueeze(0)?;
            let logits = model
                .decode(&decoder_input, &encoder_output)?
                .squeeze(0)?
                .to_dtype(DType::F32)?;
            Ok(logits.to_vec1::<f32>()?)
        };

        let output_ids = if params.deterministic {
            if self.beams.num_beams > 1 {
                beam_decode(model, self.decoder_start_token_id, &rules, &self.beams, step)?
            } else {
                let pick = |scores: &[f32]| -> Result<u32> { Ok(argmax(scores)) };
                greedy_decode(model, self.decoder_start_token_id, &rules, step, pick)?
            }
        } else {
            let mut sampler = LogitsProcessor::new(SAMPLING_SEED, Some(1.0), None);
            let pick = |scores: &[f32]| -> Result<u32> {
                Ok(sampler.sample(&Tensor::new(scores, &self.device)?)?)
            };
            greedy_decode(model, self.decoder_start_token_id, &rules, step, pick)?
        };

        debug!(
            input_tokens = input_ids.len(),
            output_tokens = output_ids.len(),
            "decoded summary"
        );
        self.tokenizer
            .decode(&output_ids, true)
            .map(|summary| summary.trim().to_string())
            .map_err(|e| AppError::SummarizationError(e.to_string()))
    }
}

impl Summarizer for T5Summarizer {
    fn summarize(&self, text: &str, params: &SummaryParams) -> Result<Vec<SummaryOutput>> {
        let summary_text = self.generate(text, params)?;
        Ok(vec![SummaryOutput { summary_text }])
    }
}

/// Keeps at most `max` encoder tokens, ending on EOS when cut.
fn cap_input_ids(ids: &[u32], max: usize, eos: u32) -> Vec<u32> {
    if ids.len() <= max {
        return ids.to_vec();
    }
    let mut capped = ids[..max - 1].to_vec();
    capped.push(eos);
    capped
}
