//! In-process llama.cpp text generation

use anyhow::{anyhow, Context, Result};
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use log::{debug, info};
use sfcore_chat_core::{GenerationError, GenerationParams, TextGenerator};
use std::num::NonZeroU32;
use std::pin::pin;
use std::time::Instant;

use crate::output;

/// Engine options. Temperature and length come per call from
/// [`GenerationParams`].
#[derive(Debug, Clone)]
pub struct LlamaCppOptions {
    // --- System Parameters ---
    /// Decode threads. Leave headroom for the OS (2-3 on a 4-core box).
    pub threads: Option<i32>,

    /// Prompt-processing threads. Falls back to `threads` when unset.
    pub threads_batch: Option<i32>,

    /// Context window in tokens (prompt + output). Drives KV cache size.
    pub context_length: u32,

    /// Logical batch size for prefill
    pub batch_size: usize,

    /// Physical sub-batch size per step
    pub ubatch_size: usize,

    /// RNG seed; fixed seeds give reproducible replies
    pub seed: u32,

    /// Lock model weights in RAM
    pub use_mlock: bool,

    // --- Sampling Parameters ---
    pub top_k: i32,
    pub top_p: f32,
    pub min_p: f32,

    // --- Penalties ---
    /// Multiplicative repeat penalty, 1.0 = off
    pub repeat_penalty: f32,
    /// Lookback window for penalties
    pub repeat_last_n: i32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl Default for LlamaCppOptions {
    fn default() -> Self {
        Self {
            threads: Some(4),
            threads_batch: Some(4),
            context_length: 2048, // chat prompts stay short
            batch_size: 512,
            ubatch_size: 512,

            seed: 1234,
            use_mlock: false,

            top_k: 40,
            top_p: 0.9,
            min_p: 0.05,

            // Mirrors repetition_penalty=1.1 used for small chat models
            repeat_penalty: 1.1,
            repeat_last_n: 64,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// Local GGUF model served through llama.cpp
pub struct LlamaCppEngine {
    backend: LlamaBackend,
    model: Option<LlamaModel>,
    opts: LlamaCppOptions,
}

impl LlamaCppEngine {
    pub fn new(opts: LlamaCppOptions) -> Result<Self> {
        let backend =
            LlamaBackend::init().map_err(|e| anyhow!("failed to init llama backend: {e}"))?;
        info!("LlamaCpp backend initialized");
        Ok(Self {
            backend,
            model: None,
            opts,
        })
    }

    /// Load a GGUF model file
    pub fn load_gguf(&mut self, model_path: &str) -> Result<()> {
        let t0 = Instant::now();
        info!("loading GGUF model: {}", model_path);

        let mut model_params = LlamaModelParams::default();
        if self.opts.use_mlock {
            model_params = model_params.with_use_mlock(true);
        }
        let model_params = pin!(model_params);

        let model = LlamaModel::load_from_file(&self.backend, model_path, &model_params)
            .with_context(|| format!("failed to load model: {}", model_path))?;

        info!(
            "model loaded in {}",
            humantime::format_duration(t0.elapsed())
        );

        self.model = Some(model);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Generate up to `max_tokens` new tokens after `prompt`.
    /// Callback receives each token piece; return false to stop early.
    pub fn generate_with_callback<F>(
        &self,
        prompt: &str,
        max_tokens: i32,
        temperature: f32,
        mut callback: F,
    ) -> Result<GenerationResult>
    where
        F: FnMut(&str) -> bool,
    {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| anyhow!("model not loaded"))?;

        let t_start = Instant::now();

        let ctx_size = NonZeroU32::new(self.opts.context_length)
            .ok_or_else(|| anyhow!("context length must be positive"))?;
        let mut ctx_params = LlamaContextParams::default()
            .with_n_ctx(Some(ctx_size))
            .with_n_batch(self.opts.batch_size as u32)
            .with_n_ubatch(self.opts.ubatch_size as u32);

        if let Some(threads) = self.opts.threads {
            ctx_params = ctx_params.with_n_threads(threads);
        }
        if let Some(threads_batch) = self.opts.threads_batch.or(self.opts.threads) {
            ctx_params = ctx_params.with_n_threads_batch(threads_batch);
        }

        let mut ctx = model
            .new_context(&self.backend, ctx_params)
            .with_context(|| "failed to create context")?;

        let tokens_list = model
            .str_to_token(prompt, AddBos::Always)
            .with_context(|| "failed to tokenize prompt")?;
        if tokens_list.is_empty() {
            return Err(anyhow!("prompt produced no tokens"));
        }

        debug!("prompt tokens: {}", tokens_list.len());

        let mut batch = LlamaBatch::new(self.opts.batch_size.max(tokens_list.len()), 1);

        let last_index = (tokens_list.len() - 1) as i32;
        for (i, token) in (0_i32..).zip(tokens_list.iter()) {
            batch.add(*token, i, &[0], i == last_index)?;
        }

        ctx.decode(&mut batch)
            .with_context(|| "prefill decode failed")?;

        let mut n_cur = batch.n_tokens();
        let n_len = (tokens_list.len() as i32)
            .saturating_add(max_tokens)
            .min(self.opts.context_length as i32);
        let mut n_decode = 0;
        let mut output = String::new();

        let t_gen_start = Instant::now();
        let mut decoder = encoding_rs::UTF_8.new_decoder();

        let mut sampler = LlamaSampler::chain_simple([
            LlamaSampler::penalties(
                self.opts.repeat_last_n,
                self.opts.repeat_penalty,
                self.opts.frequency_penalty,
                self.opts.presence_penalty,
            ),
            LlamaSampler::top_k(self.opts.top_k),
            LlamaSampler::top_p(self.opts.top_p, 1),
            LlamaSampler::min_p(self.opts.min_p, 1),
            LlamaSampler::temp(temperature),
            LlamaSampler::dist(self.opts.seed),
        ]);

        while n_cur < n_len {
            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            sampler.accept(token);

            if model.is_eog_token(token) {
                break;
            }

            let output_bytes = model.token_to_bytes(token, Special::Tokenize)?;
            let mut piece = String::with_capacity(32);
            let _ = decoder.decode_to_string(&output_bytes, &mut piece, false);

            output.push_str(&piece);
            if !callback(&piece) {
                break;
            }

            batch.clear();
            batch.add(token, n_cur, &[0], true)?;

            n_cur += 1;
            ctx.decode(&mut batch).with_context(|| "decode failed")?;
            n_decode += 1;
        }

        let gen_ms = t_gen_start.elapsed().as_millis();
        let tokens_per_sec = if gen_ms > 0 {
            (n_decode as f32) / (gen_ms as f32 / 1000.0)
        } else {
            0.0
        };

        Ok(GenerationResult {
            output,
            tokens_generated: n_decode,
            total_ms: t_start.elapsed().as_millis(),
            tokens_per_sec,
        })
    }
}

impl TextGenerator for LlamaCppEngine {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, GenerationError> {
        if !self.is_loaded() {
            return Err(GenerationError::ModelNotLoaded);
        }
        if prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let max_tokens = i32::try_from(params.max_length).unwrap_or(i32::MAX);
        let result = self
            .generate_with_callback(prompt, max_tokens, params.temperature, |_| true)
            .map_err(|e| GenerationError::Backend(format!("{e:#}")))?;

        debug!("{}", result);
        Ok(output::finalize(prompt, &result.output))
    }
}

/// Result of text generation
#[derive(Debug)]
pub struct GenerationResult {
    pub output: String,
    pub tokens_generated: i32,
    pub total_ms: u128,
    pub tokens_per_sec: f32,
}

impl std::fmt::Display for GenerationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[metrics] tokens: {}, time: {} ms, speed: {:.2} tok/s",
            self.tokens_generated, self.total_ms, self.tokens_per_sec
        )
    }
}
