use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use sfcore_chat_core::{GenerationParams, PromptStyle, DEFAULT_WINDOW_SIZE};
use sfcore_chat_engine::DEFAULT_SERVER_URL;
use std::fs;
use std::path::Path;

use crate::Args;

/// Where replies come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process llama.cpp with a local GGUF file
    Llama,
    /// A running llama-server instance
    Server,
}

/// Configuration file structure (chat_config.toml)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub backend: Option<Backend>,
    pub model: Option<String>,
    pub server_url: Option<String>,
    pub window_size: Option<usize>,
    pub max_length: Option<usize>,
    pub temperature: Option<f32>,
    pub threads: Option<i32>,
    pub context_length: Option<u32>,
    pub seed: Option<u32>,
    pub verbose_prompt: Option<bool>,
}

impl ChatConfig {
    /// Missing file means an empty config
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// Fully resolved settings (Args > Config > Defaults)
#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: Backend,
    pub model: Option<String>,
    pub server_url: String,
    pub window_size: usize,
    pub params: GenerationParams,
    pub prompt_style: PromptStyle,
    pub threads: i32,
    pub context_length: u32,
    pub seed: u32,
}

impl Settings {
    pub fn resolve(args: &Args, config: ChatConfig) -> Result<Self> {
        let defaults = GenerationParams::default();

        let window_size = args
            .window_size
            .or(config.window_size)
            .unwrap_or(DEFAULT_WINDOW_SIZE);
        if window_size == 0 {
            bail!("window size must be at least 1");
        }

        let verbose = args.verbose_prompt || config.verbose_prompt.unwrap_or(false);

        Ok(Self {
            backend: args.backend.or(config.backend).unwrap_or(Backend::Server),
            model: args.model.clone().or(config.model),
            server_url: args
                .server_url
                .clone()
                .or(config.server_url)
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            window_size,
            params: GenerationParams {
                max_length: args
                    .max_length
                    .or(config.max_length)
                    .unwrap_or(defaults.max_length),
                temperature: args
                    .temperature
                    .or(config.temperature)
                    .unwrap_or(defaults.temperature),
            },
            prompt_style: if verbose {
                PromptStyle::Verbose
            } else {
                PromptStyle::Compact
            },
            threads: args.threads.or(config.threads).unwrap_or(4),
            context_length: args.context_length.or(config.context_length).unwrap_or(2048),
            seed: args.seed.or(config.seed).unwrap_or(1234),
        })
    }
}
