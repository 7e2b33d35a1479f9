//! Text generation through a running llama-server (`/completion` endpoint)

use anyhow::{anyhow, Result};
use log::{debug, info};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use sfcore_chat_core::{GenerationError, GenerationParams, TextGenerator};
use std::time::Duration;

use crate::output;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

/// Upper bound for the startup `/health` check only
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: usize,
    temperature: f32,
    repeat_penalty: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
}

#[derive(Debug, Clone)]
pub struct LlamaServerOptions {
    pub base_url: String,
    /// Per-request limit for completions. `None` waits for the server
    /// however long a reply takes.
    pub timeout: Option<Duration>,
    pub repeat_penalty: f32,
}

impl Default for LlamaServerOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVER_URL.to_string(),
            timeout: None,
            repeat_penalty: 1.1,
        }
    }
}

/// Blocking client for llama-server
pub struct LlamaServerClient {
    client: Client,
    opts: LlamaServerOptions,
}

impl LlamaServerClient {
    pub fn new(opts: LlamaServerOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(opts.timeout)
            .build()
            .map_err(|e| anyhow!("failed to create HTTP client: {e}"))?;

        Ok(Self {
            client,
            opts: LlamaServerOptions {
                base_url: opts.base_url.trim_end_matches('/').to_string(),
                ..opts
            },
        })
    }

    pub fn base_url(&self) -> &str {
        &self.opts.base_url
    }

    /// Check that the server is up and has a model loaded
    pub fn probe(&self) -> Result<()> {
        let url = format!("{}/health", self.opts.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .map_err(|e| anyhow!("llama-server unreachable at {}: {}", self.opts.base_url, e))?;

        if !response.status().is_success() {
            anyhow::bail!("llama-server not ready: {}", response.status());
        }

        info!("llama-server ready at {}", self.opts.base_url);
        Ok(())
    }
}

impl TextGenerator for LlamaServerClient {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let request = CompletionRequest {
            prompt,
            n_predict: params.max_length,
            temperature: params.temperature,
            repeat_penalty: self.opts.repeat_penalty,
            stream: false,
        };
        debug!("POST /completion n_predict={}", request.n_predict);

        let response = self
            .client
            .post(format!("{}/completion", self.opts.base_url))
            .json(&request)
            .send()
            .map_err(|e| GenerationError::Transport(format!("failed to call llama-server: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Transport(format!(
                "llama-server error: {} - {}",
                status, body
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .map_err(|e| GenerationError::Backend(format!("invalid completion payload: {}", e)))?;

        Ok(output::finalize(prompt, &completion.content))
    }
}
