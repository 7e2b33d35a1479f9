use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use sfcore_chat_core::{DialogueController, TextGenerator};
use sfcore_chat_engine::{metrics, LlamaServerClient, LlamaServerOptions};
use std::path::PathBuf;

mod chat_loop;
mod config;

use config::{Backend, ChatConfig, Settings};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(
    name = "sfcore-chat",
    version,
    about = "SFCore Chat - terminal chatbot with sliding-window memory"
)]
pub struct Args {
    /// Config file (TOML); missing file is ignored
    #[arg(long, default_value = "chat_config.toml")]
    config: PathBuf,

    /// Generation backend
    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// Path to GGUF model file (llama backend)
    #[arg(long)]
    model: Option<String>,

    /// llama-server base URL (server backend)
    #[arg(long)]
    server_url: Option<String>,

    /// Number of exchanges kept in memory
    #[arg(long)]
    window_size: Option<usize>,

    /// Maximum new tokens per reply
    #[arg(long)]
    max_length: Option<usize>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    // === llama backend ===
    #[arg(long)]
    threads: Option<i32>,

    #[arg(long)]
    context_length: Option<u32>,

    #[arg(long)]
    seed: Option<u32>,

    /// Feed the full Human/Assistant transcript instead of the compact Q/A context
    #[arg(long)]
    verbose_prompt: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = ChatConfig::load(&args.config)?;
    let settings = Settings::resolve(&args, config)?;

    println!("🤖 Initializing Local Chatbot...");
    println!("{}", "=".repeat(50));

    let before = metrics::RuntimeMetrics::capture();

    let generator = match build_generator(&settings) {
        Ok(g) => g,
        Err(e) => {
            println!("Failed to initialize chatbot. Please check your setup.");
            return Err(e);
        }
    };

    let mut chat = DialogueController::new(generator, settings.window_size)
        .with_params(settings.params)
        .with_prompt_style(settings.prompt_style);

    info!(
        "window: {}, max_length: {}, temperature: {}, prompt: {:?}",
        settings.window_size, settings.params.max_length, settings.params.temperature, settings.prompt_style
    );

    chat_loop::run(&mut chat)?;

    let after = metrics::RuntimeMetrics::capture();
    info!("[memory] {} -> {}", before, after);

    Ok(())
}

fn build_generator(settings: &Settings) -> Result<Box<dyn TextGenerator>> {
    match settings.backend {
        Backend::Server => {
            println!("Connecting to llama-server at {}...", settings.server_url);
            let client = LlamaServerClient::new(LlamaServerOptions {
                base_url: settings.server_url.clone(),
                ..Default::default()
            })?;
            client.probe().context("llama-server is not available")?;
            println!("✓ Server ready!");
            Ok(Box::new(client))
        }
        Backend::Llama => build_llama(settings),
    }
}

#[cfg(feature = "llama")]
fn build_llama(settings: &Settings) -> Result<Box<dyn TextGenerator>> {
    use sfcore_chat_engine::{LlamaCppEngine, LlamaCppOptions};

    // Single-threaded BLAS avoids oversubscription with llama.cpp threads
    std::env::set_var("OPENBLAS_NUM_THREADS", "1");
    std::env::set_var("MKL_NUM_THREADS", "1");

    let model_path = settings
        .model
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Model path must be provided via --model or chat_config.toml"))?;

    println!("Loading {} model...", model_path);

    let mut engine = LlamaCppEngine::new(LlamaCppOptions {
        threads: Some(settings.threads),
        threads_batch: Some(settings.threads),
        context_length: settings.context_length,
        seed: settings.seed,
        ..Default::default()
    })?;
    engine.load_gguf(model_path)?;

    println!("✓ Model loaded successfully!");
    Ok(Box::new(engine))
}

#[cfg(not(feature = "llama"))]
fn build_llama(_settings: &Settings) -> Result<Box<dyn TextGenerator>> {
    anyhow::bail!("built without llama.cpp support; rebuild with `--features llama` or use `--backend server`")
}
