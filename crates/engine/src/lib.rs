//! SFCore Chat Engine - text generation backends for the chatbot
//!
//! Two [`TextGenerator`](sfcore_chat_core::TextGenerator) implementations:
//! a blocking client for a running llama-server, and (feature `llama`)
//! in-process inference through llama.cpp.

#[cfg(feature = "llama")]
mod llama_engine;
#[cfg(feature = "llama")]
pub use llama_engine::{GenerationResult, LlamaCppEngine, LlamaCppOptions};

pub mod output;
mod server_client;
pub use server_client::{LlamaServerClient, LlamaServerOptions, DEFAULT_SERVER_URL};

// Metrics module for observability
pub mod metrics {
    use sysinfo::System;

    #[derive(Debug, Clone, Copy)]
    pub struct RuntimeMetrics {
        pub process_rss_mb: f64,
        pub total_mem_mb: f64,
        pub cpu_usage_percent: f32,
    }

    impl RuntimeMetrics {
        pub fn capture() -> Self {
            let mut sys = System::new_all();
            sys.refresh_all();
            let pid = sysinfo::get_current_pid().ok();
            let (rss_bytes, cpu) = if let Some(p) = pid.and_then(|pid| sys.process(pid)) {
                (p.memory(), p.cpu_usage())
            } else {
                (0, 0.0)
            };
            let total_bytes = sys.total_memory();
            Self {
                process_rss_mb: (rss_bytes as f64) / (1024.0 * 1024.0),
                total_mem_mb: (total_bytes as f64) / (1024.0 * 1024.0),
                cpu_usage_percent: cpu,
            }
        }
    }

    impl std::fmt::Display for RuntimeMetrics {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(
                f,
                "rss: {:.1} MB / {:.0} MB, cpu: {:.1}%",
                self.process_rss_mb, self.total_mem_mb, self.cpu_usage_percent
            )
        }
    }

}
