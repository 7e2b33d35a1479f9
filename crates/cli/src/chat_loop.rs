use anyhow::{Context, Result};
use log::{debug, error};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sfcore_chat_core::{DialogueController, MemorySummary, TextGenerator, TurnResult};
use std::sync::{Arc, Mutex};
use std::thread;

const PROMPT: &str = "\n👤 You: ";
const RULE_WIDTH: usize = 50;

pub fn ready_banner() -> String {
    let rule = "=".repeat(RULE_WIDTH);
    format!(
        "🎯 Chatbot ready! Type your message or '/exit' to quit.\n\
         💡 The bot will remember the last few exchanges for context.\n\
         {rule}"
    )
}

pub fn shutdown_banner(summary: &MemorySummary) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![
        format!("\n{rule}"),
        "🚀 Thanks for chatting! Goodbye!".to_string(),
    ];
    if summary.total_turns > 0 {
        lines.push(format!(
            "📊 Session summary: {} turns, {} exchanges in memory",
            summary.total_turns, summary.stored_exchanges
        ));
    }
    lines.push(rule);
    lines.join("\n")
}

pub fn interrupted_banner(summary: &MemorySummary) -> String {
    format!("\n\nInterrupted by user.\n{}", shutdown_banner(summary))
}

/// Last published memory summary, read by the interrupt watcher.
#[derive(Debug, Clone)]
pub struct SummaryHandle(Arc<Mutex<MemorySummary>>);

impl SummaryHandle {
    pub fn new(summary: MemorySummary) -> Self {
        Self(Arc::new(Mutex::new(summary)))
    }

    pub fn publish(&self, summary: MemorySummary) {
        match self.0.lock() {
            Ok(mut slot) => *slot = summary,
            Err(poisoned) => *poisoned.into_inner() = summary,
        }
    }

    pub fn snapshot(&self) -> MemorySummary {
        match self.0.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Watch for SIGINT outside the line editor (i.e. while a reply is being
/// generated) and exit with the session summary.
///
/// While rustyline reads a line the terminal is in raw mode, so Ctrl-C there
/// arrives as `ReadlineError::Interrupted` instead.
fn spawn_interrupt_watcher(summary: SummaryHandle) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create signal runtime")?;

    thread::Builder::new()
        .name("interrupt-watcher".to_string())
        .spawn(move || {
            runtime.block_on(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for Ctrl-C: {}", e);
                    return;
                }
                debug!("Ctrl-C received during generation");
                println!("{}", interrupted_banner(&summary.snapshot()));
                std::process::exit(0);
            })
        })
        .context("Failed to spawn interrupt watcher")?;

    Ok(())
}

/// Read-eval-print until `/exit`, end of input or Ctrl-C.
pub fn run<G: TextGenerator>(chat: &mut DialogueController<G>) -> Result<()> {
    let mut rl = DefaultEditor::new().context("Failed to create line editor")?;

    let summary = SummaryHandle::new(chat.memory().summary());
    spawn_interrupt_watcher(summary.clone())?;

    println!("{}", ready_banner());

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.trim());
                }

                let result = chat.handle_turn(&line);
                summary.publish(chat.memory().summary());

                match result {
                    TurnResult::Exit => break,
                    TurnResult::CommandReply(text) | TurnResult::ChatReply(text) => {
                        println!("🤖 Bot: {}", text);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", interrupted_banner(&chat.memory().summary()));
                return Ok(());
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                error!("Error reading input: {}", err);
                println!("\nUnexpected error: {}", err);
                break;
            }
        }
    }

    println!("{}", shutdown_banner(&chat.memory().summary()));
    Ok(())
}
