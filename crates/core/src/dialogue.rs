//! Dialogue controller: one raw input line in, one reply out.

use log::{debug, warn};
use std::io::{self, Write};

use crate::generator::{GenerationParams, TextGenerator};
use crate::memory::ConversationMemory;
use crate::session::SessionStats;

pub const EMPTY_RESPONSE_FALLBACK: &str = "I'm not sure how to respond to that.";
pub const CLEANED_EMPTY_FALLBACK: &str = "I understand, but I'm not sure how to respond.";
pub const CLEARED_MESSAGE: &str = "🔄 Conversation history cleared!";
pub const EMPTY_INPUT_MESSAGE: &str = "Please enter a message or type '/help' for commands.";

pub const HELP_TEXT: &str = "Available commands:
• /exit or /quit - Exit the chatbot
• /clear or /reset - Clear conversation history
• /history or /memory - Show conversation history
• /stats - Show session statistics
• /help - Show this help message

Just type naturally to chat with the bot!";

/// Prompt labels stripped from generated text
const PROMPT_ARTIFACTS: [&str; 4] = ["Q:", "A:", "Human:", "Assistant:"];

/// Responses longer than this are cut to two sentences
const MAX_RESPONSE_CHARS: usize = 200;

/// Outcome of a single turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnResult {
    /// Session should terminate
    Exit,
    /// A control command was handled; no generation happened
    CommandReply(String),
    /// A chat message was answered (or the generation failure apology)
    ChatReply(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Exit,
    Clear,
    History,
    Stats,
    Help,
}

impl Command {
    /// Exact, case-insensitive match. Unknown `/...` input is ordinary chat.
    fn parse(input: &str) -> Option<Self> {
        match input.to_lowercase().as_str() {
            "/exit" | "/quit" | "exit" | "quit" => Some(Command::Exit),
            "/clear" | "/reset" => Some(Command::Clear),
            "/history" | "/memory" => Some(Command::History),
            "/stats" => Some(Command::Stats),
            "/help" => Some(Command::Help),
            _ => None,
        }
    }
}

/// Which memory rendering is fed to the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptStyle {
    /// Single-line Q/A context of the last two exchanges
    #[default]
    Compact,
    /// Multi-line Human/Assistant transcript of the whole window
    Verbose,
}

/// Owns one session: its memory, its generator and where `/history` is shown.
pub struct DialogueController<G, W = io::Stdout> {
    memory: ConversationMemory,
    generator: G,
    params: GenerationParams,
    prompt_style: PromptStyle,
    stats: SessionStats,
    display: W,
}

impl<G: TextGenerator> DialogueController<G, io::Stdout> {
    pub fn new(generator: G, window_size: usize) -> Self {
        Self::with_display(generator, window_size, io::stdout())
    }
}

impl<G: TextGenerator, W: Write> DialogueController<G, W> {
    pub fn with_display(generator: G, window_size: usize, display: W) -> Self {
        Self {
            memory: ConversationMemory::new(window_size),
            generator,
            params: GenerationParams::default(),
            prompt_style: PromptStyle::default(),
            stats: SessionStats::new(),
            display,
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_prompt_style(mut self, style: PromptStyle) -> Self {
        self.prompt_style = style;
        self
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn display(&self) -> &W {
        &self.display
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// Dispatch one line of user input.
    pub fn handle_turn(&mut self, raw_input: &str) -> TurnResult {
        let input = raw_input.trim();

        if let Some(command) = Command::parse(input) {
            return self.run_command(command);
        }

        if input.is_empty() {
            return TurnResult::CommandReply(EMPTY_INPUT_MESSAGE.to_string());
        }

        self.chat(input)
    }

    fn run_command(&mut self, command: Command) -> TurnResult {
        if command != Command::Exit {
            self.stats.record_command();
        }

        match command {
            Command::Exit => TurnResult::Exit,
            Command::Clear => {
                self.memory.clear();
                debug!("memory cleared");
                TurnResult::CommandReply(CLEARED_MESSAGE.to_string())
            }
            Command::History => {
                self.show_history();
                let summary = self.memory.summary();
                TurnResult::CommandReply(format!("📊 Memory: {} turns stored", summary.usage_label))
            }
            Command::Stats => TurnResult::CommandReply(self.stats.render(&self.memory.summary())),
            Command::Help => TurnResult::CommandReply(HELP_TEXT.to_string()),
        }
    }

    fn show_history(&mut self) {
        let body = if self.memory.is_empty() {
            self.memory.format_history()
        } else {
            format!(
                "\n--- Conversation History ---\n{}\n--- End History ---\n",
                self.memory.format_history()
            )
        };

        if let Err(e) = writeln!(self.display, "{}", body).and_then(|_| self.display.flush()) {
            warn!("failed to display history: {}", e);
        }
    }

    fn chat(&mut self, input: &str) -> TurnResult {
        let prompt = match self.prompt_style {
            PromptStyle::Compact => self.memory.render_compact_prompt(input),
            PromptStyle::Verbose => self.memory.render_verbose_prompt(input),
        };
        debug!("prompt ({} chars): {}", prompt.chars().count(), prompt);

        let raw_output = match self.generator.generate(&prompt, &self.params) {
            Ok(output) => output,
            Err(e) => {
                warn!("generation failed: {}", e);
                return TurnResult::ChatReply(format!("Sorry, I encountered an error: {}", e));
            }
        };

        let response = clean_response(&raw_output, input);
        self.memory.add_exchange(input, &response);

        TurnResult::ChatReply(response)
    }
}

/// Tidy raw generator output for display and storage.
///
/// The echoed-input removal matches the input case-insensitively but deletes
/// only exact-case occurrences.
pub fn clean_response(raw: &str, user_input: &str) -> String {
    if raw.trim().is_empty() {
        return EMPTY_RESPONSE_FALLBACK.to_string();
    }

    let mut response = raw.to_string();
    for artifact in PROMPT_ARTIFACTS {
        response = response.replace(artifact, "");
    }

    if response.to_lowercase().contains(&user_input.to_lowercase()) {
        response = response.replace(user_input, "").trim().to_string();
    }

    response = capitalize_first(&response);

    if response.chars().count() > MAX_RESPONSE_CHARS {
        let sentences: Vec<&str> = response.split('.').collect();
        if sentences.len() > 1 {
            response = format!("{}.", sentences[..2].join(". "));
        }
    }

    let response = response.trim();
    if response.is_empty() {
        CLEANED_EMPTY_FALLBACK.to_string()
    } else {
        response.to_string()
    }
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if !first.is_uppercase() => first.to_uppercase().chain(chars).collect(),
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{GenerationError, MockTextGenerator};
    use mockall::predicate::*;

    fn controller(generator: MockTextGenerator, window: usize) -> DialogueController<MockTextGenerator, Vec<u8>> {
        DialogueController::with_display(generator, window, Vec::new())
    }

    #[test]
    fn test_clean_response_empty() {
        assert_eq!(clean_response("", "hi"), EMPTY_RESPONSE_FALLBACK);
        assert_eq!(clean_response("   \n", "hi"), EMPTY_RESPONSE_FALLBACK);
    }

    #[test]
    fn test_clean_response_removes_echoed_input() {
        assert_eq!(clean_response("hi there. ", "hi"), "There.");
    }

    #[test]
    fn test_clean_response_strips_prompt_labels() {
        assert_eq!(
            clean_response("Assistant: sure thing Human: ok", "what"),
            "sure thing  ok"
        );
        assert_eq!(clean_response("Q: A:", "zzz"), CLEANED_EMPTY_FALLBACK);
    }

    #[test]
    fn test_clean_response_case_mismatch_keeps_input() {
        // lowercase match succeeds, exact-case removal finds nothing
        assert_eq!(clean_response("HELLO friend", "hello"), "HELLO friend");
    }

    #[test]
    fn test_clean_response_capitalizes_first_char_only() {
        assert_eq!(clean_response("good morning NASA", "xyz"), "Good morning NASA");
        assert_eq!(clean_response("élan vital", "xyz"), "Élan vital");
    }

    #[test]
    fn test_clean_response_truncates_long_text() {
        let long = format!(
            "first sentence here. second sentence here. {}. trailing",
            "x".repeat(200)
        );
        assert_eq!(
            clean_response(&long, "zzz"),
            "First sentence here.  second sentence here."
        );
    }

    #[test]
    fn test_clean_response_long_without_periods_untouched() {
        let long = "y".repeat(250);
        assert_eq!(clean_response(&long, "zzz"), format!("Y{}", "y".repeat(249)));
    }

    #[test]
    fn test_exit_commands() {
        for cmd in ["/exit", "/quit", "exit", "QUIT", "  /Exit  "] {
            let mut c = controller(MockTextGenerator::new(), 4);
            assert_eq!(c.handle_turn(cmd), TurnResult::Exit);
        }
    }

    #[test]
    fn test_clear_command_resets_memory() {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().returning(|_, _| Ok("fine".to_string()));
        let mut c = controller(generator, 4);

        c.handle_turn("how are you");
        assert_eq!(c.memory().len(), 1);

        assert_eq!(c.handle_turn("/RESET"), TurnResult::CommandReply(CLEARED_MESSAGE.to_string()));
        assert!(c.memory().is_empty());
        assert_eq!(c.memory().turn_counter(), 0);
    }

    #[test]
    fn test_history_command_displays_and_reports_usage() {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().returning(|_, _| Ok("fine".to_string()));
        let mut c = controller(generator, 4);
        c.handle_turn("how are you");

        let result = c.handle_turn("/memory");
        assert_eq!(result, TurnResult::CommandReply("📊 Memory: 1/4 turns stored".to_string()));

        let shown = String::from_utf8(c.display().clone()).unwrap();
        assert!(shown.contains("--- Conversation History ---"));
        assert!(shown.contains("Turn 1:\n  User: how are you\n  Bot:  Fine"));
    }

    #[test]
    fn test_history_command_on_empty_memory() {
        let mut c = controller(MockTextGenerator::new(), 4);
        c.handle_turn("/history");
        let shown = String::from_utf8(c.display().clone()).unwrap();
        assert_eq!(shown, "No conversation history.\n");
    }

    #[test]
    fn test_help_and_empty_input() {
        let mut c = controller(MockTextGenerator::new(), 4);
        assert_eq!(c.handle_turn("/help"), TurnResult::CommandReply(HELP_TEXT.to_string()));
        assert_eq!(c.handle_turn("   "), TurnResult::CommandReply(EMPTY_INPUT_MESSAGE.to_string()));
        assert!(c.memory().is_empty());
    }

    #[test]
    fn test_stats_counts_commands() {
        let mut c = controller(MockTextGenerator::new(), 4);
        c.handle_turn("/help");
        c.handle_turn("/history");
        let TurnResult::CommandReply(text) = c.handle_turn("/stats") else {
            panic!("expected command reply");
        };
        assert!(text.contains("Commands used: 3"));
        assert_eq!(c.stats().commands_used(), 3);
    }

    #[test]
    fn test_chat_uses_compact_prompt_and_fixed_params() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .with(eq("hello"), eq(GenerationParams { max_length: 120, temperature: 0.8 }))
            .times(1)
            .returning(|_, _| Ok("hi!".to_string()));
        generator
            .expect_generate()
            .with(eq("Q: hello A: Hi! Q: how are you A:"), always())
            .times(1)
            .returning(|_, _| Ok("fine".to_string()));

        let mut c = controller(generator, 4);
        assert_eq!(c.handle_turn("hello"), TurnResult::ChatReply("Hi!".to_string()));
        assert_eq!(c.handle_turn("how are you"), TurnResult::ChatReply("Fine".to_string()));
        assert_eq!(c.memory().turn_counter(), 2);
    }

    #[test]
    fn test_verbose_prompt_style() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .with(eq("Human: hello\nAssistant:"), always())
            .times(1)
            .returning(|_, _| Ok("hi".to_string()));

        let mut c = controller(generator, 4).with_prompt_style(PromptStyle::Verbose);
        assert_eq!(c.handle_turn("hello"), TurnResult::ChatReply("Hi".to_string()));
    }

    #[test]
    fn test_generation_failure_is_not_recorded() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .returning(|_, _| Err(GenerationError::Transport("connection refused".to_string())));

        let mut c = controller(generator, 4);
        assert_eq!(
            c.handle_turn("hello"),
            TurnResult::ChatReply("Sorry, I encountered an error: transport error: connection refused".to_string())
        );
        assert!(c.memory().is_empty());
        assert_eq!(c.memory().turn_counter(), 0);
    }

    #[test]
    fn test_unknown_slash_command_is_chat() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .with(eq("/dance"), always())
            .times(1)
            .returning(|_, _| Ok("I cannot dance.".to_string()));

        let mut c = controller(generator, 4);
        assert_eq!(c.handle_turn("/dance"), TurnResult::ChatReply("I cannot dance.".to_string()));
        assert_eq!(c.memory().len(), 1);
    }
}
