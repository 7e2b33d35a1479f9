//! Sliding-window conversation memory
//!
//! Keeps the last `window_size` user/bot exchanges of a chat session and
//! renders them into prompt text for the generator.

use log::debug;
use std::collections::VecDeque;

/// Default number of exchanges kept in the window
pub const DEFAULT_WINDOW_SIZE: usize = 4;

/// Number of most recent exchanges used by the compact prompt
const COMPACT_CONTEXT_EXCHANGES: usize = 2;

/// One recorded user/bot turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// Position in the session, 0-based. Never reused after eviction.
    pub turn_index: u64,
    pub user_text: String,
    pub bot_text: String,
}

/// Snapshot of memory usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySummary {
    pub total_turns: u64,
    pub stored_exchanges: usize,
    pub window_size: usize,
    /// `"{stored_exchanges}/{window_size}"`
    pub usage_label: String,
}

/// Bounded FIFO store of recent exchanges, one instance per chat session.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    window_size: usize,
    history: VecDeque<Exchange>,
    turn_counter: u64,
}

impl ConversationMemory {
    /// Create an empty memory holding at most `window_size` exchanges.
    ///
    /// A zero window is raised to 1; callers validate user input before this.
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            window_size,
            history: VecDeque::new(),
            turn_counter: 0,
        }
    }

    /// Record an exchange, evicting the oldest ones once the window is full.
    pub fn add_exchange(&mut self, user_input: &str, bot_response: &str) {
        let exchange = Exchange {
            turn_index: self.turn_counter,
            user_text: user_input.trim().to_string(),
            bot_text: bot_response.trim().to_string(),
        };

        self.history.push_back(exchange);
        self.turn_counter += 1;

        while self.history.len() > self.window_size {
            if let Some(evicted) = self.history.pop_front() {
                debug!("evicted turn {} from memory window", evicted.turn_index);
            }
        }
    }

    /// Multi-line `Human:`/`Assistant:` rendering of the whole window plus
    /// the current input, ending with a bare `Assistant:` line.
    pub fn render_verbose_prompt(&self, current_input: &str) -> String {
        let mut lines = Vec::with_capacity(self.history.len() * 2 + 2);

        for exchange in &self.history {
            lines.push(format!("Human: {}", exchange.user_text));
            lines.push(format!("Assistant: {}", exchange.bot_text));
        }

        lines.push(format!("Human: {}", current_input));
        lines.push("Assistant:".to_string());

        lines.join("\n")
    }

    /// Single-line `Q: .. A: ..` rendering of the two most recent exchanges.
    /// With no history the input is returned unchanged.
    pub fn render_compact_prompt(&self, current_input: &str) -> String {
        if self.history.is_empty() {
            return current_input.to_string();
        }

        let skip = self.history.len().saturating_sub(COMPACT_CONTEXT_EXCHANGES);
        let mut parts: Vec<String> = self
            .history
            .iter()
            .skip(skip)
            .map(|e| format!("Q: {} A: {}", e.user_text, e.bot_text))
            .collect();

        parts.push(format!("Q: {} A:", current_input));
        parts.join(" ")
    }

    /// Drop all history and restart turn numbering.
    pub fn clear(&mut self) {
        self.history.clear();
        self.turn_counter = 0;
    }

    pub fn summary(&self) -> MemorySummary {
        let stored_exchanges = self.history.len();
        MemorySummary {
            total_turns: self.turn_counter,
            stored_exchanges,
            window_size: self.window_size,
            usage_label: format!("{}/{}", stored_exchanges, self.window_size),
        }
    }

    /// Human-readable listing of the stored exchanges, one block per turn
    /// separated by blank lines.
    pub fn format_history(&self) -> String {
        if self.history.is_empty() {
            return "No conversation history.".to_string();
        }

        self.history
            .iter()
            .map(|e| {
                format!(
                    "Turn {}:\n  User: {}\n  Bot:  {}",
                    e.turn_index + 1,
                    e.user_text,
                    e.bot_text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn history(&self) -> impl ExactSizeIterator<Item = &Exchange> {
        self.history.iter()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn turn_counter(&self) -> u64 {
        self.turn_counter
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users(memory: &ConversationMemory) -> Vec<&str> {
        memory.history().map(|e| e.user_text.as_str()).collect()
    }

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut memory = ConversationMemory::new(3);
        for i in 0..10 {
            memory.add_exchange(&format!("q{i}"), &format!("a{i}"));
            assert!(memory.len() <= 3);
        }
        assert_eq!(memory.turn_counter(), 10);
    }

    #[test]
    fn test_fifo_eviction_keeps_latest_in_order() {
        let mut memory = ConversationMemory::new(2);
        memory.add_exchange("one", "1");
        memory.add_exchange("two", "2");
        memory.add_exchange("three", "3");

        assert_eq!(users(&memory), vec!["two", "three"]);
        let indices: Vec<u64> = memory.history().map(|e| e.turn_index).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn test_add_exchange_trims_text() {
        let mut memory = ConversationMemory::default();
        memory.add_exchange("  hello \n", "\t hi there  ");

        let stored = memory.history().next().unwrap();
        assert_eq!(stored.user_text, "hello");
        assert_eq!(stored.bot_text, "hi there");
        assert_eq!(stored.turn_index, 0);
    }

    #[test]
    fn test_verbose_prompt_empty_history() {
        let memory = ConversationMemory::default();
        assert_eq!(memory.render_verbose_prompt("hi"), "Human: hi\nAssistant:");
    }

    #[test]
    fn test_verbose_prompt_with_history() {
        let mut memory = ConversationMemory::default();
        memory.add_exchange("a", "b");
        memory.add_exchange("c", "d");

        assert_eq!(
            memory.render_verbose_prompt("e"),
            "Human: a\nAssistant: b\nHuman: c\nAssistant: d\nHuman: e\nAssistant:"
        );
    }

    #[test]
    fn test_compact_prompt_empty_history_returns_input() {
        let memory = ConversationMemory::default();
        assert_eq!(memory.render_compact_prompt("hi"), "hi");
    }

    #[test]
    fn test_compact_prompt_two_exchanges() {
        let mut memory = ConversationMemory::new(4);
        memory.add_exchange("a", "b");
        memory.add_exchange("c", "d");

        assert_eq!(memory.render_compact_prompt("e"), "Q: a A: b Q: c A: d Q: e A:");
    }

    #[test]
    fn test_compact_prompt_uses_only_last_two() {
        let mut memory = ConversationMemory::new(4);
        memory.add_exchange("a", "b");
        memory.add_exchange("c", "d");
        memory.add_exchange("e", "f");

        assert_eq!(memory.render_compact_prompt("g"), "Q: c A: d Q: e A: f Q: g A:");
    }

    #[test]
    fn test_compact_prompt_single_exchange() {
        let mut memory = ConversationMemory::new(4);
        memory.add_exchange("a", "b");

        assert_eq!(memory.render_compact_prompt("c"), "Q: a A: b Q: c A:");
    }

    #[test]
    fn test_rendering_does_not_mutate() {
        let mut memory = ConversationMemory::new(2);
        memory.add_exchange("a", "b");

        let first = memory.render_verbose_prompt("x");
        let _ = memory.render_compact_prompt("x");
        assert_eq!(memory.render_verbose_prompt("x"), first);
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.turn_counter(), 1);
    }

    #[test]
    fn test_clear_resets_counter_and_usage() {
        let mut memory = ConversationMemory::new(4);
        memory.add_exchange("a", "b");
        memory.add_exchange("c", "d");
        memory.clear();

        let summary = memory.summary();
        assert!(memory.is_empty());
        assert_eq!(summary.total_turns, 0);
        assert_eq!(summary.usage_label, "0/4");

        memory.add_exchange("e", "f");
        assert_eq!(memory.history().next().unwrap().turn_index, 0);
    }

    #[test]
    fn test_summary_counts_evicted_turns() {
        let mut memory = ConversationMemory::new(2);
        for i in 0..5 {
            memory.add_exchange(&i.to_string(), "ok");
        }

        let summary = memory.summary();
        assert_eq!(summary.total_turns, 5);
        assert_eq!(summary.stored_exchanges, 2);
        assert_eq!(summary.window_size, 2);
        assert_eq!(summary.usage_label, "2/2");
    }

    #[test]
    fn test_format_history_empty() {
        let memory = ConversationMemory::default();
        assert_eq!(memory.format_history(), "No conversation history.");
    }

    #[test]
    fn test_format_history_uses_display_turn_numbers() {
        let mut memory = ConversationMemory::new(1);
        memory.add_exchange("old", "gone");
        memory.add_exchange("hello", "hi!");

        assert_eq!(memory.format_history(), "Turn 2:\n  User: hello\n  Bot:  hi!");
    }

    #[test]
    fn test_format_history_separates_entries() {
        let mut memory = ConversationMemory::new(4);
        memory.add_exchange("a", "b");
        memory.add_exchange("c", "d");

        assert_eq!(
            memory.format_history(),
            "Turn 1:\n  User: a\n  Bot:  b\n\nTurn 2:\n  User: c\n  Bot:  d"
        );
    }

    #[test]
    fn test_zero_window_is_raised_to_one() {
        let mut memory = ConversationMemory::new(0);
        memory.add_exchange("a", "b");
        memory.add_exchange("c", "d");
        assert_eq!(memory.window_size(), 1);
        assert_eq!(users(&memory), vec!["c"]);
    }

    #[test]
    fn test_huge_window_does_not_preallocate() {
        let mut memory = ConversationMemory::new(usize::MAX);
        memory.add_exchange("a", "b");
        memory.add_exchange("c", "d");

        assert_eq!(users(&memory), vec!["a", "c"]);
        assert_eq!(memory.summary().usage_label, format!("2/{}", usize::MAX));
    }
}
