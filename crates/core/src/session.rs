use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

use crate::memory::MemorySummary;

/// Per-session counters that survive `/clear`
#[derive(Debug, Clone)]
pub struct SessionStats {
    started_at: DateTime<Local>,
    started: Instant,
    commands_used: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            started_at: Local::now(),
            started: Instant::now(),
            commands_used: 0,
        }
    }

    pub fn record_command(&mut self) {
        self.commands_used += 1;
    }

    pub fn commands_used(&self) -> u64 {
        self.commands_used
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Elapsed session time, truncated to whole seconds
    pub fn elapsed(&self) -> Duration {
        Duration::from_secs(self.started.elapsed().as_secs())
    }

    pub fn render(&self, memory: &MemorySummary) -> String {
        format!(
            "📊 Session Statistics:\n\
             • Turns: {}\n\
             • Exchanges in memory: {}\n\
             • Commands used: {}\n\
             • Started: {}\n\
             • Duration: {}",
            memory.total_turns,
            memory.usage_label,
            self.commands_used,
            self.started_at.format("%H:%M:%S"),
            humantime::format_duration(self.elapsed()),
        )
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}
