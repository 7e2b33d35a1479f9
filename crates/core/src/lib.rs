//! SFCore Chat Core - conversation memory and dialogue control
//!
//! Session state for the terminal chatbot: a sliding window of recent
//! exchanges, prompt rendering, response cleanup and command dispatch.
//! Text generation is consumed through the [`TextGenerator`] trait.

pub mod dialogue;
pub mod generator;
pub mod memory;
pub mod session;

pub use dialogue::{clean_response, DialogueController, PromptStyle, TurnResult};
pub use generator::{GenerationError, GenerationParams, TextGenerator};
pub use memory::{ConversationMemory, Exchange, MemorySummary, DEFAULT_WINDOW_SIZE};
pub use session::SessionStats;
