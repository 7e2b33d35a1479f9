//! Text generation capability consumed by the dialogue controller

use thiserror::Error;

/// Generation parameters used for every chat turn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Upper bound on generated length (new tokens)
    pub max_length: usize,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_length: 120,
            temperature: 0.8,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("model not loaded")]
    ModelNotLoaded,

    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("backend error: {0}")]
    Backend(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Maps a prompt plus parameters to generated text.
///
/// Implementations return the response only; any echo of the prompt is
/// stripped before returning.
#[cfg_attr(test, mockall::automock)]
pub trait TextGenerator {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, GenerationError>;
}

impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, GenerationError> {
        (**self).generate(prompt, params)
    }
}
