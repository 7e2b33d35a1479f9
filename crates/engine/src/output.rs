//! Post-processing of raw generated text, shared by all backends

/// Returned when nothing usable survives post-processing
pub const NO_RESPONSE: &str = "I'm not sure how to respond to that.";

/// Fragments shorter than this at the end are treated as cut-off sentences
const MIN_TAIL_CHARS: usize = 10;

/// Turn raw generator output into the response handed to the dialogue layer.
///
/// Strips an echoed prompt, drops a trailing incomplete sentence and makes
/// sure the text ends with a period.
pub fn finalize(prompt: &str, generated: &str) -> String {
    let text = generated.strip_prefix(prompt).unwrap_or(generated).trim();
    let text = drop_incomplete_tail(text);

    if text.is_empty() {
        NO_RESPONSE.to_string()
    } else {
        text
    }
}

fn drop_incomplete_tail(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut sentences: Vec<&str> = text.split('.').collect();
    if sentences.len() > 1 && sentences.last().is_some_and(|s| s.trim().is_empty()) {
        sentences.pop();
    }
    if let Some(last) = sentences.last() {
        if sentences.len() > 1 && !last.trim().is_empty() && last.chars().count() < MIN_TAIL_CHARS {
            sentences.pop();
        }
    }

    let mut joined = sentences.join(". ");
    if !joined.is_empty() && !joined.ends_with('.') {
        joined.push('.');
    }
    joined
}
