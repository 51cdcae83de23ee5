//! Text generation and image captioning over an OpenAI-compatible API.

pub mod client;
pub mod extract;

pub use client::{ChatClient, ImageCaptioner, LlmError, TextGenerator};
pub use extract::{extract_object, ExtractError, Extracted, ExtractionMethod};

/// Cuts `text` to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("ÄÖÜß", 2), "ÄÖ");
        assert_eq!(truncate_chars("", 0), "");
    }
}
