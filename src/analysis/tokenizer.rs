//! Tokenizer implementations.

/// Trait for tokenizers that split text into terms.
pub trait Tokenizer {
    /// Split `text` into terms, preserving occurrence order.
    ///
    /// Duplicates are retained; the caller counts them.
    fn tokenize(&self, text: &str) -> Vec<String>;

    /// Get the tokenizer name.
    fn name(&self) -> &'static str;
}

/// A tokenizer producing maximal runs of ASCII letters and digits.
///
/// Letters are lowercased, digits kept as-is. Every other byte,
/// including whitespace, punctuation, and multi-byte characters, acts
/// as a separator. Digit-only terms are retained.
#[derive(Clone, Debug, Default)]
pub struct AsciiAlnumTokenizer;

impl AsciiAlnumTokenizer {
    /// Create a new tokenizer.
    pub fn new() -> Self {
        AsciiAlnumTokenizer
    }
}

impl Tokenizer for AsciiAlnumTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut terms = Vec::new();
        let mut current = String::new();

        for &byte in text.as_bytes() {
            if byte.is_ascii_alphanumeric() {
                current.push(byte.to_ascii_lowercase() as char);
            } else if !current.is_empty() {
                terms.push(std::mem::take(&mut current));
            }
        }

        if !current.is_empty() {
            terms.push(current);
        }

        terms
    }

    fn name(&self) -> &'static str {
        "ascii_alnum"
    }
}
