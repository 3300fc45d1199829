//! Text analysis for indexing and querying.

pub mod tokenizer;

pub use tokenizer::{AsciiAlnumTokenizer, Tokenizer};
