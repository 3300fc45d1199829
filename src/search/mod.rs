//! Query evaluation over the final index.

pub mod bm25;
pub mod cursor;
pub mod engine;

pub use bm25::{Bm25Params, SearchHit};
pub use engine::{QueryMode, SearchEngine, TOP_K};
