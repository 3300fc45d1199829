//! Index construction: batching, spilling runs, and merging.

pub mod batch;
pub mod builder;
pub mod merge;
pub mod run;

pub use batch::PostingBatch;
pub use builder::{BuildStats, IndexBuilder, IndexBuilderConfig};
