//! Shared on-disk index format.
//!
//! Both the builder and the query engine speak this format: a
//! block-packed posting file, a text lexicon, a packed block directory,
//! a text document table, and a JSON metadata sidecar.

pub mod block;
pub mod docmeta;
pub mod lexicon;
pub mod meta;

/// Number of postings packed into one index block.
pub const POSTINGS_PER_BLOCK: usize = 128;

/// File name of the block-packed posting index.
pub const INDEX_FILE: &str = "final_sorted_index.bin";

/// File name of the text lexicon.
pub const LEXICON_FILE: &str = "final_sorted_lexicon.txt";

/// File name of the packed block directory.
pub const BLOCK_INFO_FILE: &str = "final_sorted_block_info.bin";

/// File name of the document table.
pub const DOC_INFO_FILE: &str = "document_info.txt";

/// File name of the build metadata sidecar.
pub const METADATA_FILE: &str = "index_metadata.json";

/// Name of the `run_id`-th temporary run file.
pub fn run_file_name(run_id: usize) -> String {
    format!("temp_index_{run_id}.bin")
}
