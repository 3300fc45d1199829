//! Query engine façade over the on-disk index.

use std::path::{Path, PathBuf};

use crate::analysis::{AsciiAlnumTokenizer, Tokenizer};
use crate::error::Result;
use crate::format::block::BlockDirectory;
use crate::format::docmeta::DocTable;
use crate::format::lexicon::Lexicon;
use crate::format::{BLOCK_INFO_FILE, DOC_INFO_FILE, INDEX_FILE, LEXICON_FILE};
use crate::search::bm25::{self, Bm25Params, SearchHit, TermCursor};
use crate::search::cursor::InvertedListCursor;

/// Number of results returned per query.
pub const TOP_K: usize = 10;

/// Query evaluation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Documents containing any query term.
    Disjunctive,

    /// Documents containing every query term.
    Conjunctive,
}

/// Loaded index ready to answer queries.
#[derive(Debug)]
pub struct SearchEngine {
    index_path: PathBuf,
    lexicon: Lexicon,
    directory: BlockDirectory,
    docs: DocTable,
    tokenizer: AsciiAlnumTokenizer,
    params: Bm25Params,
}

impl SearchEngine {
    /// Open the index files in `dir`.
    ///
    /// The block directory is validated against the lexicon's posting
    /// total during the load.
    pub fn open(dir: &Path) -> Result<Self> {
        let lexicon = Lexicon::load(&dir.join(LEXICON_FILE))?;
        let directory = BlockDirectory::load(&dir.join(BLOCK_INFO_FILE), lexicon.total_postings())?;
        let docs = DocTable::load(&dir.join(DOC_INFO_FILE))?;

        Ok(SearchEngine {
            index_path: dir.join(INDEX_FILE),
            lexicon,
            directory,
            docs,
            tokenizer: AsciiAlnumTokenizer::new(),
            params: Bm25Params::default(),
        })
    }

    /// Number of documents in the index.
    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    /// Number of distinct terms in the lexicon.
    pub fn term_count(&self) -> usize {
        self.lexicon.len()
    }

    /// Evaluate a query and return the top results, best first.
    ///
    /// Unknown terms are dropped silently. A term whose posting range
    /// fails to open is reported, skipped, and the query continues.
    pub fn search(&self, query: &str, mode: QueryMode) -> Result<Vec<SearchHit>> {
        let mut lists = Vec::new();
        for term in self.tokenizer.tokenize(query) {
            let Some(entry) = self.lexicon.get(&term) else {
                continue;
            };
            match InvertedListCursor::open(&self.index_path, entry, &self.directory) {
                Ok(cursor) => lists.push(TermCursor {
                    cursor,
                    idf: bm25::idf(self.docs.len() as u64, entry.posting_count as u64),
                }),
                Err(e) => log::warn!("skipping term {term:?}: {e}"),
            }
        }
        if lists.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits = match mode {
            QueryMode::Conjunctive => bm25::conjunctive(&mut lists, &self.params, &self.docs)?,
            QueryMode::Disjunctive => bm25::disjunctive(&mut lists, &self.params, &self.docs)?,
        };
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(TOP_K);
        Ok(hits)
    }
}
