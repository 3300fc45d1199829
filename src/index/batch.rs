//! In-memory posting batch with a soft memory cap.
//!
//! The batch accumulates gap-encoded postings per term until its byte
//! estimate crosses the configured cap, at which point the caller
//! spills the posting lists to a run file. The lexicon and the reverse
//! term map persist for the entire build so term ids stay stable and
//! gap chains continue across spills.

use ahash::AHashMap;

use crate::analysis::Tokenizer;

/// Estimated bytes per posting pair.
const POSTING_COST: usize = 8;

/// Estimated overhead per lexicon entry beyond the term bytes.
const TERM_COST: usize = 64;

/// Estimated overhead per posting list.
const LIST_COST: usize = 48;

/// Build-side lexicon state for one term.
#[derive(Debug, Clone)]
pub struct LexiconInfo {
    /// Dense id assigned on first sight.
    pub term_id: u32,

    /// Postings accumulated across the whole build.
    pub posting_count: u32,

    /// Last doc id that produced a posting, for gap encoding.
    pub last_doc_id: u32,
}

/// Statistics for one accepted input line.
#[derive(Debug, Clone, Copy)]
pub struct LineStats {
    /// The line's doc id.
    pub doc_id: u32,

    /// Total term occurrences on the line.
    pub term_count: u32,
}

/// In-memory batch of postings plus the persistent build lexicon.
#[derive(Debug)]
pub struct PostingBatch {
    lexicon: AHashMap<String, LexiconInfo>,
    /// term_id → term string, for sorting runs by term.
    terms: Vec<String>,
    postings: AHashMap<u32, Vec<(u32, u32)>>,
    posting_bytes: usize,
    lexicon_bytes: usize,
    memory_limit: usize,
    last_doc_id: Option<u32>,
}

impl PostingBatch {
    /// Create a batch with the given soft cap in bytes.
    pub fn new(memory_limit: usize) -> Self {
        PostingBatch {
            lexicon: AHashMap::new(),
            terms: Vec::new(),
            postings: AHashMap::new(),
            posting_bytes: 0,
            lexicon_bytes: 0,
            memory_limit,
            last_doc_id: None,
        }
    }

    /// Tokenize and ingest one input line of the form `<doc_id> <text...>`.
    ///
    /// Returns `None` when the line is rejected: no leading integer, a
    /// doc id below the last accepted one, or no indexable terms.
    /// Rejections are logged and never fatal.
    pub fn add_line(&mut self, line: &str, tokenizer: &dyn Tokenizer) -> Option<LineStats> {
        let mut parts = line.splitn(2, |c: char| c.is_ascii_whitespace());
        let id_field = parts.next().unwrap_or("");
        let Ok(doc_id) = id_field.parse::<u32>() else {
            log::warn!("skipping line without a leading doc id: {id_field:?}");
            return None;
        };
        if let Some(last) = self.last_doc_id {
            if doc_id < last {
                log::warn!("skipping doc id {doc_id} below last accepted id {last}");
                return None;
            }
        }

        let tokens = tokenizer.tokenize(parts.next().unwrap_or(""));
        let term_count = tokens.len() as u32;
        if tokens.is_empty() {
            log::warn!("skipping doc {doc_id}: no indexable terms");
            return None;
        }

        let mut counts: AHashMap<&str, u32> = AHashMap::new();
        for token in &tokens {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }

        // Walk tokens in occurrence order so term ids are assigned
        // deterministically on first sight.
        for token in &tokens {
            if let Some(freq) = counts.remove(token.as_str()) {
                self.add_posting(token.clone(), doc_id, freq);
            }
        }
        self.last_doc_id = Some(doc_id);

        Some(LineStats { doc_id, term_count })
    }

    fn add_posting(&mut self, term: String, doc_id: u32, freq: u32) {
        let next_term_id = self.terms.len() as u32;
        let term_len = term.len();
        let mut is_new = false;

        let info = self.lexicon.entry(term.clone()).or_insert_with(|| {
            is_new = true;
            LexiconInfo {
                term_id: next_term_id,
                posting_count: 0,
                last_doc_id: 0,
            }
        });
        // The first gap is the absolute doc id since last_doc_id starts at 0.
        let gap = doc_id - info.last_doc_id;
        info.last_doc_id = doc_id;
        info.posting_count += 1;
        let term_id = info.term_id;

        if is_new {
            self.terms.push(term);
            // Key plus reverse-map copy.
            self.lexicon_bytes += term_len * 2 + TERM_COST;
        }

        let list = self.postings.entry(term_id).or_default();
        if list.is_empty() {
            self.posting_bytes += LIST_COST;
        }
        list.push((gap, freq));
        self.posting_bytes += POSTING_COST;
    }

    /// Current byte estimate for postings plus lexicon.
    pub fn memory_usage(&self) -> usize {
        self.posting_bytes + self.lexicon_bytes
    }

    /// Whether the estimate has crossed the soft cap.
    pub fn should_flush(&self) -> bool {
        self.memory_usage() > self.memory_limit
    }

    /// Whether any postings are buffered.
    pub fn has_postings(&self) -> bool {
        !self.postings.is_empty()
    }

    /// Number of distinct terms seen so far.
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// term_id → term string map.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Posting count for `term_id` accumulated across the build.
    pub fn posting_count(&self, term_id: u32) -> u32 {
        self.terms
            .get(term_id as usize)
            .and_then(|term| self.lexicon.get(term))
            .map(|info| info.posting_count)
            .unwrap_or(0)
    }

    /// Drain buffered posting lists, sorted by term string.
    ///
    /// The lexicon and reverse map persist; only the posting estimate
    /// resets.
    pub fn drain_sorted(&mut self) -> Vec<(u32, Vec<(u32, u32)>)> {
        let mut records: Vec<(u32, Vec<(u32, u32)>)> = self.postings.drain().collect();
        records.sort_by(|a, b| self.terms[a.0 as usize].cmp(&self.terms[b.0 as usize]));
        self.posting_bytes = 0;
        records
    }
}
