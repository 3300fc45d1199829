//! BM25 ranking with conjunctive and disjunctive evaluation.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::Result;
use crate::format::docmeta::DocTable;
use crate::search::cursor::InvertedListCursor;

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f64,

    /// Document-length normalization strength.
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Bm25Params { k1: 1.2, b: 0.75 }
    }
}

/// One ranked result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// The matching document.
    pub doc_id: u32,

    /// BM25 score, higher is better.
    pub score: f64,
}

/// A query term's cursor together with its precomputed IDF.
#[derive(Debug)]
pub struct TermCursor<'a> {
    /// Cursor over the term's postings.
    pub cursor: InvertedListCursor<'a>,

    /// Inverse document frequency of the term.
    pub idf: f64,
}

/// Inverse document frequency for a term appearing in `df` of
/// `total_docs` documents.
pub fn idf(total_docs: u64, df: u64) -> f64 {
    let n = total_docs as f64;
    let df = df as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Term-frequency contribution for one posting.
pub fn tf(params: &Bm25Params, freq: u32, doc_length: u32, avg_doc_length: f64) -> f64 {
    let freq = freq as f64;
    let norm = if avg_doc_length > 0.0 {
        doc_length as f64 / avg_doc_length
    } else {
        0.0
    };
    freq * (params.k1 + 1.0) / (freq + params.k1 * (1.0 - params.b + params.b * norm))
}

/// Score documents containing every query term.
///
/// All cursors move in lock-step: each round aligns every cursor at or
/// past a candidate doc id. Full agreement scores and emits the
/// candidate; disagreement re-targets at the maximum observed doc id.
/// Evaluation ends when any cursor exhausts or the candidate passes
/// the document count.
pub fn conjunctive(
    lists: &mut [TermCursor<'_>],
    params: &Bm25Params,
    docs: &DocTable,
) -> Result<Vec<SearchHit>> {
    let mut hits = Vec::new();
    if lists.is_empty() {
        return Ok(hits);
    }
    for list in lists.iter_mut() {
        if !list.cursor.next()? {
            return Ok(hits);
        }
    }
    let doc_count = docs.len() as u32;

    loop {
        let first = lists[0].cursor.doc_id();
        let mut max_doc = first;
        let mut aligned = true;
        for list in lists.iter().skip(1) {
            let doc = list.cursor.doc_id();
            aligned &= doc == first;
            if doc > max_doc {
                max_doc = doc;
            }
        }

        let target = if aligned {
            let doc_length = docs.doc_length(first);
            let mut score = 0.0;
            for list in lists.iter() {
                score += list.idf * tf(params, list.cursor.term_freq(), doc_length, docs.avg_doc_length());
            }
            hits.push(SearchHit {
                doc_id: first,
                score,
            });
            first + 1
        } else {
            max_doc
        };

        if target >= doc_count {
            break;
        }
        if !advance_all(lists, target)? {
            break;
        }
    }

    Ok(hits)
}

/// Advance every cursor to a doc id ≥ `target`; `false` when one
/// exhausts its postings.
fn advance_all(lists: &mut [TermCursor<'_>], target: u32) -> Result<bool> {
    for list in lists.iter_mut() {
        while list.cursor.doc_id() < target {
            if !list.cursor.next()? {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Score documents containing any query term.
///
/// A min-heap orders cursors by their current doc id. Each round pops
/// the minimum doc, folds in every cursor positioned on it (advancing
/// and re-pushing each), and emits one result per distinct doc.
pub fn disjunctive(
    lists: &mut [TermCursor<'_>],
    params: &Bm25Params,
    docs: &DocTable,
) -> Result<Vec<SearchHit>> {
    let mut hits = Vec::new();
    let mut heap: BinaryHeap<Reverse<(u32, usize)>> = BinaryHeap::new();

    for (index, list) in lists.iter_mut().enumerate() {
        if list.cursor.next()? {
            heap.push(Reverse((list.cursor.doc_id(), index)));
        }
    }

    while let Some(Reverse((doc_id, index))) = heap.pop() {
        let doc_length = docs.doc_length(doc_id);
        let avg = docs.avg_doc_length();

        let list = &mut lists[index];
        let mut score = list.idf * tf(params, list.cursor.term_freq(), doc_length, avg);
        if list.cursor.next()? {
            heap.push(Reverse((list.cursor.doc_id(), index)));
        }

        while let Some(&Reverse((next_doc, next_index))) = heap.peek() {
            if next_doc != doc_id {
                break;
            }
            heap.pop();
            let list = &mut lists[next_index];
            score += list.idf * tf(params, list.cursor.term_freq(), doc_length, avg);
            if list.cursor.next()? {
                heap.push(Reverse((list.cursor.doc_id(), next_index)));
            }
        }

        hits.push(SearchHit { doc_id, score });
    }

    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = Bm25Params::default();
        assert!((params.k1 - 1.2).abs() < f64::EPSILON);
        assert!((params.b - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_idf_decreases_with_df() {
        let rare = idf(1000, 1);
        let common = idf(1000, 500);
        let ubiquitous = idf(1000, 1000);

        assert!(rare > common);
        assert!(common > ubiquitous);
        // The +1 inside the logarithm keeps the IDF positive.
        assert!(ubiquitous > 0.0);
    }

    #[test]
    fn test_tf_saturates_with_frequency() {
        let params = Bm25Params::default();
        let tf1 = tf(&params, 1, 10, 10.0);
        let tf5 = tf(&params, 5, 10, 10.0);
        let tf50 = tf(&params, 50, 10, 10.0);

        assert!(tf1 < tf5);
        assert!(tf5 < tf50);
        // Bounded above by k1 + 1.
        assert!(tf50 < params.k1 + 1.0);
    }

    #[test]
    fn test_tf_penalizes_long_documents() {
        let params = Bm25Params::default();
        let short = tf(&params, 2, 5, 10.0);
        let long = tf(&params, 2, 50, 10.0);
        assert!(short > long);
    }
}
