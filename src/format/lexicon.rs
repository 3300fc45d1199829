//! Text lexicon mapping terms to their posting ranges.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use ahash::AHashMap;

use crate::error::{PilumError, Result};

/// Location and statistics of one term's postings in the final index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermEntry {
    /// Dense id assigned on first sight in corpus order.
    pub term_id: u32,

    /// Number of postings, equal to the term's document frequency.
    pub posting_count: u32,

    /// Byte offset of the first posting in the posting stream.
    pub start_offset: u64,

    /// Total bytes occupied by the term's postings.
    pub bytes_size: u64,
}

/// In-memory lexicon loaded for query evaluation.
#[derive(Debug, Default)]
pub struct Lexicon {
    terms: AHashMap<String, TermEntry>,
}

impl Lexicon {
    /// Load the lexicon from its text file.
    ///
    /// Each line is `<term> <term_id> <posting_count> <start_offset>
    /// <bytes_size>`, space separated.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut terms = AHashMap::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (Some(term), Some(id), Some(count), Some(start), Some(size)) = (
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
            ) else {
                return Err(PilumError::format(format!(
                    "lexicon line {} has fewer than five fields",
                    line_no + 1
                )));
            };

            let entry = TermEntry {
                term_id: parse_field(id, line_no)?,
                posting_count: parse_field(count, line_no)?,
                start_offset: parse_field(start, line_no)?,
                bytes_size: parse_field(size, line_no)?,
            };
            terms.insert(term.to_string(), entry);
        }

        Ok(Lexicon { terms })
    }

    /// Look up a term.
    pub fn get(&self, term: &str) -> Option<&TermEntry> {
        self.terms.get(term)
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Sum of posting counts over all terms.
    pub fn total_postings(&self) -> u64 {
        self.terms
            .values()
            .map(|entry| entry.posting_count as u64)
            .sum()
    }

    /// Iterate over all terms and their entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TermEntry)> {
        self.terms.iter().map(|(term, entry)| (term.as_str(), entry))
    }
}

fn parse_field<T: FromStr>(field: &str, line_no: usize) -> Result<T> {
    field.parse().map_err(|_| {
        PilumError::format(format!(
            "lexicon line {}: bad numeric field {field:?}",
            line_no + 1
        ))
    })
}

/// Streaming writer used by the merger, emitting terms in merge order.
#[derive(Debug)]
pub struct LexiconWriter {
    out: BufWriter<File>,
}

impl LexiconWriter {
    /// Create the lexicon file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(LexiconWriter {
            out: BufWriter::new(File::create(path)?),
        })
    }

    /// Append one term line.
    pub fn write_entry(&mut self, term: &str, entry: &TermEntry) -> Result<()> {
        writeln!(
            self.out,
            "{} {} {} {} {}",
            term, entry.term_id, entry.posting_count, entry.start_offset, entry.bytes_size
        )?;
        Ok(())
    }

    /// Flush buffered lines before the handle is released.
    pub fn finish(mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
