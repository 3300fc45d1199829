//! Per-document metadata table.
//!
//! One text line per doc id in ascending order: the document's term
//! count and the byte offset of its line within the decompressed
//! corpus. Random access is positional, so ids are expected dense.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{PilumError, Result};

/// One document's table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocRecord {
    /// Number of term occurrences in the document.
    pub term_count: u32,

    /// Byte offset of the document's line within the decompressed corpus.
    pub byte_offset: u64,
}

/// Streaming writer emitting one line per doc id in ascending order.
#[derive(Debug)]
pub struct DocTableWriter {
    out: BufWriter<File>,
    next_doc_id: u32,
}

impl DocTableWriter {
    /// Create the table file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(DocTableWriter {
            out: BufWriter::new(File::create(path)?),
            next_doc_id: 0,
        })
    }

    /// Append the record for `doc_id`.
    ///
    /// Ids are expected to be dense; a gap is reported and writing
    /// continues positionally.
    pub fn push(&mut self, doc_id: u32, record: DocRecord) -> Result<()> {
        if doc_id != self.next_doc_id {
            log::error!(
                "document table expected doc id {}, observed {doc_id}; input ids are not dense",
                self.next_doc_id
            );
        }
        writeln!(self.out, "{} {}", record.term_count, record.byte_offset)?;
        self.next_doc_id = doc_id + 1;
        Ok(())
    }

    /// Flush buffered lines before the handle is released.
    pub fn finish(mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Loaded table indexed by doc id.
#[derive(Debug)]
pub struct DocTable {
    docs: Vec<DocRecord>,
    avg_doc_length: f64,
}

impl DocTable {
    /// Load the table, computing the average document length.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut docs = Vec::new();
        let mut total_terms = 0u64;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (Some(count), Some(offset)) = (fields.next(), fields.next()) else {
                return Err(PilumError::format(format!(
                    "document table line {} has fewer than two fields",
                    line_no + 1
                )));
            };
            let term_count: u32 = count.parse().map_err(|_| bad_field(count, line_no))?;
            let byte_offset: u64 = offset.parse().map_err(|_| bad_field(offset, line_no))?;

            total_terms += term_count as u64;
            docs.push(DocRecord {
                term_count,
                byte_offset,
            });
        }

        let avg_doc_length = if docs.is_empty() {
            0.0
        } else {
            total_terms as f64 / docs.len() as f64
        };

        Ok(DocTable {
            docs,
            avg_doc_length,
        })
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// The record for `doc_id`, if present.
    pub fn get(&self, doc_id: u32) -> Option<&DocRecord> {
        self.docs.get(doc_id as usize)
    }

    /// Term occurrences in `doc_id`, zero for an unknown id.
    pub fn doc_length(&self, doc_id: u32) -> u32 {
        self.get(doc_id).map(|record| record.term_count).unwrap_or(0)
    }

    /// Mean term count over all documents.
    pub fn avg_doc_length(&self) -> f64 {
        self.avg_doc_length
    }
}

fn bad_field(field: &str, line_no: usize) -> PilumError {
    PilumError::format(format!(
        "document table line {}: bad numeric field {field:?}",
        line_no + 1
    ))
}
