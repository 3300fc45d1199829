//! Corpus ingestion: gzipped tar in, final index out.
//!
//! The builder streams each archive entry line by line, feeds the
//! in-memory batch, spills a sorted run whenever the batch crosses its
//! memory cap, then k-way merges the runs into the final index.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::analysis::AsciiAlnumTokenizer;
use crate::error::{PilumError, Result};
use crate::format::docmeta::{DocRecord, DocTableWriter};
use crate::format::meta::IndexMetadata;
use crate::format::{self, run_file_name};
use crate::index::batch::PostingBatch;
use crate::index::{merge, run};

/// Default soft cap on the in-memory posting estimate.
pub const DEFAULT_MEMORY_LIMIT: usize = 800 * 1024 * 1024;

/// Configuration for an index build.
#[derive(Debug, Clone)]
pub struct IndexBuilderConfig {
    /// Soft cap in bytes on the posting + lexicon estimate.
    pub memory_limit: usize,

    /// Directory receiving all output files.
    pub output_dir: PathBuf,
}

impl Default for IndexBuilderConfig {
    fn default() -> Self {
        IndexBuilderConfig {
            memory_limit: DEFAULT_MEMORY_LIMIT,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Statistics from a completed build.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Documents accepted into the index.
    pub doc_count: u64,

    /// Distinct terms in the lexicon.
    pub term_count: u64,

    /// Postings written to the final index.
    pub total_postings: u64,

    /// Sorted runs spilled during the build.
    pub runs_spilled: usize,

    /// Input lines rejected as malformed.
    pub lines_skipped: u64,
}

/// External-merge-sort index builder.
#[derive(Debug)]
pub struct IndexBuilder {
    config: IndexBuilderConfig,
    tokenizer: AsciiAlnumTokenizer,
}

impl IndexBuilder {
    /// Create a builder with the given configuration.
    pub fn new(config: IndexBuilderConfig) -> Self {
        IndexBuilder {
            config,
            tokenizer: AsciiAlnumTokenizer::new(),
        }
    }

    /// Build the full index from a gzipped tar archive.
    ///
    /// On failure every temporary run and partially written output is
    /// removed before the error propagates.
    pub fn build(&self, archive_path: &Path) -> Result<BuildStats> {
        let result = self.build_inner(archive_path);
        if result.is_err() {
            self.remove_outputs();
        }
        result
    }

    fn build_inner(&self, archive_path: &Path) -> Result<BuildStats> {
        let out = &self.config.output_dir;
        let file = File::open(archive_path).map_err(|e| {
            PilumError::archive(format!("cannot open {}: {e}", archive_path.display()))
        })?;
        let mut archive = Archive::new(GzDecoder::new(file));

        let mut batch = PostingBatch::new(self.config.memory_limit);
        let mut doc_table = DocTableWriter::create(&out.join(format::DOC_INFO_FILE))?;
        let mut run_paths: Vec<PathBuf> = Vec::new();
        let mut stats = BuildStats::default();
        let mut total_terms = 0u64;
        // Offset within the decompressed corpus, across entries.
        let mut byte_offset = 0u64;

        let entries = archive
            .entries()
            .map_err(|e| PilumError::archive(format!("cannot read archive: {e}")))?;
        for entry in entries {
            let entry =
                entry.map_err(|e| PilumError::archive(format!("cannot read archive entry: {e}")))?;
            if !entry.header().entry_type().is_file() || entry.size() == 0 {
                continue;
            }

            let mut reader = BufReader::new(entry);
            let mut line_buf = Vec::new();
            loop {
                line_buf.clear();
                let read = reader
                    .read_until(b'\n', &mut line_buf)
                    .map_err(|e| PilumError::archive(format!("error reading archive data: {e}")))?;
                if read == 0 {
                    break;
                }
                let line_offset = byte_offset;
                byte_offset += read as u64;

                if line_buf.last() == Some(&b'\n') {
                    line_buf.pop();
                }
                if line_buf.is_empty() {
                    continue;
                }

                let line = String::from_utf8_lossy(&line_buf);
                match batch.add_line(&line, &self.tokenizer) {
                    Some(line_stats) => {
                        doc_table.push(
                            line_stats.doc_id,
                            DocRecord {
                                term_count: line_stats.term_count,
                                byte_offset: line_offset,
                            },
                        )?;
                        stats.doc_count += 1;
                        total_terms += line_stats.term_count as u64;
                    }
                    None => stats.lines_skipped += 1,
                }

                if batch.should_flush() {
                    self.spill(&mut batch, &mut run_paths)?;
                }
            }
        }

        if batch.has_postings() {
            self.spill(&mut batch, &mut run_paths)?;
        }
        doc_table.finish()?;
        stats.runs_spilled = run_paths.len();

        let merge_stats = merge::merge_runs(
            &run_paths,
            &batch,
            &out.join(format::INDEX_FILE),
            &out.join(format::LEXICON_FILE),
            &out.join(format::BLOCK_INFO_FILE),
        )?;
        stats.term_count = merge_stats.terms_merged;
        stats.total_postings = merge_stats.postings_merged;

        let avg_doc_length = if stats.doc_count > 0 {
            total_terms as f64 / stats.doc_count as f64
        } else {
            0.0
        };
        IndexMetadata::new(
            stats.doc_count,
            stats.term_count,
            stats.total_postings,
            avg_doc_length,
        )
        .write_to(&out.join(format::METADATA_FILE))?;

        log::info!(
            "indexed {} documents, {} terms, {} postings across {} runs ({} lines skipped)",
            stats.doc_count,
            stats.term_count,
            stats.total_postings,
            stats.runs_spilled,
            stats.lines_skipped
        );
        Ok(stats)
    }

    fn spill(&self, batch: &mut PostingBatch, run_paths: &mut Vec<PathBuf>) -> Result<()> {
        let records = batch.drain_sorted();
        if records.is_empty() {
            return Ok(());
        }
        let path = self.config.output_dir.join(run_file_name(run_paths.len()));
        log::debug!("spilling run {} with {} terms", run_paths.len(), records.len());
        run::write_run(&path, &records)?;
        run_paths.push(path);
        Ok(())
    }

    fn remove_outputs(&self) {
        let out = &self.config.output_dir;
        for name in [
            format::INDEX_FILE,
            format::LEXICON_FILE,
            format::BLOCK_INFO_FILE,
            format::DOC_INFO_FILE,
            format::METADATA_FILE,
        ] {
            let _ = std::fs::remove_file(out.join(name));
        }
        // Any runs the failed build left behind.
        for run_id in 0.. {
            if std::fs::remove_file(out.join(run_file_name(run_id))).is_err() {
                break;
            }
        }
    }
}
