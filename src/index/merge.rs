//! K-way merge of run files into the block-packed final index.
//!
//! A min-heap holds each open run's front record, ordered by term
//! string so the merged posting stream comes out term-sorted. Ties on
//! equal terms break by run id ascending: gap chains continue across
//! spills, so a term's records must concatenate in spill order.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{PilumError, Result};
use crate::format::block::{BlockEntry, BlockInfoWriter};
use crate::format::lexicon::{LexiconWriter, TermEntry};
use crate::format::POSTINGS_PER_BLOCK;
use crate::index::batch::PostingBatch;
use crate::index::run::{RunReader, RunRecord};
use crate::util::varint;

/// Heap entry holding one run's front record.
#[derive(Debug)]
struct HeapEntry {
    term: String,
    run_id: usize,
    record: RunRecord,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.term == other.term && self.run_id == other.run_id
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.term
            .cmp(&other.term)
            .then(self.run_id.cmp(&other.run_id))
    }
}

/// Packs postings into 128-posting blocks with split gap and frequency
/// halves, tracking the posting-stream offset.
#[derive(Debug)]
pub struct BlockAssembler {
    out: BufWriter<File>,
    blocks: BlockInfoWriter,
    gap_buf: Vec<u8>,
    freq_buf: Vec<u8>,
    postings_in_block: usize,
    running_doc_id: u32,
    bytes_flushed: u64,
    total_postings: u64,
}

impl BlockAssembler {
    /// Create the index and block-directory files.
    pub fn new(index_path: &Path, block_info_path: &Path) -> Result<Self> {
        Ok(BlockAssembler {
            out: BufWriter::new(File::create(index_path)?),
            blocks: BlockInfoWriter::create(block_info_path)?,
            gap_buf: Vec::new(),
            freq_buf: Vec::new(),
            postings_in_block: 0,
            running_doc_id: 0,
            bytes_flushed: 0,
            total_postings: 0,
        })
    }

    /// Posting-stream offset of the next byte to be appended.
    pub fn offset(&self) -> u64 {
        self.bytes_flushed + (self.gap_buf.len() + self.freq_buf.len()) as u64
    }

    /// Reset the running doc id at a term boundary.
    pub fn begin_term(&mut self) {
        self.running_doc_id = 0;
    }

    /// Append one posting, flushing a block when full.
    pub fn push(&mut self, gap: u32, freq: u32) -> Result<()> {
        varint::encode_u32_into(gap, &mut self.gap_buf);
        varint::encode_u32_into(freq, &mut self.freq_buf);
        self.running_doc_id += gap;
        self.postings_in_block += 1;
        self.total_postings += 1;

        if self.postings_in_block == POSTINGS_PER_BLOCK {
            self.flush_block()?;
        }
        Ok(())
    }

    fn flush_block(&mut self) -> Result<()> {
        let byte_len = (self.gap_buf.len() + self.freq_buf.len()) as u64;
        self.out.write_all(&self.gap_buf)?;
        self.out.write_all(&self.freq_buf)?;
        self.blocks.push(BlockEntry {
            last_doc_id: self.running_doc_id,
            byte_len,
        })?;
        self.bytes_flushed += byte_len;
        self.gap_buf.clear();
        self.freq_buf.clear();
        self.postings_in_block = 0;
        Ok(())
    }

    /// Flush the final partial block and both output files.
    ///
    /// Returns the total posting count.
    pub fn finish(mut self) -> Result<u64> {
        if self.postings_in_block > 0 {
            self.flush_block()?;
        }
        self.out.flush()?;
        self.blocks.finish()?;
        Ok(self.total_postings)
    }
}

/// Statistics from a completed merge.
#[derive(Debug, Clone, Default)]
pub struct MergeStats {
    /// Distinct terms written to the lexicon.
    pub terms_merged: u64,

    /// Postings written to the index.
    pub postings_merged: u64,

    /// Blocks emitted to the directory.
    pub blocks_written: u64,
}

/// Merge all runs into the final index, lexicon, and block directory.
///
/// Run files are deleted on success. On failure the partially written
/// outputs and the runs are removed before the error propagates.
pub fn merge_runs(
    run_paths: &[PathBuf],
    batch: &PostingBatch,
    index_path: &Path,
    lexicon_path: &Path,
    block_info_path: &Path,
) -> Result<MergeStats> {
    match merge_runs_inner(run_paths, batch, index_path, lexicon_path, block_info_path) {
        Ok(stats) => {
            for path in run_paths {
                let _ = std::fs::remove_file(path);
            }
            Ok(stats)
        }
        Err(e) => {
            for path in [index_path, lexicon_path, block_info_path] {
                let _ = std::fs::remove_file(path);
            }
            for path in run_paths {
                let _ = std::fs::remove_file(path);
            }
            Err(e)
        }
    }
}

fn merge_runs_inner(
    run_paths: &[PathBuf],
    batch: &PostingBatch,
    index_path: &Path,
    lexicon_path: &Path,
    block_info_path: &Path,
) -> Result<MergeStats> {
    let terms = batch.terms();
    let mut assembler = BlockAssembler::new(index_path, block_info_path)?;
    let mut lexicon_out = LexiconWriter::create(lexicon_path)?;

    let mut heap = BinaryHeap::new();
    let mut readers = Vec::with_capacity(run_paths.len());
    for (run_id, path) in run_paths.iter().enumerate() {
        let mut reader = RunReader::open(path, run_id)?;
        if let Some(record) = reader.next_record()? {
            heap.push(Reverse(heap_entry(record, run_id, terms)?));
        }
        readers.push(reader);
    }

    let mut stats = MergeStats::default();
    // The term currently being assembled and its start offset.
    let mut current: Option<(u32, u64)> = None;

    while let Some(Reverse(entry)) = heap.pop() {
        let HeapEntry { run_id, record, .. } = entry;

        if current.map(|(term_id, _)| term_id) != Some(record.term_id) {
            if let Some((term_id, start)) = current {
                finalize_term(&mut lexicon_out, batch, term_id, start, assembler.offset())?;
                stats.terms_merged += 1;
            }
            assembler.begin_term();
            current = Some((record.term_id, assembler.offset()));
        }

        for (gap, freq) in record.postings {
            assembler.push(gap, freq)?;
        }

        if let Some(next) = readers[run_id].next_record()? {
            heap.push(Reverse(heap_entry(next, run_id, terms)?));
        }
    }

    if let Some((term_id, start)) = current {
        finalize_term(&mut lexicon_out, batch, term_id, start, assembler.offset())?;
        stats.terms_merged += 1;
    }

    stats.postings_merged = assembler.finish()?;
    stats.blocks_written = stats.postings_merged.div_ceil(POSTINGS_PER_BLOCK as u64);
    lexicon_out.finish()?;

    log::debug!(
        "merged {} runs into {} terms, {} postings, {} blocks",
        run_paths.len(),
        stats.terms_merged,
        stats.postings_merged,
        stats.blocks_written
    );
    Ok(stats)
}

fn heap_entry(record: RunRecord, run_id: usize, terms: &[String]) -> Result<HeapEntry> {
    let term = terms.get(record.term_id as usize).cloned().ok_or_else(|| {
        PilumError::index(format!(
            "run {run_id} references unknown term id {}",
            record.term_id
        ))
    })?;
    Ok(HeapEntry {
        term,
        run_id,
        record,
    })
}

fn finalize_term(
    out: &mut LexiconWriter,
    batch: &PostingBatch,
    term_id: u32,
    start: u64,
    end: u64,
) -> Result<()> {
    let entry = TermEntry {
        term_id,
        posting_count: batch.posting_count(term_id),
        start_offset: start,
        bytes_size: end - start,
    };
    out.write_entry(&batch.terms()[term_id as usize], &entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AsciiAlnumTokenizer;
    use crate::format;
    use crate::format::block::BlockDirectory;
    use crate::format::lexicon::Lexicon;
    use crate::index::run;
    use crate::util::varint::decode_u32;

    struct Merged {
        lexicon: Lexicon,
        directory: BlockDirectory,
        index_bytes: Vec<u8>,
        _dir: tempfile::TempDir,
    }

    /// Feed each line group into the batch, spill it as a run, then merge.
    fn merge_spills(batch: &mut PostingBatch, spill_lines: &[&[&str]]) -> Merged {
        let tokenizer = AsciiAlnumTokenizer::new();
        let dir = tempfile::tempdir().unwrap();
        let mut run_paths = Vec::new();

        for lines in spill_lines {
            for line in *lines {
                batch.add_line(line, &tokenizer).unwrap();
            }
            let records = batch.drain_sorted();
            let path = dir.path().join(format::run_file_name(run_paths.len()));
            run::write_run(&path, &records).unwrap();
            run_paths.push(path);
        }

        let index_path = dir.path().join(format::INDEX_FILE);
        let lexicon_path = dir.path().join(format::LEXICON_FILE);
        let block_info_path = dir.path().join(format::BLOCK_INFO_FILE);
        let stats = merge_runs(&run_paths, batch, &index_path, &lexicon_path, &block_info_path)
            .unwrap();

        for path in &run_paths {
            assert!(!path.exists(), "run file should be deleted after merge");
        }

        let lexicon = Lexicon::load(&lexicon_path).unwrap();
        assert_eq!(lexicon.total_postings(), stats.postings_merged);
        let directory = BlockDirectory::load(&block_info_path, stats.postings_merged).unwrap();
        assert_eq!(directory.len() as u64, stats.blocks_written);
        let index_bytes = std::fs::read(&index_path).unwrap();

        Merged {
            lexicon,
            directory,
            index_bytes,
            _dir: dir,
        }
    }

    /// Decode the whole index into (doc_id, freq) pairs per posting slot.
    fn decode_postings(merged: &Merged) -> Vec<(u32, u32)> {
        let mut pairs = Vec::new();
        let mut offset = 0usize;
        for index in 0..merged.directory.len() {
            let cardinality = merged.directory.postings_in(index);
            let block = &merged.index_bytes
                [offset..offset + merged.directory.entry(index).byte_len as usize];
            let mut pos = 0usize;
            let mut gaps = Vec::new();
            for _ in 0..cardinality {
                let (gap, used) = decode_u32(&block[pos..]).unwrap();
                gaps.push(gap);
                pos += used;
            }
            for &gap in gaps.iter().take(cardinality) {
                let (freq, used) = decode_u32(&block[pos..]).unwrap();
                pairs.push((gap, freq));
                pos += used;
            }
            assert_eq!(pos, block.len(), "block decodes exactly its byte length");
            offset += block.len();
        }
        pairs
    }

    #[test]
    fn test_merge_two_runs() {
        let mut batch = PostingBatch::new(usize::MAX);
        let merged = merge_spills(
            &mut batch,
            &[
                &["0 cherry apple", "1 apple"],
                &["2 banana apple", "3 cherry"],
            ],
        );

        assert_eq!(merged.lexicon.len(), 3);

        let apple = merged.lexicon.get("apple").unwrap();
        assert_eq!(apple.posting_count, 3);
        assert_eq!(apple.start_offset, 0);

        let banana = merged.lexicon.get("banana").unwrap();
        assert_eq!(banana.posting_count, 1);
        assert_eq!(banana.start_offset, apple.start_offset + apple.bytes_size);

        let cherry = merged.lexicon.get("cherry").unwrap();
        assert_eq!(cherry.posting_count, 2);
        assert_eq!(cherry.start_offset, banana.start_offset + banana.bytes_size);

        // apple in docs 0,1,2; banana in 2; cherry in 0,3. Gaps per term.
        let pairs = decode_postings(&merged);
        assert_eq!(
            pairs,
            vec![(0, 1), (1, 1), (1, 1), (2, 1), (0, 1), (3, 1)]
        );
    }

    #[test]
    fn test_lexicon_order_and_spans_cover_index() {
        let mut batch = PostingBatch::new(usize::MAX);
        let merged = merge_spills(
            &mut batch,
            &[&["0 delta bravo", "1 echo"], &["2 alpha bravo charlie"]],
        );

        let mut entries: Vec<(&str, u64, u64)> = merged
            .lexicon
            .iter()
            .map(|(term, entry)| (term, entry.start_offset, entry.bytes_size))
            .collect();
        entries.sort_by_key(|&(_, start, _)| start);

        // Emission order is lexicographic and the spans tile the stream.
        let terms: Vec<&str> = entries.iter().map(|&(term, _, _)| term).collect();
        assert_eq!(terms, vec!["alpha", "bravo", "charlie", "delta", "echo"]);

        let mut expected_start = 0u64;
        for &(_, start, size) in &entries {
            assert_eq!(start, expected_start);
            expected_start += size;
        }
        assert_eq!(expected_start, merged.index_bytes.len() as u64);
        assert_eq!(merged.directory.total_bytes(), expected_start);
    }

    #[test]
    fn test_blocks_split_at_128_postings() {
        let tokenizer = AsciiAlnumTokenizer::new();
        let mut batch = PostingBatch::new(usize::MAX);
        for i in 0..200 {
            let line = format!("{i} common w{i}");
            batch.add_line(&line, &tokenizer).unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let records = batch.drain_sorted();
        let run_path = dir.path().join(format::run_file_name(0));
        run::write_run(&run_path, &records).unwrap();

        let index_path = dir.path().join(format::INDEX_FILE);
        let lexicon_path = dir.path().join(format::LEXICON_FILE);
        let block_info_path = dir.path().join(format::BLOCK_INFO_FILE);
        let stats = merge_runs(
            &[run_path],
            &batch,
            &index_path,
            &lexicon_path,
            &block_info_path,
        )
        .unwrap();

        // 200 docs × 2 terms each.
        assert_eq!(stats.postings_merged, 400);
        assert_eq!(stats.blocks_written, 4);
        assert_eq!(stats.terms_merged, 201);

        let directory = BlockDirectory::load(&block_info_path, 400).unwrap();
        assert_eq!(directory.postings_in(3), 400 - 3 * 128);
    }

    #[test]
    fn test_merge_no_runs_produces_empty_outputs() {
        let batch = PostingBatch::new(usize::MAX);
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join(format::INDEX_FILE);
        let lexicon_path = dir.path().join(format::LEXICON_FILE);
        let block_info_path = dir.path().join(format::BLOCK_INFO_FILE);

        let stats =
            merge_runs(&[], &batch, &index_path, &lexicon_path, &block_info_path).unwrap();
        assert_eq!(stats.terms_merged, 0);
        assert_eq!(stats.postings_merged, 0);
        assert_eq!(std::fs::read(&index_path).unwrap().len(), 0);
        assert!(Lexicon::load(&lexicon_path).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_run_removes_outputs() {
        let tokenizer = AsciiAlnumTokenizer::new();
        let mut batch = PostingBatch::new(usize::MAX);
        batch.add_line("0 alpha", &tokenizer).unwrap();
        batch.drain_sorted();

        let dir = tempfile::tempdir().unwrap();
        let run_path = dir.path().join(format::run_file_name(0));
        // A record that claims two postings but holds none.
        std::fs::write(&run_path, [0x00, 0x02]).unwrap();

        let index_path = dir.path().join(format::INDEX_FILE);
        let lexicon_path = dir.path().join(format::LEXICON_FILE);
        let block_info_path = dir.path().join(format::BLOCK_INFO_FILE);
        let result = merge_runs(
            &[run_path.clone()],
            &batch,
            &index_path,
            &lexicon_path,
            &block_info_path,
        );

        assert!(result.is_err());
        assert!(!index_path.exists());
        assert!(!lexicon_path.exists());
        assert!(!block_info_path.exists());
        assert!(!run_path.exists());
    }
}
