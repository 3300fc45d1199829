//! Block-at-a-time cursor over one term's posting range.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{PilumError, Result};
use crate::format::block::BlockDirectory;
use crate::format::lexicon::TermEntry;
use crate::util::varint;

/// Forward-only reader over one term's postings.
///
/// The cursor owns its file handle and decoded block, never seeks
/// backward, and is cheap to construct per query term. Blocks store
/// all gap bytes before all frequency bytes, so a block is decoded
/// whole and each posting's byte cost recorded; the cursor then walks
/// costs to the term's start offset and serves postings until the
/// term's byte range is exhausted.
#[derive(Debug)]
pub struct InvertedListCursor<'a> {
    file: File,
    directory: &'a BlockDirectory,
    start_offset: u64,
    bytes_size: u64,
    consumed: u64,
    /// Index of the next block to load.
    next_block: usize,
    block: DecodedBlock,
    /// Next posting slot within the decoded block.
    pos: usize,
    doc_id: u32,
    freq: u32,
}

#[derive(Debug, Default)]
struct DecodedBlock {
    gaps: Vec<u32>,
    freqs: Vec<u32>,
    /// Byte cost of each posting: gap bytes plus frequency bytes.
    costs: Vec<u32>,
    /// Posting-stream offset of the block start.
    stream_offset: u64,
}

impl<'a> InvertedListCursor<'a> {
    /// Open a cursor over `entry`'s byte range in the index file.
    pub fn open(
        index_path: &Path,
        entry: &TermEntry,
        directory: &'a BlockDirectory,
    ) -> Result<Self> {
        if entry.start_offset + entry.bytes_size > directory.total_bytes() {
            return Err(PilumError::format(format!(
                "posting range {}..{} lies outside the index ({} bytes)",
                entry.start_offset,
                entry.start_offset + entry.bytes_size,
                directory.total_bytes()
            )));
        }
        let Some(start_block) = directory.locate(entry.start_offset) else {
            return Err(PilumError::format(format!(
                "no block covers posting offset {}",
                entry.start_offset
            )));
        };

        let mut cursor = InvertedListCursor {
            file: File::open(index_path)?,
            directory,
            start_offset: entry.start_offset,
            bytes_size: entry.bytes_size,
            consumed: 0,
            next_block: start_block,
            block: DecodedBlock::default(),
            pos: 0,
            doc_id: 0,
            freq: 0,
        };
        cursor.load_block()?;
        cursor.seek_to_start()?;
        Ok(cursor)
    }

    /// Advance one posting. Returns `false` once the term's byte range
    /// is exhausted.
    pub fn next(&mut self) -> Result<bool> {
        if self.consumed >= self.bytes_size {
            return Ok(false);
        }
        if self.pos >= self.block.gaps.len() {
            self.load_block()?;
        }

        let pos = self.pos;
        let cost = self.block.costs[pos] as u64;
        if self.consumed + cost > self.bytes_size {
            return Err(PilumError::format("posting range ends inside a posting"));
        }

        self.doc_id += self.block.gaps[pos];
        self.freq = self.block.freqs[pos];
        self.consumed += cost;
        self.pos = pos + 1;
        Ok(true)
    }

    /// Absolute doc id of the current posting.
    pub fn doc_id(&self) -> u32 {
        self.doc_id
    }

    /// Term frequency within the current document.
    pub fn term_freq(&self) -> u32 {
        self.freq
    }

    /// Total bytes of the term's postings.
    pub fn size(&self) -> u64 {
        self.bytes_size
    }

    /// Decode the next block into gap, frequency, and cost arrays.
    fn load_block(&mut self) -> Result<()> {
        if self.next_block >= self.directory.len() {
            return Err(PilumError::format(
                "posting range extends past the last block",
            ));
        }
        let index = self.next_block;
        let byte_len = self.directory.entry(index).byte_len as usize;
        let stream_offset = self.directory.start_of(index);
        let cardinality = self.directory.postings_in(index);

        // Whole blocks are flushed contiguously, so the stream offset is
        // also the file offset.
        let mut raw = vec![0u8; byte_len];
        self.file.seek(SeekFrom::Start(stream_offset))?;
        self.file.read_exact(&mut raw)?;

        let mut gaps = Vec::with_capacity(cardinality);
        let mut freqs = Vec::with_capacity(cardinality);
        let mut costs = Vec::with_capacity(cardinality);
        let mut pos = 0usize;
        for _ in 0..cardinality {
            let (gap, used) = varint::decode_u32(&raw[pos..])?;
            gaps.push(gap);
            costs.push(used as u32);
            pos += used;
        }
        for slot in 0..cardinality {
            let (freq, used) = varint::decode_u32(&raw[pos..])?;
            freqs.push(freq);
            costs[slot] += used as u32;
            pos += used;
        }
        if pos != raw.len() {
            return Err(PilumError::format(format!(
                "block {index} holds {} postings in {} bytes but decodes {pos}",
                cardinality,
                raw.len()
            )));
        }

        self.block = DecodedBlock {
            gaps,
            freqs,
            costs,
            stream_offset,
        };
        self.pos = 0;
        self.next_block = index + 1;
        Ok(())
    }

    /// Walk per-posting costs to the term's first posting.
    fn seek_to_start(&mut self) -> Result<()> {
        let mut offset = self.block.stream_offset;
        let mut pos = 0usize;
        while offset < self.start_offset {
            let Some(&cost) = self.block.costs.get(pos) else {
                return Err(PilumError::format(
                    "posting start offset not reachable within its block",
                ));
            };
            offset += cost as u64;
            pos += 1;
        }
        if offset != self.start_offset {
            return Err(PilumError::format("posting start offset splits a posting"));
        }
        self.pos = pos;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AsciiAlnumTokenizer;
    use crate::format;
    use crate::format::lexicon::Lexicon;
    use crate::index::batch::PostingBatch;
    use crate::index::{merge, run};

    struct Fixture {
        lexicon: Lexicon,
        directory: BlockDirectory,
        index_path: std::path::PathBuf,
        _dir: tempfile::TempDir,
    }

    fn build_fixture(lines: &[String]) -> Fixture {
        let tokenizer = AsciiAlnumTokenizer::new();
        let mut batch = PostingBatch::new(usize::MAX);
        for line in lines {
            batch.add_line(line, &tokenizer).unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let run_path = dir.path().join(format::run_file_name(0));
        run::write_run(&run_path, &batch.drain_sorted()).unwrap();

        let index_path = dir.path().join(format::INDEX_FILE);
        let lexicon_path = dir.path().join(format::LEXICON_FILE);
        let block_info_path = dir.path().join(format::BLOCK_INFO_FILE);
        let stats = merge::merge_runs(
            &[run_path],
            &batch,
            &index_path,
            &lexicon_path,
            &block_info_path,
        )
        .unwrap();

        let lexicon = Lexicon::load(&lexicon_path).unwrap();
        let directory = BlockDirectory::load(&block_info_path, stats.postings_merged).unwrap();
        Fixture {
            lexicon,
            directory,
            index_path,
            _dir: dir,
        }
    }

    fn collect(fixture: &Fixture, term: &str) -> Vec<(u32, u32)> {
        let entry = fixture.lexicon.get(term).unwrap();
        let mut cursor =
            InvertedListCursor::open(&fixture.index_path, entry, &fixture.directory).unwrap();
        let mut postings = Vec::new();
        while cursor.next().unwrap() {
            postings.push((cursor.doc_id(), cursor.term_freq()));
        }
        postings
    }

    #[test]
    fn test_iterates_exact_postings() {
        let lines = vec![
            "0 the quick brown fox".to_string(),
            "1 the lazy dog".to_string(),
            "2 quick brown dog".to_string(),
        ];
        let fixture = build_fixture(&lines);

        assert_eq!(collect(&fixture, "the"), vec![(0, 1), (1, 1)]);
        assert_eq!(collect(&fixture, "quick"), vec![(0, 1), (2, 1)]);
        assert_eq!(collect(&fixture, "dog"), vec![(1, 1), (2, 1)]);
        assert_eq!(collect(&fixture, "fox"), vec![(0, 1)]);
    }

    #[test]
    fn test_term_straddling_blocks() {
        // One ubiquitous term plus per-doc noise pushes its list across
        // several 128-posting blocks.
        let lines: Vec<String> = (0..300).map(|i| format!("{i} common w{i}")).collect();
        let fixture = build_fixture(&lines);

        let entry = fixture.lexicon.get("common").unwrap();
        assert_eq!(entry.posting_count, 300);

        let cursor =
            InvertedListCursor::open(&fixture.index_path, entry, &fixture.directory).unwrap();
        assert_eq!(cursor.size(), entry.bytes_size);

        let postings = collect(&fixture, "common");
        assert_eq!(postings.len(), 300);
        for (i, &(doc_id, freq)) in postings.iter().enumerate() {
            assert_eq!(doc_id, i as u32);
            assert_eq!(freq, 1);
        }
    }

    #[test]
    fn test_mid_stream_term_starts_exactly() {
        let lines: Vec<String> = (0..150)
            .map(|i| format!("{i} aaa mmm zzz"))
            .collect();
        let fixture = build_fixture(&lines);

        // "mmm" starts after the 150 postings of "aaa", inside a block.
        let postings = collect(&fixture, "mmm");
        assert_eq!(postings.len(), 150);
        let docs: Vec<u32> = postings.iter().map(|&(doc, _)| doc).collect();
        let mut sorted = docs.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(docs, sorted, "doc ids strictly increase");
    }

    #[test]
    fn test_range_outside_index_is_rejected() {
        let lines = vec!["0 alpha beta".to_string()];
        let fixture = build_fixture(&lines);

        let bogus = TermEntry {
            term_id: 99,
            posting_count: 1,
            start_offset: 0,
            bytes_size: 10_000,
        };
        assert!(InvertedListCursor::open(&fixture.index_path, &bogus, &fixture.directory).is_err());
    }

    #[test]
    fn test_misaligned_start_is_rejected() {
        let lines: Vec<String> = (0..4).map(|i| format!("{i} alpha beta")).collect();
        let fixture = build_fixture(&lines);

        let real = fixture.lexicon.get("beta").unwrap().clone();
        let misaligned = TermEntry {
            start_offset: real.start_offset + 1,
            ..real
        };
        assert!(
            InvertedListCursor::open(&fixture.index_path, &misaligned, &fixture.directory)
                .is_err()
        );
    }
}
