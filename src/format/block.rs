//! Block directory over the packed posting index.
//!
//! The final index is a sequence of blocks of 128 postings each, with a
//! block's gap bytes preceding its frequency bytes. The directory holds
//! one packed little-endian `(i32 last_doc_id, i64 block_bytes)` record
//! per block; a block's start offset is the sum of the prior sizes.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{PilumError, Result};
use crate::format::POSTINGS_PER_BLOCK;

/// One directory entry describing a finished block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEntry {
    /// Absolute doc id of the last posting in the block.
    pub last_doc_id: u32,

    /// Total bytes of the block, gap half plus frequency half.
    pub byte_len: u64,
}

/// Streaming writer for the packed block directory.
#[derive(Debug)]
pub struct BlockInfoWriter {
    out: BufWriter<File>,
}

impl BlockInfoWriter {
    /// Create the directory file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(BlockInfoWriter {
            out: BufWriter::new(File::create(path)?),
        })
    }

    /// Append one entry as a packed `(i32, i64)` record.
    pub fn push(&mut self, entry: BlockEntry) -> Result<()> {
        self.out.write_i32::<LittleEndian>(entry.last_doc_id as i32)?;
        self.out.write_i64::<LittleEndian>(entry.byte_len as i64)?;
        Ok(())
    }

    /// Flush buffered records before the handle is released.
    pub fn finish(mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Loaded directory with cumulative offsets and block cardinalities.
#[derive(Debug)]
pub struct BlockDirectory {
    entries: Vec<BlockEntry>,
    /// Posting-stream offset at which each block starts.
    starts: Vec<u64>,
    total_postings: u64,
}

impl BlockDirectory {
    /// Load the packed directory and bind it to the index's posting total.
    pub fn load(path: &Path, total_postings: u64) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();

        loop {
            let last_doc_id = match reader.read_i32::<LittleEndian>() {
                Ok(value) => value,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            };
            let byte_len = reader.read_i64::<LittleEndian>()?;
            if last_doc_id < 0 || byte_len <= 0 {
                return Err(PilumError::format(format!(
                    "block {} has a non-positive field",
                    entries.len()
                )));
            }
            entries.push(BlockEntry {
                last_doc_id: last_doc_id as u32,
                byte_len: byte_len as u64,
            });
        }

        Self::new(entries, total_postings)
    }

    /// Build a directory from entries, validating the block count
    /// against `ceil(total_postings / 128)`.
    pub fn new(entries: Vec<BlockEntry>, total_postings: u64) -> Result<Self> {
        let expected = total_postings.div_ceil(POSTINGS_PER_BLOCK as u64) as usize;
        if entries.len() != expected {
            return Err(PilumError::format(format!(
                "block directory has {} entries, posting total {total_postings} implies {expected}",
                entries.len()
            )));
        }

        let mut starts = Vec::with_capacity(entries.len());
        let mut offset = 0u64;
        for entry in &entries {
            starts.push(offset);
            offset += entry.byte_len;
        }

        Ok(BlockDirectory {
            entries,
            starts,
            total_postings,
        })
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total bytes covered by all blocks.
    pub fn total_bytes(&self) -> u64 {
        match (self.starts.last(), self.entries.last()) {
            (Some(start), Some(entry)) => start + entry.byte_len,
            _ => 0,
        }
    }

    /// The entry for block `index`.
    pub fn entry(&self, index: usize) -> &BlockEntry {
        &self.entries[index]
    }

    /// Posting-stream offset at which block `index` starts.
    pub fn start_of(&self, index: usize) -> u64 {
        self.starts[index]
    }

    /// Number of postings in block `index`.
    ///
    /// Every block holds 128 postings except the final one, which holds
    /// the remainder.
    pub fn postings_in(&self, index: usize) -> usize {
        if index + 1 == self.entries.len() {
            (self.total_postings - POSTINGS_PER_BLOCK as u64 * index as u64) as usize
        } else {
            POSTINGS_PER_BLOCK
        }
    }

    /// Find the block containing `offset`: the first block whose
    /// cumulative end exceeds it.
    pub fn locate(&self, offset: u64) -> Option<usize> {
        if offset >= self.total_bytes() {
            return None;
        }
        let index = self.starts.partition_point(|&start| start <= offset);
        Some(index - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entries() -> Vec<BlockEntry> {
        vec![
            BlockEntry {
                last_doc_id: 40,
                byte_len: 300,
            },
            BlockEntry {
                last_doc_id: 90,
                byte_len: 280,
            },
            BlockEntry {
                last_doc_id: 120,
                byte_len: 64,
            },
        ]
    }

    #[test]
    fn test_write_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block_info.bin");

        let entries = sample_entries();
        let mut writer = BlockInfoWriter::create(&path).unwrap();
        for &entry in &entries {
            writer.push(entry).unwrap();
        }
        writer.finish().unwrap();

        // 2 full blocks plus a partial one.
        let directory = BlockDirectory::load(&path, 2 * 128 + 30).unwrap();
        assert_eq!(directory.len(), 3);
        assert_eq!(directory.entry(1), &entries[1]);
        assert_eq!(directory.start_of(0), 0);
        assert_eq!(directory.start_of(1), 300);
        assert_eq!(directory.start_of(2), 580);
        assert_eq!(directory.total_bytes(), 644);
    }

    #[test]
    fn test_block_count_mismatch() {
        assert!(BlockDirectory::new(sample_entries(), 128).is_err());
        assert!(BlockDirectory::new(sample_entries(), 4 * 128).is_err());
    }

    #[test]
    fn test_postings_in() {
        let directory = BlockDirectory::new(sample_entries(), 2 * 128 + 30).unwrap();
        assert_eq!(directory.postings_in(0), 128);
        assert_eq!(directory.postings_in(1), 128);
        assert_eq!(directory.postings_in(2), 30);

        let full = BlockDirectory::new(sample_entries(), 3 * 128).unwrap();
        assert_eq!(full.postings_in(2), 128);
    }

    #[test]
    fn test_locate() {
        let directory = BlockDirectory::new(sample_entries(), 2 * 128 + 30).unwrap();
        assert_eq!(directory.locate(0), Some(0));
        assert_eq!(directory.locate(299), Some(0));
        assert_eq!(directory.locate(300), Some(1));
        assert_eq!(directory.locate(579), Some(1));
        assert_eq!(directory.locate(580), Some(2));
        assert_eq!(directory.locate(643), Some(2));
        assert_eq!(directory.locate(644), None);
    }

    #[test]
    fn test_empty_directory() {
        let directory = BlockDirectory::new(Vec::new(), 0).unwrap();
        assert!(directory.is_empty());
        assert_eq!(directory.total_bytes(), 0);
        assert_eq!(directory.locate(0), None);
    }
}
