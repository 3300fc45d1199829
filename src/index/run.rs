//! Sorted run files spilled by the builder.
//!
//! A run holds one batch's posting lists in term-string order. Each
//! record is varbyte(term_id), varbyte(posting_count), then
//! posting_count pairs of varbyte(gap), varbyte(freq).

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{PilumError, Result};
use crate::util::varint;

/// One decoded run record: a term's postings from a single batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    /// The term's build-time id.
    pub term_id: u32,

    /// Gap-encoded postings in doc order.
    pub postings: Vec<(u32, u32)>,
}

/// Write one batch's records, already sorted by term string.
pub fn write_run(path: &Path, records: &[(u32, Vec<(u32, u32)>)]) -> Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    let mut buf = Vec::new();

    for (term_id, postings) in records {
        buf.clear();
        varint::encode_u32_into(*term_id, &mut buf);
        varint::encode_u32_into(postings.len() as u32, &mut buf);
        for &(gap, freq) in postings {
            varint::encode_u32_into(gap, &mut buf);
            varint::encode_u32_into(freq, &mut buf);
        }
        out.write_all(&buf)?;
    }

    out.flush()?;
    Ok(())
}

/// Sequential reader over one run file.
#[derive(Debug)]
pub struct RunReader {
    reader: BufReader<File>,
    run_id: usize,
}

impl RunReader {
    /// Open run `run_id` at `path`.
    pub fn open(path: &Path, run_id: usize) -> Result<Self> {
        Ok(RunReader {
            reader: BufReader::new(File::open(path)?),
            run_id,
        })
    }

    /// The run's sequence number.
    pub fn run_id(&self) -> usize {
        self.run_id
    }

    /// Decode the next record, or `None` at a clean end of file.
    ///
    /// EOF inside a record means the run is corrupt, which is fatal for
    /// the build.
    pub fn next_record(&mut self) -> Result<Option<RunRecord>> {
        let term_id = match varint::read_u32_opt(&mut self.reader)? {
            Some(id) => id,
            None => return Ok(None),
        };

        let count = self.read_field()?;
        let mut postings = Vec::with_capacity(count.min(4096) as usize);
        for _ in 0..count {
            let gap = self.read_field()?;
            let freq = self.read_field()?;
            postings.push((gap, freq));
        }

        Ok(Some(RunRecord { term_id, postings }))
    }

    fn read_field(&mut self) -> Result<u32> {
        varint::read_u32(&mut self.reader).map_err(|e| {
            PilumError::index(format!("run {} is corrupt: {e}", self.run_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp_index_0.bin");

        let records = vec![
            (3u32, vec![(0u32, 2u32), (5, 1)]),
            (0, vec![(4, 1)]),
            (7, vec![(1, 9), (200, 1), (1000, 3)]),
        ];
        write_run(&path, &records).unwrap();

        let mut reader = RunReader::open(&path, 0).unwrap();
        for (term_id, postings) in &records {
            let record = reader.next_record().unwrap().unwrap();
            assert_eq!(record.term_id, *term_id);
            assert_eq!(&record.postings, postings);
        }
        assert!(reader.next_record().unwrap().is_none());
        // A drained run keeps returning None.
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_empty_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp_index_0.bin");

        write_run(&path, &[]).unwrap();
        let mut reader = RunReader::open(&path, 0).unwrap();
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_truncated_record_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp_index_0.bin");

        // term_id 1, count 2, but only one complete pair follows.
        let mut bytes = Vec::new();
        varint::encode_u32_into(1, &mut bytes);
        varint::encode_u32_into(2, &mut bytes);
        varint::encode_u32_into(3, &mut bytes);
        varint::encode_u32_into(1, &mut bytes);
        std::fs::write(&path, &bytes).unwrap();

        let mut reader = RunReader::open(&path, 4).unwrap();
        let err = reader.next_record().unwrap_err();
        assert!(err.to_string().contains("run 4"));
    }
}
