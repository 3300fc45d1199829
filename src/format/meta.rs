//! Build metadata sidecar.

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Statistics recorded at the end of a successful build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Version of the index format.
    pub version: u32,

    /// Number of documents indexed.
    pub doc_count: u64,

    /// Number of distinct terms.
    pub term_count: u64,

    /// Total postings across all terms.
    pub total_postings: u64,

    /// Average document length in term occurrences.
    pub avg_doc_length: f64,

    /// Creation time (seconds since epoch).
    pub created: u64,
}

impl IndexMetadata {
    /// Stamp metadata with the current time.
    pub fn new(doc_count: u64, term_count: u64, total_postings: u64, avg_doc_length: f64) -> Self {
        let created = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        IndexMetadata {
            version: 1,
            doc_count,
            term_count,
            total_postings,
            avg_doc_length,
            created,
        }
    }

    /// Write as pretty-printed JSON.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Read back from JSON.
    pub fn read_from(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
