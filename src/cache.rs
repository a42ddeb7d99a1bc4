// 🗃️ Dataset Cache - parse each uploaded file once
// Keyed by the SHA-256 of the reader format and file bytes

use crate::error::Result;
use crate::loader::{load_exposures, InputFormat};
use crate::record::Exposure;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::Arc;

/// Hex SHA-256 over the reader format and the uploaded bytes.
///
/// The same bytes read as CSV and as a workbook give different datasets,
/// so the format is part of the identity.
pub fn content_key(bytes: &[u8], format: InputFormat) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// A parsed upload.
///
/// `file_name` is the name it was first loaded under; callers that upload
/// identical bytes under another name keep their own name.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub key: String,
    pub file_name: String,
    pub exposures: Vec<Exposure>,
}

impl Dataset {
    /// Parse an upload without touching any cache.
    pub fn load(bytes: &[u8], file_name: &str) -> Result<Self> {
        let key = content_key(bytes, InputFormat::from_file_name(file_name));
        let exposures = load_exposures(bytes, file_name)?;

        Ok(Dataset {
            key,
            file_name: file_name.to_string(),
            exposures,
        })
    }

    pub fn len(&self) -> usize {
        self.exposures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exposures.is_empty()
    }
}

/// Bounded, insertion-ordered cache; the oldest dataset is evicted first.
#[derive(Debug)]
pub struct DatasetCache {
    capacity: usize,
    entries: VecDeque<Arc<Dataset>>,
}

impl DatasetCache {
    pub fn new(capacity: usize) -> Self {
        DatasetCache {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Return the cached dataset for these bytes, parsing them on a miss.
    /// A failed parse leaves the cache untouched.
    pub fn get_or_load(&mut self, bytes: &[u8], file_name: &str) -> Result<Arc<Dataset>> {
        let key = content_key(bytes, InputFormat::from_file_name(file_name));

        if let Some(hit) = self.get(&key) {
            tracing::debug!(key = %key, file = file_name, "dataset cache hit");
            return Ok(hit);
        }

        tracing::debug!(key = %key, file = file_name, "dataset cache miss");
        Ok(self.insert(Dataset::load(bytes, file_name)?))
    }

    /// Store a parsed dataset. If an entry with the same key arrived first
    /// (two concurrent uploads of one file), that entry wins.
    pub fn insert(&mut self, dataset: Dataset) -> Arc<Dataset> {
        if let Some(existing) = self.get(&dataset.key) {
            return existing;
        }

        if self.entries.len() >= self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                tracing::debug!(key = %evicted.key, "dataset evicted");
            }
        }

        let dataset = Arc::new(dataset);
        self.entries.push_back(Arc::clone(&dataset));
        dataset
    }

    pub fn get(&self, key: &str) -> Option<Arc<Dataset>> {
        self.entries.iter().find(|d| d.key == key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DatasetCache {
    fn default() -> Self {
        Self::new(1)
    }
}
