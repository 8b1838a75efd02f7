use crate::config::Number;
use crate::vector_entry::{EntryMetadata, Fragment, VectorEntry};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory vector store keyed by fragment id.
///
/// Every mutation holds the write lock for its whole duration and every read
/// works on a snapshot taken under the read lock, so concurrent indexing of
/// different files never observes a half-applied change.
#[derive(Debug, Default)]
pub struct VectorStore {
    entries: RwLock<HashMap<String, Arc<VectorEntry>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_vectors: usize,
    pub total_files: usize,
    pub file_names: Vec<String>,
    pub average_chunks_per_file: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingStatus {
    pub total_indexed_files: usize,
    pub indexed_file_names: Vec<String>,
    pub total_chunks: usize,
    /// Rounded to two decimals.
    pub average_chunks_per_file: f64,
}

impl From<StoreStats> for IndexingStatus {
    fn from(stats: StoreStats) -> Self {
        Self {
            total_indexed_files: stats.total_files,
            indexed_file_names: stats.file_names,
            total_chunks: stats.total_vectors,
            average_chunks_per_file: (stats.average_chunks_per_file * 100.0).round() / 100.0,
        }
    }
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<VectorEntry>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<VectorEntry>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace the entry stored under `id`.
    pub fn insert(
        &self,
        id: impl Into<String>,
        embedding: Vec<Number>,
        fragment: Fragment,
        metadata: EntryMetadata,
    ) {
        self.insert_entry(VectorEntry {
            id: id.into(),
            embedding,
            fragment,
            metadata,
        });
    }

    pub fn insert_entry(&self, entry: VectorEntry) {
        let id = entry.id.clone();
        if self.write().insert(id.clone(), Arc::new(entry)).is_some() {
            debug!("Replaced vector entry '{}'", id);
        }
    }

    /// Upsert each entry in turn under a single lock acquisition.
    pub fn insert_many<I>(&self, entries: I)
    where
        I: IntoIterator<Item = VectorEntry>,
    {
        let mut map = self.write();
        for entry in entries {
            map.insert(entry.id.clone(), Arc::new(entry));
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<VectorEntry>> {
        self.read().get(id).cloned()
    }

    /// Returns whether an entry was removed.
    pub fn remove_by_id(&self, id: &str) -> bool {
        self.write().remove(id).is_some()
    }

    /// Returns the number of entries removed.
    pub fn remove_by_file_name(&self, file_name: &str) -> usize {
        let mut map = self.write();
        let before = map.len();
        map.retain(|_, entry| entry.file_name() != file_name);
        before - map.len()
    }

    /// Entries of one file, ordered by `chunk_index`.
    pub fn list_by_file_name(&self, file_name: &str) -> Vec<Arc<VectorEntry>> {
        let mut entries: Vec<Arc<VectorEntry>> = self
            .read()
            .values()
            .filter(|entry| entry.file_name() == file_name)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.chunk_index().cmp(&b.chunk_index()).then_with(|| a.id.cmp(&b.id)));
        entries
    }

    pub fn is_file_indexed(&self, file_name: &str) -> bool {
        self.read()
            .values()
            .any(|entry| entry.file_name() == file_name)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn list_file_names(&self) -> BTreeSet<String> {
        self.read()
            .values()
            .map(|entry| entry.file_name().to_string())
            .collect()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn stats(&self) -> StoreStats {
        let map = self.read();
        let file_names: BTreeSet<&str> = map.values().map(|entry| entry.file_name()).collect();
        let total_vectors = map.len();
        let total_files = file_names.len();
        let average_chunks_per_file = if total_files == 0 {
            0.0
        } else {
            total_vectors as f64 / total_files as f64
        };

        StoreStats {
            total_vectors,
            total_files,
            file_names: file_names.into_iter().map(str::to_string).collect(),
            average_chunks_per_file,
        }
    }

    pub fn indexing_status(&self) -> IndexingStatus {
        self.stats().into()
    }

    /// Shared handles to the entries matching `file_name_filter`, taken under
    /// one read lock.
    pub(crate) fn snapshot(&self, file_name_filter: Option<&str>) -> Vec<Arc<VectorEntry>> {
        self.read()
            .values()
            .filter(|entry| file_name_filter.map_or(true, |name| entry.file_name() == name))
            .cloned()
            .collect()
    }
}
