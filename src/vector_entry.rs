use crate::config::Number;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A bounded slice of one document's text, the unit of embedding and retrieval.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Fragment {
    pub id: String,
    pub content: String,
    pub file_name: String,
    pub chunk_index: usize,
    /// First character of the fragment in the newline-normalized source.
    pub start_char: usize,
    /// One past the last character of the fragment in the normalized source.
    pub end_char: usize,
}

impl Fragment {
    pub fn fragment_id(file_name: &str, chunk_index: usize) -> String {
        format!("{}-chunk-{}", file_name, chunk_index)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EntryMetadata {
    pub file_name: String,
    pub processed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl EntryMetadata {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            processed_at: Utc::now(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VectorEntry {
    pub id: String,
    pub embedding: Vec<Number>,
    pub fragment: Fragment,
    pub metadata: EntryMetadata,
}

impl VectorEntry {
    pub fn file_name(&self) -> &str {
        &self.fragment.file_name
    }

    pub fn chunk_index(&self) -> usize {
        self.fragment.chunk_index
    }
}
