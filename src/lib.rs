pub mod chunker;
pub mod config;
pub mod error;
pub mod provider;
pub mod rag;
pub mod search;
pub mod store;
pub mod vector_entry;
pub mod vector_ops;

pub use crate::chunker::{chunk_document, Chunker, ChunkingOptions};
pub use crate::config::{Number, Settings};
pub use crate::error::{Error, Result};
pub use crate::provider::{ChatMessage, Embedder, GenerationOptions, Generator, Role};
pub use crate::rag::{IndexReport, RagOptions, RagPipeline, RetrievedContext, Retrieval};
pub use crate::search::SimilarityResult;
pub use crate::store::{IndexingStatus, StoreStats, VectorStore};
pub use crate::vector_entry::{EntryMetadata, Fragment, VectorEntry};
