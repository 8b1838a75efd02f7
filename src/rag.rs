//! Retrieval-augmented answering over one document at a time.
//!
//! A request indexes the document on first sight, embeds the query, ranks the
//! document's fragments, walks the fallback ladder when nothing ranks, and
//! hands the assembled excerpts to the generator.

use crate::chunker::{Chunker, ChunkingOptions};
use crate::config::Number;
use crate::error::{Error, Result};
use crate::provider::{ChatMessage, Embedder, GenerationOptions, Generator};
use crate::search::SimilarityResult;
use crate::store::{IndexingStatus, StoreStats, VectorStore};
use crate::vector_entry::{EntryMetadata, VectorEntry};
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Threshold of the second rung of the fallback ladder.
pub const FALLBACK_THRESHOLD: Number = 0.3;
/// Result cap of the second rung, further bounded by `top_k`.
pub const FALLBACK_TOP_K: usize = 3;
/// Leading fragments used when nothing ranks at all.
pub const UNRANKED_FRAGMENTS: usize = 3;

const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

#[derive(Debug, Clone, PartialEq)]
pub struct RagOptions {
    pub chunking: ChunkingOptions,
    pub top_k: usize,
    pub similarity_threshold: Number,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Extra caller-supplied context bound into the system instruction.
    pub additional_context: Option<String>,
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingOptions::default(),
            top_k: 5,
            similarity_threshold: 0.7,
            temperature: 0.1,
            max_output_tokens: 2000,
            additional_context: None,
        }
    }
}

/// Which rung of the fallback ladder produced the context.
#[derive(Debug, Clone)]
pub enum Retrieval {
    /// Primary search at the configured threshold.
    Ranked(Vec<SimilarityResult>),
    /// Second search at [`FALLBACK_THRESHOLD`].
    RankedFallback(Vec<SimilarityResult>),
    /// Leading fragments in document order, no scores.
    Unranked(Vec<Arc<VectorEntry>>),
}

impl Retrieval {
    pub fn is_ranked(&self) -> bool {
        !matches!(self, Retrieval::Unranked(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Retrieval::Ranked(results) | Retrieval::RankedFallback(results) => results.len(),
            Retrieval::Unranked(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<Arc<VectorEntry>> {
        match self {
            Retrieval::Ranked(results) | Retrieval::RankedFallback(results) => {
                results.iter().map(|r| Arc::clone(&r.entry)).collect()
            }
            Retrieval::Unranked(entries) => entries.clone(),
        }
    }

    /// Label each fragment with its position (and score when ranked) and join
    /// them with a visible delimiter.
    pub fn context(&self) -> String {
        let blocks: Vec<String> = match self {
            Retrieval::Ranked(results) | Retrieval::RankedFallback(results) => results
                .iter()
                .enumerate()
                .map(|(i, result)| {
                    format!(
                        "[Chunk {}, Similarity: {:.3}]\n{}",
                        i + 1,
                        result.similarity,
                        result.entry.fragment.content
                    )
                })
                .collect(),
            Retrieval::Unranked(entries) => entries
                .iter()
                .enumerate()
                .map(|(i, entry)| format!("[Chunk {}]\n{}", i + 1, entry.fragment.content))
                .collect(),
        };
        blocks.join(CONTEXT_DELIMITER)
    }
}

#[derive(Debug, Clone)]
pub struct RetrievedContext {
    pub retrieval: Retrieval,
    pub context: String,
}

/// Outcome of making sure a document is in the store.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub file_name: String,
    /// The store already held entries for the file; nothing was chunked.
    pub already_indexed: bool,
    pub total_fragments: usize,
    pub indexed: usize,
    /// One [`Error::EmbeddingFailed`] per dropped fragment.
    pub failures: Vec<Error>,
}

impl IndexReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub struct RagPipeline<E, G> {
    store: Arc<VectorStore>,
    embedder: E,
    generator: G,
    options: RagOptions,
}

impl<E, G> RagPipeline<E, G>
where
    E: Embedder,
    G: Generator,
{
    pub fn new(
        store: Arc<VectorStore>,
        embedder: E,
        generator: G,
        options: RagOptions,
    ) -> Result<Self> {
        options.chunking.validate()?;
        Ok(Self {
            store,
            embedder,
            generator,
            options,
        })
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn options(&self) -> &RagOptions {
        &self.options
    }

    /// Chunk and embed `content` unless the store already holds `file_name`.
    ///
    /// A fragment whose embedding fails is logged and left out; the pass
    /// always continues with the remaining fragments.
    pub fn index_document(&self, file_name: &str, content: &str) -> Result<IndexReport> {
        if self.store.is_file_indexed(file_name) {
            debug!("'{}' is already indexed", file_name);
            return Ok(IndexReport {
                file_name: file_name.to_string(),
                already_indexed: true,
                ..IndexReport::default()
            });
        }

        info!("Processing and indexing document: {}", file_name);
        let fragments = Chunker::new(self.options.chunking)?.chunk(content, file_name);
        let mut report = IndexReport {
            file_name: file_name.to_string(),
            total_fragments: fragments.len(),
            ..IndexReport::default()
        };

        for fragment in fragments {
            match self.embedder.embed(&fragment.content) {
                Ok(embedding) => {
                    self.store.insert(
                        fragment.id.clone(),
                        embedding,
                        fragment,
                        EntryMetadata::new(file_name),
                    );
                    report.indexed += 1;
                }
                Err(err) => {
                    let failure = Error::EmbeddingFailed {
                        id: fragment.id,
                        message: Error::provider_message(&err),
                    };
                    warn!("{}", failure);
                    report.failures.push(failure);
                }
            }
        }

        if report.is_partial() {
            warn!(
                "{}",
                Error::IndexingPartialFailure {
                    file_name: file_name.to_string(),
                    failed: report.failures.len(),
                    total: report.total_fragments,
                }
            );
        }
        info!(
            "Indexed {} of {} fragments for {}",
            report.indexed, report.total_fragments, file_name
        );
        Ok(report)
    }

    /// Everything up to generation: index, embed the query, rank, fall back,
    /// and assemble the context text.
    pub fn retrieve_context(
        &self,
        file_name: &str,
        file_content: &str,
        query: &str,
    ) -> Result<RetrievedContext> {
        self.index_document(file_name, file_content)?;

        debug!("Generating query embedding");
        let query_embedding = self.embedder.embed(query).map_err(|err| {
            let failure = Error::QueryEmbeddingFailed {
                message: Error::provider_message(&err),
            };
            error!("{}", failure);
            failure
        })?;

        let retrieval = self.select(file_name, &query_embedding)?;
        let context = retrieval.context();
        info!(
            "Selected {} fragments from {} ({})",
            retrieval.len(),
            file_name,
            match &retrieval {
                Retrieval::Ranked(_) => "ranked",
                Retrieval::RankedFallback(_) => "ranked fallback",
                Retrieval::Unranked(_) => "unranked",
            }
        );

        Ok(RetrievedContext { retrieval, context })
    }

    /// Answer `query` about one document and return the generator's reply verbatim.
    pub fn retrieve(&self, file_name: &str, file_content: &str, query: &str) -> Result<String> {
        let retrieved = self.retrieve_context(file_name, file_content, query)?;
        let messages = self.build_messages(file_name, &retrieved.context, query);
        let options = GenerationOptions {
            temperature: self.options.temperature,
            max_output_tokens: self.options.max_output_tokens,
        };

        self.generator.generate(&messages, &options).map_err(|err| {
            let failure = Error::GenerationFailed {
                message: Error::provider_message(&err),
            };
            error!("{}", failure);
            failure
        })
    }

    fn select(&self, file_name: &str, query_embedding: &[Number]) -> Result<Retrieval> {
        let ranked = self.store.similarity_search(
            query_embedding,
            self.options.top_k,
            self.options.similarity_threshold,
            Some(file_name),
        )?;
        if !ranked.is_empty() {
            return Ok(Retrieval::Ranked(ranked));
        }

        debug!("No fragments above {}, lowering threshold", self.options.similarity_threshold);
        let fallback = self.store.similarity_search(
            query_embedding,
            self.options.top_k.min(FALLBACK_TOP_K),
            FALLBACK_THRESHOLD,
            Some(file_name),
        )?;
        if !fallback.is_empty() {
            return Ok(Retrieval::RankedFallback(fallback));
        }

        debug!("No fragments above {}, using leading fragments", FALLBACK_THRESHOLD);
        let leading = self
            .store
            .list_by_file_name(file_name)
            .into_iter()
            .take(UNRANKED_FRAGMENTS)
            .collect();
        Ok(Retrieval::Unranked(leading))
    }

    fn build_messages(&self, file_name: &str, context: &str, query: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(system_prompt(
                file_name,
                self.options.additional_context.as_deref(),
                context,
            )),
            ChatMessage::user(query),
        ]
    }

    /// Drop every entry of `file_name` so the next request re-chunks it.
    pub fn clear_entries_for_file(&self, file_name: &str) -> usize {
        let removed = self.store.remove_by_file_name(file_name);
        info!("Cleared {} embeddings for file: {}", removed, file_name);
        removed
    }

    pub fn clear_all(&self) {
        self.store.clear();
        info!("Cleared all embeddings from vector store");
    }

    pub fn is_file_indexed(&self, file_name: &str) -> bool {
        self.store.is_file_indexed(file_name)
    }

    pub fn list_file_names(&self) -> BTreeSet<String> {
        self.store.list_file_names()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn indexing_status(&self) -> IndexingStatus {
        self.store.indexing_status()
    }
}

fn system_prompt(file_name: &str, additional_context: Option<&str>, context: &str) -> String {
    let mut prompt = format!(
        "You are a document analysis assistant answering questions about \"{}\" \
         using only the excerpts retrieved from it below.\n\n\
         - Base every answer on the excerpts; if they do not contain the answer, say so plainly.\n\
         - Quote or cite the excerpts by their chunk number where it helps.\n\
         - Keep answers concise but complete.\n\
         - When asked about something the excerpts do not cover, describe what they do cover.\n",
        file_name
    );
    if let Some(extra) = additional_context.filter(|extra| !extra.trim().is_empty()) {
        prompt.push_str(&format!("\nAdditional context: {}\n", extra));
    }
    prompt.push_str("\nRetrieved excerpts:\n");
    if context.is_empty() {
        prompt.push_str("(no excerpts were retrieved)");
    } else {
        prompt.push_str(context);
    }
    prompt
}
