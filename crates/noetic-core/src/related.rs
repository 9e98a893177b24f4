//! Related-Memory Linker (C10)
//!
//! After a memory is successfully indexed, embed the first 1,000 characters
//! of its content, search for near neighbors, and persist the top 5 (minus
//! self) as `related_memories`.

use crate::embeddings::EmbeddingProvider;
use crate::search::vector::{self, SearchOptions, VectorSearchError};
use crate::storage::{MemoryUpdate, Storage, StorageError};
use crate::types::RelatedMemory;
use thiserror::Error;

const CONTENT_PREFIX_CHARS: usize = 1000;
const MIN_SIMILARITY: f32 = 75.0;
const MAX_RELATED: usize = 5;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RelatedLinkError {
    #[error("embedding generation failed: {0}")]
    Embedding(#[from] crate::embeddings::EmbeddingError),
    #[error("vector search failed: {0}")]
    Search(#[from] VectorSearchError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, RelatedLinkError>;

fn content_prefix(content: &str) -> &str {
    match content.char_indices().nth(CONTENT_PREFIX_CHARS) {
        Some((byte_idx, _)) => &content[..byte_idx],
        None => content,
    }
}

/// Recompute and persist `related_memories` for `memory_id` from `content`.
/// Returns the linked neighbors that were written.
pub fn link_related(
    storage: &Storage,
    provider: &dyn EmbeddingProvider,
    memory_id: i64,
    content: &str,
    spec_folder: Option<&str>,
) -> Result<Vec<RelatedMemory>> {
    let prefix = content_prefix(content);
    let query_vector = provider.embed_document(prefix)?;

    let options = SearchOptions {
        limit: MAX_RELATED + 1,
        spec_folder: spec_folder.map(str::to_string),
        min_similarity: Some(MIN_SIMILARITY),
        use_decay: false,
        tier: None,
        context_type: None,
        include_constitutional: false,
    };

    let candidates = vector::search(storage, &query_vector, &options)?;

    let related: Vec<RelatedMemory> = candidates
        .into_iter()
        .filter(|c| c.memory.id != memory_id)
        .take(MAX_RELATED)
        .map(|c| RelatedMemory {
            id: c.memory.id,
            similarity: c.similarity,
        })
        .collect();

    storage.update_memory(
        memory_id,
        MemoryUpdate {
            related_memories: Some(related.clone()),
            ..Default::default()
        },
    )?;

    Ok(related)
}
