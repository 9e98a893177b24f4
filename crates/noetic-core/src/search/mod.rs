//! Search Pipeline (C6)
//!
//! Vector search with decay, multi-concept AND, keyword fallback,
//! enrichment, and an LRU+TTL cache over query results.

pub mod cache;
pub mod enrich;
pub mod keyword;
pub mod vector;

pub use cache::TtlLruCache;
pub use vector::{Candidate, MultiConceptCandidate, SearchOptions, VectorSearchError};

use crate::constitutional::ConstitutionalCache;
use crate::storage::Storage;
use crate::types::MemoryRecord;
use std::time::Duration;

/// One entry of a search result list: either a constitutional prepend
/// (`similarity` pinned at 100) or a regular ranked candidate.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub memory: MemoryRecord,
    pub similarity: f32,
    pub is_constitutional: bool,
}

/// Build the cache key exactly as specified: `query:limit:JSON(options)`.
pub fn cache_key(query: &str, limit: usize, options_json: &str) -> String {
    format!("{query}:{limit}:{options_json}")
}

/// Orchestrates the full vector search: constitutional prepend, brute-force
/// cosine search, limit adjustment for the constitutional rows already
/// included.
pub fn search_with_constitutional(
    storage: &Storage,
    constitutional_cache: &mut ConstitutionalCache,
    query_vector: &[f32],
    options: &SearchOptions,
) -> vector::Result<Vec<SearchResult>> {
    let mut results = Vec::new();
    let mut remaining_limit = options.limit;

    let prepend_constitutional = options.tier != Some(crate::types::ImportanceTier::Constitutional)
        && options.include_constitutional;

    if prepend_constitutional {
        let prepended = constitutional_cache.get_or_populate(storage, options.spec_folder.as_deref())?;
        for memory in prepended {
            if remaining_limit == 0 {
                break;
            }
            results.push(SearchResult {
                memory,
                similarity: 100.0,
                is_constitutional: true,
            });
            remaining_limit -= 1;
        }
    }

    if remaining_limit > 0 {
        let mut adjusted = options.clone();
        adjusted.limit = remaining_limit;
        let candidates = vector::search(storage, query_vector, &adjusted)?;
        for candidate in candidates {
            results.push(SearchResult {
                memory: candidate.memory,
                similarity: candidate.similarity,
                is_constitutional: false,
            });
        }
    }

    Ok(results)
}

/// Default TTL/capacity construction matching §4.6 "Cached search": 500
/// entries, 15-minute TTL.
pub fn new_search_cache() -> TtlLruCache<Vec<SearchResult>> {
    TtlLruCache::new(500, Duration::from_secs(15 * 60))
}
