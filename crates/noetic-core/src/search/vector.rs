//! Exact vector search (C6)
//!
//! An in-process brute-force cosine index over the rows of the `vec` table.
//! The teacher crate uses USearch's approximate HNSW index with I8
//! quantization for sub-millisecond queries at scale; this engine trades
//! that speed for exactness, since downstream callers assert precise
//! `similarity` values (round-tripped to two decimal places) that an
//! approximate index cannot guarantee.

use crate::embeddings::cosine_distance;
use crate::storage::Storage;
use crate::types::{ContextType, ImportanceTier, MemoryRecord};
use chrono::Utc;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum VectorSearchError {
    #[error("query dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

pub type Result<T> = std::result::Result<T, VectorSearchError>;

/// Options accepted by a vector search call (§4.6).
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: usize,
    pub spec_folder: Option<String>,
    pub min_similarity: Option<f32>,
    pub use_decay: bool,
    pub tier: Option<ImportanceTier>,
    pub context_type: Option<ContextType>,
    pub include_constitutional: bool,
}

/// One scored candidate returned by a vector search.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub memory: MemoryRecord,
    pub similarity: f32,
}

fn effective_importance(record: &MemoryRecord, use_decay: bool) -> f32 {
    if record.is_pinned || !use_decay {
        return record.importance_weight;
    }
    let half_life = if record.decay_half_life_days > 0.0 {
        record.decay_half_life_days
    } else {
        90.0
    };
    let age_days = (Utc::now() - record.updated_at).num_seconds() as f32 / 86_400.0;
    let decay = 0.5_f32.powf(age_days.max(0.0) / half_life);
    record.importance_weight * decay
}

fn round2(x: f32) -> f32 {
    (x * 100.0).round() / 100.0
}

/// Run a brute-force cosine search over every embedded, non-expired memory
/// matching the given filters, excluding constitutional-tier rows (those
/// are prepended separately by the caller per §4.6 step 1).
pub fn search(storage: &Storage, query: &[f32], options: &SearchOptions) -> Result<Vec<Candidate>> {
    let vectors = storage.all_vectors()?;
    let now = Utc::now();

    let max_distance = options
        .min_similarity
        .map(|sim| 2.0 * (1.0 - sim / 100.0))
        .unwrap_or(f32::MAX);

    let mut scored: Vec<(f64, Candidate)> = Vec::new();

    for (id, vector) in vectors {
        if vector.len() != query.len() {
            continue;
        }
        let Some(record) = storage.get_by_id(id)? else {
            continue;
        };
        if record.embedding_status != crate::types::EmbeddingStatus::Success {
            continue;
        }
        if record.importance_tier == ImportanceTier::Constitutional {
            continue;
        }
        if let Some(expires_at) = record.expires_at {
            if expires_at <= now {
                continue;
            }
        }
        if let Some(tier) = options.tier {
            if record.importance_tier != tier {
                continue;
            }
        }
        if let Some(folder) = &options.spec_folder {
            if &record.spec_folder != folder {
                continue;
            }
        }
        if let Some(ctx) = options.context_type {
            if record.context_type != ctx {
                continue;
            }
        }

        let distance = cosine_distance(query, &vector);
        if distance > max_distance {
            continue;
        }

        let importance = effective_importance(&record, options.use_decay);
        let ordering_key = distance as f64 - 0.1 * importance as f64;
        let similarity = round2((1.0 - distance / 2.0) * 100.0);

        scored.push((ordering_key, Candidate { memory: record, similarity }));
    }

    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(options.limit.max(1));

    Ok(scored.into_iter().map(|(_, c)| c).collect())
}

/// A single concept query vector and its per-concept similarity to a result.
#[derive(Debug, Clone)]
pub struct ConceptSimilarity {
    pub similarity: f32,
}

/// One result from a multi-concept AND query (§4.6 "Multi-concept AND").
#[derive(Debug, Clone)]
pub struct MultiConceptCandidate {
    pub memory: MemoryRecord,
    pub concept_similarities: Vec<f32>,
    pub avg_similarity: f32,
}

/// Search for memories within `min_similarity` of **every** concept vector
/// (2-5 of them). Ranked by average distance across concepts.
pub fn search_multi_concept(
    storage: &Storage,
    concepts: &[Vec<f32>],
    options: &SearchOptions,
) -> Result<Vec<MultiConceptCandidate>> {
    debug_assert!(concepts.len() >= 2 && concepts.len() <= 5);

    let vectors = storage.all_vectors()?;
    let now = Utc::now();
    let max_distance = options
        .min_similarity
        .map(|sim| 2.0 * (1.0 - sim / 100.0))
        .unwrap_or(f32::MAX);

    let mut results = Vec::new();

    for (id, vector) in vectors {
        if concepts.iter().any(|c| c.len() != vector.len()) {
            continue;
        }
        let Some(record) = storage.get_by_id(id)? else {
            continue;
        };
        if record.embedding_status != crate::types::EmbeddingStatus::Success {
            continue;
        }
        if record.importance_tier == ImportanceTier::Constitutional {
            continue;
        }
        if let Some(expires_at) = record.expires_at {
            if expires_at <= now {
                continue;
            }
        }
        if let Some(folder) = &options.spec_folder {
            if &record.spec_folder != folder {
                continue;
            }
        }

        let distances: Vec<f32> = concepts.iter().map(|c| cosine_distance(c, &vector)).collect();
        if distances.iter().any(|d| *d > max_distance) {
            continue;
        }

        let avg_distance = distances.iter().sum::<f32>() / distances.len() as f32;
        let concept_similarities: Vec<f32> = distances.iter().map(|d| round2((1.0 - d / 2.0) * 100.0)).collect();
        let avg_similarity = round2((1.0 - avg_distance / 2.0) * 100.0);

        results.push(MultiConceptCandidate {
            memory: record,
            concept_similarities,
            avg_similarity,
        });
    }

    results.sort_by(|a, b| b.avg_similarity.partial_cmp(&a.avg_similarity).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(options.limit.max(1));
    Ok(results)
}
