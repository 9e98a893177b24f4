//! Embedding provider boundary
//!
//! This crate consumes embeddings through a narrow trait; it bundles no
//! concrete model. Hosts implement `EmbeddingProvider` over whatever local
//! or remote model they choose (the teacher crate, for reference, wraps
//! fastembed's `TextEmbedding` behind the same kind of seam).

use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding model initialization failed: {0}")]
    Init(String),
    #[error("embedding generation failed: {0}")]
    Generation(String),
    #[error("invalid input for embedding: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Identifies one embedding configuration: provider + model + dimension.
/// `database_suffix` is appended to the database filename so two profiles
/// never share (and thus never cross-contaminate) a database file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub provider: String,
    pub model: String,
    pub dim: usize,
    pub database_suffix: String,
}

impl Profile {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, dim: usize) -> Self {
        let provider = provider.into();
        let model = model.into();
        let database_suffix = format!("{provider}-{model}-{dim}d")
            .to_lowercase()
            .replace(['/', ' ', ':'], "_");
        Self {
            provider,
            model,
            dim,
            database_suffix,
        }
    }
}

/// The sole external interface to an embedding model. `embed_document` and
/// `embed_query` are kept separate because some providers apply different
/// instructions/prefixes for indexing vs. querying.
pub trait EmbeddingProvider: Send + Sync {
    fn embed_document(&self, text: &str) -> Result<Vec<f32>>;
    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
    fn profile(&self) -> &Profile;
}

/// Cosine similarity between two equal-length vectors, in `[-1, 1]`.
/// Returns `0.0` on a dimension mismatch rather than panicking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Cosine *distance* (`1 - similarity`), used by the vector store's
/// nearest-neighbor ordering since it is a proper (if non-metric) distance.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::MAX;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}
