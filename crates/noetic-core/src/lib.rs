//! `noetic-core`: the indexing, storage, search, and decay subsystem of a
//! local semantic-memory engine.
//!
//! An editor or agent writes memory files (markdown with embedded anchor
//! tags) into per-project folders; this crate ingests them, stores
//! metadata and vectors side by side, and answers hybrid similarity/keyword
//! queries with ranking, diversity, and usage-aware boosting. It consumes
//! embeddings through a narrow [`embeddings::EmbeddingProvider`] trait and
//! bundles no model of its own.

pub mod budget;
pub mod config;
pub mod constitutional;
pub mod decay;
pub mod embeddings;
pub mod ingest;
pub mod preflight;
pub mod ranking;
pub mod related;
pub mod retry;
pub mod safety;
pub mod search;
pub mod storage;
pub mod types;
pub mod usage;

/// The on-disk schema version this crate writes and expects to read.
pub const SCHEMA_VERSION: i64 = 1;

/// Commonly imported items, re-exported for convenient `use noetic_core::prelude::*;`.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::decay::{classify_tier, compute_expiry, effective_importance};
    pub use crate::embeddings::{EmbeddingProvider, Profile as EmbeddingProfile};
    pub use crate::storage::{MemoryUpdate, NewMemory, Storage};
    pub use crate::types::{ContextType, ImportanceTier, MemoryRecord};
}
