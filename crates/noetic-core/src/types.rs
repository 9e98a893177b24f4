//! Core data model
//!
//! Mirrors the `memory` / `vec` / `history` / checkpoint records described in
//! the system specification. Enumerated fields use closed Rust enums so
//! invalid states are unrepresentable; free-form metadata (tags, related
//! memories) stays as JSON via `serde_json::Value` at the edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of the embedding generation pipeline for a memory row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingStatus {
    #[default]
    Pending,
    Success,
    Failed,
    Retry,
}

impl EmbeddingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingStatus::Pending => "pending",
            EmbeddingStatus::Success => "success",
            EmbeddingStatus::Failed => "failed",
            EmbeddingStatus::Retry => "retry",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "success" => EmbeddingStatus::Success,
            "failed" => EmbeddingStatus::Failed,
            "retry" => EmbeddingStatus::Retry,
            _ => EmbeddingStatus::Pending,
        }
    }
}

/// Importance tier controlling decay, expiry, and surfacing behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImportanceTier {
    Constitutional,
    Critical,
    Important,
    #[default]
    Normal,
    Temporary,
    Deprecated,
}

impl ImportanceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportanceTier::Constitutional => "constitutional",
            ImportanceTier::Critical => "critical",
            ImportanceTier::Important => "important",
            ImportanceTier::Normal => "normal",
            ImportanceTier::Temporary => "temporary",
            ImportanceTier::Deprecated => "deprecated",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "constitutional" => ImportanceTier::Constitutional,
            "critical" => ImportanceTier::Critical,
            "important" => ImportanceTier::Important,
            "temporary" => ImportanceTier::Temporary,
            "deprecated" => ImportanceTier::Deprecated,
            _ => ImportanceTier::Normal,
        }
    }

    /// Whether this tier bypasses time-based decay entirely (§4.8).
    pub fn bypasses_decay(&self) -> bool {
        matches!(
            self,
            ImportanceTier::Constitutional | ImportanceTier::Critical | ImportanceTier::Important
        )
    }
}

/// Auto-detected context type for a memory, derived from tool-usage ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    Research,
    Implementation,
    Decision,
    Discovery,
    #[default]
    General,
}

impl ContextType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::Research => "research",
            ContextType::Implementation => "implementation",
            ContextType::Decision => "decision",
            ContextType::Discovery => "discovery",
            ContextType::General => "general",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "research" => ContextType::Research,
            "implementation" => ContextType::Implementation,
            "decision" => ContextType::Decision,
            "discovery" => ContextType::Discovery,
            _ => ContextType::General,
        }
    }
}

/// A precomputed neighbor entry persisted in `related_memories` (§3, §4.10).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelatedMemory {
    pub id: i64,
    pub similarity: f32,
}

/// The `memory` record (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub id: i64,
    pub spec_folder: String,
    pub file_path: String,
    pub anchor_id: Option<String>,
    pub title: String,
    pub trigger_phrases: Vec<String>,
    pub content_hash: String,
    pub embedding_model: Option<String>,
    pub embedding_status: EmbeddingStatus,
    pub importance_weight: f32,
    pub importance_tier: ImportanceTier,
    pub context_type: ContextType,
    pub decay_half_life_days: f32,
    pub is_pinned: bool,
    pub access_count: u64,
    pub last_accessed: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub confidence: f32,
    pub related_memories: Vec<RelatedMemory>,
    pub channel: Option<String>,
    pub session_id: Option<String>,
}

impl MemoryRecord {
    pub const DEFAULT_DECAY_HALF_LIFE_DAYS: f32 = 90.0;
}

/// The `vec` record (§3): one row per successfully embedded memory, keyed by
/// the same id as the metadata row.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: i64,
    pub embedding: Vec<f32>,
}

/// Append-only audit log event kind (§3 `history`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HistoryEvent {
    Add,
    Update,
    Delete,
}

impl HistoryEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryEvent::Add => "ADD",
            HistoryEvent::Update => "UPDATE",
            HistoryEvent::Delete => "DELETE",
        }
    }
}

/// A `history` row. `actor` and future `is_deleted`-style fields are
/// write-only audit data per Open Question #1 (§9) — no reader consumes them
/// yet, so they are not exposed beyond storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: i64,
    pub memory_id: i64,
    pub prev_value: Option<String>,
    pub new_value: Option<String>,
    pub event: HistoryEvent,
    pub timestamp: DateTime<Utc>,
    pub actor: Option<String>,
}

/// A named checkpoint snapshot (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub spec_folder: String,
    pub branch: Option<String>,
    pub memory_snapshot: Vec<u8>,
    pub file_snapshot: Vec<u8>,
    pub metadata: serde_json::Value,
}
