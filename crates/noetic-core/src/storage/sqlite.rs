//! SQLite-backed storage engine (C5)
//!
//! Synchronized dual-table (metadata + vector) writes, schema migration,
//! per-profile database routing. `Storage` holds its connection behind a
//! `Mutex`, so the whole type is `Send + Sync` and callers share it via
//! `Arc<Storage>` rather than an outer `Mutex<Storage>`.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::safety::{safe_parse_json, safe_resolve};
use crate::types::{
    ContextType, EmbeddingStatus, HistoryEvent, HistoryRecord, ImportanceTier, MemoryRecord,
    RelatedMemory,
};

use super::migrations::apply_migrations;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("memory not found: {0}")]
    NotFound(i64),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("path {0} does not resolve within the allowed bases")]
    PathNotAllowed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Fields required to index a brand-new memory. `None` embedding leaves
/// `embedding_status='pending'` and skips the vector row (anchor-only mode).
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub spec_folder: String,
    pub file_path: String,
    pub anchor_id: Option<String>,
    pub title: String,
    pub trigger_phrases: Vec<String>,
    pub content_hash: String,
    pub embedding_model: Option<String>,
    pub importance_weight: f32,
    pub importance_tier: ImportanceTier,
    pub context_type: ContextType,
    pub decay_half_life_days: f32,
    pub is_pinned: bool,
    pub confidence: f32,
    pub channel: Option<String>,
    pub session_id: Option<String>,
}

/// A partial update: `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct MemoryUpdate {
    pub title: Option<String>,
    pub trigger_phrases: Option<Vec<String>>,
    pub importance_weight: Option<f32>,
    pub importance_tier: Option<ImportanceTier>,
    pub context_type: Option<ContextType>,
    pub is_pinned: Option<bool>,
    pub confidence: Option<f32>,
    pub related_memories: Option<Vec<RelatedMemory>>,
    pub new_embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegrityReport {
    pub orphaned_vectors: Vec<i64>,
    pub missing_vectors: Vec<i64>,
    pub orphaned_files: Vec<i64>,
}

use crate::decay::compute_expiry;

pub struct Storage {
    conn: Mutex<Connection>,
    allowed_paths: Vec<PathBuf>,
    expected_dim: Option<usize>,
}

impl Storage {
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA mmap_size = 268435456;",
        )?;
        Ok(())
    }

    /// Open (creating if absent) a database at `path`, restricted to
    /// owner-only permissions on Unix, with `allowed_paths` as the
    /// containment allow-list for every `file_path` this instance persists.
    pub fn open(path: &Path, allowed_paths: Vec<PathBuf>, expected_dim: Option<usize>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::configure_connection(&conn)?;
        apply_migrations(&conn)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if path.exists() {
                let perms = std::fs::Permissions::from_mode(0o600);
                let _ = std::fs::set_permissions(path, perms);
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
            allowed_paths,
            expected_dim,
        })
    }

    pub fn open_in_memory(allowed_paths: Vec<PathBuf>, expected_dim: Option<usize>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;
        apply_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            allowed_paths,
            expected_dim,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }

    fn validate_path(&self, file_path: &str) -> Result<()> {
        if self.allowed_paths.is_empty() {
            return Ok(());
        }
        safe_resolve(file_path, &self.allowed_paths)
            .map(|_| ())
            .ok_or_else(|| StorageError::PathNotAllowed(file_path.to_string()))
    }

    /// Find an existing row's id by `(spec_folder, file_path, anchor_id)`.
    pub fn find_by_unique_key(
        &self,
        spec_folder: &str,
        file_path: &str,
        anchor_id: Option<&str>,
    ) -> Result<Option<i64>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id FROM memory WHERE spec_folder = ?1 AND file_path = ?2 AND anchor_id IS ?3",
            params![spec_folder, file_path, anchor_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(StorageError::from)
    }

    /// Find a row by exact content hash, optionally scoped to a folder
    /// (used by the pre-flight gate's exact-duplicate check).
    pub fn find_by_content_hash(
        &self,
        content_hash: &str,
        spec_folder: Option<&str>,
    ) -> Result<Option<i64>> {
        let conn = self.lock()?;
        match spec_folder {
            Some(folder) => conn
                .query_row(
                    "SELECT id FROM memory WHERE content_hash = ?1 AND spec_folder = ?2",
                    params![content_hash, folder],
                    |row| row.get(0),
                )
                .optional(),
            None => conn
                .query_row(
                    "SELECT id FROM memory WHERE content_hash = ?1",
                    params![content_hash],
                    |row| row.get(0),
                )
                .optional(),
        }
        .map_err(StorageError::from)
    }

    /// Index a new memory. If a row already exists for the same
    /// `(spec_folder, file_path, anchor_id)` tuple, delegates to
    /// `update_memory` instead of inserting a duplicate (invariant #3).
    pub fn index_memory(&self, input: NewMemory, embedding: Option<Vec<f32>>) -> Result<i64> {
        self.validate_path(&input.file_path)?;

        if let Some(vector) = &embedding {
            if let Some(expected) = self.expected_dim {
                if vector.len() != expected {
                    return Err(StorageError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
            }
        }

        if let Some(existing_id) =
            self.find_by_unique_key(&input.spec_folder, &input.file_path, input.anchor_id.as_deref())?
        {
            let update = MemoryUpdate {
                title: Some(input.title),
                trigger_phrases: Some(input.trigger_phrases),
                importance_weight: Some(input.importance_weight),
                importance_tier: Some(input.importance_tier),
                context_type: Some(input.context_type),
                is_pinned: Some(input.is_pinned),
                confidence: Some(input.confidence),
                related_memories: None,
                new_embedding: embedding,
            };
            self.update_memory(existing_id, update)?;
            return Ok(existing_id);
        }

        let now = Utc::now();
        let status = if embedding.is_some() {
            EmbeddingStatus::Success
        } else {
            EmbeddingStatus::Pending
        };
        let expires_at = compute_expiry(input.importance_tier, now);
        let triggers_json = serde_json::to_string(&input.trigger_phrases).unwrap_or_else(|_| "[]".into());

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO memory (
                spec_folder, file_path, anchor_id, title, trigger_phrases, content_hash,
                embedding_model, embedding_status, importance_weight, importance_tier,
                context_type, decay_half_life_days, is_pinned, access_count, last_accessed,
                created_at, updated_at, expires_at, confidence, related_memories, channel, session_id
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 0, ?14,
                ?15, ?16, ?17, ?18, '[]', ?19, ?20
            )",
            params![
                input.spec_folder,
                input.file_path,
                input.anchor_id,
                input.title,
                triggers_json,
                input.content_hash,
                input.embedding_model,
                status.as_str(),
                input.importance_weight,
                input.importance_tier.as_str(),
                input.context_type.as_str(),
                input.decay_half_life_days,
                input.is_pinned as i64,
                now.timestamp_millis(),
                now.to_rfc3339(),
                now.to_rfc3339(),
                expires_at.map(|d| d.to_rfc3339()),
                input.confidence,
                input.channel,
                input.session_id,
            ],
        )?;

        let id = tx.last_insert_rowid();

        if let Some(vector) = &embedding {
            tx.execute(
                "INSERT INTO vec (id, embedding, dim) VALUES (?1, ?2, ?3)",
                params![id, vector_to_blob(vector), vector.len() as i64],
            )?;
        }

        tx.execute(
            "INSERT INTO history (memory_id, prev_value, new_value, event, timestamp, actor)
             VALUES (?1, NULL, ?2, ?3, ?4, NULL)",
            params![id, input.title, HistoryEvent::Add.as_str(), now.to_rfc3339()],
        )?;

        tx.commit()?;
        Ok(id)
    }

    /// Apply a partial update. Tier changes are reported to the caller via
    /// the returned bool so the constitutional cache can be invalidated.
    pub fn update_memory(&self, id: i64, update: MemoryUpdate) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let existing_tier: String = tx
            .query_row("SELECT importance_tier FROM memory WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?
            .ok_or(StorageError::NotFound(id))?;

        let now = Utc::now();
        let mut tier_changed = false;

        if let Some(title) = &update.title {
            tx.execute("UPDATE memory SET title = ?1 WHERE id = ?2", params![title, id])?;
        }
        if let Some(triggers) = &update.trigger_phrases {
            let json = serde_json::to_string(triggers).unwrap_or_else(|_| "[]".into());
            tx.execute("UPDATE memory SET trigger_phrases = ?1 WHERE id = ?2", params![json, id])?;
        }
        if let Some(weight) = update.importance_weight {
            tx.execute("UPDATE memory SET importance_weight = ?1 WHERE id = ?2", params![weight, id])?;
        }
        if let Some(tier) = update.importance_tier {
            if tier.as_str() != existing_tier {
                tier_changed = true;
            }
            let created_at: String = tx.query_row(
                "SELECT created_at FROM memory WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or(now);
            let expires_at = compute_expiry(tier, created_at);
            tx.execute(
                "UPDATE memory SET importance_tier = ?1, expires_at = ?2 WHERE id = ?3",
                params![tier.as_str(), expires_at.map(|d| d.to_rfc3339()), id],
            )?;
        }
        if let Some(ctx) = update.context_type {
            tx.execute("UPDATE memory SET context_type = ?1 WHERE id = ?2", params![ctx.as_str(), id])?;
        }
        if let Some(pinned) = update.is_pinned {
            tx.execute("UPDATE memory SET is_pinned = ?1 WHERE id = ?2", params![pinned as i64, id])?;
        }
        if let Some(confidence) = update.confidence {
            tx.execute("UPDATE memory SET confidence = ?1 WHERE id = ?2", params![confidence, id])?;
        }
        if let Some(related) = &update.related_memories {
            let json = serde_json::to_string(related).unwrap_or_else(|_| "[]".into());
            tx.execute("UPDATE memory SET related_memories = ?1 WHERE id = ?2", params![json, id])?;
        }
        if let Some(vector) = &update.new_embedding {
            if let Some(expected) = self.expected_dim {
                if vector.len() != expected {
                    return Err(StorageError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
            }
            tx.execute("DELETE FROM vec WHERE id = ?1", params![id])?;
            tx.execute(
                "INSERT INTO vec (id, embedding, dim) VALUES (?1, ?2, ?3)",
                params![id, vector_to_blob(vector), vector.len() as i64],
            )?;
            tx.execute(
                "UPDATE memory SET embedding_status = ?1 WHERE id = ?2",
                params![EmbeddingStatus::Success.as_str(), id],
            )?;
        }

        tx.execute("UPDATE memory SET updated_at = ?1 WHERE id = ?2", params![now.to_rfc3339(), id])?;
        tx.execute(
            "INSERT INTO history (memory_id, prev_value, new_value, event, timestamp, actor)
             VALUES (?1, NULL, NULL, ?2, ?3, NULL)",
            params![id, HistoryEvent::Update.as_str(), now.to_rfc3339()],
        )?;

        tx.commit()?;
        Ok(tier_changed)
    }

    /// Delete a memory and all its dependent rows in one transaction:
    /// history → vector → metadata (invariant #1).
    pub fn delete_memory(&self, id: i64) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row("SELECT id FROM memory WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        if exists.is_none() {
            return Err(StorageError::NotFound(id));
        }

        tx.execute("DELETE FROM history WHERE memory_id = ?1", params![id])?;
        tx.execute("DELETE FROM vec WHERE id = ?1", params![id])?;
        tx.execute("DELETE FROM memory WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(())
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<MemoryRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, spec_folder, file_path, anchor_id, title, trigger_phrases, content_hash,
                    embedding_model, embedding_status, importance_weight, importance_tier,
                    context_type, decay_half_life_days, is_pinned, access_count, last_accessed,
                    created_at, updated_at, expires_at, confidence, related_memories, channel, session_id
             FROM memory WHERE id = ?1",
            params![id],
            row_to_memory,
        )
        .optional()
        .map_err(StorageError::from)
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.lock()?;
        conn.query_row("SELECT count(*) FROM memory", [], |row| row.get(0))
            .map_err(StorageError::from)
    }

    pub fn list_paginated(&self, spec_folder: Option<&str>, limit: i64, offset: i64) -> Result<Vec<MemoryRecord>> {
        let conn = self.lock()?;
        let mut stmt = match spec_folder {
            Some(_) => conn.prepare(
                "SELECT id, spec_folder, file_path, anchor_id, title, trigger_phrases, content_hash,
                        embedding_model, embedding_status, importance_weight, importance_tier,
                        context_type, decay_half_life_days, is_pinned, access_count, last_accessed,
                        created_at, updated_at, expires_at, confidence, related_memories, channel, session_id
                 FROM memory WHERE spec_folder = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
            )?,
            None => conn.prepare(
                "SELECT id, spec_folder, file_path, anchor_id, title, trigger_phrases, content_hash,
                        embedding_model, embedding_status, importance_weight, importance_tier,
                        context_type, decay_half_life_days, is_pinned, access_count, last_accessed,
                        created_at, updated_at, expires_at, confidence, related_memories, channel, session_id
                 FROM memory ORDER BY id LIMIT ?1 OFFSET ?2",
            )?,
        };

        let rows = match spec_folder {
            Some(folder) => stmt
                .query_map(params![folder, limit, offset], row_to_memory)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt
                .query_map(params![limit, offset], row_to_memory)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
    }

    pub fn get_vector(&self, id: i64) -> Result<Option<Vec<f32>>> {
        let conn = self.lock()?;
        conn.query_row("SELECT embedding FROM vec WHERE id = ?1", params![id], |row| {
            let blob: Vec<u8> = row.get(0)?;
            Ok(blob_to_vector(&blob))
        })
        .optional()
        .map_err(StorageError::from)
    }

    /// All (id, embedding) pairs, for the brute-force vector store to scan.
    pub fn all_vectors(&self) -> Result<Vec<(i64, Vec<f32>)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, embedding FROM vec")?;
        let rows = stmt
            .query_map([], |row| {
                let id: i64 = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((id, blob_to_vector(&blob)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn history_for(&self, memory_id: i64) -> Result<Vec<HistoryRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, memory_id, prev_value, new_value, event, timestamp, actor
             FROM history WHERE memory_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![memory_id], |row| {
                let event_str: String = row.get(4)?;
                let ts: String = row.get(5)?;
                Ok(HistoryRecord {
                    id: row.get(0)?,
                    memory_id: row.get(1)?,
                    prev_value: row.get(2)?,
                    new_value: row.get(3)?,
                    event: match event_str.as_str() {
                        "ADD" => HistoryEvent::Add,
                        "DELETE" => HistoryEvent::Delete,
                        _ => HistoryEvent::Update,
                    },
                    timestamp: DateTime::parse_from_rfc3339(&ts)
                        .map(|d| d.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    actor: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Atomic increment of `access_count` and refresh of `last_accessed`.
    /// Non-fatal: the caller decides whether to log and continue (§4.11).
    pub fn record_access(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;
        let now_ms = Utc::now().timestamp_millis();
        conn.execute(
            "UPDATE memory SET access_count = access_count + 1, last_accessed = ?1 WHERE id = ?2",
            params![now_ms, id],
        )?;
        Ok(())
    }

    /// `verifyIntegrity` (§4.5): cross-check the metadata/vector tables and
    /// confirm each `file_path` still exists on disk.
    pub fn verify_integrity(&self) -> Result<IntegrityReport> {
        let conn = self.lock()?;

        let mut orphaned_vectors = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT vec.id FROM vec LEFT JOIN memory ON memory.id = vec.id WHERE memory.id IS NULL",
        )?;
        for id in stmt.query_map([], |row| row.get::<_, i64>(0))? {
            orphaned_vectors.push(id?);
        }
        drop(stmt);

        let mut missing_vectors = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT memory.id FROM memory LEFT JOIN vec ON memory.id = vec.id
             WHERE memory.embedding_status = 'success' AND vec.id IS NULL",
        )?;
        for id in stmt.query_map([], |row| row.get::<_, i64>(0))? {
            missing_vectors.push(id?);
        }
        drop(stmt);

        let mut orphaned_files = Vec::new();
        let mut stmt = conn.prepare("SELECT id, file_path FROM memory")?;
        let paths: Vec<(i64, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (id, path) in paths {
            if !Path::new(&path).exists() {
                orphaned_files.push(id);
            }
        }

        Ok(IntegrityReport {
            orphaned_vectors,
            missing_vectors,
            orphaned_files,
        })
    }
}

fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<MemoryRecord> {
    let trigger_phrases_json: String = row.get(5)?;
    let related_json: String = row.get(20)?;
    let created_at: String = row.get(16)?;
    let updated_at: String = row.get(17)?;
    let expires_at: Option<String> = row.get(18)?;
    let embedding_status: String = row.get(8)?;
    let importance_tier: String = row.get(10)?;
    let context_type: String = row.get(11)?;

    Ok(MemoryRecord {
        id: row.get(0)?,
        spec_folder: row.get(1)?,
        file_path: row.get(2)?,
        anchor_id: row.get(3)?,
        title: row.get(4)?,
        trigger_phrases: safe_parse_json(&trigger_phrases_json, serde_json::json!([]))
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default(),
        content_hash: row.get(6)?,
        embedding_model: row.get(7)?,
        embedding_status: EmbeddingStatus::parse(&embedding_status),
        importance_weight: row.get(9)?,
        importance_tier: ImportanceTier::parse(&importance_tier),
        context_type: ContextType::parse(&context_type),
        decay_half_life_days: row.get(12)?,
        is_pinned: row.get::<_, i64>(13)? != 0,
        access_count: row.get::<_, i64>(14)? as u64,
        last_accessed: row.get(15)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        expires_at: expires_at.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|d| d.with_timezone(&Utc))
                .ok()
        }),
        confidence: row.get(19)?,
        related_memories: safe_parse_json(&related_json, serde_json::json!([]))
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| serde_json::from_value::<RelatedMemory>(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default(),
        channel: row.get(21)?,
        session_id: row.get(22)?,
    })
}
