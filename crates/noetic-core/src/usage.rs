//! Usage Tracker (C11)
//!
//! Thin orchestration over `Storage::record_access` plus the two read-side
//! views the spec calls for: sorted usage stats and cleanup-candidate
//! discovery.

use crate::storage::{Storage, StorageError};
use crate::types::MemoryRecord;
use chrono::Utc;
use tracing::warn;

const CLEANUP_AGE_DAYS: i64 = 90;
const CLEANUP_MAX_ACCESS_COUNT: u64 = 2;
const CLEANUP_MAX_CONFIDENCE: f32 = 0.4;

const LIST_SCAN_PAGE_SIZE: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    AccessCount,
    LastAccessed,
    Confidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone)]
pub struct UsageStatsQuery {
    pub sort_by: SortBy,
    pub order: SortOrder,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct CleanupCandidate {
    pub memory: MemoryRecord,
    pub reasons: Vec<String>,
}

/// Record an access. Failures are logged, not propagated — a broken access
/// counter must never break a read path (§4.11).
pub fn record_access(storage: &Storage, id: i64) {
    if let Err(err) = storage.record_access(id) {
        warn!(memory_id = id, error = %err, "record_access failed, continuing");
    }
}

fn scan_all(storage: &Storage) -> Result<Vec<MemoryRecord>, StorageError> {
    let mut all = Vec::new();
    let mut offset = 0_i64;
    loop {
        let page = storage.list_paginated(None, LIST_SCAN_PAGE_SIZE, offset)?;
        let got = page.len();
        all.extend(page);
        if got < LIST_SCAN_PAGE_SIZE as usize {
            break;
        }
        offset += LIST_SCAN_PAGE_SIZE;
    }
    Ok(all)
}

/// Top-N memories with `access_count > 0`, sorted per `query`.
pub fn usage_stats(storage: &Storage, query: &UsageStatsQuery) -> Result<Vec<MemoryRecord>, StorageError> {
    let mut used: Vec<MemoryRecord> = scan_all(storage)?.into_iter().filter(|m| m.access_count > 0).collect();

    used.sort_by(|a, b| {
        let ordering = match query.sort_by {
            SortBy::AccessCount => a.access_count.cmp(&b.access_count),
            SortBy::LastAccessed => a.last_accessed.cmp(&b.last_accessed),
            SortBy::Confidence => a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal),
        };
        match query.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });

    used.truncate(query.limit);
    Ok(used)
}

fn cleanup_reasons(memory: &MemoryRecord, now: chrono::DateTime<Utc>) -> Vec<String> {
    let mut reasons = Vec::new();

    let age_days = (now - memory.created_at).num_days();
    if age_days > CLEANUP_AGE_DAYS {
        reasons.push(format!("created {age_days} days ago (older than {CLEANUP_AGE_DAYS})"));
    }
    if memory.access_count <= CLEANUP_MAX_ACCESS_COUNT {
        reasons.push(format!("accessed only {} time(s)", memory.access_count));
    }
    if memory.confidence <= CLEANUP_MAX_CONFIDENCE {
        reasons.push(format!("confidence {:.2} is at or below {CLEANUP_MAX_CONFIDENCE}", memory.confidence));
    }

    reasons
}

/// Memories that qualify as cleanup candidates: any of stale creation date,
/// low access count, or low confidence (§4.11).
pub fn cleanup_candidates(storage: &Storage) -> Result<Vec<CleanupCandidate>, StorageError> {
    let now = Utc::now();
    let all = scan_all(storage)?;

    Ok(all
        .into_iter()
        .filter_map(|memory| {
            let reasons = cleanup_reasons(&memory, now);
            if reasons.is_empty() {
                None
            } else {
                Some(CleanupCandidate { memory, reasons })
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewMemory;
    use crate::types::{ContextType, ImportanceTier};

    fn index(storage: &Storage, confidence: f32) -> i64 {
        storage
            .index_memory(
                NewMemory {
                    spec_folder: "proj".into(),
                    file_path: format!("/a/{confidence}.md"),
                    anchor_id: None,
                    title: "T".into(),
                    trigger_phrases: vec![],
                    content_hash: format!("h-{confidence}"),
                    embedding_model: None,
                    importance_weight: 0.5,
                    importance_tier: ImportanceTier::Normal,
                    context_type: ContextType::General,
                    decay_half_life_days: 90.0,
                    is_pinned: false,
                    confidence,
                    channel: None,
                    session_id: None,
                },
                None,
            )
            .unwrap()
    }

    #[test]
    fn record_access_increments_count() {
        let storage = Storage::open_in_memory(vec![], None).unwrap();
        let id = index(&storage, 1.0);
        record_access(&storage, id);
        record_access(&storage, id);
        let memory = storage.get_by_id(id).unwrap().unwrap();
        assert_eq!(memory.access_count, 2);
    }

    #[test]
    fn usage_stats_excludes_unused_memories() {
        let storage = Storage::open_in_memory(vec![], None).unwrap();
        let used = index(&storage, 1.0);
        index(&storage, 1.0);
        record_access(&storage, used);

        let stats = usage_stats(
            &storage,
            &UsageStatsQuery {
                sort_by: SortBy::AccessCount,
                order: SortOrder::Descending,
                limit: 10,
            },
        )
        .unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].id, used);
    }

    #[test]
    fn cleanup_candidates_flags_low_confidence() {
        let storage = Storage::open_in_memory(vec![], None).unwrap();
        index(&storage, 0.1);
        let candidates = cleanup_candidates(&storage).unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].reasons.iter().any(|r| r.contains("confidence")));
    }

    #[test]
    fn cleanup_candidates_skips_healthy_memories() {
        let storage = Storage::open_in_memory(vec![], None).unwrap();
        let id = index(&storage, 0.9);
        for _ in 0..5 {
            record_access(&storage, id);
        }
        let candidates = cleanup_candidates(&storage).unwrap();
        assert!(candidates.is_empty());
    }
}
