//! Constitutional Cache (C9)
//!
//! A per-folder (and global, under the empty-string key) cache of the
//! constitutional-tier result set. Populated lazily on first search,
//! invalidated on any tier change or delete, capped at ~20 entries per
//! key (a 2,000-token budget at ~100 tokens per memory).

use crate::budget::TokenBudget;
use crate::search::cache::TtlLruCache;
use crate::storage::{Storage, StorageError};
use crate::types::{ImportanceTier, MemoryRecord};
use std::time::Duration;

const GLOBAL_KEY: &str = "";

pub struct ConstitutionalCache {
    cache: TtlLruCache<Vec<MemoryRecord>>,
    capacity_per_key: usize,
    token_budget: TokenBudget,
}

impl ConstitutionalCache {
    pub fn new(ttl: Duration, capacity_per_key: usize, token_budget: TokenBudget) -> Self {
        Self {
            cache: TtlLruCache::new(256, ttl),
            capacity_per_key,
            token_budget,
        }
    }

    fn key_for(folder: Option<&str>) -> String {
        folder.unwrap_or(GLOBAL_KEY).to_string()
    }

    /// Return the cached constitutional set for `folder` (or global if
    /// `None`), populating it from storage on a cache miss.
    pub fn get_or_populate(
        &mut self,
        storage: &Storage,
        folder: Option<&str>,
    ) -> Result<Vec<MemoryRecord>, StorageError> {
        let key = Self::key_for(folder);

        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }

        let all = storage.list_paginated(folder, 10_000, 0)?;
        let mut constitutional: Vec<MemoryRecord> = all
            .into_iter()
            .filter(|m| m.importance_tier == ImportanceTier::Constitutional)
            .collect();

        constitutional.sort_by(|a, b| {
            b.importance_weight
                .partial_cmp(&a.importance_weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let result = self
            .token_budget
            .truncate(constitutional, |m: &MemoryRecord| (m.title.chars().count() + 400) / 4);

        let mut capped = result.items;
        capped.truncate(self.capacity_per_key);

        self.cache.put(key, capped.clone());
        Ok(capped)
    }

    /// Invalidate the cache for `folder` (and always the global entry,
    /// since a folder-scoped tier change can affect the global prepend
    /// too). Pass `None` to invalidate everything.
    pub fn invalidate(&mut self, folder: Option<&str>) {
        match folder {
            Some(f) => {
                self.cache.invalidate_matching(f);
                self.cache.invalidate_matching(GLOBAL_KEY);
            }
            None => self.cache.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenBudgetConfig;
    use crate::storage::NewMemory;
    use crate::types::ContextType;

    fn cache() -> ConstitutionalCache {
        ConstitutionalCache::new(
            Duration::from_secs(5 * 60),
            20,
            TokenBudget::new(TokenBudgetConfig::default()),
        )
    }

    fn insert_weighted(storage: &Storage, folder: &str, title: &str, weight: f32) {
        storage
            .index_memory(
                NewMemory {
                    spec_folder: folder.to_string(),
                    file_path: format!("/a/{folder}-{title}.md"),
                    anchor_id: None,
                    title: title.to_string(),
                    trigger_phrases: vec![],
                    content_hash: format!("h-{folder}-{title}"),
                    embedding_model: None,
                    importance_weight: weight,
                    importance_tier: ImportanceTier::Constitutional,
                    context_type: ContextType::General,
                    decay_half_life_days: 90.0,
                    is_pinned: false,
                    confidence: 1.0,
                    channel: None,
                    session_id: None,
                },
                None,
            )
            .unwrap();
    }

    fn insert(storage: &Storage, folder: &str, tier: ImportanceTier) {
        storage
            .index_memory(
                NewMemory {
                    spec_folder: folder.to_string(),
                    file_path: format!("/a/{folder}-{tier:?}.md"),
                    anchor_id: None,
                    title: "T".into(),
                    trigger_phrases: vec![],
                    content_hash: format!("h-{folder}-{tier:?}"),
                    embedding_model: None,
                    importance_weight: 0.5,
                    importance_tier: tier,
                    context_type: ContextType::General,
                    decay_half_life_days: 90.0,
                    is_pinned: false,
                    confidence: 1.0,
                    channel: None,
                    session_id: None,
                },
                None,
            )
            .unwrap();
    }

    #[test]
    fn populates_only_constitutional_tier() {
        let storage = Storage::open_in_memory(vec![], None).unwrap();
        insert(&storage, "proj", ImportanceTier::Constitutional);
        insert(&storage, "proj", ImportanceTier::Normal);

        let mut cache = cache();
        let result = cache.get_or_populate(&storage, Some("proj")).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].importance_tier, ImportanceTier::Constitutional);
    }

    #[test]
    fn second_call_is_served_from_cache() {
        let storage = Storage::open_in_memory(vec![], None).unwrap();
        insert(&storage, "proj", ImportanceTier::Constitutional);

        let mut cache = cache();
        let first = cache.get_or_populate(&storage, Some("proj")).unwrap();
        insert(&storage, "proj", ImportanceTier::Constitutional);
        let second = cache.get_or_populate(&storage, Some("proj")).unwrap();
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn invalidate_forces_repopulation() {
        let storage = Storage::open_in_memory(vec![], None).unwrap();
        insert(&storage, "proj", ImportanceTier::Constitutional);

        let mut cache = cache();
        cache.get_or_populate(&storage, Some("proj")).unwrap();
        insert(&storage, "proj", ImportanceTier::Constitutional);
        cache.invalidate(Some("proj"));
        let after = cache.get_or_populate(&storage, Some("proj")).unwrap();
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn sorted_by_importance_weight_descending() {
        let storage = Storage::open_in_memory(vec![], None).unwrap();
        insert_weighted(&storage, "proj", "Low", 0.5);
        insert_weighted(&storage, "proj", "High", 0.9);
        insert_weighted(&storage, "proj", "Mid", 0.7);

        let mut cache = cache();
        let result = cache.get_or_populate(&storage, Some("proj")).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].title, "High");
        assert_eq!(result[1].title, "Mid");
        assert_eq!(result[2].title, "Low");
    }

    #[test]
    fn capped_at_capacity_per_key() {
        let storage = Storage::open_in_memory(vec![], None).unwrap();
        for i in 0..25 {
            storage
                .index_memory(
                    NewMemory {
                        spec_folder: "proj".into(),
                        file_path: format!("/a/{i}.md"),
                        anchor_id: None,
                        title: format!("T{i}"),
                        trigger_phrases: vec![],
                        content_hash: format!("h{i}"),
                        embedding_model: None,
                        importance_weight: 0.5,
                        importance_tier: ImportanceTier::Constitutional,
                        context_type: ContextType::General,
                        decay_half_life_days: 90.0,
                        is_pinned: false,
                        confidence: 1.0,
                        channel: None,
                        session_id: None,
                    },
                    None,
                )
                .unwrap();
        }
        let mut cache = cache();
        let result = cache.get_or_populate(&storage, Some("proj")).unwrap();
        assert!(result.len() <= 20);
    }
}
