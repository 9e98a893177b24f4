//! Ranking & Diversity (C7)
//!
//! Composite smart-score ranking, MMR diversification, and
//! learn-from-selection trigger extraction.

pub mod learning;
pub mod mmr;

pub use learning::learn_from_selection;
pub use mmr::diversify;

use crate::search::SearchResult;
use chrono::{DateTime, Utc};

/// Smart score weights (§4.7): `0.5·similarity + 0.3·recency + 0.2·usage`.
const SIMILARITY_WEIGHT: f32 = 0.5;
const RECENCY_WEIGHT: f32 = 0.3;
const USAGE_WEIGHT: f32 = 0.2;

const RECENCY_WEEK: f32 = 1.0;
const RECENCY_MONTH: f32 = 0.8;
const RECENCY_OLD: f32 = 0.5;

const USAGE_SATURATION: u64 = 10;

fn recency_component(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
    let age_days = (now - updated_at).num_seconds() as f32 / 86_400.0;
    if age_days < 7.0 {
        RECENCY_WEEK
    } else if age_days < 30.0 {
        RECENCY_MONTH
    } else {
        RECENCY_OLD
    }
}

fn usage_component(access_count: u64) -> f32 {
    (access_count as f32 / USAGE_SATURATION as f32).min(1.0)
}

/// The composite smart score (0–1) for one result, given its reported
/// `similarity` (0–100).
pub fn smart_score(similarity: f32, updated_at: DateTime<Utc>, access_count: u64, now: DateTime<Utc>) -> f32 {
    let similarity_norm = (similarity / 100.0).clamp(0.0, 1.0);
    let recency = recency_component(updated_at, now);
    let usage = usage_component(access_count);
    SIMILARITY_WEIGHT * similarity_norm + RECENCY_WEIGHT * recency + USAGE_WEIGHT * usage
}

/// Sort `results` descending by smart score. Constitutional prepends are
/// assigned `similarity = 100` already, so they naturally sort first unless
/// outranked by a very recent, heavily-used normal result — callers that
/// want constitutional rows pinned should slice them off before ranking.
pub fn rank_by_smart_score(results: &mut [SearchResult], now: DateTime<Utc>) {
    results.sort_by(|a, b| {
        let score_a = smart_score(a.similarity, a.memory.updated_at, a.memory.access_count, now);
        let score_b = smart_score(b.similarity, b.memory.updated_at, b.memory.access_count, now);
        score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Enhanced search orchestration (§4.7): fetch `min(limit*2, 100)` candidates
/// upstream, smart-rank, diversify, then slice to `limit`. This function
/// performs the rank/diversify/slice portion given an already-fetched
/// over-fetched candidate list.
pub fn enhanced_rank(mut results: Vec<SearchResult>, limit: usize, now: DateTime<Utc>) -> Vec<SearchResult> {
    rank_by_smart_score(&mut results, now);
    let diversified = diversify(results);
    diversified.into_iter().take(limit).collect()
}

/// The over-fetch size used by enhanced search: `min(limit*2, 100)`.
pub fn overfetch_limit(limit: usize) -> usize {
    (limit.saturating_mul(2)).min(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewMemory;
    use crate::storage::Storage;
    use crate::types::{ContextType, ImportanceTier};

    fn make_result(similarity: f32, age_days: i64, access_count: u64) -> SearchResult {
        let storage = Storage::open_in_memory(vec![], None).unwrap();
        let id = storage
            .index_memory(
                NewMemory {
                    spec_folder: "proj".into(),
                    file_path: format!("/a/{age_days}-{access_count}.md"),
                    anchor_id: None,
                    title: "T".into(),
                    trigger_phrases: vec![],
                    content_hash: format!("h-{age_days}-{access_count}"),
                    embedding_model: None,
                    importance_weight: 0.5,
                    importance_tier: ImportanceTier::Normal,
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
        let mut memory = storage.get_by_id(id).unwrap().unwrap();
        memory.updated_at = Utc::now() - chrono::Duration::days(age_days);
        memory.access_count = access_count;
        SearchResult {
            memory,
            similarity,
            is_constitutional: false,
        }
    }

    #[test]
    fn smart_score_rewards_recent_frequently_used_high_similarity() {
        let now = Utc::now();
        let best = smart_score(100.0, now, 10, now);
        let worst = smart_score(0.0, now - chrono::Duration::days(400), 0, now);
        assert!(best > worst);
        assert!(best <= 1.0);
        assert!(worst >= 0.0);
    }

    #[test]
    fn recency_buckets_match_spec() {
        let now = Utc::now();
        assert_eq!(recency_component(now - chrono::Duration::days(1), now), RECENCY_WEEK);
        assert_eq!(recency_component(now - chrono::Duration::days(10), now), RECENCY_MONTH);
        assert_eq!(recency_component(now - chrono::Duration::days(90), now), RECENCY_OLD);
    }

    #[test]
    fn usage_saturates_at_ten_accesses() {
        assert_eq!(usage_component(10), 1.0);
        assert_eq!(usage_component(20), 1.0);
        assert_eq!(usage_component(5), 0.5);
    }

    #[test]
    fn rank_by_smart_score_orders_descending() {
        let now = Utc::now();
        let mut results = vec![make_result(10.0, 400, 0), make_result(90.0, 1, 10)];
        rank_by_smart_score(&mut results, now);
        assert!(results[0].similarity > results[1].similarity);
    }

    #[test]
    fn overfetch_limit_caps_at_one_hundred() {
        assert_eq!(overfetch_limit(10), 20);
        assert_eq!(overfetch_limit(80), 100);
    }
}
