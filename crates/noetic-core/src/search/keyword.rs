//! Keyword fallback search (C6)
//!
//! Invoked when the vector extension is unavailable or a query embedding
//! could not be generated. Scores by substring matches weighted exactly as
//! specified: title hits count 3x, trigger-phrase hits 2.5x, folder/path
//! hits 1x, the sum scaled by `(0.5 + importance_weight)`.

use crate::types::MemoryRecord;

pub const TITLE_WEIGHT: f32 = 3.0;
pub const TRIGGER_WEIGHT: f32 = 2.5;
pub const FOLDER_WEIGHT: f32 = 1.0;
pub const PATH_WEIGHT: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct KeywordCandidate {
    pub memory: MemoryRecord,
    pub score: f32,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn score_one(record: &MemoryRecord, query: &str) -> f32 {
    let mut score = 0.0;

    if contains_ci(&record.title, query) {
        score += TITLE_WEIGHT;
    }
    if record.trigger_phrases.iter().any(|t| contains_ci(t, query)) {
        score += TRIGGER_WEIGHT;
    }
    if contains_ci(&record.spec_folder, query) {
        score += FOLDER_WEIGHT;
    }
    if contains_ci(&record.file_path, query) {
        score += PATH_WEIGHT;
    }

    score * (0.5 + record.importance_weight)
}

/// Score and rank `candidates` against `query`, returning the top `limit`
/// by descending score. Zero-score candidates are dropped.
pub fn search(candidates: &[MemoryRecord], query: &str, limit: usize) -> Vec<KeywordCandidate> {
    let mut scored: Vec<KeywordCandidate> = candidates
        .iter()
        .map(|m| KeywordCandidate {
            memory: m.clone(),
            score: score_one(m, query),
        })
        .filter(|c| c.score > 0.0)
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContextType, EmbeddingStatus, ImportanceTier};
    use chrono::Utc;

    fn record(title: &str, importance_weight: f32) -> MemoryRecord {
        MemoryRecord {
            id: 1,
            spec_folder: "proj".to_string(),
            file_path: "/a/b.md".to_string(),
            anchor_id: None,
            title: title.to_string(),
            trigger_phrases: vec!["retry logic".to_string()],
            content_hash: "h".to_string(),
            embedding_model: None,
            embedding_status: EmbeddingStatus::Success,
            importance_weight,
            importance_tier: ImportanceTier::Normal,
            context_type: ContextType::General,
            decay_half_life_days: 90.0,
            is_pinned: false,
            access_count: 0,
            last_accessed: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            expires_at: None,
            confidence: 1.0,
            related_memories: vec![],
            channel: None,
            session_id: None,
        }
    }

    #[test]
    fn title_match_scores_exactly_three_times_weighted_importance() {
        let m = record("Retry Engine Design", 0.5);
        let results = search(&[m], "retry engine", 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, TITLE_WEIGHT * (0.5 + 0.5));
    }

    #[test]
    fn trigger_phrase_match_scores_two_point_five_times_weighted_importance() {
        let m = record("Unrelated", 0.2);
        let results = search(&[m], "retry logic", 10);
        assert_eq!(results[0].score, TRIGGER_WEIGHT * (0.5 + 0.2));
    }

    #[test]
    fn non_matching_candidate_is_dropped() {
        let m = record("Completely Unrelated Content", 0.5);
        let results = search(&[m], "xyz123nomatch", 10);
        assert!(results.is_empty());
    }

    #[test]
    fn results_are_sorted_descending_by_score() {
        let strong = record("Retry Engine", 1.0);
        let weak = record("Some Other Title", 0.1);
        let mut weak = weak;
        weak.spec_folder = "retry-folder".to_string();
        let results = search(&[weak, strong], "retry", 10);
        assert!(results[0].score >= results[1].score);
    }
}
