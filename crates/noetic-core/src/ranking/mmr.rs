//! Maximal Marginal Relevance diversification (§4.7)
//!
//! Always keeps the top-ranked result, then iteratively picks the remaining
//! candidate maximizing `relevance - λ · maxSimToSelected` using a cheap
//! proxy similarity (shared `spec_folder` → 0.8, shared `date` → 0.5, take
//! the max) instead of a real embedding comparison.

use crate::search::SearchResult;

const LAMBDA: f32 = 0.3;
const MIN_RESULTS_FOR_DIVERSIFICATION: usize = 4;

const FOLDER_PROXY_SIM: f32 = 0.8;
const DATE_PROXY_SIM: f32 = 0.5;

fn proxy_similarity(a: &SearchResult, b: &SearchResult) -> f32 {
    let mut sim: f32 = 0.0;
    if a.memory.spec_folder == b.memory.spec_folder {
        sim = sim.max(FOLDER_PROXY_SIM);
    }
    if a.memory.created_at.date_naive() == b.memory.created_at.date_naive() {
        sim = sim.max(DATE_PROXY_SIM);
    }
    sim
}

/// Re-order `results` (already sorted by relevance, most relevant first) to
/// trade off redundancy against relevance. Results must already carry a
/// relevance proxy in `similarity`; the first result is always kept.
pub fn diversify(results: Vec<SearchResult>) -> Vec<SearchResult> {
    if results.len() < MIN_RESULTS_FOR_DIVERSIFICATION {
        return results;
    }

    let mut pool = results;
    let mut selected = vec![pool.remove(0)];

    while !pool.is_empty() {
        let mut best_idx = 0;
        let mut best_score = f32::MIN;

        for (idx, candidate) in pool.iter().enumerate() {
            let relevance = candidate.similarity / 100.0;
            let max_sim_to_selected = selected
                .iter()
                .map(|s| proxy_similarity(candidate, s))
                .fold(0.0_f32, f32::max);
            let mmr_score = relevance - LAMBDA * max_sim_to_selected;
            if mmr_score > best_score {
                best_score = mmr_score;
                best_idx = idx;
            }
        }

        selected.push(pool.remove(best_idx));
    }

    selected
}
