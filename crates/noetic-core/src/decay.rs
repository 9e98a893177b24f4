//! Decay & Tiering (C8)
//!
//! Time-based importance decay and six-tier classification. Constitutional,
//! critical, and important tiers bypass decay entirely (`ImportanceTier::
//! bypasses_decay`, §3); everything else decays exponentially by half-life.

use crate::types::ImportanceTier;
use chrono::{DateTime, Utc};

/// Paths matching these prefixes are treated as core architectural
/// surfaces, the signal for `constitutional`/`critical` classification.
const CORE_PATH_SEGMENTS: [&str; 5] = ["/architecture/", "/core/", "/schema/", "/security/", "/config/"];

const DECISION_KEYWORDS: [&str; 6] = [
    "decided", "decision", "we chose", "we will use", "rationale", "trade-off",
];

fn matches_core_path(file_path: &str) -> bool {
    CORE_PATH_SEGMENTS.iter().any(|seg| file_path.contains(seg))
}

fn looks_like_decision(narrative: &str) -> bool {
    let lower = narrative.to_lowercase();
    DECISION_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Classify the importance tier of a new memory from its path and content
/// signals (§4.8). Context type `decision` on a core path promotes to
/// `critical`; off a core path it promotes to `important`.
pub fn classify_tier(file_path: &str, narrative: &str, is_decision_context: bool) -> ImportanceTier {
    let on_core_path = matches_core_path(file_path);
    let is_decision = is_decision_context || looks_like_decision(narrative);

    if on_core_path && is_decision {
        return ImportanceTier::Critical;
    }
    if on_core_path {
        return ImportanceTier::Constitutional;
    }
    if is_decision {
        return ImportanceTier::Important;
    }
    ImportanceTier::Normal
}

/// Exponential decay factor in `(0, 1]` for an item with `importance_weight`
/// at `half_life_days`, evaluated `age_days` after `updated_at`.
pub fn decay_factor(age_days: f32, half_life_days: f32) -> f32 {
    let half_life = if half_life_days > 0.0 { half_life_days } else { 90.0 };
    0.5_f32.powf(age_days.max(0.0) / half_life)
}

/// The decayed effective importance for a memory, honoring pin and
/// tier-bypass rules.
pub fn effective_importance(
    importance_weight: f32,
    tier: ImportanceTier,
    is_pinned: bool,
    half_life_days: f32,
    updated_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f32 {
    if is_pinned || tier.bypasses_decay() {
        return importance_weight;
    }
    let age_days = (now - updated_at).num_seconds() as f32 / 86_400.0;
    importance_weight * decay_factor(age_days, half_life_days)
}

/// Deterministic expiry computed from tier + `created_at` (§3 invariant #5).
/// `None` means "never expires".
pub fn compute_expiry(tier: ImportanceTier, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match tier {
        ImportanceTier::Constitutional | ImportanceTier::Critical | ImportanceTier::Important => None,
        ImportanceTier::Temporary => Some(created_at + chrono::Duration::days(7)),
        ImportanceTier::Deprecated => Some(created_at),
        ImportanceTier::Normal => Some(created_at + chrono::Duration::days(90)),
    }
}

/// Whether `expires_at` (if any) has already passed as of `now`.
pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|ts| ts <= now)
}
