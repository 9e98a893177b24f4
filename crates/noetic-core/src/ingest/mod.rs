//! Session Ingestor (C12)
//!
//! Normalizes heterogeneous session input into observations, classifies
//! each observation's type, assigns anchor ids, and derives the context
//! type / importance tier / project phase that downstream indexing needs.
//! Template rendering and the storage call itself stay with the host.

pub mod anchors;
pub mod phase;

pub use anchors::{slugify, AnchorIdAllocator};
pub use phase::{detect_phase, ProjectPhase, ToolUsageCounts};

use crate::decay::classify_tier;
use crate::types::{ContextType, ImportanceTier};

/// Observation type classification (§4.12 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationKind {
    Feature,
    Bugfix,
    Refactor,
    Decision,
    Research,
    Discovery,
    Observation,
}

impl ObservationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationKind::Feature => "feature",
            ObservationKind::Bugfix => "bugfix",
            ObservationKind::Refactor => "refactor",
            ObservationKind::Decision => "decision",
            ObservationKind::Research => "research",
            ObservationKind::Discovery => "discovery",
            ObservationKind::Observation => "observation",
        }
    }

    fn to_context_type(self) -> ContextType {
        match self {
            ObservationKind::Research => ContextType::Research,
            ObservationKind::Feature | ObservationKind::Bugfix | ObservationKind::Refactor => {
                ContextType::Implementation
            }
            ObservationKind::Decision => ContextType::Decision,
            ObservationKind::Discovery => ContextType::Discovery,
            ObservationKind::Observation => ContextType::General,
        }
    }
}

const BUGFIX_KEYWORDS: &[&str] = &["fix", "bug", "regression", "patch", "hotfix"];
const REFACTOR_KEYWORDS: &[&str] = &["refactor", "cleanup", "restructure", "simplify", "rename"];
const DECISION_KEYWORDS: &[&str] = &["decided", "decision", "we chose", "we will use", "trade-off"];
const RESEARCH_KEYWORDS: &[&str] = &["investigat", "research", "explore", "read through", "looked into"];
const DISCOVERY_KEYWORDS: &[&str] = &["discovered", "found that", "turns out", "realized"];
const FEATURE_KEYWORDS: &[&str] = &["add", "implement", "introduce", "build", "new feature"];

fn matches_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| haystack.contains(kw))
}

/// Classify an observation's type from its title and narrative text.
/// Checked in order of specificity: decision and bugfix signals are the
/// least ambiguous, generic "observation" is the fallback.
pub fn classify_observation(title: &str, narrative: &str) -> ObservationKind {
    let haystack = format!("{} {}", title.to_lowercase(), narrative.to_lowercase());

    if matches_any(&haystack, DECISION_KEYWORDS) {
        ObservationKind::Decision
    } else if matches_any(&haystack, BUGFIX_KEYWORDS) {
        ObservationKind::Bugfix
    } else if matches_any(&haystack, REFACTOR_KEYWORDS) {
        ObservationKind::Refactor
    } else if matches_any(&haystack, DISCOVERY_KEYWORDS) {
        ObservationKind::Discovery
    } else if matches_any(&haystack, RESEARCH_KEYWORDS) {
        ObservationKind::Research
    } else if matches_any(&haystack, FEATURE_KEYWORDS) {
        ObservationKind::Feature
    } else {
        ObservationKind::Observation
    }
}

/// A single normalized observation, ready for anchor assignment and
/// template rendering by the host.
#[derive(Debug, Clone)]
pub struct Observation {
    pub title: String,
    pub narrative: String,
    pub kind: ObservationKind,
    pub context_type: ContextType,
    pub importance_tier: ImportanceTier,
    pub anchor_id: String,
    pub file_path: Option<String>,
}

/// The canonical shape all supported session input formats normalize into.
#[derive(Debug, Clone, Default)]
pub struct NormalizedSession {
    pub user_prompts: Vec<String>,
    pub observations: Vec<Observation>,
    pub recent_context: Vec<String>,
    pub files: Vec<String>,
}

/// One raw observation as received from either supported input shape,
/// before classification and anchor assignment.
#[derive(Debug, Clone)]
pub struct RawObservation {
    pub title: String,
    pub narrative: String,
    pub file_path: Option<String>,
    pub is_decision_context: bool,
}

/// Heterogeneous raw session input (transcript-capture or manual JSON),
/// already shape-normalized to field level by the host's deserializer.
#[derive(Debug, Clone, Default)]
pub struct RawSessionInput {
    pub user_prompts: Vec<String>,
    pub observations: Vec<RawObservation>,
    pub recent_context: Vec<String>,
    pub files: Vec<String>,
}

/// Normalize raw session input into the canonical record (§4.12 steps 1-5):
/// classify each observation, assign it a collision-free anchor id, and
/// derive its context type / importance tier from content signals.
pub fn normalize(input: RawSessionInput, spec_number_start: u32) -> NormalizedSession {
    let mut allocator = AnchorIdAllocator::new();
    let mut observations = Vec::with_capacity(input.observations.len());

    for (idx, raw) in input.observations.into_iter().enumerate() {
        let kind = classify_observation(&raw.title, &raw.narrative);
        let spec_number = spec_number_start + idx as u32;
        let anchor_id = allocator.allocate(kind, &raw.title, spec_number);

        let file_path = raw.file_path.clone().unwrap_or_default();
        let importance_tier = classify_tier(&file_path, &raw.narrative, raw.is_decision_context);

        observations.push(Observation {
            title: raw.title,
            narrative: raw.narrative,
            kind,
            context_type: kind.to_context_type(),
            importance_tier,
            anchor_id,
            file_path: raw.file_path,
        });
    }

    NormalizedSession {
        user_prompts: input.user_prompts,
        observations,
        recent_context: input.recent_context,
        files: input.files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_decision_before_other_keywords() {
        let kind = classify_observation("Fix the router", "we decided to fix it this way");
        assert_eq!(kind, ObservationKind::Decision);
    }

    #[test]
    fn classifies_bugfix() {
        assert_eq!(classify_observation("Fix login bug", ""), ObservationKind::Bugfix);
    }

    #[test]
    fn classifies_refactor() {
        assert_eq!(classify_observation("Refactor auth module", ""), ObservationKind::Refactor);
    }

    #[test]
    fn classifies_research() {
        assert_eq!(classify_observation("Investigate flaky test", ""), ObservationKind::Research);
    }

    #[test]
    fn classifies_discovery() {
        assert_eq!(classify_observation("Notes", "turns out the cache was stale"), ObservationKind::Discovery);
    }

    #[test]
    fn classifies_feature() {
        assert_eq!(classify_observation("Add retry support", ""), ObservationKind::Feature);
    }

    #[test]
    fn falls_back_to_observation() {
        assert_eq!(classify_observation("Random note", "nothing special"), ObservationKind::Observation);
    }

    #[test]
    fn normalize_assigns_unique_anchors_and_tiers() {
        let input = RawSessionInput {
            user_prompts: vec!["do the thing".into()],
            observations: vec![
                RawObservation {
                    title: "Add retry support".into(),
                    narrative: "implemented backoff".into(),
                    file_path: Some("/proj/src/retry.rs".into()),
                    is_decision_context: false,
                },
                RawObservation {
                    title: "Add retry support".into(),
                    narrative: "follow-up".into(),
                    file_path: Some("/proj/architecture/retry.md".into()),
                    is_decision_context: false,
                },
            ],
            recent_context: vec![],
            files: vec!["/proj/src/retry.rs".into()],
        };

        let normalized = normalize(input, 1);
        assert_eq!(normalized.observations.len(), 2);
        assert_ne!(normalized.observations[0].anchor_id, normalized.observations[1].anchor_id);
        assert_eq!(normalized.observations[1].importance_tier, ImportanceTier::Constitutional);
    }
}
